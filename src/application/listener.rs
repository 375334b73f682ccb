//! フックリスナーのフィルタリングロジック（Application層）
//!
//! OSフックコールバック1回ごとの判定をプラットフォーム非依存の形で実装する。
//! Windowsアダプタ（infrastructure::hook）はKBDLLHOOKSTRUCTをRawKeyInputへ
//! 変換してここに渡すだけで、判定そのものはこの層で完結する。
//!
//! # リアルタイム制約
//! この経路はOSのフックチェーン上で実行される。許されるのは
//! アトミック読み取りとロックフリーpushのみで、ロック・システムコール・
//! 追加アロケーションは行わない。

use crate::application::pipeline::PipelineShared;
use crate::domain::keymap::should_ignore_vk;
use crate::domain::types::{KeyEvent, INJECTED_KEY_MARKER};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// フックコールバックが受け取る生のキー情報
///
/// OSのフック構造体から最小限の情報だけを写したもの。
#[derive(Debug, Clone, Copy)]
pub struct RawKeyInput {
    /// 仮想キーコード
    pub vk_code: u16,
    /// キー押下ならtrue
    pub key_down: bool,
    /// Alt併用遷移（WM_SYSKEYDOWN/WM_SYSKEYUP）ならtrue
    pub system_transition: bool,
    /// OSが合成入力に立てるフラグ（LLKHF_INJECTED）
    pub os_injected: bool,
    /// イベントに付随する追加情報（dwExtraInfo）
    pub extra_info: usize,
    /// CapsLockのトグル状態
    pub caps: bool,
    /// Ctrl押下状態
    pub ctrl: bool,
    /// Shift押下状態
    pub shift: bool,
}

/// フィルタの判定結果
///
/// いずれの場合もキーイベント自体はOSのフックチェーンへ
/// そのまま流される（このIMEはキーを握りつぶさない）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVerdict {
    /// パイプラインの対象外（合成入力・修飾キー・キーアップ等）
    Ignored,
    /// キューへ追加済み
    Enqueued,
    /// キュー満杯により破棄
    Dropped,
}

/// フックコールバック1回ごとの判定とキュー追加
pub struct HookFilter {
    shared: Arc<PipelineShared>,
}

impl HookFilter {
    /// 新しいHookFilterを作成
    pub fn new(shared: Arc<PipelineShared>) -> Self {
        Self { shared }
    }

    /// 1回のフック呼び出しを処理
    ///
    /// # 判定順序
    /// 1. 合成入力（OSフラグまたは自プロセスのマーカー）→ 無視。
    ///    自分の注入出力を再処理すると無限ループになるため最優先。
    /// 2. 注入バースト実行中 → 無視（合成イベント列との競合を避ける）
    /// 3. Alt併用遷移・キーアップ・修飾/ファンクション/ロックキー → 無視
    /// 4. KeyEventを構築してpush。満杯なら破棄してカウント
    ///    （リトライもブロックもしない）。
    pub fn process(&self, raw: RawKeyInput) -> HookVerdict {
        // 1. 合成入力の識別（フィードバックループ防止）
        if raw.os_injected || raw.extra_info == INJECTED_KEY_MARKER {
            return HookVerdict::Ignored;
        }

        // 2. 注入実行中はすべて素通し
        if self.shared.is_injecting() {
            return HookVerdict::Ignored;
        }

        // 3. 対象外イベントのフィルタ
        if raw.system_transition || !raw.key_down || should_ignore_vk(raw.vk_code) {
            return HookVerdict::Ignored;
        }

        // 4. キューへ追加
        let event = KeyEvent::new(raw.vk_code, raw.key_down, raw.caps, raw.ctrl, raw.shift);
        if self.shared.queue.push(event) {
            HookVerdict::Enqueued
        } else {
            let dropped = self.shared.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                "Event queue full, dropped keystroke (vk={:#04x}, total dropped: {})",
                raw.vk_code,
                dropped
            );
            HookVerdict::Dropped
        }
    }
}
