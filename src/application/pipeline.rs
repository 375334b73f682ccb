//! パイプライン制御モジュール
//!
//! フック（OSスレッド）とワーカー/統計スレッドを束ねる共有コンテキストと、
//! スレッドのライフサイクル管理を提供します。
//!
//! # シングルトンの排除
//! フック・注入器をプロセスグローバルに置く代わりに、起動時に1度だけ
//! 構築されるPipelineSharedを参照共有で各コンポーネントへ渡す。
//! 隠れたグローバル可変状態を避け、テストでのフェイク注入を容易にする。

use crate::application::queue::EventQueue;
use crate::application::stats::{KeystrokeStats, StatSample};
use crate::domain::types::KeyEvent;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// イベントキューの容量
///
/// 512イベント ≈ ワーカーが50ms停止しても溢れない余裕。
/// 満杯になるのはワーカーのハング等の異常時のみ。
pub const QUEUE_CAPACITY: usize = 512;

/// 統計チャネルの容量（満杯時はサンプルを破棄）
const STATS_CHANNEL_CAPACITY: usize = 64;

/// パイプライン共有コンテキスト
///
/// フックコールバックとワーカースレッドの間で共有されるすべての
/// 可変状態。キューと3つのアトミック以外に共有状態は存在しない。
pub struct PipelineShared {
    /// フック → ワーカーのイベントキュー
    pub queue: EventQueue<KeyEvent, QUEUE_CAPACITY>,
    /// 注入バースト実行中フラグ
    ///
    /// ワーカーが注入直前にrelease-storeし、注入完了後にクリアする。
    /// フック側はacquire-loadし、自己生成イベントとの競合を避ける。
    pub injecting: AtomicBool,
    /// フォーカス変更通知フラグ
    ///
    /// WinEventコールバックがセットし、ワーカーが次のイベント処理時に
    /// 消費してエンジンの合成バッファをクリアする。
    pub focus_changed: AtomicBool,
    /// キュー満杯により破棄されたイベント数（診断用）
    pub dropped_events: AtomicU64,
}

impl PipelineShared {
    /// 新しい共有コンテキストを作成
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: EventQueue::new(),
            injecting: AtomicBool::new(false),
            focus_changed: AtomicBool::new(false),
            dropped_events: AtomicU64::new(0),
        })
    }

    /// 注入中フラグを読む（フック側、acquire）
    #[inline]
    pub fn is_injecting(&self) -> bool {
        self.injecting.load(Ordering::Acquire)
    }

    /// フォーカス変更を通知（WinEventコールバック側）
    #[inline]
    pub fn mark_focus_changed(&self) {
        self.focus_changed.store(true, Ordering::Release);
    }

    /// フォーカス変更フラグを消費（ワーカー側）
    #[inline]
    pub fn take_focus_changed(&self) -> bool {
        self.focus_changed.swap(false, Ordering::AcqRel)
    }
}

/// 統計チャネルを作成
pub fn stats_channel() -> (Sender<StatSample>, Receiver<StatSample>) {
    crossbeam_channel::bounded(STATS_CHANNEL_CAPACITY)
}

/// 統計サンプルを非ブロッキング送信
///
/// 統計はベストエフォート。チャネル満杯時はサンプルを黙って破棄し、
/// ワーカーのホットパスを決してブロックしない。
pub fn send_stat_sample(tx: &Sender<StatSample>, sample: StatSample) {
    match tx.try_send(sample) {
        Ok(_) => {}
        Err(TrySendError::Full(_)) => {
            // 統計スレッドが追いついていない - サンプルを破棄
        }
        Err(TrySendError::Disconnected(_)) => {
            // 統計スレッド終了済み
        }
    }
}

/// 統計スレッドのメインループ
///
/// ワーカーからのサンプルを集計し、設定間隔でレポートを出力する。
/// チャネルが切断されたら終了する。
pub fn stats_thread(
    rx: Receiver<StatSample>,
    shared: Arc<PipelineShared>,
    report_interval: Duration,
) {
    tracing::info!("Stats thread started (report interval: {:?})", report_interval);

    let mut stats = KeystrokeStats::new(report_interval);
    let poll_interval = Duration::from_millis(100);

    loop {
        match rx.recv_timeout(poll_interval) {
            Ok(sample) => {
                stats.record(&sample);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // タイムアウト - レポート判定を続行
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                // Channel closed
                break;
            }
        }

        if stats.should_report() {
            let dropped = shared.dropped_events.load(Ordering::Relaxed);
            stats.report_and_reset(dropped);
        }
    }

    tracing::info!("Stats thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_context_defaults() {
        let shared = PipelineShared::new();
        assert!(!shared.is_injecting());
        assert!(!shared.take_focus_changed());
        assert!(shared.queue.is_empty());
        assert_eq!(shared.dropped_events.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_focus_changed_is_consumed_once() {
        let shared = PipelineShared::new();

        shared.mark_focus_changed();
        assert!(shared.take_focus_changed());
        // 2回目の消費はfalse
        assert!(!shared.take_focus_changed());
    }

    #[test]
    fn test_send_stat_sample_drops_when_full() {
        let (tx, rx) = crossbeam_channel::bounded(1);

        send_stat_sample(&tx, StatSample::zero());
        // 満杯でもパニックせず破棄される
        send_stat_sample(&tx, StatSample::zero());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_stat_sample_disconnected() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);
        // 切断済みでもパニックしない
        send_stat_sample(&tx, StatSample::zero());
    }
}
