/// モックエンジンアダプタ
///
/// テスト・開発用の変換エンジンモック実装。
/// キーコードごとに返す編集要求を事前にスクリプトしておける。

use crate::domain::ports::EnginePort;
use crate::domain::types::EngineEdit;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// モックエンジンアダプタ
pub struct MockEngineAdapter {
    /// キーコード → 返す編集要求
    responses: HashMap<u16, EngineEdit>,
    /// process_keyの呼び出し回数（共有カウンタ、テスト検証用）
    key_calls: Arc<AtomicU32>,
    /// clear()の呼び出し回数（共有カウンタ、テスト検証用）
    clear_calls: Arc<AtomicU32>,
}

#[allow(dead_code)]
impl MockEngineAdapter {
    /// 新しいモックエンジンを作成（すべてのキーでパススルー）
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            key_calls: Arc::new(AtomicU32::new(0)),
            clear_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// 指定キーコードへの応答をスクリプト
    pub fn with_response(mut self, keycode: u16, edit: EngineEdit) -> Self {
        self.responses.insert(keycode, edit);
        self
    }

    /// process_key呼び出し回数の共有ハンドルを取得
    pub fn key_call_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.key_calls)
    }

    /// clear呼び出し回数の共有ハンドルを取得
    pub fn clear_call_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.clear_calls)
    }
}

impl Default for MockEngineAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EnginePort for MockEngineAdapter {
    fn process_key(
        &mut self,
        keycode: u16,
        _caps: bool,
        _ctrl: bool,
        _shift: bool,
    ) -> Option<EngineEdit> {
        self.key_calls.fetch_add(1, Ordering::Relaxed);
        self.responses.get(&keycode).cloned()
    }

    fn clear(&mut self) {
        self.clear_calls.fetch_add(1, Ordering::Relaxed);
    }
}
