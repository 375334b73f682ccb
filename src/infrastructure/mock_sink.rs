/// モック入力シンクアダプタ
///
/// テスト・開発用の合成入力シンク。送出されたバッチを記録するのみで、
/// 実際のOS送出は行わない。記録は共有ハンドル越しに検証できる。

use crate::domain::ports::InputSinkPort;
use crate::domain::types::SyntheticKey;
use crate::domain::DomainResult;
use std::sync::{Arc, Mutex};

/// モック入力シンクアダプタ
pub struct MockSinkAdapter {
    /// 送出されたバッチの記録
    sent: Arc<Mutex<Vec<Vec<SyntheticKey>>>>,
    /// 受理するイベント数の上限（UIPIブロックのシミュレーション用）
    accept_limit: Option<usize>,
}

#[allow(dead_code)]
impl MockSinkAdapter {
    /// 新しいモックシンクを作成
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            accept_limit: None,
        }
    }

    /// バッチごとの受理上限を設定（部分受理のシミュレーション）
    pub fn with_accept_limit(mut self, limit: usize) -> Self {
        self.accept_limit = Some(limit);
        self
    }

    /// 記録の共有ハンドルを取得
    pub fn recorded(&self) -> Arc<Mutex<Vec<Vec<SyntheticKey>>>> {
        Arc::clone(&self.sent)
    }
}

impl Default for MockSinkAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSinkPort for MockSinkAdapter {
    fn send(&mut self, keys: &[SyntheticKey]) -> DomainResult<usize> {
        let mut sent = match self.sent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sent.push(keys.to_vec());

        let accepted = match self.accept_limit {
            Some(limit) => keys.len().min(limit),
            None => keys.len(),
        };
        Ok(accepted)
    }
}
