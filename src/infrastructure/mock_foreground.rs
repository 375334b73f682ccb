/// モックフォアグラウンド検出アダプタ
///
/// テスト・開発用。返すアプリ識別情報を外部から差し替えられる。

use crate::domain::ports::ForegroundPort;
use crate::domain::types::AppIdentity;
use std::sync::{Arc, Mutex};

/// モックフォアグラウンド検出アダプタ
pub struct MockForegroundAdapter {
    app: Arc<Mutex<Option<AppIdentity>>>,
}

#[allow(dead_code)]
impl MockForegroundAdapter {
    /// 指定アプリを返すモックを作成
    pub fn returning(app: Option<AppIdentity>) -> Self {
        Self {
            app: Arc::new(Mutex::new(app)),
        }
    }

    /// 返すアプリの共有ハンドルを取得（テスト中の切り替え用）
    pub fn handle(&self) -> Arc<Mutex<Option<AppIdentity>>> {
        Arc::clone(&self.app)
    }
}

impl ForegroundPort for MockForegroundAdapter {
    fn current(&self) -> Option<AppIdentity> {
        match self.app.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
