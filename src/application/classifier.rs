//! フォアグラウンドアプリ分類モジュール
//!
//! 前面アプリのプロセス名から注入ポリシーを解決し、TTL付きで
//! キャッシュします。キーストロークごとのプロセス名解決
//! （OpenProcess + イメージ名取得）は高くつくため、同一プロセスへの
//! 連続キーストロークではキャッシュ済みポリシーを返します。
//!
//! キャッシュはワーカースレッドが読み、フォーカス変更通知スレッドが
//! invalidate()するため、短いクリティカルセクションのMutexで守る
//! （競合は稀かつ一瞬なのでロックフリーにはしない）。

use crate::domain::config::InjectionOverride;
use crate::domain::ports::ForegroundPort;
use crate::domain::types::{InjectionMethod, InjectionPolicy};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 分類キャッシュのエントリ
#[derive(Debug, Clone)]
struct CacheEntry {
    /// 解決時のプロセスID
    pid: u32,
    /// 解決済みポリシー
    policy: InjectionPolicy,
    /// 解決時刻
    resolved_at: Instant,
}

/// フォアグラウンドアプリ分類器
pub struct ForegroundAppClassifier {
    /// キャッシュTTL
    ttl: Duration,
    /// 設定ファイル由来のプロセス名別上書き（静的テーブルより優先）
    overrides: Vec<(String, InjectionPolicy)>,
    /// TTL付き分類キャッシュ
    cache: Mutex<Option<CacheEntry>>,
}

impl ForegroundAppClassifier {
    /// 新しい分類器を作成
    ///
    /// # Arguments
    /// - `ttl`: キャッシュの有効期間（通常200ms）
    /// - `overrides`: 設定ファイルのポリシー上書き
    pub fn new(ttl: Duration, overrides: &[InjectionOverride]) -> Self {
        Self {
            ttl,
            overrides: overrides
                .iter()
                .map(|ov| (ov.process.to_lowercase(), ov.to_policy()))
                .collect(),
            cache: Mutex::new(None),
        }
    }

    /// 現在のフォアグラウンドアプリの注入ポリシーを解決
    ///
    /// # 解決順序
    /// 1. 前面プロセスのID/名前を取得（失敗時はデフォルトFast）
    /// 2. 同一PIDのキャッシュがTTL内なら再分類せずそのまま返す
    /// 3. 設定上書き → 静的テーブルの順で分類し、キャッシュして返す
    pub fn policy(&self, foreground: &dyn ForegroundPort) -> InjectionPolicy {
        let Some(app) = foreground.current() else {
            // 前面プロセスを読めない場合もキーストロークは失敗させない
            tracing::debug!("Foreground process unavailable, using default policy");
            return InjectionPolicy::fast_default();
        };

        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(entry) = cache.as_ref() {
            if entry.pid == app.pid && entry.resolved_at.elapsed() < self.ttl {
                return entry.policy;
            }
        }

        let policy = self.resolve(&app.name);
        tracing::debug!(
            "Classified foreground app: {} (pid {}) -> {:?}",
            app.name,
            app.pid,
            policy.method
        );

        *cache = Some(CacheEntry {
            pid: app.pid,
            policy,
            resolved_at: Instant::now(),
        });

        policy
    }

    /// キャッシュを無効化
    ///
    /// フォーカス変更通知から呼ばれ、新しくフォーカスされたウィンドウの
    /// 最初のキーストロークに古いポリシーが使われるのを防ぐ。
    pub fn invalidate(&self) {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *cache = None;
    }

    /// プロセス名からポリシーを解決（上書き → 静的テーブル）
    fn resolve(&self, name: &str) -> InjectionPolicy {
        for (process, policy) in &self.overrides {
            if process == name {
                return *policy;
            }
        }
        classify_process(name)
    }
}

/// プロセス名の静的分類テーブル
///
/// 遅延値は各アプリでの取りこぼし実測から調整された経験値。
pub fn classify_process(name: &str) -> InjectionPolicy {
    match name {
        // ターミナル: 低速注入が必要
        "windowsterminal.exe" | "cmd.exe" | "powershell.exe" | "pwsh.exe" | "conhost.exe" => {
            InjectionPolicy::new(InjectionMethod::Slow, 8000, 25000, 8000)
        }

        // VSCode系エディタ: ターミナルと同等の低速注入
        "code.exe" | "cursor.exe" | "code - insiders.exe" | "windsurf.exe" => {
            InjectionPolicy::new(InjectionMethod::Slow, 8000, 25000, 8000)
        }

        // Electron系チャットアプリ: 中程度の低速
        "teams.exe" | "slack.exe" | "discord.exe" | "telegram.exe" => {
            InjectionPolicy::new(InjectionMethod::Slow, 3000, 8000, 3000)
        }

        // ブラウザ: やや遅めのFast
        "chrome.exe" | "msedge.exe" | "firefox.exe" | "brave.exe" | "opera.exe" => {
            InjectionPolicy::new(InjectionMethod::Fast, 500, 1500, 800)
        }

        // それ以外: 高速注入
        _ => InjectionPolicy::fast_default(),
    }
}
