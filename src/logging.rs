/// ログ・トレーシング基盤
///
/// tracingを使用した統一的なログ出力。
///
/// # ビルドモードとパフォーマンス
/// - **Release ビルド**: ログ初期化が空実装になり、ゼロランタイムオーバーヘッド
/// - **Debug ビルド**: 非同期ファイル出力（tracing-appender）でホットパスへの影響を最小化
///
/// # 設計意図
/// フックコールバックとワーカーはサブミリ秒の予算で動くため、
/// ログ出力がホットパスのパフォーマンスに影響しないように実装しています。

#[cfg(debug_assertions)]
use std::path::PathBuf;
#[cfg(debug_assertions)]
use tracing::info;
#[cfg(debug_assertions)]
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログシステムを初期化
///
/// # ビルドモード別の動作
/// - **Release ビルド**: この関数自体が空関数にコンパイル最適化され、ゼロオーバーヘッド
/// - **Debug ビルド**: tracing-appenderで非同期ファイル出力（呼び出し側はメモリコピーのみ）
///
/// # Arguments
/// - `log_level`: ログレベル（"info", "debug", "trace"等）
/// - `json_format`: JSON形式で出力するか
/// - `log_dir`: ログファイル出力先（None = 標準出力）
///
/// # Returns
/// - Debug: `Some(WorkerGuard)` - プログラム終了まで保持必須（Drop時にログスレッド終了）
/// - Release: `None` - オーバーヘッドなし
#[cfg(debug_assertions)]
pub fn init_logging(
    log_level: &str,
    json_format: bool,
    log_dir: Option<PathBuf>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    match log_dir {
        Some(dir) => {
            // ファイル出力（非同期）
            if let Err(e) = std::fs::create_dir_all(&dir) {
                eprintln!("Failed to create log directory: {}", e);
                return None;
            }

            let file_appender = tracing_appender::rolling::daily(dir, "gonhanh.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let subscriber = tracing_subscriber::registry().with(env_filter);

            let result = if json_format {
                subscriber
                    .with(fmt::layer().json().with_writer(non_blocking))
                    .try_init()
            } else {
                subscriber
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_thread_ids(true)
                            .with_ansi(false) // ファイル出力時はANSIエスケープ無効
                            .with_writer(non_blocking),
                    )
                    .try_init()
            };

            if result.is_err() {
                return None;
            }

            info!(
                "Logging initialized (async file): level={}, format={}",
                log_level,
                if json_format { "json" } else { "text" }
            );
            Some(guard)
        }
        None => {
            // 標準出力（デバッグ用）
            let subscriber = tracing_subscriber::registry().with(env_filter);

            let result = if json_format {
                subscriber.with(fmt::layer().json()).try_init()
            } else {
                subscriber
                    .with(fmt::layer().with_target(true).with_thread_ids(true))
                    .try_init()
            };

            if result.is_ok() {
                info!(
                    "Logging initialized (stdout): level={}, format={}",
                    log_level,
                    if json_format { "json" } else { "text" }
                );
            }
            None
        }
    }
}

/// Release ビルド時のスタブ実装
#[cfg(not(debug_assertions))]
pub fn init_logging(
    _log_level: &str,
    _json_format: bool,
    _log_dir: Option<std::path::PathBuf>,
) -> Option<()> {
    // Release ビルド時は何もしない（ランタイムオーバーヘッドなし）
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_stdout() {
        // 標準出力モード（デバッグ用）
        let guard = init_logging("debug", false, None);

        #[cfg(debug_assertions)]
        assert!(guard.is_none());
        #[cfg(not(debug_assertions))]
        let _ = guard;

        tracing::info!("Test log message");
        // ログが出力されることを確認（エラーにならないこと）
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_init_logging_file() {
        // ファイル出力モード
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let log_dir = temp_dir.path().join("logs");

        // グローバルsubscriberが既に設定されている場合はスキップ
        // （他のテストで設定済みの可能性がある）
        let guard = init_logging("info", false, Some(log_dir.clone()));

        if guard.is_none() {
            // 既に設定済み - スキップ
            return;
        }

        assert!(log_dir.exists());

        tracing::info!("Test file log");

        // guardをDropしてログをフラッシュ
        drop(guard);

        // ログファイルが作成されていることを確認
        let log_files: Vec<_> = std::fs::read_dir(&log_dir)
            .expect("read log dir")
            .filter_map(|e| e.ok())
            .collect();
        assert!(!log_files.is_empty(), "Log file should be created");
    }
}
