mod application;
mod domain;
mod infrastructure;
mod logging;

use crate::logging::init_logging;
use std::path::PathBuf;

fn main() {
    // ログシステムの初期化（非同期ファイル出力）
    let log_dir = PathBuf::from("logs");
    let _guard = init_logging("info", false, Some(log_dir));
    // 注意: _guardはmain終了まで保持する必要がある（Dropでログスレッドが終了）

    tracing::info!("gonhanh starting...");

    match run() {
        Ok(_) => {
            tracing::info!("gonhanh terminated gracefully.");
        }
        Err(e) => {
            tracing::error!("Fatal error: {:?}", e);
            eprintln!("gonhanh failed to start: {:?}", e);
            std::process::exit(1);
        }
    }
}

/// アプリケーションのメイン処理
#[cfg(windows)]
fn run() -> anyhow::Result<()> {
    use crate::application::classifier::ForegroundAppClassifier;
    use crate::application::injector::TextInjector;
    use crate::domain::config::AppConfig;
    use crate::application::pipeline::{stats_channel, stats_thread, PipelineShared};
    use crate::application::worker::spawn_worker;
    use crate::infrastructure::engine::EngineDllClient;
    use crate::infrastructure::foreground::{FocusWatcher, WindowsForegroundAdapter};
    use crate::infrastructure::hook::KeyboardHookAdapter;
    use crate::infrastructure::sender::SendInputAdapter;
    use std::sync::Arc;

    // 設定ファイルの読み込み（存在しない場合はデフォルト設定を使用）
    let config = match AppConfig::from_file("config.toml") {
        Ok(config) => {
            tracing::info!("Loaded configuration from config.toml");
            config
        }
        Err(e) => {
            tracing::warn!("Failed to load config.toml: {:?}, using defaults", e);
            AppConfig::default()
        }
    };

    // 設定の検証
    config.validate()?;

    tracing::info!("Configuration validated successfully");
    tracing::info!(
        "Engine: library={}, method={:?}",
        config.engine.library,
        config.engine.method
    );
    tracing::info!(
        "Classifier: ttl={}ms, overrides={}",
        config.classifier.ttl_ms,
        config.injection.overrides.len()
    );

    // エンジンDLLのロードと初期化
    tracing::info!("Loading transformation engine...");
    let engine = EngineDllClient::load(&config.engine.library)?;
    engine.initialize(&config.engine);

    // パイプライン共有コンテキストの構築
    let shared = PipelineShared::new();
    let classifier = Arc::new(ForegroundAppClassifier::new(
        config.classifier.ttl(),
        &config.injection.overrides,
    ));
    let foreground = Arc::new(WindowsForegroundAdapter::new());
    let injector = TextInjector::new(SendInputAdapter::new());

    // 統計スレッドの起動
    let (stats_tx, stats_rx) = stats_channel();
    let stats_handle = {
        let shared = Arc::clone(&shared);
        let interval = config.pipeline.stats_interval();
        std::thread::Builder::new()
            .name("gonhanh-stats".to_string())
            .spawn(move || stats_thread(stats_rx, shared, interval))?
    };

    // ワーカースレッドの起動
    tracing::info!("Starting dispatch worker...");
    let worker = spawn_worker(
        Arc::clone(&shared),
        engine,
        injector,
        Arc::clone(&classifier),
        foreground,
        stats_tx,
        config.worker.clone(),
    );

    // キーボードフックの登録（失敗は致命的）
    let hook = KeyboardHookAdapter::install(Arc::clone(&shared))?;

    // フォーカス変更ウォッチャーの登録
    let focus_watcher = FocusWatcher::install({
        let classifier = Arc::clone(&classifier);
        let shared = Arc::clone(&shared);
        move || {
            classifier.invalidate();
            shared.mark_focus_changed();
        }
    })?;

    // Ctrl+Cでメッセージループを抜ける
    install_ctrl_handler()?;

    tracing::info!("gonhanh running. Press Ctrl+C to exit.");

    // WinEventコールバックはこのスレッドのメッセージループ上で配送される
    run_message_loop();

    tracing::info!("Shutting down...");

    // 終了順序: フック解除（生産停止）→ ワーカー停止（消費停止）。
    // キューに残ったイベントはドレインしない。
    drop(hook);
    drop(focus_watcher);
    worker.stop();
    let _ = stats_handle.join();

    Ok(())
}

/// Ctrl+CハンドラをメッセージループへのWM_QUIT送出として登録
#[cfg(windows)]
fn install_ctrl_handler() -> anyhow::Result<()> {
    use std::sync::atomic::Ordering;
    use windows::Win32::System::Console::SetConsoleCtrlHandler;
    use windows::Win32::System::Threading::GetCurrentThreadId;

    MAIN_THREAD_ID.store(unsafe { GetCurrentThreadId() }, Ordering::Release);

    unsafe { SetConsoleCtrlHandler(Some(ctrl_handler), true) }
        .map_err(|e| anyhow::anyhow!("SetConsoleCtrlHandler failed: {}", e))?;
    Ok(())
}

#[cfg(windows)]
static MAIN_THREAD_ID: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);

/// コンソール制御イベントのハンドラ（別スレッドで呼ばれる）
#[cfg(windows)]
unsafe extern "system" fn ctrl_handler(_ctrl_type: u32) -> windows::Win32::Foundation::BOOL {
    use std::sync::atomic::Ordering;
    use windows::Win32::Foundation::{LPARAM, TRUE, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{PostThreadMessageW, WM_QUIT};

    let tid = MAIN_THREAD_ID.load(Ordering::Acquire);
    if tid != 0 {
        let _ = PostThreadMessageW(tid, WM_QUIT, WPARAM(0), LPARAM(0));
    }
    TRUE
}

/// WM_QUITまでメッセージループを回す
#[cfg(windows)]
fn run_message_loop() {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, GetMessageW, TranslateMessage, MSG,
    };

    let mut msg = MSG::default();
    loop {
        let result = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
        // 0 = WM_QUIT, -1 = エラー
        if result.0 <= 0 {
            break;
        }
        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

/// 非Windows環境向けのスタブ
#[cfg(not(windows))]
fn run() -> anyhow::Result<()> {
    anyhow::bail!(
        "gonhanh requires Windows (WH_KEYBOARD_LL hook and SendInput are Windows-only APIs)"
    )
}
