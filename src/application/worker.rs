//! イベントディスパッチワーカー
//!
//! キューからキーイベントを取り出し、エンジン呼び出し・ポリシー解決・
//! テキスト注入を実行する専用スレッド。フックコールバックから遅い処理を
//! すべて引き剥がすことで、フック側のサブミリ秒制約を守る。

use crate::application::classifier::ForegroundAppClassifier;
use crate::application::injector::TextInjector;
use crate::application::pipeline::{send_stat_sample, PipelineShared};
use crate::application::stats::StatSample;
use crate::domain::config::WorkerConfig;
use crate::domain::keymap::vk_to_engine_keycode;
use crate::domain::ports::{EnginePort, ForegroundPort, InputSinkPort};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// 実行中のワーカースレッドのハンドル
pub struct WorkerHandle {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// ワーカーが実行中か
    #[allow(dead_code)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// ワーカーを停止してスレッドを合流
    ///
    /// 呼び出し前にフックの登録解除を済ませておくこと
    /// （新規イベントの生産を止めてから消費を止める）。
    /// キューに残ったイベントはドレインしない。
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // stop()を経ずにDropされた場合もスレッドを止める
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// ワーカースレッドを起動
///
/// エンジンと注入器はワーカースレッドが専有する（FFIエンジンは
/// スレッド間共有できないため所有権ごと移す）。
pub fn spawn_worker<E, S>(
    shared: Arc<PipelineShared>,
    engine: E,
    injector: TextInjector<S>,
    classifier: Arc<ForegroundAppClassifier>,
    foreground: Arc<dyn ForegroundPort>,
    stats_tx: Sender<StatSample>,
    config: WorkerConfig,
) -> WorkerHandle
where
    E: EnginePort + 'static,
    S: InputSinkPort + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let thread_running = Arc::clone(&running);

    let handle = std::thread::spawn(move || {
        worker_loop(
            shared,
            engine,
            injector,
            classifier,
            foreground,
            stats_tx,
            config,
            thread_running,
        );
    });

    WorkerHandle {
        running,
        handle: Some(handle),
    }
}

/// ワーカースレッドのメインループ
#[allow(clippy::too_many_arguments)]
fn worker_loop<E, S>(
    shared: Arc<PipelineShared>,
    mut engine: E,
    injector: TextInjector<S>,
    classifier: Arc<ForegroundAppClassifier>,
    foreground: Arc<dyn ForegroundPort>,
    stats_tx: Sender<StatSample>,
    config: WorkerConfig,
    running: Arc<AtomicBool>,
) where
    E: EnginePort,
    S: InputSinkPort,
{
    if config.time_critical {
        elevate_thread_priority();
    }

    let idle_sleep = config.idle_sleep();
    tracing::info!(
        "Worker thread started (idle sleep: {:?}, time critical: {})",
        idle_sleep,
        config.time_critical
    );

    while running.load(Ordering::Acquire) {
        let mut had_event = false;

        // キューに溜まったイベントをすべて処理
        while let Some(event) = shared.queue.pop() {
            had_event = true;
            let dequeued_at = Instant::now();

            // フォーカスが変わっていたら前のウィンドウの合成バッファを捨てる
            if shared.take_focus_changed() {
                engine.clear();
            }

            // エンジンのキーコード空間へ変換（対象外キーはスキップ）
            let Some(keycode) = vk_to_engine_keycode(event.vk_code) else {
                continue;
            };

            let edit = engine.process_key(keycode, event.caps, event.ctrl, event.shift);
            let engine_done_at = Instant::now();

            let mut injected = false;
            if let Some(edit) = edit {
                if edit.requires_injection() {
                    // フック側に合成バースト実行中を知らせる
                    shared.injecting.store(true, Ordering::Release);

                    let policy = classifier.policy(foreground.as_ref());
                    let result = injector.inject(edit.backspace, &edit.chars, &policy);

                    shared.injecting.store(false, Ordering::Release);
                    injected = true;

                    if let Err(e) = result {
                        tracing::error!("Injection failed: {:?}", e);
                    }
                }
            }

            send_stat_sample(
                &stats_tx,
                StatSample {
                    captured_at: event.timestamp,
                    dequeued_at,
                    engine_done_at,
                    finished_at: Instant::now(),
                    injected,
                },
            );

            #[cfg(debug_assertions)]
            {
                let latency = event.timestamp.elapsed();
                if latency.as_millis() > 1 {
                    tracing::debug!(
                        "Keystroke latency exceeded 1ms: {:?} (vk={:#04x})",
                        latency,
                        event.vk_code
                    );
                }
            }
        }

        // アイドル時はスリープしてCPU使用を抑える
        if !had_event {
            std::thread::sleep(idle_sleep);
        }
    }

    tracing::info!("Worker thread stopped");
}

/// ワーカースレッドをTIME_CRITICAL優先度へ昇格
#[cfg(windows)]
fn elevate_thread_priority() {
    use windows::Win32::System::Threading::{
        GetCurrentThread, SetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL,
    };

    // 昇格失敗は致命的ではない（通常優先度で続行）
    let result = unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) };
    if result.is_err() {
        tracing::warn!("Failed to elevate worker thread priority");
    }
}

/// 非Windows環境ではスレッド優先度の昇格を行わない
#[cfg(not(windows))]
fn elevate_thread_priority() {}
