//! 統計情報管理モジュール
//!
//! キーストロークレート、各処理段階のレイテンシ、破棄イベント数などの
//! 統計を収集・出力します。

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 統計情報の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    /// キュー滞在時間（フック捕捉 → ワーカー取り出し）
    Queue,
    /// エンジン処理時間（取り出し → エンジン応答）
    Engine,
    /// 注入時間（エンジン応答 → 注入完了）
    Injection,
    /// エンドツーエンドのレイテンシ（捕捉 → 完了）
    EndToEnd,
}

/// 1キーストロークの処理タイムスタンプ
#[derive(Debug, Clone, Copy)]
pub struct StatSample {
    /// フックでの捕捉時刻
    pub captured_at: Instant,
    /// ワーカーでの取り出し時刻
    pub dequeued_at: Instant,
    /// エンジン応答時刻
    pub engine_done_at: Instant,
    /// 処理完了時刻（注入があればその完了後）
    pub finished_at: Instant,
    /// 注入が発生したか
    pub injected: bool,
}

impl StatSample {
    /// すべてのタイムスタンプを現在時刻にしたサンプル（テスト用）
    #[allow(dead_code)]
    pub fn zero() -> Self {
        let now = Instant::now();
        Self {
            captured_at: now,
            dequeued_at: now,
            engine_done_at: now,
            finished_at: now,
            injected: false,
        }
    }
}

/// パーセンタイル統計値
#[derive(Debug, Clone)]
pub struct PercentileStats {
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub count: usize,
}

/// キーストローク統計コレクター
#[derive(Debug)]
pub struct KeystrokeStats {
    /// レート計測用のタイムスタンプ（最大1秒分保持）
    keystroke_times: VecDeque<Instant>,
    /// 各処理段階の所要時間（最大1000サンプル保持）
    durations: std::collections::HashMap<StatKind, VecDeque<Duration>>,
    /// 注入が発生したキーストローク数
    injected_count: u64,
    /// 処理したキーストローク総数
    total_count: u64,
    /// 最後の統計出力時刻
    last_report: Instant,
    /// 統計出力間隔
    report_interval: Duration,
}

impl KeystrokeStats {
    /// レート計算の時間範囲（1秒間のキーストローク数を計測）
    const RATE_WINDOW_SECS: u64 = 1;

    /// 最大サンプル保持数（パーセンタイル計算用）
    const MAX_DURATION_SAMPLES: usize = 1000;

    /// 新しいKeystrokeStatsを作成
    ///
    /// # Arguments
    /// * `report_interval` - 統計出力間隔（例: 10秒）
    pub fn new(report_interval: Duration) -> Self {
        Self {
            keystroke_times: VecDeque::new(),
            durations: std::collections::HashMap::new(),
            injected_count: 0,
            total_count: 0,
            last_report: Instant::now(),
            report_interval,
        }
    }

    /// 1キーストロークのサンプルを記録
    pub fn record(&mut self, sample: &StatSample) {
        let now = Instant::now();
        self.keystroke_times.push_back(now);

        // 指定秒数より古いタイムスタンプを削除
        let window = Duration::from_secs(Self::RATE_WINDOW_SECS);
        while let Some(&front) = self.keystroke_times.front() {
            if now.duration_since(front) > window {
                self.keystroke_times.pop_front();
            } else {
                break;
            }
        }

        self.total_count += 1;
        if sample.injected {
            self.injected_count += 1;
        }

        self.record_duration(
            StatKind::Queue,
            sample.dequeued_at.duration_since(sample.captured_at),
        );
        self.record_duration(
            StatKind::Engine,
            sample.engine_done_at.duration_since(sample.dequeued_at),
        );
        self.record_duration(
            StatKind::Injection,
            sample.finished_at.duration_since(sample.engine_done_at),
        );
        self.record_duration(
            StatKind::EndToEnd,
            sample.finished_at.duration_since(sample.captured_at),
        );
    }

    /// 処理時間を記録
    fn record_duration(&mut self, kind: StatKind, duration: Duration) {
        let queue = self.durations.entry(kind).or_default();
        queue.push_back(duration);

        // 最大サンプル数を超えたら古いデータを破棄
        if queue.len() > Self::MAX_DURATION_SAMPLES {
            queue.pop_front();
        }
    }

    /// 直近1秒のキーストロークレートを計算
    pub fn current_rate(&self) -> f64 {
        if self.keystroke_times.is_empty() {
            return 0.0;
        }

        let count = self.keystroke_times.len() as f64;
        if let (Some(&first), Some(&last)) =
            (self.keystroke_times.front(), self.keystroke_times.back())
        {
            let elapsed = last.duration_since(first).as_secs_f64();
            if elapsed > 0.0 {
                return count / elapsed;
            }
        }
        0.0
    }

    /// パーセンタイル統計を計算
    ///
    /// # Returns
    /// パーセンタイル統計値。データがない場合は None
    pub fn percentile_stats(&self, kind: StatKind) -> Option<PercentileStats> {
        let queue = self.durations.get(&kind)?;
        if queue.is_empty() {
            return None;
        }

        let mut sorted: Vec<Duration> = queue.iter().copied().collect();
        sorted.sort();

        let count = sorted.len();
        let p50 = sorted[count * 50 / 100];
        let p95 = sorted[count * 95 / 100];
        let p99 = sorted[count * 99 / 100];

        Some(PercentileStats {
            p50,
            p95,
            p99,
            count,
        })
    }

    /// 統計レポートを出力すべきか判定
    pub fn should_report(&self) -> bool {
        self.last_report.elapsed() >= self.report_interval
    }

    /// 統計レポートを出力してタイマーをリセット
    pub fn report_and_reset(&mut self, dropped_events: u64) {
        use tracing::info;

        info!("=== Keystroke Pipeline Statistics ===");
        info!(
            "Rate: {:.1} keys/s (total: {}, injected: {})",
            self.current_rate(),
            self.total_count,
            self.injected_count
        );

        for kind in [
            StatKind::Queue,
            StatKind::Engine,
            StatKind::Injection,
            StatKind::EndToEnd,
        ] {
            if let Some(stats) = self.percentile_stats(kind) {
                info!(
                    "{:?}: p50={:.2}ms, p95={:.2}ms, p99={:.2}ms (n={})",
                    kind,
                    stats.p50.as_secs_f64() * 1000.0,
                    stats.p95.as_secs_f64() * 1000.0,
                    stats.p99.as_secs_f64() * 1000.0,
                    stats.count
                );
            }
        }

        if dropped_events > 0 {
            info!("Dropped events (queue full): {}", dropped_events);
        }
        info!("=====================================");

        self.last_report = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_with_durations(queue_us: u64, engine_us: u64, inject_us: u64) -> StatSample {
        let captured_at = Instant::now();
        let dequeued_at = captured_at + Duration::from_micros(queue_us);
        let engine_done_at = dequeued_at + Duration::from_micros(engine_us);
        let finished_at = engine_done_at + Duration::from_micros(inject_us);
        StatSample {
            captured_at,
            dequeued_at,
            engine_done_at,
            finished_at,
            injected: inject_us > 0,
        }
    }

    #[test]
    fn test_record_and_percentiles() {
        let mut stats = KeystrokeStats::new(Duration::from_secs(10));

        for i in 0..100 {
            stats.record(&sample_with_durations(i * 10, 100, 50));
        }

        let queue_stats = stats.percentile_stats(StatKind::Queue).expect("queue stats");
        assert_eq!(queue_stats.count, 100);
        // p50は中央付近（i=50 → 500µs）
        assert!(queue_stats.p50.as_micros() >= 450 && queue_stats.p50.as_micros() <= 550);
        assert_eq!(queue_stats.p99.as_micros(), 990);

        let e2e = stats.percentile_stats(StatKind::EndToEnd).expect("e2e stats");
        assert!(e2e.p50 >= queue_stats.p50);
    }

    #[test]
    fn test_injected_count() {
        let mut stats = KeystrokeStats::new(Duration::from_secs(10));

        stats.record(&sample_with_durations(10, 100, 0));
        stats.record(&sample_with_durations(10, 100, 500));
        stats.record(&sample_with_durations(10, 100, 500));

        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.injected_count, 2);
    }

    #[test]
    fn test_no_stats_without_samples() {
        let stats = KeystrokeStats::new(Duration::from_secs(10));
        assert!(stats.percentile_stats(StatKind::Engine).is_none());
        assert_eq!(stats.current_rate(), 0.0);
    }

    #[test]
    fn test_should_report() {
        let stats = KeystrokeStats::new(Duration::from_millis(100));

        assert!(!stats.should_report());

        std::thread::sleep(Duration::from_millis(150));

        assert!(stats.should_report());
    }

    #[test]
    fn test_report_resets_timer() {
        let mut stats = KeystrokeStats::new(Duration::from_millis(50));
        std::thread::sleep(Duration::from_millis(60));
        assert!(stats.should_report());

        stats.report_and_reset(0);
        assert!(!stats.should_report());
    }
}
