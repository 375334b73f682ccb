//! ロックフリーSPSCイベントキュー
//!
//! フックコールバック（プロデューサ）とワーカースレッド（コンシューマ）を
//! 橋渡しする固定容量リングバッファ。フックコールバックはOSのリアルタイム
//! 制約下で動くため、pushは決してブロックせず、満杯時は即座にfalseを返す。
//!
//! # 並行性の契約
//! - プロデューサはちょうど1スレッド、コンシューマはちょうど1スレッド
//! - head/tailのacquire/release順序付けにより、コンシューマは
//!   書き込み途中のスロットを決して観測しない
//! - 満杯と空を区別するため、構造上1スロットは常に未使用
//!   （実効容量はN-1）
//!
//! # false sharing対策
//! headとtailは別々の64バイト境界に配置し、プロデューサコアと
//! コンシューマコアのキャッシュライン競合を避ける。

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// キャッシュライン境界に整列したカウンタ
#[repr(align(64))]
struct CacheAligned(AtomicUsize);

/// 固定容量のロックフリーSPSCリングバッファ
///
/// Nはコンパイル時定数。実効容量はN-1。
pub struct EventQueue<T, const N: usize> {
    buffer: [UnsafeCell<MaybeUninit<T>>; N],
    /// 次に書き込むインデックス（プロデューサのみ更新）
    head: CacheAligned,
    /// 次に読み出すインデックス（コンシューマのみ更新）
    tail: CacheAligned,
}

// SAFETY: SPSC契約（プロデューサ1・コンシューマ1）の下で、スロットへの
// アクセスはhead/tailのacquire/releaseペアにより順序付けられる。
unsafe impl<T: Send + Copy, const N: usize> Sync for EventQueue<T, N> {}

impl<T: Copy, const N: usize> EventQueue<T, N> {
    /// 空のキューを作成
    pub fn new() -> Self {
        Self {
            buffer: std::array::from_fn(|_| UnsafeCell::new(MaybeUninit::uninit())),
            head: CacheAligned(AtomicUsize::new(0)),
            tail: CacheAligned(AtomicUsize::new(0)),
        }
    }

    /// 実効容量（N-1）
    pub const fn capacity() -> usize {
        N - 1
    }

    /// アイテムをキューに追加（プロデューサ専用）
    ///
    /// フックコールバックから呼ばれるため、ロックもシステムコールも
    /// 行わない。満杯時はfalseを返し、アイテムは呼び出し側で破棄される
    /// （リトライもブロックもしない）。
    ///
    /// # Returns
    /// - `true`: 追加成功
    /// - `false`: キュー満杯（アイテムは破棄）
    pub fn push(&self, item: T) -> bool {
        let head = self.head.0.load(Ordering::Relaxed);
        let next = (head + 1) % N;

        // 満杯チェック（acquire: コンシューマのtail更新と同期）
        if next == self.tail.0.load(Ordering::Acquire) {
            return false;
        }

        // SAFETY: headスロットはプロデューサだけが書き込み、コンシューマは
        // head更新（release）を観測するまでこのスロットを読まない。
        unsafe {
            (*self.buffer[head].get()).write(item);
        }

        // release: スロットへの書き込みをコンシューマから可視化
        self.head.0.store(next, Ordering::Release);
        true
    }

    /// アイテムをキューから取り出す（コンシューマ専用）
    ///
    /// # Returns
    /// - `Some(item)`: 取り出し成功
    /// - `None`: キューが空
    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.0.load(Ordering::Relaxed);

        // 空チェック（acquire: プロデューサのhead更新と同期）
        if tail == self.head.0.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: head != tailである以上、tailスロットはプロデューサが
        // 書き込みを完了（release済み）したスロット。
        let item = unsafe { (*self.buffer[tail].get()).assume_init() };

        self.tail.0.store((tail + 1) % N, Ordering::Release);
        Some(item)
    }

    /// キューが空か（近似値、診断用）
    ///
    /// 同期保証のないスナップショットであり、返った瞬間には
    /// 既に古い可能性がある。制御フローには使わないこと。
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.tail.0.load(Ordering::Relaxed) == self.head.0.load(Ordering::Relaxed)
    }

    /// キュー内のアイテム数（近似値、診断用）
    #[allow(dead_code)]
    pub fn approx_len(&self) -> usize {
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Relaxed);
        if head >= tail {
            head - tail
        } else {
            N - tail + head
        }
    }
}

impl<T: Copy, const N: usize> Default for EventQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue: EventQueue<u32, 8> = EventQueue::new();

        for i in 0..5 {
            assert!(queue.push(i));
        }
        for i in 0..5 {
            assert_eq!(queue.pop(), Some(i));
        }
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_capacity_is_n_minus_one() {
        let queue: EventQueue<u32, 8> = EventQueue::new();
        assert_eq!(EventQueue::<u32, 8>::capacity(), 7);

        // capacity-1 = 7個までは成功
        for i in 0..7 {
            assert!(queue.push(i), "push {} should succeed", i);
        }
        // 8個目（capacity番目）は失敗
        assert!(!queue.push(7));
        assert_eq!(queue.approx_len(), 7);

        // 1つ取り出せば1つ入る
        assert_eq!(queue.pop(), Some(0));
        assert!(queue.push(7));
        assert!(!queue.push(8));
    }

    #[test]
    fn test_empty_queue() {
        let queue: EventQueue<u32, 8> = EventQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.approx_len(), 0);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_wraparound() {
        let queue: EventQueue<u32, 4> = EventQueue::new();

        // リングを複数周させてもFIFOが保たれる
        for round in 0..10u32 {
            for i in 0..3 {
                assert!(queue.push(round * 3 + i));
            }
            for i in 0..3 {
                assert_eq!(queue.pop(), Some(round * 3 + i));
            }
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_then_drain() {
        let queue: EventQueue<u32, 16> = EventQueue::new();

        for i in 0..15 {
            assert!(queue.push(i));
        }
        assert!(!queue.push(100));

        let mut drained = Vec::new();
        while let Some(item) = queue.pop() {
            drained.push(item);
        }
        // 落ちたアイテム（100）は現れず、順序も保たれる
        assert_eq!(drained, (0..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_spsc_threaded() {
        const COUNT: u32 = 100_000;
        let queue: Arc<EventQueue<u32, 512>> = Arc::new(EventQueue::new());

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for i in 0..COUNT {
                    // 満杯なら空くまでスピン（テスト専用、実プロデューサは破棄する）
                    while !queue.push(i) {
                        std::hint::spin_loop();
                    }
                }
            })
        };

        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut expected = 0u32;
                while expected < COUNT {
                    if let Some(item) = queue.pop() {
                        assert_eq!(item, expected);
                        expected += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            })
        };

        producer.join().expect("producer thread");
        consumer.join().expect("consumer thread");
        assert!(queue.is_empty());
    }
}
