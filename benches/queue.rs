//! SPSCイベントキューのベンチマーク
//!
//! フックコールバックのホットパスであるpushと、ワーカー側のpopの
//! スループットを計測する。

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gonhanh::application::queue::EventQueue;
use gonhanh::domain::types::KeyEvent;

fn bench_push_pop(c: &mut Criterion) {
    let queue: EventQueue<KeyEvent, 512> = EventQueue::new();

    c.bench_function("queue_push_pop", |b| {
        b.iter(|| {
            let event = KeyEvent::new(0x41, true, false, false, false);
            black_box(queue.push(event));
            black_box(queue.pop());
        })
    });
}

fn bench_fill_drain(c: &mut Criterion) {
    let queue: EventQueue<KeyEvent, 512> = EventQueue::new();

    c.bench_function("queue_fill_drain_511", |b| {
        b.iter(|| {
            for _ in 0..511 {
                let event = KeyEvent::new(0x41, true, false, false, false);
                black_box(queue.push(event));
            }
            while let Some(event) = queue.pop() {
                black_box(event);
            }
        })
    });
}

criterion_group!(benches, bench_push_pop, bench_fill_drain);
criterion_main!(benches);
