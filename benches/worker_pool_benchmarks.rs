use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use resizable_worker_pool::prelude::*;
use std::sync::Arc;
use std::thread;

fn quiet_config(workers: usize) -> WorkerPoolConfig {
    WorkerPoolConfig::new(workers).with_handler(|_: usize, msg: &str| -> Result<()> {
        black_box(msg.len());
        Ok(())
    })
}

fn benchmark_pool_lifecycle(c: &mut Criterion) {
    c.bench_function("pool_create_close_4_workers", |b| {
        b.iter(|| {
            let pool = WorkerPool::with_config(quiet_config(4)).expect("Failed to create pool");
            pool.close().expect("Failed to close pool");
        });
    });
}

fn benchmark_message_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_dispatch");

    group.bench_function("sequential_100_messages_4_workers", |b| {
        b.iter_batched(
            || WorkerPool::with_config(quiet_config(4)).expect("Failed to create pool"),
            |pool| {
                for i in 0..100 {
                    pool.add_message(format!("message {}", i))
                        .expect("Failed to send message");
                }
                pool.close().expect("Failed to close pool");
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("concurrent_4x25_messages_4_workers", |b| {
        b.iter_batched(
            || Arc::new(WorkerPool::with_config(quiet_config(4)).expect("Failed to create pool")),
            |pool| {
                let senders: Vec<_> = (0..4)
                    .map(|_| {
                        let pool = Arc::clone(&pool);
                        thread::spawn(move || {
                            for i in 0..25 {
                                pool.add_message(format!("message {}", i))
                                    .expect("Failed to send message");
                            }
                        })
                    })
                    .collect();
                for sender in senders {
                    sender.join().expect("sender panicked");
                }
                pool.close().expect("Failed to close pool");
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_resize(c: &mut Criterion) {
    let pool = WorkerPool::with_config(quiet_config(2)).expect("Failed to create pool");

    c.bench_function("resize_add_delete_8", |b| {
        b.iter(|| {
            pool.add_workers(8).expect("Failed to add workers");
            pool.delete_workers(8).expect("Failed to delete workers");
        });
    });

    pool.close().expect("Failed to close pool");
}

criterion_group!(
    benches,
    benchmark_pool_lifecycle,
    benchmark_message_dispatch,
    benchmark_resize
);
criterion_main!(benches);
