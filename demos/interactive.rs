//! Interactive front end for the worker pool.
//!
//! Reads menu choices from stdin and drives the pool: add or remove workers,
//! send a burst of generated messages concurrently, print status. Ctrl+C,
//! SIGTERM, the quit option or end of input cancels the pool's scope and
//! closes it.
//!
//! Run with: `RUST_LOG=info cargo run --example interactive`

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use resizable_worker_pool::prelude::*;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use tokio::signal;

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
];

/// Generates lorem-ipsum style sentences from a seeded RNG
struct SentenceGenerator {
    rng: Mutex<fastrand::Rng>,
}

impl SentenceGenerator {
    fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    fn sentence(&self) -> String {
        let mut rng = self.rng.lock();
        let len = rng.usize(4..12);
        let words: Vec<&str> = (0..len).map(|_| WORDS[rng.usize(..WORDS.len())]).collect();
        let mut sentence = words.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }
}

/// Prints `text` and reads one line; `None` once stdin is exhausted
fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, text: &str) -> Option<String> {
    print!("{}", text);
    let _ = io::stdout().flush();
    lines.next()?.ok()
}

fn read_count(lines: &mut impl Iterator<Item = io::Result<String>>, text: &str) -> Option<usize> {
    prompt(lines, text)?.trim().parse().ok()
}

fn send_burst(pool: &WorkerPool, generator: &SentenceGenerator, count: usize) {
    let panicked = thread::scope(|scope| {
        let handles: Vec<_> = (0..count)
            .map(|id| {
                scope.spawn(move || {
                    let msg = format!("Message {}: {}", id, generator.sentence());
                    if let Err(e) = pool.add_message(msg) {
                        println!("Failed to send message: {}", e);
                    }
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join())
            .filter(|r| r.is_err())
            .count()
    });

    if panicked == 0 {
        println!("Sent {} messages", count);
    } else {
        println!("{} sender threads panicked", panicked);
    }
}

fn run_menu(pool: &WorkerPool, quit: Sender<()>) {
    let generator = SentenceGenerator::with_seed(1234);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!("\nChoose an action:");
        println!("1 - Add workers");
        println!("2 - Delete workers");
        println!("3 - Send messages");
        println!("4 - Pool status");
        println!("5 - Quit");

        let Some(line) = prompt(&mut lines, "> ") else {
            let _ = quit.try_send(());
            return;
        };

        match line.trim().parse::<u32>().unwrap_or(0) {
            1 => match read_count(&mut lines, "How many workers to add? ") {
                Some(count) => match pool.add_workers(count) {
                    Ok(()) => println!("Added {} workers", count),
                    Err(e) => println!("Failed to add workers: {}", e),
                },
                None => println!("Expected a non-negative number"),
            },
            2 => match read_count(&mut lines, "How many workers to delete? ") {
                Some(count) => match pool.delete_workers(count) {
                    Ok(()) => println!("Deleted {} workers", count),
                    Err(e) => println!("Failed to delete workers: {}", e),
                },
                None => println!("Expected a non-negative number"),
            },
            3 => match read_count(&mut lines, "How many messages to send? ") {
                Some(count) => send_burst(pool, &generator, count),
                None => println!("Expected a non-negative number"),
            },
            4 => {
                let stats = pool.stats();
                println!(
                    "Workers: {} ({} busy), messages handled: {}",
                    stats.workers, stats.busy, stats.messages_handled
                );
                if let Ok(json) = stats.to_json() {
                    println!("{}", json);
                }
            }
            5 => {
                let _ = quit.try_send(());
                return;
            }
            _ => println!("Invalid choice, try again"),
        }
    }
}

/// Waits for Ctrl+C or SIGTERM on a dedicated thread, then cancels `shutdown`
fn spawn_signal_listener(shutdown: CancellationToken, quit: Sender<()>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| PoolError::invalid_config("signal_runtime", e.to_string()))?;

    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            runtime.block_on(async {
                #[cfg(unix)]
                let terminate = async {
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(mut stream) => {
                            stream.recv().await;
                        }
                        Err(e) => {
                            log::warn!("failed to install SIGTERM handler: {}", e);
                            std::future::pending::<()>().await;
                        }
                    }
                };

                #[cfg(not(unix))]
                let terminate = std::future::pending::<()>();

                tokio::select! {
                    result = signal::ctrl_c() => {
                        if let Err(e) = result {
                            log::warn!("failed to listen for Ctrl+C: {}", e);
                            return;
                        }
                        log::info!("received Ctrl+C");
                    }
                    () = terminate => log::info!("received SIGTERM"),
                }

                shutdown.cancel_with_reason(CancellationReason::Custom("interrupted".into()));
                let _ = quit.try_send(());
            });
        })
        .map_err(|e| PoolError::spawn_with_source(0, "signal thread", e))?;

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let shutdown = CancellationToken::new();
    let pool = Arc::new(WorkerPool::with_cancellation(shutdown.clone()));

    let (quit_tx, quit_rx) = bounded::<()>(1);
    spawn_signal_listener(shutdown.clone(), quit_tx.clone())?;

    {
        let pool = Arc::clone(&pool);
        thread::Builder::new()
            .name("menu".into())
            .spawn(move || run_menu(&pool, quit_tx))
            .map_err(|e| PoolError::spawn_with_source(0, "menu thread", e))?;
    }

    // The menu thread may still be blocked on stdin; it ends with the process.
    let _ = quit_rx.recv();
    println!("\nShutdown requested, closing pool...");
    shutdown.cancel_with_reason(CancellationReason::Custom("menu quit".into()));
    pool.close()?;
    Ok(())
}
