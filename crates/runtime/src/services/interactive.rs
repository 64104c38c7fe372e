use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{derive_combined_flag, RunFlag, Service, ServiceSection};

/// Minimal administrative console: reads commands from stdin, logs a
/// response to stdout. Stands in for the original's interactive network
/// service -- plain stdin/stdout here, since no terminal-server crate is in
/// this build's dependency stack.
pub struct InteractiveService {
    stop: RunFlag,
}

impl InteractiveService {
    pub fn new() -> Self {
        Self { stop: Arc::new(AtomicBool::new(true)) }
    }
}

impl Default for InteractiveService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for InteractiveService {
    fn name(&self) -> &str {
        "interactive"
    }

    async fn start(&self, _config: ServiceSection, run: RunFlag) -> anyhow::Result<()> {
        info!("interactive service started, type 'status' or 'quit'");
        // `combined` is what the console loop polls (either the process-wide
        // flag or this service's own stop fires); `run` itself is what
        // `quit`/`exit` clears, since that command means "shut the whole
        // runtime down", not just this one service.
        let combined = derive_combined_flag(Arc::clone(&run), Arc::clone(&self.stop));
        tokio::task::spawn_blocking(move || run_console(run, combined)).await?;
        Ok(())
    }

    fn request_stop(&self) {
        self.stop.store(false, Ordering::Relaxed);
    }
}

fn run_console(run: RunFlag, combined: RunFlag) {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        if !combined.load(Ordering::Relaxed) {
            break;
        }
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        match line.trim() {
            "quit" | "exit" => {
                run.store(false, Ordering::Relaxed);
                break;
            }
            "status" => {
                let _ = writeln!(stdout, "oplcd running");
            }
            "" => {}
            other => {
                let _ = writeln!(stdout, "unknown command: {other}");
            }
        }
    }
    info!("interactive service exiting");
}
