mod classify;
mod correlate;
mod error;
pub mod extract;
mod paths;
mod pipeline;
mod reader;
mod tail;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use classify::{classify, LineClass};
pub use correlate::LogMemory;
pub use error::Error;
pub use paths::default_log_paths;
pub use pipeline::{parse_file, ParseOptions, ParseOutcome};
pub use reader::{LogLine, LogReader};
pub use tail::{tail, TailOptions};

pub type Result<T> = std::result::Result<T, Error>;

/// Cooperative cancellation handle. The pipeline checks it between lines and
/// the tail sleep returns early when it fires.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Cancel {
        Cancel::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for |total|, waking promptly on cancellation.
    pub fn sleep(&self, total: Duration) {
        let slice = Duration::from_millis(100);
        let mut remaining = total;
        while !self.is_cancelled() && remaining > Duration::ZERO {
            let step = remaining.min(slice);
            std::thread::sleep(step);
            remaining = remaining.saturating_sub(step);
        }
    }
}
