use indicatif::ProgressBar;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// A spinner displaying a value, typically a counter,
/// refreshed from a background thread.
pub struct Progress<T> {
    pub bar: ProgressBar,
    pub value: T,
    done: AtomicBool,
}

impl<T> Progress<T> {
    pub fn new(value: T) -> Self {
        let bar = {
            use indicatif::*;
            let progress = ProgressBar::new_spinner();
            progress.set_style(
                ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}"),
            );
            progress
        };
        Progress {
            bar,
            value,
            done: AtomicBool::new(false),
        }
    }

    pub fn done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn finish(&self) {
        self.done.store(true, Ordering::Release);
    }
}

impl<T: fmt::Display> Progress<T> {
    pub fn update_progress(&self) {
        self.bar.set_message(&format!("{}", self.value));
    }

    /// Update at the given interval until `finish` is called
    /// from another thread; then draw the final value.
    pub fn update_until_done(&self, timeout: Duration) {
        while !self.done() {
            self.update_progress();
            std::thread::park_timeout(timeout);
        }
        self.update_progress();
        self.bar.finish();
    }
}

impl<T: Send + Sync + fmt::Display + 'static> Progress<T> {
    pub fn spawn_auto_update_thread(self: Arc<Self>, timeout: Duration) -> JoinHandle<()> {
        std::thread::spawn(move || self.update_until_done(timeout))
    }
}

/// Tiles processed out of a total, with the number of
/// features skipped so far.
#[derive(Debug, Default)]
pub struct TileCounter {
    pub total: AtomicUsize,
    pub processed: AtomicUsize,
    pub skipped: AtomicUsize,
}

impl fmt::Display for TileCounter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "tiles: completed {} of {}",
            self.processed.load(Ordering::Acquire),
            self.total.load(Ordering::Acquire)
        )?;
        let skipped = self.skipped.load(Ordering::Acquire);
        if skipped > 0 {
            write!(f, " (skipped {} features)", skipped)?;
        }
        write!(f, ".")
    }
}
