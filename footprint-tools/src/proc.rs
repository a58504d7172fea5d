use crate::cli::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

const PROGRESS_UPDATE_MILLIS: u64 = 500;

/// Reports tile progress on the terminal while a run is in
/// flight. Shared by reference between the workers.
pub struct Tracker {
    progress: Arc<Progress<TileCounter>>,
    handle: Option<JoinHandle<()>>,
}

impl Tracker {
    pub fn new(tiles: usize) -> Self {
        let progress = Arc::new(Progress::new(TileCounter::default()));
        progress.value.total.store(tiles, Ordering::Release);
        let handle = progress
            .clone()
            .spawn_auto_update_thread(std::time::Duration::from_millis(PROGRESS_UPDATE_MILLIS));
        Tracker {
            progress,
            handle: Some(handle),
        }
    }

    pub fn increment(&self) {
        self.progress.value.processed.fetch_add(1, Ordering::AcqRel);
    }

    pub fn add_skipped(&self, features: usize) {
        self.progress.value.skipped.fetch_add(features, Ordering::AcqRel);
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.progress.finish();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                eprintln!("Warning: progress thread panicked!");
            }
        }
    }
}
