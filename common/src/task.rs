//! Scoped task fan-out
//!
//! A plain `tokio::spawn` handle detaches its task when dropped. `AbortOnDrop`
//! ties a batch of spawned tasks to the future that awaits them: when that future
//! is cancelled (deadline, caller gone), every task still running is aborted.

use tokio::task::{AbortHandle, JoinHandle};

/// Aborts the tracked tasks when dropped; finished tasks are unaffected
#[derive(Debug, Default)]
pub struct AbortOnDrop {
    handles: Vec<AbortHandle>,
}

impl AbortOnDrop {
    pub fn new<T>(tasks: &[JoinHandle<T>]) -> Self {
        Self {
            handles: tasks.iter().map(|t| t.abort_handle()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Await every task in spawn order; cancelling this future aborts the ones still running
pub async fn join_scoped<T>(
    tasks: Vec<JoinHandle<T>>,
) -> Vec<Result<T, tokio::task::JoinError>> {
    let _guard = AbortOnDrop::new(&tasks);
    futures::future::join_all(tasks).await
}
