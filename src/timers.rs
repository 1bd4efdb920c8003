use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Keyed one-shot timers. Scheduling an existing key aborts the older timer;
/// dropping the set aborts everything still pending.
#[derive(Debug)]
pub struct TimerSet {
    runtime: Handle,
    timers: HashMap<String, JoinHandle<()>>,
}

impl TimerSet {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            timers: HashMap::new(),
        }
    }

    /// Runs `task` after `delay` unless cancelled first.
    pub fn schedule<F>(&mut self, key: impl Into<String>, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.prune();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        if let Some(previous) = self.timers.insert(key.into(), handle) {
            previous.abort();
        }
    }

    pub fn cancel(&mut self, key: &str) -> bool {
        match self.timers.remove(key) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    /// Aborts every timer and returns the keys of those that had not fired.
    pub fn cancel_all(&mut self) -> Vec<String> {
        let mut pending = Vec::new();
        for (key, handle) in self.timers.drain() {
            if !handle.is_finished() {
                pending.push(key);
            }
            handle.abort();
        }
        pending
    }

    pub fn contains(&self, key: &str) -> bool {
        self.timers
            .get(key)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Timers that have not fired yet.
    pub fn len(&self) -> usize {
        self.timers
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&mut self) {
        self.timers.retain(|_, handle| !handle.is_finished());
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
