use crate::builder::{BuildFuture, Promise};
use crate::model::Task;
use dashmap::DashMap;
use std::sync::Mutex;
use tracing::*;

/// The per-invocation deduplicator: at most one future per `(package, goal)`.
///
/// Check-and-insert is a single critical section so two branches of a
/// diamond racing on the same dependency cannot both schedule it. The
/// factory, which spawns the actual pipeline, runs after the handle is
/// installed and outside the lock, so unrelated branches never serialize on
/// each other's pipeline construction.
///
#[derive(Debug, Default)]
pub(crate) struct TargetCache {
    targets: DashMap<Task, BuildFuture>,

    // Serializes installs so the same task is never scheduled twice.
    install_lock: Mutex<()>,
}

impl TargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task: &Task) -> Option<BuildFuture> {
        self.targets.get(task).map(|entry| entry.clone())
    }

    /// Return the future for `task`, installing one via `factory` if this is
    /// the first request. `factory` is not invoked for a cached task.
    ///
    #[instrument(name = "TargetCache::get_or_install", skip(self, factory))]
    pub fn get_or_install<F>(&self, task: Task, factory: F) -> BuildFuture
    where
        F: FnOnce() -> BuildFuture,
    {
        let (promise, future) = {
            let _lock = self.install_lock.lock().unwrap();
            if let Some(existing) = self.targets.get(&task) {
                debug!("cache hit for {}", task);
                return existing.clone();
            }
            let (promise, future) = BuildFuture::new();
            self.targets.insert(task, future.clone());
            (promise, future)
        };

        // Outside the lock: build the pipeline and forward its terminal
        // outcome into the handle that was just installed.
        let inner = factory();
        tokio::spawn(async move {
            promise.publish(inner.wait().await);
        });

        future
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Artifact, BuildResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ok() -> BuildResult {
        Ok(Artifact::None)
    }

    #[tokio::test]
    async fn the_factory_runs_once_per_task() {
        let cache = TargetCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let future = cache.get_or_install(Task::library("a"), || {
                calls.fetch_add(1, Ordering::SeqCst);
                BuildFuture::resolved(ok())
            });
            assert_matches!(future.wait().await, Ok(Artifact::None));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn different_goals_for_one_package_are_distinct_entries() {
        let cache = TargetCache::new();
        cache.get_or_install(Task::library("a"), || BuildFuture::resolved(ok()));
        cache.get_or_install(Task::command("a"), || BuildFuture::resolved(ok()));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_installs_of_the_same_task_share_one_future() {
        let cache = Arc::new(TargetCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_install(Task::library("shared"), move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        BuildFuture::resolved(ok())
                    })
                    .wait()
                    .await
            }));
        }

        for handle in handles {
            assert_matches!(handle.await.unwrap(), Ok(Artifact::None));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
