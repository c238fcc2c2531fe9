use crate::builder::BuildError;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// What a successfully completed build target left on disk.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// The target completed but produced no file of its own.
    None,

    /// A single object file.
    Object(PathBuf),

    /// A package archive.
    Archive(PathBuf),

    /// A linked executable.
    Binary(PathBuf),

    /// The sources written by the cgo preprocessor. Only valid once the
    /// producing future has resolved successfully.
    CgoGenerated {
        go_files: Vec<PathBuf>,
        c_files: Vec<PathBuf>,
    },
}

impl Artifact {
    /// The produced file path, for artifacts that have exactly one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Artifact::Object(path) | Artifact::Archive(path) | Artifact::Binary(path) => {
                Some(path)
            }
            Artifact::None | Artifact::CgoGenerated { .. } => None,
        }
    }
}

pub type BuildResult = Result<Artifact, BuildError>;

/// A handle to one asynchronous unit of build work and its memoized outcome.
///
/// Invariants:
/// 1. Exactly one producer (the [Promise]) publishes the outcome, exactly
///    once, on every exit path.
/// 2. Any number of consumers may call [BuildFuture::wait] concurrently or
///    repeatedly and always observe the same outcome.
/// 3. Waiting before the outcome exists suspends only the calling task.
///
#[derive(Debug, Clone)]
pub struct BuildFuture {
    rx: watch::Receiver<Option<BuildResult>>,
}

/// The write side of a [BuildFuture]. Publishing consumes the promise, so the
/// exactly-once discipline is enforced by ownership.
///
#[derive(Debug)]
pub(crate) struct Promise {
    tx: watch::Sender<Option<BuildResult>>,
}

impl BuildFuture {
    pub(crate) fn new() -> (Promise, BuildFuture) {
        let (tx, rx) = watch::channel(None);
        (Promise { tx }, BuildFuture { rx })
    }

    /// A future that has already completed with `result`.
    pub fn resolved(result: BuildResult) -> BuildFuture {
        let (promise, future) = BuildFuture::new();
        promise.publish(result);
        future
    }

    /// Block this task until the outcome is available, then return it. The
    /// stored outcome is returned immediately on every later call.
    ///
    pub async fn wait(&self) -> BuildResult {
        let mut rx = self.rx.clone();
        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                // The producer went away without publishing. This only
                // happens if its task died; surface it instead of hanging.
                return match rx.borrow().clone() {
                    Some(result) => result,
                    None => Err(BuildError::AbandonedTarget),
                };
            }
        }
    }
}

impl Promise {
    /// Record the outcome and wake every waiter. Consumers that have not yet
    /// called wait observe the stored value immediately.
    ///
    pub(crate) fn publish(self, result: BuildResult) {
        // Send can only fail when every receiver is gone, in which case
        // nobody is left to care about the outcome.
        let _ = self.tx.send(Some(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn resolved_futures_return_immediately() {
        let future = BuildFuture::resolved(Ok(Artifact::None));
        assert_matches!(future.wait().await, Ok(Artifact::None));
    }

    #[tokio::test]
    async fn waiters_block_until_the_promise_publishes() {
        let (promise, future) = BuildFuture::new();
        let waiter = {
            let future = future.clone();
            tokio::spawn(async move { future.wait().await })
        };
        tokio::task::yield_now().await;
        promise.publish(Ok(Artifact::Object("x.6".into())));
        assert_matches!(waiter.await.unwrap(), Ok(Artifact::Object(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn repeated_reads_from_many_tasks_see_the_same_outcome() {
        let (promise, future) = BuildFuture::new();
        let future = Arc::new(future);

        let mut waiters = vec![];
        for _ in 0..8 {
            let future = future.clone();
            waiters.push(tokio::spawn(async move {
                let mut outcomes = vec![];
                for _ in 0..4 {
                    outcomes.push(future.wait().await);
                }
                outcomes
            }));
        }

        promise.publish(Err(BuildError::AbandonedTarget));

        for waiter in waiters {
            for outcome in waiter.await.unwrap() {
                assert_matches!(outcome, Err(BuildError::AbandonedTarget));
            }
        }
    }

    #[tokio::test]
    async fn a_dropped_promise_resolves_to_an_error_instead_of_hanging() {
        let (promise, future) = BuildFuture::new();
        drop(promise);
        assert_matches!(future.wait().await, Err(BuildError::AbandonedTarget));
    }
}
