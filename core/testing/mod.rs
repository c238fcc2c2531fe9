//! # Test toolchains
//!
//! A [Toolchain] that records instead of running, so engine behavior can be
//! asserted without a Go installation: how many times each step ran, in what
//! order, and what happens when a scripted step fails.

use crate::builder::StepKind;
use crate::toolchain::{Toolchain, ToolchainError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// One recorded toolchain invocation. `seq` is a global monotonic counter,
/// so relative ordering between any two calls can be asserted.
///
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub step: StepKind,
    pub key: String,
    pub seq: u64,
}

#[derive(Debug, Default)]
pub struct RecordingToolchain {
    seq: AtomicU64,
    calls: Mutex<Vec<ToolCall>>,
    failures: DashMap<(StepKind, String), String>,
    link_flags: Mutex<Vec<String>>,
}

impl RecordingToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a failure: any future call of `step` whose key contains
    /// `key` fails with `message` instead of succeeding.
    ///
    pub fn fail(&self, step: StepKind, key: &str, message: &str) {
        self.failures
            .insert((step, key.to_string()), message.to_string());
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    /// How many times `step` ran with exactly `key`.
    pub fn invocations(&self, step: StepKind, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.step == step && call.key == key)
            .count()
    }

    /// The ldflags passed to the most recent link call.
    pub fn link_flags(&self) -> Vec<String> {
        self.link_flags.lock().unwrap().clone()
    }

    /// The sequence number of the first `step` call with exactly `key`.
    pub fn sequence(&self, step: StepKind, key: &str) -> Option<u64> {
        self.calls()
            .iter()
            .find(|call| call.step == step && call.key == key)
            .map(|call| call.seq)
    }

    fn record(&self, step: StepKind, key: String) -> Result<(), ToolchainError> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(ToolCall {
            step,
            key: key.clone(),
            seq,
        });
        for entry in self.failures.iter() {
            let (failed_step, failed_key) = entry.key();
            if *failed_step == step && key.contains(failed_key.as_str()) {
                return Err(ToolchainError::Scripted(entry.value().clone()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Toolchain for RecordingToolchain {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn compile(
        &self,
        import_path: &str,
        _src_dir: &Path,
        _out_file: &Path,
        _go_files: &[String],
        _search_paths: &[PathBuf],
    ) -> Result<(), ToolchainError> {
        self.record(StepKind::Gc, import_path.to_string())
    }

    async fn assemble(
        &self,
        _src_dir: &Path,
        _out_file: &Path,
        s_file: &str,
    ) -> Result<(), ToolchainError> {
        self.record(StepKind::Asm, s_file.to_string())
    }

    async fn cc(
        &self,
        _src_dir: &Path,
        _obj_dir: &Path,
        _out_file: &Path,
        c_file: &Path,
    ) -> Result<(), ToolchainError> {
        self.record(StepKind::Cc, c_file.display().to_string())
    }

    async fn cgo(&self, src_dir: &Path, _args: &[String]) -> Result<(), ToolchainError> {
        self.record(StepKind::Cgo, src_dir.display().to_string())
    }

    async fn pack(
        &self,
        archive_file: &Path,
        _obj_files: &[PathBuf],
    ) -> Result<(), ToolchainError> {
        self.record(StepKind::Pack, archive_file.display().to_string())
    }

    async fn link(
        &self,
        out_file: &Path,
        _archive_file: &Path,
        _search_paths: &[PathBuf],
        ldflags: &[String],
    ) -> Result<(), ToolchainError> {
        *self.link_flags.lock().unwrap() = ldflags.to_vec();
        self.record(StepKind::Ld, out_file.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let tc = RecordingToolchain::new();
        tc.compile("a", Path::new("/src"), Path::new("/out"), &[], &[])
            .await
            .unwrap();
        tc.pack(Path::new("/w/a.a"), &[]).await.unwrap();

        assert_eq!(tc.invocations(StepKind::Gc, "a"), 1);
        assert!(tc.sequence(StepKind::Gc, "a") < tc.sequence(StepKind::Pack, "/w/a.a"));
    }

    #[tokio::test]
    async fn scripted_failures_match_by_key() {
        let tc = RecordingToolchain::new();
        tc.fail(StepKind::Pack, "net/http", "archive corrupt");

        assert!(tc.pack(Path::new("/w/net/http.a"), &[]).await.is_err());
        assert!(tc.pack(Path::new("/w/fmt.a"), &[]).await.is_ok());
        // The failed call is still recorded.
        assert_eq!(tc.calls().len(), 2);
    }
}
