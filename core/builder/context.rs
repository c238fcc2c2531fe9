use crate::builder::{BuildError, BuildGraph, Statistics, TargetCache};
use crate::config::Config;
use crate::model::{Goal, Package};
use crate::toolchain::Toolchain;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::*;

/// Per-invocation build state: the ephemeral working directory, the target
/// cache, and the toolchain every target bottoms out in.
///
/// Cloning is cheap; every spawned target carries a clone. The working
/// directory is partitioned per package, so concurrent targets never contend
/// on the same files.
///
#[derive(Debug, Clone)]
pub struct BuildContext {
    config: Config,
    workdir: Arc<PathBuf>,
    obj_ext: &'static str,
    toolchain: Arc<dyn Toolchain>,
    search_paths: Arc<Vec<PathBuf>>,
    pub(crate) target_cache: Arc<TargetCache>,
    pub(crate) build_graph: Arc<BuildGraph>,
    stats: Arc<Statistics>,
}

impl BuildContext {
    #[instrument(name = "BuildContext::new", skip(toolchain))]
    pub fn new(config: Config, toolchain: Arc<dyn Toolchain>) -> Result<Self, BuildError> {
        let obj_ext = config
            .arch_char()
            .map_err(|err| BuildError::Config(Arc::new(err)))?;
        let workdir = tempfile::Builder::new()
            .prefix("gale-")
            .tempdir()
            .map_err(|err| BuildError::Workdir(Arc::new(err)))?
            .into_path();
        debug!("workdir {:?}", workdir);

        let search_paths = Arc::new(vec![config.stdlib_dir(), workdir.clone()]);

        Ok(Self {
            config,
            workdir: Arc::new(workdir),
            obj_ext,
            toolchain,
            search_paths,
            target_cache: Arc::new(TargetCache::new()),
            build_graph: Arc::new(BuildGraph::new()),
            stats: Arc::new(Statistics::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The temporary working directory for this context. Its contents are
    /// removed by [BuildContext::destroy].
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub(crate) fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    /// Directories the toolchain resolves dependency archives through.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// The object file extension for the target architecture (`6` on amd64).
    pub(crate) fn obj_ext(&self) -> &'static str {
        self.obj_ext
    }

    /// Where object files for `pkg` go. Test builds get their own partition
    /// so they never collide with the library build of the same package.
    ///
    pub(crate) fn obj_dir(&self, pkg: &Package, goal: Goal) -> PathBuf {
        let partition = if goal.is_test() { "_test" } else { "_obj" };
        self.workdir.join(pkg.import_path()).join(partition)
    }

    /// Where the archive for `pkg` goes. Library archives live directly
    /// under the workdir so the workdir doubles as a search path.
    ///
    pub(crate) fn archive_file(&self, pkg: &Package, goal: Goal) -> PathBuf {
        if goal.is_test() {
            self.obj_dir(pkg, goal)
                .join(format!("{}.a", pkg.base_name()))
        } else {
            self.workdir.join(format!("{}.a", pkg.import_path()))
        }
    }

    pub(crate) fn bin_dir(&self) -> PathBuf {
        self.config.bin_dir().clone()
    }

    /// Idempotent directory creation for object/archive/binary outputs.
    pub(crate) fn mkdir(&self, path: &Path) -> Result<(), BuildError> {
        debug!("mkdir {:?}", path);
        std::fs::create_dir_all(path).map_err(|err| BuildError::mkdir(path, err))
    }

    /// Remove the temporary files associated with this context. Call after
    /// every requested target has completed.
    ///
    pub fn destroy(&self) -> std::io::Result<()> {
        debug!("destroy {:?}", self.workdir);
        std::fs::remove_dir_all(self.workdir.as_path())
    }
}
