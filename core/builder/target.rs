use crate::builder::{Artifact, BuildContext, BuildError, BuildFuture, BuildResult};
use crate::model::{Goal, Package};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::*;

/// The kind of leaf operation a target performs, named after the gc suite
/// tool that performs it.
///
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum StepKind {
    Gc,
    Asm,
    Cc,
    Cgo,
    Pack,
    Ld,
}

impl StepKind {
    pub fn phase(&self) -> &'static str {
        match self {
            StepKind::Gc => "gc",
            StepKind::Asm => "asm",
            StepKind::Cc => "cc",
            StepKind::Cgo => "cgo",
            StepKind::Pack => "pack",
            StepKind::Ld => "ld",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.phase())
    }
}

/// One executable node of the build graph.
///
/// Every variant follows the same shape: wait on its predecessor futures,
/// short-circuiting the first error verbatim; otherwise perform exactly one
/// toolchain operation and publish the outcome. A target is spawned the
/// moment it is constructed and is never re-run.
///
#[derive(Debug)]
pub(crate) enum Target {
    /// Compile the package's Go sources into a single object file.
    Compile {
        pkg: Arc<Package>,
        go_files: Vec<String>,
        deps: Vec<BuildFuture>,
        goal: Goal,
    },

    /// Assemble one `.s` file. Runs in parallel with Compile.
    Assemble {
        pkg: Arc<Package>,
        s_file: String,
        goal: Goal,
    },

    /// Compile one C file, possibly written by the cgo preprocessor.
    CompileC {
        pkg: Arc<Package>,
        c_file: PathBuf,
        dep: BuildFuture,
        goal: Goal,
    },

    /// Run the cgo preprocessor, producing generated Go and C sources for
    /// downstream Compile/CompileC targets.
    Cgo {
        pkg: Arc<Package>,
        deps: Vec<BuildFuture>,
        args: Vec<String>,
        go_files: Vec<PathBuf>,
        c_files: Vec<PathBuf>,
        goal: Goal,
    },

    /// Pack the ordered object files of every object-producing step into the
    /// package archive.
    Pack {
        pkg: Arc<Package>,
        objs: Vec<BuildFuture>,
        goal: Goal,
    },

    /// Link the package's own archive into an executable. Transitive
    /// archives are found through the search paths; their completion is
    /// guaranteed by the recursive wiring below this step.
    Link {
        pkg: Arc<Package>,
        archive: BuildFuture,
    },
}

impl Target {
    /// Spawn this target as its own task and hand back the future its
    /// outcome will be published on.
    ///
    pub(crate) fn spawn(self, ctx: BuildContext) -> BuildFuture {
        let (promise, future) = BuildFuture::new();
        tokio::spawn(async move {
            promise.publish(self.execute(&ctx).await);
        });
        future
    }

    async fn execute(self, ctx: &BuildContext) -> BuildResult {
        match self {
            Target::Compile {
                pkg,
                go_files,
                deps,
                goal,
            } => {
                wait_all(&deps).await?;
                let obj_dir = ctx.obj_dir(&pkg, goal);
                ctx.mkdir(&obj_dir)?;
                let out_file = obj_dir.join(format!("_go_.{}", ctx.obj_ext()));
                debug!("gc {:?}: {:?}", pkg.import_path(), go_files);
                let t0 = Instant::now();
                let result = ctx
                    .toolchain()
                    .compile(
                        pkg.import_path(),
                        pkg.src_dir(),
                        &out_file,
                        &go_files,
                        ctx.search_paths(),
                    )
                    .await;
                ctx.stats().record("gc", t0.elapsed());
                result.map_err(|err| BuildError::step_failed(StepKind::Gc, pkg.import_path(), err))?;
                Ok(Artifact::Object(out_file))
            }

            Target::Assemble { pkg, s_file, goal } => {
                let obj_dir = ctx.obj_dir(&pkg, goal);
                ctx.mkdir(&obj_dir)?;
                let out_file =
                    obj_dir.join(format!("{}.{}", trim_ext(&s_file), ctx.obj_ext()));
                debug!("as {:?}: {}", pkg.import_path(), s_file);
                let t0 = Instant::now();
                let result = ctx
                    .toolchain()
                    .assemble(pkg.src_dir(), &out_file, &s_file)
                    .await;
                ctx.stats().record("asm", t0.elapsed());
                result
                    .map_err(|err| BuildError::step_failed(StepKind::Asm, pkg.import_path(), err))?;
                Ok(Artifact::Object(out_file))
            }

            Target::CompileC {
                pkg,
                c_file,
                dep,
                goal,
            } => {
                dep.wait().await?;
                let obj_dir = ctx.obj_dir(&pkg, goal);
                ctx.mkdir(&obj_dir)?;
                let stem = c_file
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "_c_".to_string());
                let out_file = obj_dir.join(format!("{}.{}", stem, ctx.obj_ext()));
                debug!("cc {:?}: {:?}", pkg.import_path(), c_file);
                let t0 = Instant::now();
                let result = ctx
                    .toolchain()
                    .cc(pkg.src_dir(), &obj_dir, &out_file, &c_file)
                    .await;
                ctx.stats().record("cc", t0.elapsed());
                result
                    .map_err(|err| BuildError::step_failed(StepKind::Cc, pkg.import_path(), err))?;
                Ok(Artifact::Object(out_file))
            }

            Target::Cgo {
                pkg,
                deps,
                args,
                go_files,
                c_files,
                goal,
            } => {
                wait_all(&deps).await?;
                let obj_dir = ctx.obj_dir(&pkg, goal);
                ctx.mkdir(&obj_dir)?;
                debug!("cgo {:?}: {:?}", pkg.import_path(), args);
                let t0 = Instant::now();
                let result = ctx.toolchain().cgo(pkg.src_dir(), &args).await;
                ctx.stats().record("cgo", t0.elapsed());
                result
                    .map_err(|err| BuildError::step_failed(StepKind::Cgo, pkg.import_path(), err))?;
                Ok(Artifact::CgoGenerated { go_files, c_files })
            }

            Target::Pack { pkg, objs, goal } => {
                // Collect object paths in schedule order so archives are
                // reproducible: compile output first, then assembly, then
                // cgo-derived objects.
                let mut obj_files = vec![];
                for dep in &objs {
                    let artifact = dep.wait().await?;
                    if let Some(path) = artifact.path() {
                        obj_files.push(path.to_path_buf());
                    }
                }
                let archive_file = ctx.archive_file(&pkg, goal);
                if let Some(parent) = archive_file.parent() {
                    ctx.mkdir(parent)?;
                }
                info!("pack {:?}: {:?}", pkg.import_path(), obj_files);
                let t0 = Instant::now();
                let result = ctx.toolchain().pack(&archive_file, &obj_files).await;
                ctx.stats().record("pack", t0.elapsed());
                result
                    .map_err(|err| BuildError::step_failed(StepKind::Pack, pkg.import_path(), err))?;
                Ok(Artifact::Archive(archive_file))
            }

            Target::Link { pkg, archive } => {
                let archive_file = match archive.wait().await? {
                    Artifact::Archive(path) => path,
                    _ => unreachable!("link scheduled on a non-archive producer"),
                };
                let bin_dir = ctx.bin_dir();
                ctx.mkdir(&bin_dir)?;
                let out_file = bin_dir.join(pkg.base_name());
                let ldflags = transitive_ldflags(&pkg);
                info!("ld {:?}: {:?}", pkg.import_path(), archive_file);
                let t0 = Instant::now();
                let result = ctx
                    .toolchain()
                    .link(&out_file, &archive_file, ctx.search_paths(), &ldflags)
                    .await;
                ctx.stats().record("ld", t0.elapsed());
                result
                    .map_err(|err| BuildError::step_failed(StepKind::Ld, pkg.import_path(), err))?;
                Ok(Artifact::Binary(out_file))
            }
        }
    }
}

/// Wait on every predecessor in order, propagating the first error verbatim.
async fn wait_all(deps: &[BuildFuture]) -> Result<(), BuildError> {
    for dep in deps {
        dep.wait().await?;
    }
    Ok(())
}

/// The `#cgo LDFLAGS` of a package and everything it transitively imports,
/// deduplicated, in discovery order. The visited set makes an accidental
/// import cycle terminate here too.
///
fn transitive_ldflags(pkg: &Package) -> Vec<String> {
    fn collect(pkg: &Package, seen: &mut Vec<String>, flags: &mut Vec<String>) {
        if seen.iter().any(|p| p == pkg.import_path()) {
            return;
        }
        seen.push(pkg.import_path().to_string());
        for flag in pkg.cgo_ldflags() {
            if !flags.contains(flag) {
                flags.push(flag.clone());
            }
        }
        for dep in pkg.imports() {
            collect(dep, seen, flags);
        }
    }

    let mut flags = vec![];
    collect(pkg, &mut Vec::new(), &mut flags);
    flags
}

fn trim_ext(file: &str) -> &str {
    file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_kinds_render_as_tool_phases() {
        assert_eq!(StepKind::Gc.to_string(), "gc");
        assert_eq!(StepKind::Ld.to_string(), "ld");
        assert_eq!(StepKind::Pack.phase(), "pack");
    }

    #[test]
    fn extensions_are_trimmed_for_object_names() {
        assert_eq!(trim_ext("sqrt_amd64.s"), "sqrt_amd64");
        assert_eq!(trim_ext("noext"), "noext");
    }

    fn cgo_pkg(import_path: &str, ldflags: &[&str], imports: Vec<Arc<Package>>) -> Arc<Package> {
        let pkg = Arc::new(
            Package::builder()
                .name(import_path)
                .import_path(import_path)
                .src_dir(format!("/tmp/src/{}", import_path))
                .cgo_files(vec!["c.go".to_string()])
                .cgo_ldflags(ldflags.iter().map(|f| f.to_string()).collect::<Vec<_>>())
                .build()
                .unwrap(),
        );
        pkg.set_imports(imports);
        pkg
    }

    #[test]
    fn ldflags_accumulate_across_imports_without_duplicates() {
        let zlib = cgo_pkg("zlib", &["-lz"], vec![]);
        let png = cgo_pkg("png", &["-lpng", "-lz"], vec![zlib.clone()]);
        let app = cgo_pkg("app", &[], vec![png, zlib]);

        assert_eq!(transitive_ldflags(&app), ["-lpng", "-lz"]);
    }
}
