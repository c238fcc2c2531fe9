use crate::builder::{Artifact, BuildContext, BuildError, BuildFuture, Target};
use crate::model::{Goal, Package, Task};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::*;

/// The graph walker. Walking is synchronous and cheap: it only wires up
/// futures and spawns targets; all waiting happens inside the targets
/// themselves. Recursion bottoms out at the target cache, so a package
/// shared by many dependents is wired up exactly once.
///
impl BuildContext {
    /// Build `pkg`, dispatching on its kind: commands are compiled, packed
    /// and linked; libraries stop at their archive.
    ///
    #[instrument(name = "BuildContext::build", skip(self, pkg), fields(pkg = pkg.import_path()))]
    pub fn build(&self, pkg: &Arc<Package>) -> BuildFuture {
        if pkg.is_command() {
            self.build_command(pkg)
        } else {
            self.build_package(pkg)
        }
    }

    /// Build `pkg` toward an explicit goal, regardless of its kind.
    pub fn build_goal(&self, pkg: &Arc<Package>, goal: Goal) -> BuildFuture {
        match goal {
            Goal::Library => self.build_package(pkg),
            Goal::Command => self.build_command(pkg),
            Goal::Test => self.build_test(pkg),
        }
    }

    /// The terminal future of the compile→pack pipeline for `pkg` as a
    /// library. Compilation begins as soon as the archives of its *direct*
    /// imports exist; unrelated branches of the graph never gate it.
    ///
    #[instrument(
        name = "BuildContext::build_package",
        skip(self, pkg),
        fields(pkg = pkg.import_path())
    )]
    pub fn build_package(&self, pkg: &Arc<Package>) -> BuildFuture {
        self.build_library(pkg, &mut Vec::new())
    }

    /// The terminal future of the compile→pack→link pipeline for `pkg` as a
    /// command.
    ///
    #[instrument(
        name = "BuildContext::build_command",
        skip(self, pkg),
        fields(pkg = pkg.import_path())
    )]
    pub fn build_command(&self, pkg: &Arc<Package>) -> BuildFuture {
        let task = Task::command(pkg.import_path());
        if let Some(future) = self.target_cache.get(&task) {
            return future;
        }

        let deps = match self.import_futures(pkg, &mut Vec::new()) {
            Ok(deps) => deps,
            Err(err) => return BuildFuture::resolved(Err(err)),
        };

        self.target_cache.get_or_install(task, || {
            let archive = self.compile(pkg.clone(), deps, Goal::Command);
            Target::Link {
                pkg: pkg.clone(),
                archive,
            }
            .spawn(self.clone())
        })
    }

    /// Build `pkg` together with its in-package test sources into a test
    /// archive, kept in a separate workdir partition from the library build.
    ///
    #[instrument(
        name = "BuildContext::build_test",
        skip(self, pkg),
        fields(pkg = pkg.import_path())
    )]
    pub fn build_test(&self, pkg: &Arc<Package>) -> BuildFuture {
        let task = Task::test(pkg.import_path());
        if let Some(future) = self.target_cache.get(&task) {
            return future;
        }

        let deps = match self.import_futures(pkg, &mut Vec::new()) {
            Ok(deps) => deps,
            Err(err) => return BuildFuture::resolved(Err(err)),
        };

        self.target_cache
            .get_or_install(task, || self.compile(pkg.clone(), deps, Goal::Test))
    }

    fn build_library(&self, pkg: &Arc<Package>, visiting: &mut Vec<String>) -> BuildFuture {
        let import_path = pkg.import_path().to_string();

        // An import cycle must resolve to an error, never hang the walk.
        if let Some(pos) = visiting.iter().position(|p| *p == import_path) {
            let mut path = visiting[pos..].to_vec();
            path.push(import_path);
            return BuildFuture::resolved(Err(BuildError::DependencyCycle { path }));
        }

        let task = Task::library(&import_path);
        if let Some(future) = self.target_cache.get(&task) {
            return future;
        }

        visiting.push(import_path);
        let deps = match self.import_futures(pkg, visiting) {
            Ok(deps) => deps,
            Err(err) => {
                visiting.pop();
                return BuildFuture::resolved(Err(err));
            }
        };
        visiting.pop();

        self.target_cache
            .get_or_install(task, || self.compile(pkg.clone(), deps, Goal::Library))
    }

    /// The futures of every direct import's archive: exactly the predecessor
    /// set of this package's compile step.
    ///
    fn import_futures(
        &self,
        pkg: &Arc<Package>,
        visiting: &mut Vec<String>,
    ) -> Result<Vec<BuildFuture>, BuildError> {
        let deps = pkg
            .imports()
            .iter()
            .map(|dep| self.build_library(dep, visiting))
            .collect();

        let dep_paths: Vec<String> = pkg
            .imports()
            .iter()
            .map(|dep| dep.import_path().to_string())
            .collect();
        self.build_graph
            .add_dependencies(pkg.import_path(), &dep_paths)?;

        Ok(deps)
    }

    /// Wire up all the steps required to build one package: a Compile for
    /// the Go sources, an Assemble per assembly file, the cgo chain for cgo
    /// packages, and a Pack that collects every object in deterministic
    /// order: compile output first, then assembly, then cgo-derived.
    ///
    fn compile(&self, pkg: Arc<Package>, mut deps: Vec<BuildFuture>, goal: Goal) -> BuildFuture {
        let mut go_files: Vec<String> = pkg.go_files().to_vec();
        if goal.is_test() {
            go_files.extend(pkg.test_go_files().iter().cloned());
        }

        let mut asm_objs: Vec<BuildFuture> = vec![];
        let mut c_objs: Vec<BuildFuture> = vec![];

        if !pkg.cgo_files().is_empty() {
            let (cgo, generated_go, c_files) = self.cgo(&pkg, deps.clone(), goal);
            // The generated sources only exist once the preprocessor has
            // succeeded, so compile gains the cgo future as a predecessor.
            go_files.extend(generated_go);
            deps.push(cgo.clone());
            for c_file in c_files {
                c_objs.push(
                    Target::CompileC {
                        pkg: pkg.clone(),
                        c_file,
                        dep: cgo.clone(),
                        goal,
                    }
                    .spawn(self.clone()),
                );
            }
        } else if !pkg.c_files().is_empty() {
            // Plain C sources have no preprocessor to wait on.
            for c_file in pkg.c_files() {
                c_objs.push(
                    Target::CompileC {
                        pkg: pkg.clone(),
                        c_file: pkg.src_dir().join(c_file),
                        dep: BuildFuture::resolved(Ok(Artifact::None)),
                        goal,
                    }
                    .spawn(self.clone()),
                );
            }
        }

        for s_file in pkg.s_files() {
            asm_objs.push(
                Target::Assemble {
                    pkg: pkg.clone(),
                    s_file: s_file.clone(),
                    goal,
                }
                .spawn(self.clone()),
            );
        }

        let gc = Target::Compile {
            pkg: pkg.clone(),
            go_files,
            deps,
            goal,
        }
        .spawn(self.clone());

        let mut objs = vec![gc];
        objs.extend(asm_objs);
        objs.extend(c_objs);

        Target::Pack { pkg, objs, goal }.spawn(self.clone())
    }

    /// Wire up the cgo preprocessor for a package, returning its future, the
    /// generated Go sources the compile step must pick up, and the C files
    /// the preprocessor leaves for the C compiler.
    ///
    fn cgo(
        &self,
        pkg: &Arc<Package>,
        deps: Vec<BuildFuture>,
        goal: Goal,
    ) -> (BuildFuture, Vec<String>, Vec<PathBuf>) {
        let obj_dir = self.obj_dir(pkg, goal);

        let mut args = vec![
            "-objdir".to_string(),
            obj_dir.display().to_string(),
            "--".to_string(),
            "-I".to_string(),
            pkg.src_dir().display().to_string(),
            "-I".to_string(),
            obj_dir.display().to_string(),
        ];
        args.extend(pkg.cgo_cflags().iter().cloned());

        let mut go_files = vec![obj_dir.join("_cgo_gotypes.go")];
        let mut c_files = vec![obj_dir.join("_cgo_defun.c"), obj_dir.join("_cgo_export.c")];
        for cgo_file in pkg.cgo_files() {
            args.push(cgo_file.clone());
            go_files.push(obj_dir.join(cgo_file.replace(".go", ".cgo1.go")));
            c_files.push(obj_dir.join(cgo_file.replace(".go", ".cgo2.c")));
        }
        for c_file in pkg.c_files() {
            c_files.push(pkg.src_dir().join(c_file));
        }

        let generated_go = go_files.iter().map(|p| p.display().to_string()).collect();

        let future = Target::Cgo {
            pkg: pkg.clone(),
            deps,
            args,
            go_files,
            c_files: c_files.clone(),
            goal,
        }
        .spawn(self.clone());

        (future, generated_go, c_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StepKind;
    use crate::config::Config;
    use crate::testing::RecordingToolchain;

    fn pkg(import_path: &str) -> Arc<Package> {
        Arc::new(
            Package::builder()
                .name(import_path.rsplit('/').next().unwrap())
                .import_path(import_path)
                .src_dir(format!("/tmp/src/{}", import_path))
                .go_files(vec![format!("{}.go", import_path.rsplit('/').next().unwrap())])
                .build()
                .unwrap(),
        )
    }

    fn ctx() -> (BuildContext, Arc<RecordingToolchain>) {
        let toolchain = Arc::new(RecordingToolchain::new());
        let ctx = BuildContext::new(Config::default(), toolchain.clone()).unwrap();
        (ctx, toolchain)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn an_import_cycle_resolves_to_an_error_instead_of_hanging() {
        let (ctx, _toolchain) = ctx();
        let a = pkg("a");
        let b = pkg("b");
        a.set_imports(vec![b.clone()]);
        b.set_imports(vec![a.clone()]);

        let err = ctx.build_package(&a).wait().await.unwrap_err();
        assert_matches!(err, BuildError::DependencyCycle { ref path } if path.contains(&"a".to_string()));
        ctx.destroy().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn building_the_same_package_twice_schedules_once() {
        let (ctx, toolchain) = ctx();
        let a = pkg("a");
        a.set_imports(vec![]);

        let first = ctx.build_package(&a);
        let second = ctx.build_package(&a);
        assert_matches!(first.wait().await, Ok(Artifact::Archive(_)));
        assert_matches!(second.wait().await, Ok(Artifact::Archive(_)));

        assert_eq!(toolchain.invocations(StepKind::Gc, "a"), 1);
        ctx.destroy().unwrap();
    }
}
