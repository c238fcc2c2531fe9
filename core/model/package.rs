use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Whether a package produces a library archive or a linked executable.
///
#[derive(Default, Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum PackageKind {
    #[default]
    Library,
    Command,
}

/// A single compilable package, as produced by a
/// [PackageResolver](crate::resolver::PackageResolver).
///
/// Packages are immutable once their imports have been wired up, and are
/// shared by reference across every build target that concerns them. The
/// import edges form a directed graph that is expected to be acyclic; the
/// build engine surfaces an accidental cycle as an error instead of hanging.
///
#[derive(Builder)]
#[builder(setter(into))]
pub struct Package {
    name: String,

    /// The unique key for this package within a build.
    import_path: String,

    #[builder(default)]
    kind: PackageKind,

    /// The directory the source files below live in.
    src_dir: PathBuf,

    /// Plain sources, compiled by the gc compiler.
    #[builder(default)]
    go_files: Vec<String>,

    /// Sources that import "C" and need the cgo preprocessor.
    #[builder(default)]
    cgo_files: Vec<String>,

    /// C sources, compiled by the C compiler.
    #[builder(default)]
    c_files: Vec<String>,

    /// Assembly sources, one object file each.
    #[builder(default)]
    s_files: Vec<String>,

    /// C headers, tracked but not compiled.
    #[builder(default)]
    h_files: Vec<String>,

    /// In-package _test.go sources, only compiled for [Goal::Test](crate::Goal).
    #[builder(default)]
    test_go_files: Vec<String>,

    /// Sources excluded from this build by their platform suffix.
    #[builder(default)]
    ignored_go_files: Vec<String>,

    /// #cgo CFLAGS directives.
    #[builder(default)]
    cgo_cflags: Vec<String>,

    /// #cgo LDFLAGS directives.
    #[builder(default)]
    cgo_ldflags: Vec<String>,

    /// Direct dependencies. Wired up after construction because the packages
    /// on the other end may themselves still be resolving.
    #[builder(setter(skip), default)]
    imports: OnceCell<Vec<Arc<Package>>>,
}

impl Package {
    pub fn builder() -> PackageBuilder {
        PackageBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn import_path(&self) -> &str {
        &self.import_path
    }

    pub fn kind(&self) -> PackageKind {
        self.kind
    }

    pub fn is_command(&self) -> bool {
        matches!(self.kind, PackageKind::Command)
    }

    pub fn src_dir(&self) -> &Path {
        &self.src_dir
    }

    pub fn go_files(&self) -> &[String] {
        &self.go_files
    }

    pub fn cgo_files(&self) -> &[String] {
        &self.cgo_files
    }

    pub fn c_files(&self) -> &[String] {
        &self.c_files
    }

    pub fn s_files(&self) -> &[String] {
        &self.s_files
    }

    pub fn h_files(&self) -> &[String] {
        &self.h_files
    }

    pub fn test_go_files(&self) -> &[String] {
        &self.test_go_files
    }

    pub fn ignored_go_files(&self) -> &[String] {
        &self.ignored_go_files
    }

    pub fn cgo_cflags(&self) -> &[String] {
        &self.cgo_cflags
    }

    pub fn cgo_ldflags(&self) -> &[String] {
        &self.cgo_ldflags
    }

    pub fn imports(&self) -> &[Arc<Package>] {
        self.imports.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Wire up the direct dependencies of this package. May be called at most
    /// once; the resolver does this after every import has resolved.
    ///
    pub fn set_imports(&self, imports: Vec<Arc<Package>>) {
        assert!(
            self.imports.set(imports).is_ok(),
            "imports already wired up for {:?}",
            self.import_path
        );
    }

    /// The last segment of the import path, used to name linked binaries.
    pub fn base_name(&self) -> &str {
        self.import_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.import_path)
    }
}

// Hand-written so an import cycle cannot recurse through the derive.
impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("name", &self.name)
            .field("import_path", &self.import_path)
            .field("kind", &self.kind)
            .field(
                "imports",
                &self
                    .imports()
                    .iter()
                    .map(|dep| dep.import_path())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(import_path: &str) -> Package {
        Package::builder()
            .name(import_path.rsplit('/').next().unwrap())
            .import_path(import_path)
            .src_dir("/tmp/src")
            .go_files(vec!["a.go".to_string()])
            .build()
            .unwrap()
    }

    #[test]
    fn imports_default_to_empty_until_wired() {
        let p = pkg("a");
        assert!(p.imports().is_empty());
        p.set_imports(vec![Arc::new(pkg("b"))]);
        assert_eq!(p.imports().len(), 1);
    }

    #[test]
    #[should_panic]
    fn wiring_imports_twice_is_a_panic() {
        let p = pkg("a");
        p.set_imports(vec![]);
        p.set_imports(vec![]);
    }

    #[test]
    fn base_name_is_the_last_path_segment() {
        assert_eq!(pkg("net/http").base_name(), "http");
        assert_eq!(pkg("fmt").base_name(), "fmt");
    }

    #[test]
    fn debug_does_not_recurse_through_cycles() {
        let a = Arc::new(pkg("a"));
        let b = Arc::new(pkg("b"));
        a.set_imports(vec![b.clone()]);
        b.set_imports(vec![a.clone()]);
        let rendered = format!("{:?}", a);
        assert!(rendered.contains("\"b\""));
    }
}
