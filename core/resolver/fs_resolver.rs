use super::{PackageResolver, ResolveError};
use crate::config::Config;
use crate::model::{Package, PackageKind};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::*;

/// Import paths provided precompiled by the Go installation. They are never
/// resolved from the source tree; the compiler finds their archives on the
/// search path.
///
const STDLIB: &[&str] = &[
    "archive/tar",
    "archive/zip",
    "bufio",
    "bytes",
    "compress/bzip2",
    "compress/flate",
    "compress/gzip",
    "compress/zlib",
    "container/heap",
    "container/list",
    "container/ring",
    "crypto",
    "crypto/aes",
    "crypto/hmac",
    "crypto/md5",
    "crypto/rand",
    "crypto/rsa",
    "crypto/sha1",
    "crypto/sha256",
    "crypto/sha512",
    "crypto/tls",
    "crypto/x509",
    "database/sql",
    "encoding/base32",
    "encoding/base64",
    "encoding/binary",
    "encoding/csv",
    "encoding/gob",
    "encoding/hex",
    "encoding/json",
    "encoding/pem",
    "encoding/xml",
    "errors",
    "expvar",
    "flag",
    "fmt",
    "go/ast",
    "go/build",
    "go/parser",
    "go/token",
    "hash",
    "hash/adler32",
    "hash/crc32",
    "hash/crc64",
    "hash/fnv",
    "html",
    "html/template",
    "image",
    "image/color",
    "image/draw",
    "image/gif",
    "image/jpeg",
    "image/png",
    "io",
    "io/ioutil",
    "log",
    "log/syslog",
    "math",
    "math/big",
    "math/cmplx",
    "math/rand",
    "mime",
    "mime/multipart",
    "net",
    "net/http",
    "net/http/cgi",
    "net/http/httptest",
    "net/http/httputil",
    "net/mail",
    "net/rpc",
    "net/smtp",
    "net/textproto",
    "net/url",
    "os",
    "os/exec",
    "os/signal",
    "os/user",
    "path",
    "path/filepath",
    "reflect",
    "regexp",
    "regexp/syntax",
    "runtime",
    "runtime/cgo",
    "runtime/debug",
    "runtime/pprof",
    "sort",
    "strconv",
    "strings",
    "sync",
    "sync/atomic",
    "syscall",
    "testing",
    "testing/iotest",
    "testing/quick",
    "text/scanner",
    "text/tabwriter",
    "text/template",
    "text/template/parse",
    "time",
    "unicode",
    "unicode/utf16",
    "unicode/utf8",
];

const KNOWN_OS: &[&str] = &[
    "darwin", "freebsd", "linux", "netbsd", "openbsd", "plan9", "windows",
];
const KNOWN_ARCH: &[&str] = &["386", "amd64", "arm", "arm64"];

/// Resolves packages by scanning `<root>/src/<import path>` on disk.
///
/// Resolution is memoized, so diamond imports resolve to a single shared
/// [Package] and cyclic imports terminate: a package is cached before its own
/// imports resolve, and the cycle is reported later by the build walker where
/// the full chain is known.
///
#[derive(Debug)]
pub struct FsResolver {
    src_dir: PathBuf,
    goos: String,
    goarch: String,
    ignored_imports: Vec<String>,
    cache: DashMap<String, Arc<Package>>,

    // Serializes scans per import path, so concurrent resolves of the same
    // path read the directory once and only ever observe a package whose
    // imports are fully wired.
    scan_locks: DashMap<String, Arc<std::sync::Mutex<()>>>,
}

impl FsResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            src_dir: config.src_dir(),
            goos: config.goos().to_string(),
            goarch: config.goarch().to_string(),
            ignored_imports: config.ignored_imports().to_vec(),
            cache: DashMap::new(),
            scan_locks: DashMap::new(),
        }
    }

    fn is_external(&self, import_path: &str) -> bool {
        import_path == "C"
            || import_path == "unsafe"
            || STDLIB.contains(&import_path)
            || self.ignored_imports.iter().any(|p| p == import_path)
    }

    /// Whether `file` participates in a build for our platform, following
    /// the `name_os.go`, `name_arch.go` and `name_os_arch.go` conventions.
    ///
    fn good_os_arch_file(&self, file: &str) -> bool {
        let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file);
        let parts: Vec<&str> = stem.split('_').collect();
        let n = parts.len();
        if n >= 3 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return parts[n - 2] == self.goos && parts[n - 1] == self.goarch;
        }
        if n >= 2 {
            let last = parts[n - 1];
            if KNOWN_OS.contains(&last) {
                return last == self.goos;
            }
            if KNOWN_ARCH.contains(&last) {
                return last == self.goarch;
            }
        }
        true
    }

    #[instrument(name = "FsResolver::scan", skip(self))]
    fn scan(&self, import_path: &str) -> Result<Arc<Package>, ResolveError> {
        let src_dir = self.src_dir.join(import_path);
        if !src_dir.is_dir() {
            return Err(ResolveError::PackageNotFound {
                import_path: import_path.to_string(),
                searched: self.src_dir.clone(),
            });
        }

        let mut go_files = vec![];
        let mut cgo_files = vec![];
        let mut c_files = vec![];
        let mut s_files = vec![];
        let mut h_files = vec![];
        let mut test_go_files = vec![];
        let mut ignored_go_files = vec![];
        let mut cgo_cflags = vec![];
        let mut cgo_ldflags = vec![];
        let mut names = vec![];
        let mut imports: Vec<String> = vec![];

        let mut entries: Vec<String> = std::fs::read_dir(&src_dir)
            .map_err(|err| ResolveError::Io {
                path: src_dir.clone(),
                source: err,
            })?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with('.') && !name.starts_with('_'))
            .collect();
        entries.sort();

        for file in entries {
            match file.rsplit_once('.').map(|(_, ext)| ext) {
                Some("go") => {
                    if !self.good_os_arch_file(&file) {
                        ignored_go_files.push(file);
                        continue;
                    }
                    let parsed = parse_go_file(&src_dir.join(&file))?;
                    let is_test = file.ends_with("_test.go");
                    if is_test {
                        if parsed.uses_cgo {
                            return Err(ResolveError::CgoInTest {
                                file: src_dir.join(&file),
                            });
                        }
                        test_go_files.push(file);
                    } else {
                        names.push(parsed.package_name.clone());
                        if parsed.uses_cgo {
                            cgo_files.push(file);
                        } else {
                            go_files.push(file);
                        }
                        cgo_cflags.extend(parsed.cgo_cflags);
                        cgo_ldflags.extend(parsed.cgo_ldflags);
                    }
                    for import in parsed.imports {
                        if !imports.contains(&import) {
                            imports.push(import);
                        }
                    }
                }
                Some("c") => c_files.push(file),
                Some("s") => {
                    if self.good_os_arch_file(&file) {
                        s_files.push(file);
                    }
                }
                Some("h") => h_files.push(file),
                _ => {}
            }
        }

        if go_files.is_empty() && cgo_files.is_empty() {
            return Err(ResolveError::NoGoSources {
                import_path: import_path.to_string(),
            });
        }

        names.sort();
        names.dedup();
        if names.len() > 1 {
            return Err(ResolveError::ConflictingPackageNames {
                import_path: import_path.to_string(),
                names,
            });
        }
        let name = names.remove(0);
        let kind = if name == "main" {
            PackageKind::Command
        } else {
            PackageKind::Library
        };

        let pkg = Arc::new(
            Package::builder()
                .name(name)
                .import_path(import_path)
                .kind(kind)
                .src_dir(src_dir)
                .go_files(go_files)
                .cgo_files(cgo_files)
                .c_files(c_files)
                .s_files(s_files)
                .h_files(h_files)
                .test_go_files(test_go_files)
                .ignored_go_files(ignored_go_files)
                .cgo_cflags(cgo_cflags)
                .cgo_ldflags(cgo_ldflags)
                .build()
                .unwrap_or_else(|err| unreachable!("every package field is set: {}", err)),
        );

        // Cache before resolving imports so cyclic imports terminate here
        // instead of recursing forever. The walker reports the cycle. A
        // concurrent resolve may have scanned the same directory; the first
        // install wins and stays the canonical instance for this path.
        match self.cache.entry(import_path.to_string()) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(slot) => slot.insert(pkg.clone()),
        };

        let mut resolved = vec![];
        for import in &imports {
            if self.is_external(import) {
                trace!("skipping external import {:?}", import);
                continue;
            }
            match self.resolve(import) {
                Ok(dep) => resolved.push(dep),
                Err(err) => {
                    self.cache.remove(import_path);
                    return Err(err);
                }
            }
        }
        pkg.set_imports(resolved);

        debug!(
            "resolved {:?}: {} go, {} cgo, {} s, {} c, {} test",
            import_path,
            pkg.go_files().len(),
            pkg.cgo_files().len(),
            pkg.s_files().len(),
            pkg.c_files().len(),
            pkg.test_go_files().len(),
        );
        Ok(pkg)
    }
}

impl PackageResolver for FsResolver {
    fn resolve(&self, import_path: &str) -> Result<Arc<Package>, ResolveError> {
        if let Some(pkg) = self.cache.get(import_path) {
            return Ok(pkg.clone());
        }

        // The cache fast path above also covers the cyclic case: a scan
        // installs its package before resolving imports, so a re-entrant
        // resolve never reaches for this path's lock a second time.
        let lock = self
            .scan_locks
            .entry(import_path.to_string())
            .or_default()
            .clone();
        let _guard = lock.lock().unwrap();

        if let Some(pkg) = self.cache.get(import_path) {
            return Ok(pkg.clone());
        }
        self.scan(import_path)
    }
}

#[derive(Debug, Default)]
struct ParsedGoFile {
    package_name: String,
    imports: Vec<String>,
    uses_cgo: bool,
    cgo_cflags: Vec<String>,
    cgo_ldflags: Vec<String>,
}

/// A line-oriented reading of a Go file's header: the package clause, the
/// import declarations, and any `#cgo` directives. Stops at the first
/// top-level declaration, which is as far as resolution needs to look.
///
fn parse_go_file(path: &Path) -> Result<ParsedGoFile, ResolveError> {
    let text = std::fs::read_to_string(path).map_err(|err| ResolveError::Io {
        path: path.to_path_buf(),
        source: err,
    })?;

    let mut parsed = ParsedGoFile::default();
    let mut in_block_comment = false;
    let mut in_import_block = false;

    for line in text.lines() {
        let line = line.trim();

        if in_block_comment {
            parse_cgo_directive(line, &mut parsed);
            if line.contains("*/") {
                in_block_comment = false;
            }
            continue;
        }
        if line.starts_with("/*") {
            parse_cgo_directive(line, &mut parsed);
            if !line.contains("*/") {
                in_block_comment = true;
            }
            continue;
        }
        if let Some(comment) = line.strip_prefix("//") {
            parse_cgo_directive(comment.trim(), &mut parsed);
            continue;
        }
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix("package ") {
            parsed.package_name = name.trim().to_string();
            continue;
        }

        if in_import_block {
            if line.starts_with(')') {
                in_import_block = false;
            } else {
                push_import(line, path, &mut parsed)?;
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("import") {
            let rest = rest.trim();
            if rest.starts_with('(') {
                in_import_block = true;
            } else {
                push_import(rest, path, &mut parsed)?;
            }
            continue;
        }

        // First top-level declaration: nothing of interest follows.
        break;
    }

    Ok(parsed)
}

fn push_import(line: &str, path: &Path, parsed: &mut ParsedGoFile) -> Result<(), ResolveError> {
    let import = match quoted(line) {
        Some(import) => import,
        None => return Ok(()),
    };
    if import.is_empty() {
        return Err(ResolveError::BlankImportPath {
            file: path.to_path_buf(),
        });
    }
    if import == "C" {
        parsed.uses_cgo = true;
    } else if !parsed.imports.iter().any(|i| i == &import) {
        parsed.imports.push(import);
    }
    Ok(())
}

fn quoted(line: &str) -> Option<String> {
    let start = line.find('"')?;
    let rest = &line[start + 1..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn parse_cgo_directive(comment: &str, parsed: &mut ParsedGoFile) {
    let directive = match comment.trim().strip_prefix("#cgo ") {
        Some(directive) => directive,
        None => return,
    };
    if let Some(flags) = directive.trim().strip_prefix("CFLAGS:") {
        parsed
            .cgo_cflags
            .extend(flags.split_whitespace().map(str::to_string));
    } else if let Some(flags) = directive.trim().strip_prefix("LDFLAGS:") {
        parsed
            .cgo_ldflags
            .extend(flags.split_whitespace().map(str::to_string));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    fn resolver_for(root: &TempDir) -> FsResolver {
        let config = Config::builder()
            .root(root.path())
            .goos("linux")
            .goarch("amd64")
            .build()
            .unwrap();
        FsResolver::new(&config)
    }

    fn write(root: &TempDir, path: &str, contents: &str) {
        root.child(path).write_str(contents).unwrap();
    }

    #[test]
    fn resolves_a_library_with_sources_and_imports() {
        let root = TempDir::new().unwrap();
        write(
            &root,
            "src/a/a.go",
            "package a\n\nimport (\n\t\"fmt\"\n\t\"b\"\n)\n\nfunc A() {}\n",
        );
        write(&root, "src/a/a_test.go", "package a\n\nimport \"testing\"\n");
        write(&root, "src/b/b.go", "package b\n\nfunc B() {}\n");

        let resolver = resolver_for(&root);
        let a = resolver.resolve("a").unwrap();

        assert_eq!(a.name(), "a");
        assert_eq!(a.kind(), PackageKind::Library);
        assert_eq!(a.go_files(), &["a.go".to_string()]);
        assert_eq!(a.test_go_files(), &["a_test.go".to_string()]);
        // "fmt" is external; only "b" resolves from the tree.
        assert_eq!(a.imports().len(), 1);
        assert_eq!(a.imports()[0].import_path(), "b");
    }

    #[test]
    fn resolution_is_memoized_by_identity() {
        let root = TempDir::new().unwrap();
        write(&root, "src/a/a.go", "package a\n");

        let resolver = resolver_for(&root);
        let first = resolver.resolve("a").unwrap();
        let second = resolver.resolve("a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn concurrent_resolves_share_one_fully_wired_instance() {
        let root = TempDir::new().unwrap();
        write(&root, "src/a/a.go", "package a\n\nimport \"b\"\n");
        write(&root, "src/b/b.go", "package b\n");

        let resolver = Arc::new(resolver_for(&root));
        let mut handles = vec![];
        for _ in 0..8 {
            let resolver = resolver.clone();
            handles.push(std::thread::spawn(move || resolver.resolve("a").unwrap()));
        }

        let packages: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for pkg in &packages {
            // Every caller sees the same instance, with its imports wired.
            assert!(Arc::ptr_eq(pkg, &packages[0]));
            assert_eq!(pkg.imports().len(), 1);
            assert_eq!(pkg.imports()[0].import_path(), "b");
        }
    }

    #[test]
    fn diamond_imports_share_one_package() {
        let root = TempDir::new().unwrap();
        write(&root, "src/top/top.go", "package top\n\nimport (\n\t\"left\"\n\t\"right\"\n)\n");
        write(&root, "src/left/left.go", "package left\n\nimport \"base\"\n");
        write(&root, "src/right/right.go", "package right\n\nimport \"base\"\n");
        write(&root, "src/base/base.go", "package base\n");

        let resolver = resolver_for(&root);
        let top = resolver.resolve("top").unwrap();
        let base_via_left = top.imports()[0].imports()[0].clone();
        let base_via_right = top.imports()[1].imports()[0].clone();
        assert!(Arc::ptr_eq(&base_via_left, &base_via_right));
    }

    #[test]
    fn a_main_package_is_a_command() {
        let root = TempDir::new().unwrap();
        write(&root, "src/cmd/hello/main.go", "package main\n\nfunc main() {}\n");

        let resolver = resolver_for(&root);
        let hello = resolver.resolve("cmd/hello").unwrap();
        assert_eq!(hello.kind(), PackageKind::Command);
        assert!(hello.is_command());
    }

    #[test]
    fn platform_suffixes_filter_sources() {
        let root = TempDir::new().unwrap();
        write(&root, "src/a/a.go", "package a\n");
        write(&root, "src/a/a_linux.go", "package a\n");
        write(&root, "src/a/a_windows.go", "package a\n");
        write(&root, "src/a/a_darwin_arm64.go", "package a\n");
        write(&root, "src/a/sqrt_amd64.s", "TEXT ·Sqrt(SB),7,$0\n");
        write(&root, "src/a/sqrt_arm.s", "TEXT ·Sqrt(SB),7,$0\n");

        let resolver = resolver_for(&root);
        let a = resolver.resolve("a").unwrap();
        assert_eq!(a.go_files(), &["a.go".to_string(), "a_linux.go".to_string()]);
        assert_eq!(
            a.ignored_go_files(),
            &["a_darwin_arm64.go".to_string(), "a_windows.go".to_string()]
        );
        assert_eq!(a.s_files(), &["sqrt_amd64.s".to_string()]);
    }

    #[test]
    fn import_c_marks_a_file_for_the_preprocessor() {
        let root = TempDir::new().unwrap();
        write(
            &root,
            "src/gzip/gzip.go",
            "package gzip\n\n/*\n#cgo CFLAGS: -I/opt/include\n#cgo LDFLAGS: -lz\n#include <zlib.h>\n*/\nimport \"C\"\n",
        );
        write(&root, "src/gzip/doc.go", "package gzip\n");

        let resolver = resolver_for(&root);
        let gzip = resolver.resolve("gzip").unwrap();
        assert_eq!(gzip.cgo_files(), &["gzip.go".to_string()]);
        assert_eq!(gzip.go_files(), &["doc.go".to_string()]);
        assert_eq!(gzip.cgo_cflags(), &["-I/opt/include".to_string()]);
        assert_eq!(gzip.cgo_ldflags(), &["-lz".to_string()]);
    }

    #[test]
    fn cgo_in_a_test_file_is_rejected() {
        let root = TempDir::new().unwrap();
        write(&root, "src/a/a.go", "package a\n");
        write(&root, "src/a/a_test.go", "package a\n\nimport \"C\"\n");

        let resolver = resolver_for(&root);
        assert_matches!(resolver.resolve("a"), Err(ResolveError::CgoInTest { .. }));
    }

    #[test]
    fn missing_and_empty_packages_are_errors() {
        let root = TempDir::new().unwrap();
        root.child("src/empty").create_dir_all().unwrap();
        write(&root, "src/empty/readme.txt", "nothing to build\n");

        let resolver = resolver_for(&root);
        assert_matches!(
            resolver.resolve("nope"),
            Err(ResolveError::PackageNotFound { .. })
        );
        assert_matches!(
            resolver.resolve("empty"),
            Err(ResolveError::NoGoSources { .. })
        );
    }

    #[test]
    fn conflicting_package_names_are_rejected() {
        let root = TempDir::new().unwrap();
        write(&root, "src/a/a.go", "package a\n");
        write(&root, "src/a/b.go", "package b\n");

        let resolver = resolver_for(&root);
        assert_matches!(
            resolver.resolve("a"),
            Err(ResolveError::ConflictingPackageNames { .. })
        );
    }

    #[test]
    fn cyclic_imports_resolve_without_recursing_forever() {
        let root = TempDir::new().unwrap();
        write(&root, "src/a/a.go", "package a\n\nimport \"b\"\n");
        write(&root, "src/b/b.go", "package b\n\nimport \"a\"\n");

        let resolver = resolver_for(&root);
        let a = resolver.resolve("a").unwrap();
        let b = a.imports()[0].clone();
        assert_eq!(b.import_path(), "b");
        assert!(Arc::ptr_eq(&b.imports()[0], &a));
    }

    #[test]
    fn ignored_imports_are_treated_as_external() {
        let root = TempDir::new().unwrap();
        write(&root, "src/a/a.go", "package a\n\nimport \"vendored/thing\"\n");

        let config = Config::builder()
            .root(root.path())
            .goos("linux")
            .goarch("amd64")
            .ignored_imports(vec!["vendored/thing".to_string()])
            .build()
            .unwrap();
        let resolver = FsResolver::new(&config);
        let a = resolver.resolve("a").unwrap();
        assert!(a.imports().is_empty());
    }
}
