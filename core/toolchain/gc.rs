use super::{run, Toolchain, ToolchainError};
use crate::config::{Config, ConfigError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// The gc tool suite: `6g`, `6a`, `6c`, `6l`, `pack`, and `cgo` (with the
/// arch character substituted for the target), plus the system gcc for
/// cgo-adjacent work.
///
#[derive(Debug)]
pub struct GcToolchain {
    gc: PathBuf,
    asm: PathBuf,
    cc: PathBuf,
    ld: PathBuf,
    pack: PathBuf,
    cgo: PathBuf,
    include_dir: PathBuf,
    goos: String,
    goarch: String,
}

impl GcToolchain {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let tool_dir = config.tool_dir();
        let archchar = config.arch_char()?;
        Ok(Self {
            gc: tool_dir.join(format!("{}g", archchar)),
            asm: tool_dir.join(format!("{}a", archchar)),
            cc: tool_dir.join(format!("{}c", archchar)),
            ld: tool_dir.join(format!("{}l", archchar)),
            pack: tool_dir.join("pack"),
            cgo: tool_dir.join("cgo"),
            include_dir: config.stdlib_dir(),
            goos: config.goos().to_string(),
            goarch: config.goarch().to_string(),
        })
    }
}

#[async_trait]
impl Toolchain for GcToolchain {
    fn name(&self) -> &'static str {
        "gc"
    }

    async fn compile(
        &self,
        import_path: &str,
        src_dir: &Path,
        out_file: &Path,
        go_files: &[String],
        search_paths: &[PathBuf],
    ) -> Result<(), ToolchainError> {
        let mut args = vec!["-p".to_string(), import_path.to_string()];
        for dir in search_paths {
            args.push("-I".to_string());
            args.push(dir.display().to_string());
        }
        args.push("-o".to_string());
        args.push(out_file.display().to_string());
        args.extend(go_files.iter().cloned());
        run(src_dir, &self.gc, &args).await
    }

    async fn assemble(
        &self,
        src_dir: &Path,
        out_file: &Path,
        s_file: &str,
    ) -> Result<(), ToolchainError> {
        let args = vec![
            "-o".to_string(),
            out_file.display().to_string(),
            "-D".to_string(),
            format!("GOOS_{}", self.goos),
            "-D".to_string(),
            format!("GOARCH_{}", self.goarch),
            s_file.to_string(),
        ];
        run(src_dir, &self.asm, &args).await
    }

    async fn cc(
        &self,
        src_dir: &Path,
        obj_dir: &Path,
        out_file: &Path,
        c_file: &Path,
    ) -> Result<(), ToolchainError> {
        let args = vec![
            "-F".to_string(),
            "-V".to_string(),
            "-w".to_string(),
            "-I".to_string(),
            obj_dir.display().to_string(),
            "-I".to_string(),
            self.include_dir.display().to_string(),
            "-o".to_string(),
            out_file.display().to_string(),
            c_file.display().to_string(),
        ];
        run(src_dir, &self.cc, &args).await
    }

    async fn cgo(&self, src_dir: &Path, args: &[String]) -> Result<(), ToolchainError> {
        run(src_dir, &self.cgo, args).await
    }

    async fn pack(
        &self,
        archive_file: &Path,
        obj_files: &[PathBuf],
    ) -> Result<(), ToolchainError> {
        let work_dir = archive_file.parent().unwrap_or_else(|| Path::new("."));
        let mut args = vec!["grc".to_string(), archive_file.display().to_string()];
        args.extend(obj_files.iter().map(|obj| obj.display().to_string()));
        run(work_dir, &self.pack, &args).await
    }

    async fn link(
        &self,
        out_file: &Path,
        archive_file: &Path,
        search_paths: &[PathBuf],
        ldflags: &[String],
    ) -> Result<(), ToolchainError> {
        let work_dir = out_file.parent().unwrap_or_else(|| Path::new("."));
        let mut args = vec!["-o".to_string(), out_file.display().to_string()];
        for dir in search_paths {
            args.push("-L".to_string());
            args.push(dir.display().to_string());
        }
        args.push(archive_file.display().to_string());
        args.extend(ldflags.iter().cloned());
        run(work_dir, &self.ld, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_paths_use_the_arch_char() {
        let config = Config::builder()
            .goroot("/goroot")
            .goos("linux")
            .goarch("amd64")
            .build()
            .unwrap();
        let tc = GcToolchain::new(&config).unwrap();
        assert_eq!(tc.gc, PathBuf::from("/goroot/pkg/tool/linux_amd64/6g"));
        assert_eq!(tc.ld, PathBuf::from("/goroot/pkg/tool/linux_amd64/6l"));
        assert_eq!(tc.pack, PathBuf::from("/goroot/pkg/tool/linux_amd64/pack"));
    }

    #[test]
    fn unsupported_arches_are_rejected_up_front() {
        let config = Config::builder().goarch("s390x").build().unwrap();
        assert!(GcToolchain::new(&config).is_err());
    }
}
