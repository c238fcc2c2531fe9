use std::path::PathBuf;
use std::time::Instant;
use thiserror::*;

/// A collection of flags and options that describe one build invocation:
/// where the project lives, which platform is being targeted, and where the
/// Go installation providing the tool binaries is.
///
#[derive(Builder, Debug, Clone)]
#[builder(build_fn(error = "ConfigError"), setter(into))]
pub struct Config {
    /// The project root. Sources are resolved under `<root>/src`.
    #[builder(default = "self.default_root()")]
    root: PathBuf,

    /// The target operating system.
    #[builder(default = "self.default_goos()")]
    goos: String,

    /// The target architecture.
    #[builder(default = "self.default_goarch()")]
    goarch: String,

    /// The Go installation that provides the gc tool suite.
    #[builder(default = "self.default_goroot()")]
    goroot: PathBuf,

    /// Where linked executables end up.
    #[builder(default = "self.default_bin_dir()")]
    bin_dir: PathBuf,

    /// The directory gale was invoked from.
    #[builder(default = "self.default_invocation_dir()")]
    invocation_dir: PathBuf,

    /// Import paths to treat as externally provided: they are skipped during
    /// resolution and expected on the archive search path instead.
    #[builder(default)]
    ignored_imports: Vec<String>,

    /// The time at which this configuration was created. Used to compute the
    /// total build time.
    #[builder(default = "self.default_created_at()")]
    created_at: Instant,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build().unwrap()
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn goos(&self) -> &str {
        &self.goos
    }

    pub fn goarch(&self) -> &str {
        &self.goarch
    }

    pub fn goroot(&self) -> &PathBuf {
        &self.goroot
    }

    pub fn bin_dir(&self) -> &PathBuf {
        &self.bin_dir
    }

    pub fn invocation_dir(&self) -> &PathBuf {
        &self.invocation_dir
    }

    pub fn ignored_imports(&self) -> &[String] {
        &self.ignored_imports
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// The single-character tool prefix for the target architecture, as used
    /// by the gc suite (`6g`, `6l`, ...).
    ///
    pub fn arch_char(&self) -> Result<&'static str, ConfigError> {
        match self.goarch.as_str() {
            "amd64" => Ok("6"),
            "386" => Ok("8"),
            "arm" => Ok("5"),
            "arm64" => Ok("7"),
            _ => Err(ConfigError::UnsupportedArch(self.goarch.clone())),
        }
    }

    pub fn goos_goarch(&self) -> String {
        format!("{}_{}", self.goos, self.goarch)
    }

    /// The precompiled standard library for the target platform.
    pub fn stdlib_dir(&self) -> PathBuf {
        self.goroot.join("pkg").join(self.goos_goarch())
    }

    /// Where the gc suite binaries live.
    pub fn tool_dir(&self) -> PathBuf {
        self.goroot.join("pkg").join("tool").join(self.goos_goarch())
    }
}

impl ConfigBuilder {
    fn default_root(&self) -> PathBuf {
        PathBuf::from(".")
    }

    fn default_goos(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn default_goarch(&self) -> String {
        match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "386",
            "aarch64" => "arm64",
            other => other,
        }
        .to_string()
    }

    fn default_goroot(&self) -> PathBuf {
        std::env::var_os("GOROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/usr/local/go"))
    }

    fn default_bin_dir(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| self.default_root())
            .join("bin")
    }

    fn default_invocation_dir(&self) -> PathBuf {
        PathBuf::from(".")
    }

    fn default_created_at(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Attempted to build a Config struct while missing fields: {0:?}")]
    BuilderError(derive_builder::UninitializedFieldError),

    #[error("unsupported target architecture {0:?}")]
    UnsupportedArch(String),
}

impl From<derive_builder::UninitializedFieldError> for ConfigError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Self::BuilderError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_every_field() {
        let config = Config::default();
        assert_eq!(config.src_dir(), config.root().join("src"));
        assert_eq!(config.bin_dir(), &config.root().join("bin"));
    }

    #[test]
    fn arch_chars_match_the_gc_suite() {
        let config = Config::builder().goarch("amd64").build().unwrap();
        assert_eq!(config.arch_char().unwrap(), "6");
        let config = Config::builder().goarch("386").build().unwrap();
        assert_eq!(config.arch_char().unwrap(), "8");
        let config = Config::builder().goarch("mips").build().unwrap();
        assert_matches!(config.arch_char(), Err(ConfigError::UnsupportedArch(_)));
    }

    #[test]
    fn tool_dir_is_scoped_by_platform() {
        let config = Config::builder()
            .goroot("/goroot")
            .goos("linux")
            .goarch("amd64")
            .build()
            .unwrap();
        assert_eq!(config.tool_dir(), PathBuf::from("/goroot/pkg/tool/linux_amd64"));
        assert_eq!(config.stdlib_dir(), PathBuf::from("/goroot/pkg/linux_amd64"));
    }
}
