use gale_core::Config;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Default, Debug, Clone, StructOpt)]
pub struct Flags {
    #[structopt(
        help = r"The project root. Package sources are resolved under <root>/src.",
        long = "root"
    )]
    pub(crate) root: Option<PathBuf>,

    #[structopt(help = r"The target operating system.", long = "goos")]
    pub(crate) goos: Option<String>,

    #[structopt(help = r"The target architecture.", long = "goarch")]
    pub(crate) goarch: Option<String>,

    #[structopt(
        help = r"The Go installation providing the gc tool suite and the
precompiled standard library.",
        long = "goroot"
    )]
    pub(crate) goroot: Option<PathBuf>,

    #[structopt(help = r"Where linked executables end up.", long = "bin-dir")]
    pub(crate) bin_dir: Option<PathBuf>,

    #[structopt(
        help = r"Import paths to treat as externally provided: they are not
resolved from the source tree and their archives are expected on the
search path.",
        long = "ignore"
    )]
    pub(crate) ignored_imports: Vec<String>,
}

impl From<Flags> for Config {
    fn from(flags: Flags) -> Self {
        let mut config = Config::builder();

        if let Some(root) = flags.root {
            config.root(root);
        }
        if let Some(goos) = flags.goos {
            config.goos(goos);
        }
        if let Some(goarch) = flags.goarch {
            config.goarch(goarch);
        }
        if let Some(goroot) = flags.goroot {
            config.goroot(goroot);
        }
        if let Some(bin_dir) = flags.bin_dir {
            config.bin_dir(bin_dir);
        }
        config.ignored_imports(flags.ignored_imports);

        config.build().unwrap()
    }
}
