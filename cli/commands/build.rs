use super::*;
use gale_core::resolver::{FsResolver, PackageResolver};
use gale_core::toolchain::GcToolchain;
use gale_core::{BuildContext, BuildFuture, Config};
use std::sync::Arc;
use structopt::StructOpt;
use tracing::*;

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "build",
    setting = structopt::clap::AppSettings::ColoredHelp,
    about = "Build one or more packages and their dependencies",
)]
pub struct BuildCommand {
    #[structopt(
        help = r"The import paths of the packages to build, resolved under
<root>/src. Commands are linked into <root>/bin.

Example: gale build cmd/hello net/dict
",
        required = true
    )]
    packages: Vec<String>,

    #[structopt(flatten)]
    flags: Flags,
}

impl BuildCommand {
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let config: Config = self.flags.into();
        let resolver = FsResolver::new(&config);
        let toolchain = Arc::new(GcToolchain::new(&config)?);
        let ctx = BuildContext::new(config, toolchain)?;

        // Schedule everything up front; requested packages build in
        // parallel with each other just like their dependencies do.
        let mut futures: Vec<(String, BuildFuture)> = vec![];
        for import_path in self.packages {
            let pkg = resolver.resolve(&import_path)?;
            futures.push((import_path, ctx.build(&pkg)));
        }

        for (import_path, future) in futures {
            let artifact = future.wait().await?;
            info!("built {}: {:?}", import_path, artifact);
        }

        println!(
            "{} (total {:.3?})",
            ctx.stats(),
            ctx.config().created_at().elapsed()
        );
        ctx.destroy()?;
        Ok(())
    }
}
