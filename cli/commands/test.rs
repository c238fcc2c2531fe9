use super::*;
use gale_core::resolver::{FsResolver, PackageResolver};
use gale_core::toolchain::GcToolchain;
use gale_core::{BuildContext, BuildFuture, Config};
use std::sync::Arc;
use structopt::StructOpt;
use tracing::*;

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "test",
    setting = structopt::clap::AppSettings::ColoredHelp,
    about = "Compile the test archives for one or more packages",
)]
pub struct TestCommand {
    #[structopt(
        help = r"The import paths of the packages whose tests to compile.",
        required = true
    )]
    packages: Vec<String>,

    #[structopt(flatten)]
    flags: Flags,
}

impl TestCommand {
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let config: Config = self.flags.into();
        let resolver = FsResolver::new(&config);
        let toolchain = Arc::new(GcToolchain::new(&config)?);
        let ctx = BuildContext::new(config, toolchain)?;

        let mut futures: Vec<(String, BuildFuture)> = vec![];
        for import_path in self.packages {
            let pkg = resolver.resolve(&import_path)?;
            futures.push((import_path, ctx.build_test(&pkg)));
        }

        for (import_path, future) in futures {
            let artifact = future.wait().await?;
            info!("compiled tests for {}: {:?}", import_path, artifact);
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
