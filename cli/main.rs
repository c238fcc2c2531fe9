mod commands;
pub mod flags;

use commands::*;
use structopt::StructOpt;
use tracing::{error, log};

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "gale",
    setting = structopt::clap::AppSettings::ColoredHelp,
    about = "A concurrent, memoizing build tool for Go-style package trees"
)]
struct Gale {
    #[structopt(subcommand, help = "the command to run")]
    cmd: Command,
}

impl Gale {
    async fn run(self) -> Result<(), anyhow::Error> {
        human_panic::setup_panic!(Metadata {
            name: "gale".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            authors: "the gale contributors".into(),
            homepage: "".into(),
        });

        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .format_timestamp_micros()
            .format_module_path(false)
            .parse_env("GALE_LOG")
            .try_init()
            .unwrap();

        let result = self.cmd.run().await;

        if let Err(ref err) = result {
            error!("{:?}", &err);
        };

        result
    }
}

#[derive(StructOpt, Debug, Clone)]
enum Command {
    Build(BuildCommand),
    Test(TestCommand),
}

impl Command {
    async fn run(self) -> Result<(), anyhow::Error> {
        match self {
            Command::Build(x) => x.run().await,
            Command::Test(x) => x.run().await,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    Gale::from_args().run().await
}
