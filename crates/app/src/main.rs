mod html;
mod traffic;

use clap::Parser;

use crate::traffic::{TrafficCliArgs, TrafficConfig};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = TrafficConfig::try_from(TrafficCliArgs::parse())?;
    traffic::init_tracing(config.verbose)?;
    traffic::run(config)
}
