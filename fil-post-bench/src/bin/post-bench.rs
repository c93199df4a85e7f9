use anyhow::Result;
use clap::Parser;
use fil_post_bench::{cli, run, BenchParams, Settings};
use log::info;

fn main() -> Result<()> {
    fil_logger::maybe_init();

    let args = cli::Cli::parse();
    let settings = Settings::new()?;

    let params = BenchParams::from(args.command);
    info!("{:?}", params);

    let report = run(&params, &settings)?;
    info!("{:?}", report);
    cli::print_stdout(report)?;

    Ok(())
}
