use anyhow::Context;
use chrono::Local;
use log::LevelFilter;
use structopt::StructOpt;

use fish_release::jobs::HostPlatform;
use fish_release::tool::SystemRunner;
use fish_release::{pipeline, version, MergePlan, MergeReport};

mod cli;

fn print_report(report: &MergeReport) {
    println!("Merged image: {}", report.path.display());
    println!("Size: {} bytes", report.size);
    println!("SHA-256: {}", report.sha256);
}

fn main() -> Result<(), anyhow::Error> {
    use cli::Command;

    // Log timestamped messages at Info level or above, unless RUST_LOG says otherwise
    let mut logger = pretty_env_logger::formatted_timed_builder();
    logger.filter_level(LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.init();

    // Parse the command-line arguments
    let opts = cli::Opts::from_args();
    let mut ctx = opts
        .build_context()
        .with_context(|| "Invalid build configuration")?;

    match &opts.command {
        Command::Version => {
            let tag = version::tag_build(&mut ctx).with_context(|| {
                format!("Failed to write version header {}", ctx.header_path().display())
            })?;

            println!("{}", tag);
        }
        Command::Merge { .. } => {
            let plan = MergePlan::prepare(&ctx, Local::now().date_naive());

            println!("Merging firmware version {}", plan.version);

            let report = plan.execute(&mut SystemRunner).with_context(|| {
                format!("Failed to merge image {}", plan.output.display())
            })?;

            print_report(&report);
        }
        Command::Build { command } => {
            let report = pipeline::run(
                &mut ctx,
                HostPlatform::current(),
                command,
                &mut SystemRunner,
                || Local::now().date_naive(),
            )
            .with_context(|| "Release build failed")?;

            println!("Firmware version: {}", report.version);
            print_report(&report.merge);
        }
    }

    Ok(())
}
