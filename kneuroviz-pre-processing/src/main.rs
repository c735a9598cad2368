/// HDF5 to chunked volume pre-processing entry point
use anyhow::Context;
use clap::Parser;
use kneuroviz::cli::PreprocessArgs;
use kneuroviz::config::PreprocessConfig;
use kneuroviz::converter::VolumeConverter;
use kneuroviz::error::exit_code_of;
use std::process::ExitCode;
use tracing::info;

fn main() -> ExitCode {
    kneuroviz::init_tracing();
    let args = PreprocessArgs::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code_of(&err) as u8)
        }
    }
}

fn run(args: &PreprocessArgs) -> anyhow::Result<()> {
    let config = PreprocessConfig::from_args(args)?;
    let converter = VolumeConverter::new(config);

    let report = converter.convert().with_context(|| {
        format!(
            "Could not convert {} into {}",
            args.source.display(),
            args.destination.display()
        )
    })?;

    info!(
        extent = ?report.extent,
        data_type = %report.data_type,
        blocks = report.blocks_written,
        mesh_tasks = report.mesh_tasks,
        manifest_tasks = report.manifest_tasks,
        "Pre-processing finished"
    );
    Ok(())
}
