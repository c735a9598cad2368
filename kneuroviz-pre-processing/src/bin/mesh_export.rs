/// Segment mesh export entry point
use anyhow::Context;
use clap::Parser;
use kneuroviz::cli::MeshExportArgs;
use kneuroviz::config::MeshExportConfig;
use kneuroviz::error::exit_code_of;
use kneuroviz::exporter::MeshExporter;
use std::process::ExitCode;

fn main() -> ExitCode {
    kneuroviz::init_tracing();
    let args = MeshExportArgs::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code_of(&err) as u8)
        }
    }
}

fn run(args: &MeshExportArgs) -> anyhow::Result<()> {
    let config = MeshExportConfig::from_args(args)?;
    let segment_id = config.segment_id;

    let report = MeshExporter::new(config)
        .export()
        .with_context(|| format!("Could not export mesh of segment {}", segment_id))?;

    println!(
        "Exported segment {} ({} vertices, {} faces) to {}",
        segment_id,
        report.vertices,
        report.faces,
        report.ctm_path.display()
    );
    Ok(())
}
