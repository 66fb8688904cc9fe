mod cli;

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use agro_panda::data::export::{write_csv, write_parquet};
use agro_panda::data::loader::{load_file, SourceFormat};
use agro_panda::report::{render_text, ReportSummary};
use agro_panda::state::Session;
use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use crate::cli::{Cli, Commands, ExportArgs, OutputFormat, ReportArgs, SourceArgs};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run() {
        error!("{err}");
        for cause in err.chain().skip(1) {
            error!("caused by: {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Report(args) => report(args),
        Commands::Export(args) => export(args),
    }
}

/// Load the source and apply the requested filters.
fn open_session(source: &SourceArgs) -> Result<Session> {
    let dataset = load_file(&source.input)
        .with_context(|| format!("failed to load {}", source.input.display()))?;
    if dataset.rejected_count() > 0 {
        warn!(
            "{} rows of {} were skipped",
            dataset.rejected_count(),
            source.input.display()
        );
    }
    let spec = source.filter_spec(&dataset)?;

    let mut session = Session::default();
    session.set_dataset(Arc::new(dataset));
    session.set_filters(spec);
    Ok(session)
}

fn report(args: ReportArgs) -> Result<()> {
    let mut session = open_session(&args.source)?;
    session.set_price_factor(args.price_factor);
    let Some(bundle) = &session.result else {
        return Ok(());
    };

    match args.format {
        OutputFormat::Text => {
            print!("{}", render_text(bundle, args.group_by.into(), session.price_factor));
        }
        OutputFormat::Json => {
            let summary = ReportSummary::new(bundle, args.group_by.into(), session.price_factor);
            let json =
                serde_json::to_string_pretty(&summary).context("failed to serialize report")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn export(args: ExportArgs) -> Result<()> {
    let session = open_session(&args.source)?;
    let Some(bundle) = &session.result else {
        return Ok(());
    };

    let file = File::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    let writer = BufWriter::new(file);
    let written = match SourceFormat::from_path(&args.output) {
        Ok(SourceFormat::Parquet) => write_parquet(&bundle.records, bundle.has_audit_date, writer),
        _ => write_csv(&bundle.records, bundle.has_audit_date, writer),
    };
    written.with_context(|| format!("failed to write {}", args.output.display()))?;

    info!("wrote {} farms to {}", bundle.records.len(), args.output.display());
    Ok(())
}
