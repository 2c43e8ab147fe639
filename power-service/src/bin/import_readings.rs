use anyhow::{bail, Result};
use power_service::{config::AppConfig, observability, pipeline, store};
use std::{env, path::Path};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: import_readings <company> <spreadsheet.csv|spreadsheet.xlsx>");
    }
    let company = &args[1];
    let file_path = Path::new(&args[2]);

    // POWER_CONFIG can point at an import-specific file.
    let cfg = AppConfig::load()?;
    let settings = cfg.ingest.settings()?;
    let store = store::connect(&cfg).await?;

    let file_name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let bytes = tokio::fs::read(file_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", file_path.display()))?;

    let job = pipeline::IngestJob::new(0, company.as_str(), file_name, bytes)?;
    let report = pipeline::ingest_job(store.as_ref(), job, &settings).await?;

    if report.persist_failures > 0 {
        bail!(
            "{} of {} readings could not be stored",
            report.persist_failures,
            report.persisted + report.persist_failures
        );
    }
    Ok(())
}
