mod mime;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use kuke_upload::config::upload_secret_from_env;
use kuke_upload::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "kuke-upload")]
#[command(about = "Upload images to Kuke and print their public URLs")]
#[command(version)]
struct Cli {
    /// Image files to upload; identical files are sent once
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Base URL of the Kuke API
    #[arg(long)]
    api_base: Option<String>,

    /// Session token sent as a bearer token
    #[arg(long)]
    token: Option<String>,

    /// Shared upload signing secret (defaults to KUKE__UPLOAD__SECRET)
    #[arg(long)]
    secret: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print coordinator statistics as JSON when done
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let uploads = build_coordinator(&cli)?;

    // one coordinator for every file, so duplicates share a transfer
    let jobs = cli.files.iter().map(|path| {
        let uploads = &uploads;
        async move { (path, upload_file(uploads, path).await) }
    });

    let mut failed = 0usize;
    for (path, outcome) in futures::future::join_all(jobs).await {
        match outcome {
            Ok(url) => println!("{} -> {}", path.display(), url),
            Err(e) => {
                failed += 1;
                error!(path = %path.display(), "upload failed: {e:#}");
            }
        }
    }

    if cli.stats {
        println!("{}", serde_json::to_string_pretty(&uploads.stats())?);
    }

    if failed > 0 {
        bail!("{failed} of {} uploads failed", cli.files.len());
    }
    Ok(())
}

fn build_coordinator(cli: &Cli) -> Result<UploadCoordinator> {
    let mut transfer_config = TransferConfig::from_env().context("reading API settings")?;
    if let Some(base) = &cli.api_base {
        transfer_config = transfer_config.with_api_base(base.clone());
    }
    if let Some(token) = &cli.token {
        transfer_config = transfer_config.with_bearer_token(token.clone());
    }
    if let Some(secs) = cli.timeout_secs {
        transfer_config = transfer_config.with_timeout(Duration::from_secs(secs));
    }

    let secret = cli
        .secret
        .clone()
        .or_else(upload_secret_from_env)
        .context("no upload secret: pass --secret or set KUKE__UPLOAD__SECRET")?;

    let upload_config = UploadConfig::from_env().context("reading upload settings")?;
    info!(
        endpoint = %transfer_config.upload_url(),
        downsize_threshold_bytes = upload_config.downsize_threshold_bytes,
        max_dimension_px = upload_config.max_dimension_px,
        "upload coordinator configured"
    );

    let transfer = HttpTransfer::new(transfer_config)?;
    Ok(UploadCoordinator::new(
        transfer,
        Sha256TimestampSigner::new(secret),
        upload_config,
    ))
}

async fn upload_file(uploads: &UploadCoordinator, path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let request = UploadRequest::new(bytes, filename).with_content_type(mime::content_type_for(path));
    Ok(uploads.resolve_upload(request).await?)
}
