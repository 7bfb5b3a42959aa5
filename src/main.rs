//! TG Batch Uploader
//!
//! Uploads images from a directory tree and/or a zip archive to a Telegram
//! chat as media groups, rotating over pooled bot tokens and API mirrors.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tg_batch_uploader::{
    app::{App, SourceTarget},
    config::{split_list, LogFormat, Settings},
    logging::init_tracing,
};

/// TG Batch Uploader
///
/// Uploads images to a Telegram chat as media groups.
#[derive(Parser, Debug)]
#[command(name = "tg-batch-uploader")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bot token(s), comma-separated (replaces tokens from the config file)
    #[arg(short = 't', long)]
    bot_token: Option<String>,

    /// Target chat or channel id (overrides TG_CHAT_ID env var)
    #[arg(short = 'c', long)]
    chat_id: Option<String>,

    /// Zip archive to upload images from
    #[arg(short = 'z', long)]
    zip_file: Option<PathBuf>,

    /// Directory to upload images from (walked recursively)
    #[arg(short = 'd', long)]
    image_dir: Option<PathBuf>,

    /// Bot API base address(es), comma-separated (overrides the config file)
    #[arg(long)]
    api_url: Option<String>,

    /// INI configuration file with API addresses and [TokenN] sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// Images per media group (1-10)
    #[arg(long)]
    group_size: Option<usize>,

    /// First batch index to upload (resume a partial run)
    #[arg(long)]
    start_index: Option<u64>,

    /// Last batch index to upload, 0 for no limit
    #[arg(long)]
    end_index: Option<u64>,

    /// Attempts per delivery before giving up
    #[arg(long)]
    max_retries: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long)]
    retry_delay: Option<u64>,

    /// Seconds to pause after every media group
    #[arg(long)]
    batch_cooldown: Option<u64>,

    /// Extra seconds to wait after a "Too Many Requests" response
    #[arg(long)]
    rate_limit_cooldown: Option<u64>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Console log format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Also append JSON logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn targets(&self) -> Vec<SourceTarget> {
        let mut targets = Vec::new();
        if let Some(path) = &self.zip_file {
            targets.push(SourceTarget::Archive(path.clone()));
        }
        if let Some(path) = &self.image_dir {
            targets.push(SourceTarget::Directory(path.clone()));
        }
        targets
    }

    /// Log level and format, CLI flags first, before any config file is read
    fn log_settings(&self, settings: &Settings) -> (String, LogFormat) {
        let level = self
            .log_level
            .clone()
            .unwrap_or_else(|| settings.log_level.clone());
        (level, self.log_format.unwrap_or(settings.log_format))
    }

    /// Apply command-line overrides on top of env and config-file settings
    fn apply(&self, settings: &mut Settings) {
        if let Some(tokens) = &self.bot_token {
            settings.tokens = split_list(tokens);
        }
        if let Some(chat_id) = &self.chat_id {
            settings.chat_id = chat_id.clone();
        }
        if let Some(api_url) = &self.api_url {
            settings.api_urls = split_list(api_url);
        }
        if let Some(group_size) = self.group_size {
            settings.batch.group_size = group_size;
        }
        if let Some(start_index) = self.start_index {
            settings.batch.start_index = start_index;
        }
        if let Some(end_index) = self.end_index {
            settings.batch.end_index = end_index;
        }
        if let Some(max_retries) = self.max_retries {
            settings.retry.max_retries = max_retries;
        }
        if let Some(delay) = self.retry_delay {
            settings.retry.delay_seconds = delay;
        }
        if let Some(cooldown) = self.batch_cooldown {
            settings.batch.cooldown_seconds = cooldown;
        }
        if let Some(cooldown) = self.rate_limit_cooldown {
            settings.retry.rate_limit_cooldown_seconds = cooldown;
        }
        if let Some(log_level) = &self.log_level {
            settings.log_level = log_level.clone();
        }
        if let Some(log_format) = self.log_format {
            settings.log_format = log_format;
        }
    }
}

/// Layer the config file (if any) and then the CLI flags over `settings`
fn resolve_settings(args: &Args, settings: &mut Settings) -> Result<()> {
    if let Some(path) = &args.config {
        settings
            .merge_config_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?;
    }
    args.apply(settings);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let targets = args.targets();
    if targets.is_empty() {
        anyhow::bail!("Provide --zip-file (-z) and/or --image-dir (-d)");
    }

    // Load env settings first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    let (log_level, log_format) = args.log_settings(&settings);
    init_tracing(&log_level, log_format, args.log_file.as_deref())
        .context("Failed to initialize logging")?;

    resolve_settings(&args, &mut settings)?;
    settings.validate()?;

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        chat_id = %settings.chat_id,
        api_urls = settings.api_urls.len(),
        tokens = settings.tokens.len(),
        group_size = settings.batch.group_size,
        start_index = settings.batch.start_index,
        end_index = settings.batch.end_index,
        "Starting upload run"
    );

    let app = App::new(settings).await?;
    let reports = app.run_until_complete(&targets).await?;

    for report in &reports {
        tracing::info!(
            source = %report.source,
            items_sent = report.items_sent,
            batches_sent = report.batches_sent,
            "Source uploaded"
        );
    }
    tracing::info!("All uploads complete");

    Ok(())
}
