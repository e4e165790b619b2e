//! # News Globe
//!
//! Fetches top stories from the New York Times, asks an LLM where each story
//! takes place, keeps the results as dated snapshot files, and renders an
//! HTML table whose rows carry coordinates for a client-side globe.
//!
//! ## Usage
//!
//! ```sh
//! news_globe -s ./static/snapshots -o ./public/index.html --nyt-api-key YOUR_KEY
//! ```
//!
//! ## Architecture
//!
//! Every invocation runs one pipeline cycle:
//! 1. **Cull**: drop expired and excess snapshots
//! 2. **Fetch**: write a new snapshot unless the newest one is still fresh
//! 3. **Enrich**: geolocate the newest snapshot once, joining by article id
//! 4. **Render**: build the table and tag every row with its coordinates

use awful_aj::{config as aj_config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod enricher;
mod error;
mod fetcher;
mod models;
mod outputs;
mod pipeline;
mod snapshots;
mod sources;
mod utils;

use api::AskFnWrapper;
use cli::Cli;
use outputs::table::HtmlTableRenderer;
use outputs::{PLACEHOLDER, page};
use pipeline::Pipeline;
use sources::nyt::NytTopStories;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_globe starting up");

    if let Err(e) = dotenvy::dotenv() {
        debug!(error = %e, "No .env file loaded");
    }

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.snapshot_dir, ?args.output, "Parsed CLI arguments");
    let conf = config::Config::from_cli(&args).await?;

    // Early check: snapshot and output dirs must be writable
    let output_dir = conf
        .output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    for dir in [&conf.snapshot_dir, &output_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    // ---- Load LLM config & template ----
    // A broken LLM setup disables enrichment for this run; the page is still written.
    let (llm, llm_error) = match load_llm(&conf).await {
        Ok(loaded) => (Some(loaded), None),
        Err(e) => {
            error!(error = %e, "LLM client unavailable; enrichment disabled for this run");
            (None, Some(e))
        }
    };

    // ---- Run one pipeline cycle ----
    let source = NytTopStories::new(
        &conf.settings.api_base_url,
        conf.nyt_api_key.clone(),
        conf.settings.fetch_timeout(),
    )?;
    let client = llm.as_ref().map(|(config, template)| AskFnWrapper { config, template });
    let pipeline = Pipeline::new(source, client, HtmlTableRenderer, &conf);

    let result = pipeline.render().await;
    let table_html = match &result {
        Ok(rendered) => {
            info!(
                fetch = ?rendered.fetch,
                enrich = ?rendered.enrich,
                rendered_from = ?rendered.rendered_from,
                culled = rendered.culled.removed(),
                "Pipeline cycle complete"
            );
            if rendered.rendered_from.is_none() {
                warn!("No enriched snapshot available yet; writing placeholder");
            }
            rendered.html.as_str()
        }
        Err(e) => {
            error!(error = %e, "Pipeline failed; writing placeholder");
            PLACEHOLDER
        }
    };

    if let Err(e) = page::write_page(&conf.output_path, table_html).await {
        error!(path = %conf.output_path.display(), error = %e, "Failed writing page");
        return Err(e);
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    result?;
    match llm_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Load the LLM client config and the geolocation chat template.
async fn load_llm(conf: &config::Config) -> Result<(AwfulJadeConfig, ChatTemplate), Box<dyn Error>> {
    let conf_file = match &conf.llm_config_path {
        Some(path) => path.clone(),
        None => config_dir()?.join("config.yaml"),
    };
    let config_path = conf_file.to_str().ok_or("LLM config path is not valid UTF-8")?;
    let llm_config = aj_config::load_config(config_path)?;
    info!(config_path, "Loaded LLM configuration");
    let llm_template = template::load_template(&conf.template_name).await?;
    info!(template = %conf.template_name, "Loaded template");
    Ok((llm_config, llm_template))
}
