//! Command-line interface definitions for News Globe.
//!
//! All arguments can be provided via command-line flags or environment variables.

use clap::Parser;

/// Command-line arguments for the News Globe application.
///
/// # Examples
///
/// ```sh
/// # Render with defaults (snapshots in ./static/snapshots, page in ./public/index.html)
/// news_globe --nyt-api-key YOUR_KEY
///
/// # Custom locations and pipeline settings
/// news_globe -s /var/lib/news_globe -o /srv/www/index.html --settings settings.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding the dated snapshot files
    #[arg(short, long, env = "SNAPSHOT_DIR", default_value = "static/snapshots")]
    pub snapshot_dir: String,

    /// Path of the HTML page to write
    #[arg(short, long, default_value = "public/index.html")]
    pub output: String,

    /// Optional path to the LLM client's config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Name of the LLM chat template used for geolocation
    #[arg(long, default_value = "news_geolocator")]
    pub template: String,

    /// New York Times API key
    #[arg(long, env = "NYT_API_KEY")]
    pub nyt_api_key: Option<String>,

    /// Optional YAML file with pipeline settings (sections, thresholds, timeouts)
    #[arg(long)]
    pub settings: Option<String>,
}
