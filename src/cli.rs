use browser::LaunchSettings;
use clap::{Args, Parser, Subcommand, ValueEnum};
use collector::{CollectConfig, ScrollBudget, DEFAULT_ENDPOINT_PATTERN};
use exporter::ExportFormat;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "video-collector")]
#[command(version)]
#[command(about = "Collect video metadata from a profile page", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scroll a profile page and export the videos it lists
    Collect(CollectArgs),

    /// List previous exports
    List {
        /// Directory to look for exports in
        #[arg(short, long, default_value = "./exports", env = "VIDEO_COLLECTOR_OUTPUT")]
        output: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    /// Profile URL, e.g. https://www.tiktok.com/@handle
    #[arg(value_name = "PROFILE_URL")]
    pub url: String,

    /// Stop after this many unique videos (default: everything the page loads)
    #[arg(short = 'n', long, value_parser = parse_count)]
    pub count: Option<usize>,

    /// Maximum number of scroll gestures
    #[arg(long, default_value = "20")]
    pub max_scrolls: u32,

    /// Pause after each scroll in milliseconds
    #[arg(long, default_value = "2000")]
    pub scroll_pause_ms: u64,

    /// Wait after scrolling for in-flight responses, in milliseconds
    #[arg(long, default_value = "5000")]
    pub settle_ms: u64,

    /// Wait after opening the page before scrolling, in milliseconds
    #[arg(long, default_value = "3000")]
    pub initial_wait_ms: u64,

    /// Vertical distance of one scroll gesture in pixels
    #[arg(long, default_value = "5000")]
    pub scroll_distance: i64,

    /// URL fragment identifying the listing endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT_PATTERN)]
    pub endpoint: String,

    /// Keep scrolling after the page reports it has no more videos
    #[arg(long)]
    pub keep_scrolling: bool,

    /// Run browser in headless mode
    #[arg(long, env = "VIDEO_COLLECTOR_HEADLESS")]
    pub headless: bool,

    /// Output directory for exports
    #[arg(short, long, default_value = "./exports", env = "VIDEO_COLLECTOR_OUTPUT")]
    pub output: PathBuf,

    /// Export format
    #[arg(short, long, value_enum, default_value = "xlsx")]
    pub format: FormatArg,
}

impl CollectArgs {
    pub fn to_config(&self) -> CollectConfig {
        CollectConfig {
            target: self.count,
            budget: ScrollBudget {
                max_iterations: self.max_scrolls,
                pause: Duration::from_millis(self.scroll_pause_ms),
            },
            settle: Duration::from_millis(self.settle_ms),
            initial_wait: Duration::from_millis(self.initial_wait_ms),
            scroll_distance: self.scroll_distance,
            endpoint_pattern: self.endpoint.clone(),
            stop_on_exhausted: !self.keep_scrolling,
        }
    }

    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            headless: self.headless,
            ..LaunchSettings::default()
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Excel workbook
    Xlsx,
    /// Comma separated values
    Csv,
    /// JSON array of records
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Xlsx => ExportFormat::Xlsx,
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

fn parse_count(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("count must be at least 1".to_string()),
        Ok(count) => Ok(count),
        Err(e) => Err(e.to_string()),
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
