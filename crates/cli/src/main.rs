//! Binary entry point for the anime study card generator.

use animejp_core::export::file_name;
use animejp_core::{AnalyzeRequest, AnalyzeResponse, Config, ErrorPayload, Pipeline, Provider};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command line options for the binary.
#[derive(Parser)]
#[command(name = "animejp", version, about = "YouTube anime clip to Japanese study cards")]
struct Cli {
    /// YouTube video link.
    url: String,

    /// Model service key. Falls back to ANTHROPIC_API_KEY or OPENAI_API_KEY.
    #[arg(long)]
    api_key: Option<String>,

    /// Model service to use (anthropic or openai).
    #[arg(long)]
    provider: Option<Provider>,

    /// Model name override.
    #[arg(long)]
    model: Option<String>,

    /// Where to write the .nihongocards bundle.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Print the response (or the error) as JSON.
    #[arg(long)]
    json: bool,

    /// Browser to borrow cookies from when YouTube asks for a sign-in.
    #[arg(long)]
    cookies_from_browser: Option<String>,

    /// Path to the yt-dlp executable.
    #[arg(long = "yt-dlp")]
    ytdlp: Option<PathBuf>,

    /// Seconds allowed for each subtitle download.
    #[arg(long)]
    download_timeout: Option<u64>,

    /// Enable verbose debug and trace logs.
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::default()
            .add_directive("animejp=trace".parse().unwrap())
            .add_directive("animejp_core=trace".parse().unwrap())
            .add_directive("info".parse().unwrap())
    } else {
        EnvFilter::default()
            .add_directive("animejp=info".parse().unwrap())
            .add_directive("animejp_core=info".parse().unwrap())
            .add_directive("warn".parse().unwrap())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env(cli.provider)?;
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(path) = &cli.ytdlp {
        config.ytdlp_path = path.clone();
    }
    if let Some(browser) = &cli.cookies_from_browser {
        config.cookies_from_browser = Some(browser.clone());
    }
    if let Some(secs) = cli.download_timeout {
        config.download_timeout = Duration::from_secs(secs);
    }
    Ok(config)
}

fn print_cards(response: &AnalyzeResponse) {
    println!("{}", response.title);
    println!("\n單字 ({})", response.vocabulary.len());
    for entry in &response.vocabulary {
        println!("  {}【{}】{}  ({})", entry.japanese, entry.reading, entry.chinese, entry.notes);
    }
    println!("\n文法 ({})", response.grammar.len());
    for entry in &response.grammar {
        println!("  {}\n    {}  ({})", entry.japanese, entry.chinese, entry.notes);
    }
}

fn save_bundle(response: &AnalyzeResponse, output: Option<PathBuf>) -> Result<PathBuf> {
    let path = output.unwrap_or_else(|| PathBuf::from(file_name(&response.title)));
    let text = serde_json::to_string_pretty(&response.nihongocards)?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Application entry point which parses CLI args and runs one request.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = build_config(&cli)?;
    let pipeline = Pipeline::from_config(config)?;
    let request = AnalyzeRequest {
        url: Some(cli.url.clone()),
        api_key: cli.api_key.clone(),
    };

    match pipeline.analyze(&request).await {
        Ok(response) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_cards(&response);
            }
            let path = save_bundle(&response, cli.output)?;
            info!("saved {}", path.display());
            Ok(())
        }
        Err(err) => {
            error!("{err:?}");
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&ErrorPayload::from(&err))?);
            } else {
                eprintln!("{}", err.user_message());
            }
            std::process::exit(err.exit_code());
        }
    }
}
