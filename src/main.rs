use billing_extract::config::Config;
use billing_extract::heuristics;
use billing_extract::llm_extract::ChatCompletionsClient;
use billing_extract::pdf_text::{PdfTextExtractor, TextExtractor};
use billing_extract::pipeline::Extractor;
use billing_extract::server::{self, ApiState, ExtractResponse};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "billing-extract", version, about = "Billing PDF to unified rows")]
struct Cli {
    /// TOML config file (default: ./billing-extract.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Override `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run the full pipeline on a local PDF and print the response JSON
    Extract { pdf: PathBuf },
    /// Print the lines that would be sent to the model
    Lines { pdf: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "billing_extract=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = Config::resolve(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            let addr = cfg.server.bind_addr()?;
            let extractor = build_extractor(&cfg)?;
            let state = ApiState::new(extractor, cfg.server.max_upload_bytes);
            server::start_server(&addr.to_string(), state).await?;
        }
        Command::Extract { pdf } => {
            let extractor = build_extractor(&cfg)?;
            let bytes = std::fs::read(&pdf)?;
            let result = extractor.extract_upload(&file_name(&pdf), bytes).await;
            let response = ExtractResponse::from(result);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Lines { pdf } => {
            let bytes = std::fs::read(&pdf)?;
            let pages = PdfTextExtractor.extract(&bytes)?;
            let lines = heuristics::normalize_pages(&pages);
            let filtered = heuristics::filter_rows(&lines, &cfg.filter.rules());
            info!(
                lines = lines.len(),
                kept = filtered.len(),
                halted_at = ?filtered.halted_at,
                fallback = filtered.fallback,
                "Filtered table rows"
            );
            for line in &filtered.lines {
                println!("{line}");
            }
        }
    }

    Ok(())
}

/// The API key is checked here, before anything is served.
fn build_extractor(cfg: &Config) -> Result<Extractor, Box<dyn std::error::Error>> {
    let api_key = cfg.llm.api_key()?;
    let model = ChatCompletionsClient::new(&cfg.llm, api_key);
    Ok(Extractor::new(
        Arc::new(PdfTextExtractor),
        Arc::new(model),
        cfg.filter.rules(),
    ))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
