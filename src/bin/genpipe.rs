//! genpipe: run one generation request from the command line.
//!
//! Prints the validated result as JSON on stdout. On failure, prints the
//! error category, its HTTP-style status and a truncated diagnostic on
//! stderr and exits non-zero.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use genpipe::{GenError, GenerationOrchestrator, GenerationRequest, Input, RuntimeConfig};

/// Cached, validated UI generation
#[derive(Parser)]
#[command(name = "genpipe")]
#[command(version = genpipe::version::PKG_VERSION)]
#[command(about = "Generate a validated UI description from an input and an intent")]
struct Args {
    /// Input text, `@file.json` for structured input, or omit to read stdin
    #[arg(short, long)]
    input: Option<String>,

    /// What the UI should do with the input
    #[arg(short = 't', long)]
    intent: String,

    /// "small", "large" or a concrete model id (default: config active_model)
    #[arg(short, long, env = "GENPIPE_MODEL")]
    model: Option<String>,

    /// Provider name, or "auto" to probe
    #[arg(short, long, env = "GENPIPE_PROVIDER")]
    provider: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    tracing::debug!(version = genpipe::version::version_string(), "genpipe starting");
    match run(args).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let category = e.category();
            eprintln!(
                "error: {category:?} ({}): {}",
                category.status_code(),
                e.diagnostic()
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> genpipe::Result<String> {
    let mut config = RuntimeConfig::load(args.config.as_deref())?;
    if let Some(provider) = args.provider {
        config.provider = Some(provider);
    }
    let model = args.model.unwrap_or_else(|| config.active_model.clone());

    let input = read_input(args.input)?;
    let request = GenerationRequest::new(input, args.intent, model.as_str());

    let pipeline = GenerationOrchestrator::from_config(config)?;
    let result = pipeline.generate(&request).await?;
    Ok(serde_json::to_string_pretty(&result)?)
}

fn read_input(arg: Option<String>) -> genpipe::Result<Input> {
    match arg {
        Some(arg) => match arg.strip_prefix('@') {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| GenError::InvalidInput(format!("cannot read {path}: {e}")))?;
                let value = serde_json::from_str(&text)
                    .map_err(|e| GenError::InvalidInput(format!("{path} is not JSON: {e}")))?;
                Ok(Input::Structured(value))
            }
            None => Ok(Input::Text(arg)),
        },
        None => {
            if io::stdin().is_terminal() {
                return Err(GenError::InvalidInput(
                    "no --input given and stdin is a terminal".into(),
                ));
            }
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| GenError::InvalidInput(format!("cannot read stdin: {e}")))?;
            Ok(Input::Text(buf))
        }
    }
}
