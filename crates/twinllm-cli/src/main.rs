use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use twinllm_core::{driver, select_device, CandleRuntime, DriverError};

mod config;
mod settings;

use config::load_config;

/// twinllm — run one prompt through two LLaMA-family models, one after the other
#[derive(Debug, Parser)]
#[command(name = "twinllm", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Path to a custom configuration file (TOML).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log format: "pretty" (default) or "json".
    #[arg(long, default_value = "pretty", value_name = "FORMAT")]
    log_format: String,

    /// First model descriptor (LLaMA `config.json`).
    #[arg(long, value_name = "FILE")]
    model1: Option<String>,

    /// Second model descriptor (LLaMA `config.json`).
    #[arg(long, value_name = "FILE")]
    model2: Option<String>,

    /// Weight shards shared by both models; a path or comma-separated list.
    #[arg(long, value_name = "PATHS")]
    weights: Option<String>,

    /// Weight shards for the first model only (overrides --weights).
    #[arg(long, value_name = "PATHS")]
    weights1: Option<String>,

    /// Weight shards for the second model only (overrides --weights).
    #[arg(long, value_name = "PATHS")]
    weights2: Option<String>,

    /// Tokenizer artifact (tokenizer.json, tiktoken model or llama2.c .bin).
    #[arg(long, value_name = "FILE")]
    tokenizer_path: Option<String>,

    /// Prompt text.
    #[arg(long)]
    prompt: Option<String>,

    /// System prompt placed in the chat template.
    #[arg(long)]
    system: Option<String>,

    /// Sampling temperature; 0 = greedy argmax (deterministic).
    #[arg(long)]
    temperature: Option<f64>,

    /// Total number of tokens (prompt + output), capped by the model's context length.
    #[arg(long)]
    seq_len: Option<usize>,

    /// Wrap the prompt in the LLaMA-3 chat template.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    apply_chat_template: Option<bool>,

    /// Print the prompt before each model's output.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    echo: Option<bool>,

    /// Print timing and throughput stats after each model.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    stats: Option<bool>,

    /// Prefer GPU acceleration (CUDA/Metal).
    #[arg(long)]
    gpu: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(&cli.log_format);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            let code = e.downcast_ref::<DriverError>().map_or(1, DriverError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    info!("Running dual-model example");

    let cfg = load_config(cli.config.as_ref()).context("Failed to load configuration")?;
    let driver_config = settings::driver_config(cli, &cfg);

    let device = select_device(cli.gpu || cfg.device.prefer_gpu)?;
    let runtime = CandleRuntime::new(device);

    driver::run(&runtime, &driver_config)?;
    Ok(())
}

fn init_tracing(log_format: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout carries generated text only.
    if log_format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}
