//! Dual-model generation driver.
//!
//! Loads two tokenizers, hands one to each of two runners, formats the prompt
//! once and then generates with runner 1 followed by runner 2. The first
//! failure ends the run; runner 2 never starts if runner 1 failed.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    chat_template::{format_prompt, DEFAULT_SYSTEM_PROMPT},
    error::CoreError,
    generation::{GenerationConfig, GenerationStats},
    runtime::{Runner, Runtime},
    special_tokens::default_special_tokens,
    weights::WeightShards,
};

/// One model descriptor and the weight shards that back it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub model: PathBuf,
    pub shards: WeightShards,
}

/// Immutable driver configuration, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    pub model1: ModelSpec,
    pub model2: ModelSpec,
    pub tokenizer_path: PathBuf,
    pub prompt: String,
    pub system_prompt: String,
    pub temperature: f64,
    pub seq_len: usize,
    pub apply_chat_template: bool,
    pub echo: bool,
    pub stats: bool,
}

impl DriverConfig {
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            echo: self.echo,
            seq_len: self.seq_len,
            temperature: self.temperature,
        }
    }

    pub fn formatted_prompt(&self) -> String {
        format_prompt(self.apply_chat_template, &self.system_prompt, &self.prompt)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            model1: ModelSpec {
                model: PathBuf::from("llama_3_2_1B_lora/config.json"),
                shards: WeightShards::parse("foundation.safetensors"),
            },
            model2: ModelSpec {
                model: PathBuf::from("llama_3_2_1B/config.json"),
                shards: WeightShards::parse("foundation.safetensors"),
            },
            tokenizer_path: PathBuf::from("tokenizer.model"),
            prompt: "What is the meaning of life?".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.0,
            seq_len: 128,
            apply_chat_template: false,
            echo: false,
            stats: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to load tokenizer {path}: {source}")]
    TokenizerLoad {
        path: String,
        #[source]
        source: CoreError,
    },

    #[error("Failed to generate with model {model}, error code {code:#04x}: {source}")]
    Generation {
        model: String,
        code: u32,
        #[source]
        source: CoreError,
    },
}

impl DriverError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        1
    }

    fn generation(model: &ModelSpec, source: CoreError) -> Self {
        DriverError::Generation {
            model: model.model.display().to_string(),
            code: source.code(),
            source,
        }
    }
}

/// Run both models over the same prompt, strictly one after the other.
pub fn run<R: Runtime>(runtime: &R, config: &DriverConfig) -> Result<(), DriverError> {
    info!(
        model1 = %config.model1.model.display(),
        model2 = %config.model2.model.display(),
        tokenizer = %config.tokenizer_path.display(),
        "Running dual-model generation"
    );

    let special_tokens = default_special_tokens();
    let load_tokenizer = || {
        runtime
            .load_tokenizer(&config.tokenizer_path, &special_tokens)
            .map_err(|source| DriverError::TokenizerLoad {
                path: config.tokenizer_path.display().to_string(),
                source,
            })
    };
    let tokenizer1 = load_tokenizer()?;
    let tokenizer2 = load_tokenizer()?;

    let mut runner1 = create_runner(runtime, &config.model1, tokenizer1, config.temperature)?;
    let mut runner2 = create_runner(runtime, &config.model2, tokenizer2, config.temperature)?;

    let prompt = config.formatted_prompt();
    let generation = config.generation_config();

    generate_with(runner1.as_mut(), &config.model1, &prompt, generation, config.stats)?;
    generate_with(runner2.as_mut(), &config.model2, &prompt, generation, config.stats)?;

    info!("Both generations completed");
    Ok(())
}

fn create_runner<R: Runtime>(
    runtime: &R,
    spec: &ModelSpec,
    tokenizer: R::Tokenizer,
    temperature: f64,
) -> Result<Box<dyn Runner>, DriverError> {
    runtime
        .create_runner(&spec.model, tokenizer, spec.shards.clone(), temperature)
        .map_err(|source| DriverError::generation(spec, source))
}

fn generate_with(
    runner: &mut dyn Runner,
    spec: &ModelSpec,
    prompt: &str,
    generation: GenerationConfig,
    print_stats: bool,
) -> Result<(), DriverError> {
    info!(model = %runner.model_path().display(), shards = %spec.shards.display(), "Generating with model");
    debug!(prompt = %prompt, "Formatted prompt");

    // Failures are reported once, by the caller.
    let stats = runner
        .generate(prompt, generation)
        .map_err(|source| DriverError::generation(spec, source))?;
    if print_stats {
        report_stats(runner.model_path(), &stats);
    }
    Ok(())
}

fn report_stats(model: &Path, stats: &GenerationStats) {
    eprintln!(
        "[stats] {} | load {:.2} s | {} prompt tokens | {} tokens generated | {:.1} tok/s",
        model.display(),
        stats.load_time.as_secs_f64(),
        stats.prompt_tokens,
        stats.generated_tokens,
        stats.tokens_per_second(),
    );
}
