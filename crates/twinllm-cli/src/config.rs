use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Defaults for every driver option, loaded from TOML + env vars.
///
/// Command-line flags take precedence over anything set here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    pub tokenizer: TokenizerConfig,
    pub generation: GenerationDefaults,
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    pub model1: String,
    pub model2: String,
    /// Shared shard list used by both models unless overridden.
    pub weights: String,
    #[serde(default)]
    pub weights1: Option<String>,
    #[serde(default)]
    pub weights2: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenizerConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationDefaults {
    pub prompt: String,
    pub system_prompt: String,
    pub temperature: f64,
    pub seq_len: usize,
    pub apply_chat_template: bool,
    pub echo: bool,
    pub stats: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub prefer_gpu: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelsConfig {
                model1: "llama_3_2_1B_lora/config.json".to_string(),
                model2: "llama_3_2_1B/config.json".to_string(),
                weights: "foundation.safetensors".to_string(),
                weights1: None,
                weights2: None,
            },
            tokenizer: TokenizerConfig {
                path: "tokenizer.model".to_string(),
            },
            generation: GenerationDefaults {
                prompt: "What is the meaning of life?".to_string(),
                system_prompt: "You are a helpful assistant.".to_string(),
                temperature: 0.0,
                seq_len: 128,
                apply_chat_template: false,
                echo: false,
                stats: false,
            },
            device: DeviceConfig { prefer_gpu: false },
        }
    }
}

/// Load configuration from:
/// 1. Built-in defaults
/// 2. `config/default.toml` (if present)
/// 3. A custom config file path (if provided)
/// 4. Environment variables prefixed with `TWINLLM_`
///    (`TWINLLM_GENERATION__SEQ_LEN=256`)
pub fn load_config(config_file: Option<&PathBuf>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .set_default("models.model1", "llama_3_2_1B_lora/config.json")?
        .set_default("models.model2", "llama_3_2_1B/config.json")?
        .set_default("models.weights", "foundation.safetensors")?
        .set_default("tokenizer.path", "tokenizer.model")?
        .set_default("generation.prompt", "What is the meaning of life?")?
        .set_default("generation.system_prompt", "You are a helpful assistant.")?
        .set_default("generation.temperature", 0.0)?
        .set_default("generation.seq_len", 128_i64)?
        .set_default("generation.apply_chat_template", false)?
        .set_default("generation.echo", false)?
        .set_default("generation.stats", false)?
        .set_default("device.prefer_gpu", false)?
        .add_source(File::with_name("config/default").required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    // Double underscore separates sections because keys contain `_`.
    builder = builder.add_source(
        Environment::with_prefix("TWINLLM")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_path(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}
