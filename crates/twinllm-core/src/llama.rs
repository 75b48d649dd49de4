use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaConfig, LlamaEosToks};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    chat_template::stop_token_strings,
    error::{CoreError, CoreResult},
    generation::{GenerationConfig, GenerationStats},
    runtime::Runner,
    tokenizer::{TokenStream, Tokenizer},
    weights::WeightShards,
};

/// Seed for the sampling RNG; only used when temperature > 0.
const SAMPLING_SEED: u64 = 299_792_458;

/// Fields of the model descriptor that `LlamaConfig` does not carry.
#[derive(Debug, Deserialize)]
struct DescriptorMeta {
    torch_dtype: Option<String>,
}

struct LoadedModel {
    inner: Llama,
    config: Config,
    dtype: DType,
    stop_token_ids: Vec<u32>,
}

/// Runner for LLaMA-architecture models.
///
/// The model descriptor is a Hugging Face style `config.json`; the weights
/// come from one or more safetensors shards mapped together.
pub struct LlamaRunner {
    model_path: PathBuf,
    tokenizer: Tokenizer,
    shards: WeightShards,
    temperature: f64,
    device: Device,
    loaded: Option<LoadedModel>,
}

impl std::fmt::Debug for LlamaRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaRunner")
            .field("model_path", &self.model_path)
            .field("shards", &self.shards)
            .field("temperature", &self.temperature)
            .field("loaded", &self.loaded.is_some())
            .finish()
    }
}

impl LlamaRunner {
    pub fn new(
        model_path: PathBuf,
        tokenizer: Tokenizer,
        shards: WeightShards,
        temperature: f64,
        device: Device,
    ) -> Self {
        Self { model_path, tokenizer, shards, temperature, device, loaded: None }
    }

    fn check_shards(&self) -> CoreResult<()> {
        if self.shards.is_empty() {
            return Err(CoreError::Config {
                field: "weights".to_string(),
                reason: format!("no weight shards given for {}", self.model_path.display()),
            });
        }
        if let Some(missing) = self.shards.paths().iter().find(|p| !p.exists()) {
            return Err(CoreError::Config {
                field: "weights".to_string(),
                reason: format!("weight shard {} does not exist", missing.display()),
            });
        }
        Ok(())
    }

    fn resolve_dtype(&self, meta: &DescriptorMeta) -> DType {
        // Half precision on CPU is slow and only partially supported.
        if self.device.is_cpu() {
            return DType::F32;
        }
        match meta.torch_dtype.as_deref() {
            Some("bfloat16") => DType::BF16,
            Some("float16") => DType::F16,
            _ => DType::F32,
        }
    }

    fn stop_token_ids(&self, config: &Config) -> Vec<u32> {
        let mut ids: Vec<u32> = stop_token_strings()
            .iter()
            .filter_map(|s| self.tokenizer.token_id(s))
            .collect();
        let from_config = match &config.eos_token_id {
            Some(LlamaEosToks::Single(id)) => vec![*id],
            Some(LlamaEosToks::Multiple(list)) => list.clone(),
            None => Vec::new(),
        };
        for id in from_config.into_iter().chain(self.tokenizer.eos_token_id()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Generate into `out`, streaming text as it is decoded.
    pub fn generate_to<W: Write>(
        &mut self,
        prompt: &str,
        config: GenerationConfig,
        out: &mut W,
    ) -> CoreResult<GenerationStats> {
        if prompt.is_empty() {
            return Err(CoreError::InvalidArgument("prompt must not be empty".to_string()));
        }

        let load_time = if self.is_loaded() {
            Duration::ZERO
        } else {
            let start = Instant::now();
            self.load()?;
            start.elapsed()
        };

        // Negative means "use the temperature the runner was created with".
        let temperature = if config.temperature < 0.0 { self.temperature } else { config.temperature };

        let model = self.loaded.as_mut().ok_or(CoreError::NotLoaded)?;

        // The chat template already embeds <|begin_of_text|> as literal text.
        let prompt_tokens = self.tokenizer.encode(prompt, false)?;
        if prompt_tokens.is_empty() {
            return Err(CoreError::InvalidArgument("prompt encodes to zero tokens".to_string()));
        }

        let budget = config.seq_len.min(model.config.max_position_embeddings);
        if prompt_tokens.len() >= budget {
            return Err(CoreError::SequenceTooLong { got: prompt_tokens.len(), max: budget });
        }
        debug!(prompt_tokens = prompt_tokens.len(), budget, temperature, "Starting generation");

        if config.echo {
            write!(out, "{prompt}")?;
            out.flush()?;
        }

        let mut cache = Cache::new(true, model.dtype, &model.config, &self.device)?;
        let mut sampler = LogitsProcessor::new(SAMPLING_SEED, (temperature > 0.0).then_some(temperature), None);
        let mut stream = TokenStream::new(&self.tokenizer);

        let gen_start = Instant::now();
        let mut tokens = prompt_tokens.clone();
        let mut index_pos = 0;
        let mut generated = 0;

        while tokens.len() < budget {
            // Prefill the whole prompt once, then feed one token per step.
            let context = if index_pos == 0 { &tokens[..] } else { &tokens[tokens.len() - 1..] };
            let input = Tensor::new(context, &self.device)?.unsqueeze(0)?;
            let logits = model.inner.forward(&input, index_pos, &mut cache)?;
            let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
            index_pos += context.len();

            let next = sampler.sample(&logits)?;
            tokens.push(next);
            if model.stop_token_ids.contains(&next) {
                break;
            }
            generated += 1;

            if let Some(text) = stream.next_token(next)? {
                write!(out, "{text}")?;
                out.flush()?;
            }
        }
        if let Some(rest) = stream.flush()? {
            write!(out, "{rest}")?;
        }
        writeln!(out)?;

        Ok(GenerationStats {
            load_time,
            prompt_tokens: prompt_tokens.len(),
            generated_tokens: generated,
            generation_time: gen_start.elapsed(),
        })
    }
}

impl Runner for LlamaRunner {
    fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn load(&mut self) -> CoreResult<()> {
        if self.loaded.is_some() {
            return Ok(());
        }
        self.check_shards()?;

        info!(
            model = %self.model_path.display(),
            shards = %self.shards.display(),
            "Loading LLaMA model"
        );

        let descriptor = std::fs::read_to_string(&self.model_path)?;
        let llama_config: LlamaConfig = serde_json::from_str(&descriptor)?;
        let meta: DescriptorMeta = serde_json::from_str(&descriptor)?;
        let dtype = self.resolve_dtype(&meta);
        let config = llama_config.into_config(false);
        debug!(?dtype, layers = config.num_hidden_layers, "Resolved LLaMA config");

        // Later shards shadow tensors of the same name in earlier ones.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(self.shards.paths(), dtype, &self.device)? };
        let inner = Llama::load(vb, &config)?;
        let stop_token_ids = self.stop_token_ids(&config);

        info!(
            model = %self.model_path.display(),
            max_context = config.max_position_embeddings,
            "Model loaded"
        );
        self.loaded = Some(LoadedModel { inner, config, dtype, stop_token_ids });
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    fn generate(&mut self, prompt: &str, config: GenerationConfig) -> CoreResult<GenerationStats> {
        let mut stdout = std::io::stdout().lock();
        self.generate_to(prompt, config, &mut stdout)
    }
}
