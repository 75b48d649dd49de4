use std::path::Path;

use candle_core::Device;
use tracing::debug;

use crate::{
    device::device_name,
    error::CoreResult,
    generation::{GenerationConfig, GenerationStats},
    llama::LlamaRunner,
    tokenizer::Tokenizer,
    weights::WeightShards,
};

/// A text-generation runner bound to one model and one tokenizer.
///
/// Runners are constructed cheaply; weights are mapped on [`Runner::load`],
/// which `generate` calls on first use.
pub trait Runner {
    /// The model descriptor this runner was created for.
    fn model_path(&self) -> &Path;

    fn load(&mut self) -> CoreResult<()>;

    fn is_loaded(&self) -> bool;

    /// Generate a completion for `prompt`, streaming text to stdout.
    fn generate(&mut self, prompt: &str, config: GenerationConfig) -> CoreResult<GenerationStats>;
}

/// Everything the driver needs from an inference backend.
///
/// `create_runner` takes the tokenizer by value: each runner owns exactly one
/// tokenizer and tokenizers are never shared between runners.
pub trait Runtime {
    type Tokenizer;

    fn load_tokenizer(&self, descriptor: &Path, special_tokens: &[String]) -> CoreResult<Self::Tokenizer>;

    fn create_runner(
        &self,
        model: &Path,
        tokenizer: Self::Tokenizer,
        shards: WeightShards,
        temperature: f64,
    ) -> CoreResult<Box<dyn Runner>>;
}

/// Runtime backed by candle LLaMA models and `tokenizers`.
#[derive(Debug, Clone)]
pub struct CandleRuntime {
    device: Device,
}

impl CandleRuntime {
    pub fn new(device: Device) -> Self {
        Self { device }
    }
}

impl Runtime for CandleRuntime {
    type Tokenizer = Tokenizer;

    fn load_tokenizer(&self, descriptor: &Path, special_tokens: &[String]) -> CoreResult<Tokenizer> {
        Tokenizer::load(descriptor, special_tokens)
    }

    fn create_runner(
        &self,
        model: &Path,
        tokenizer: Tokenizer,
        shards: WeightShards,
        temperature: f64,
    ) -> CoreResult<Box<dyn Runner>> {
        debug!(
            model = %model.display(),
            shards = %shards.display(),
            device = device_name(&self.device),
            "Creating LLaMA runner"
        );
        Ok(Box::new(LlamaRunner::new(
            model.to_path_buf(),
            tokenizer,
            shards,
            temperature,
            self.device.clone(),
        )))
    }
}
