//! # twinllm-core
//!
//! Runs one prompt through two LLaMA-family models, one after the other.
//!
//! The [`driver`] only talks to the narrow [`Runtime`] / [`Runner`] traits.
//! [`CandleRuntime`] is the concrete backend: tokenizers come from
//! `tokenizers` (HF JSON, tiktoken or llama2.c files) and models are candle
//! LLaMA graphs whose weights are mapped from one or more safetensors shards.
//!
//! ## Feature Flags
//!
//! | Flag | Effect |
//! |---|---|
//! | `cuda` | Enable CUDA GPU acceleration |
//! | `metal` | Enable Apple Metal GPU acceleration |

pub mod chat_template;
pub mod device;
pub mod driver;
pub mod error;
pub mod generation;
pub mod llama;
pub mod runtime;
pub mod special_tokens;
pub mod tokenizer;
pub mod weights;

pub use device::select_device;
pub use driver::{DriverConfig, DriverError, ModelSpec};
pub use error::{CoreError, CoreResult};
pub use generation::{GenerationConfig, GenerationStats};
pub use llama::LlamaRunner;
pub use runtime::{CandleRuntime, Runner, Runtime};
pub use tokenizer::{Tokenizer, TokenizerFormat};
pub use weights::WeightShards;
