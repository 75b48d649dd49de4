use std::time::Duration;

/// Per-call parameters for a single `Runner::generate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    /// Print the prompt before the generated text.
    pub echo: bool,
    /// Total token budget (prompt + generated), capped by the model's
    /// maximum context length.
    pub seq_len: usize,
    /// Sampling temperature; `0.0` selects greedy argmax decoding and a
    /// negative value falls back to the runner's own temperature.
    pub temperature: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { echo: false, seq_len: 128, temperature: 0.0 }
    }
}

/// Timing and token counts for one completed generation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationStats {
    /// Time spent mapping weights, zero when the runner was already loaded.
    pub load_time: Duration,
    pub prompt_tokens: usize,
    pub generated_tokens: usize,
    pub generation_time: Duration,
}

impl GenerationStats {
    pub fn tokens_per_second(&self) -> f64 {
        let secs = self.generation_time.as_secs_f64();
        if secs > 0.0 {
            self.generated_tokens as f64 / secs
        } else {
            0.0
        }
    }
}
