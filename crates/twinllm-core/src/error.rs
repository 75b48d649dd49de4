use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model config error: {field} — {reason}")]
    Config { field: String, reason: String },

    #[error("Failed to load {path} as a {tried} tokenizer")]
    UnsupportedTokenizer { path: String, tried: String },

    #[error("Sequence too long: {got} tokens, max {max}")]
    SequenceTooLong { got: usize, max: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Runner used before its model was loaded")]
    NotLoaded,
}

impl CoreError {
    /// Stable numeric code reported alongside a failed generation.
    ///
    /// Grouped by category: `0x0_` internal state, `0x1_` caller input,
    /// `0x2_` artifacts on disk, `0x3_` backend execution.
    pub fn code(&self) -> u32 {
        match self {
            CoreError::NotLoaded => 0x02,
            CoreError::InvalidArgument(_) => 0x12,
            CoreError::SequenceTooLong { .. } => 0x13,
            CoreError::Io(_) => 0x20,
            CoreError::Json(_) => 0x21,
            CoreError::Config { .. } => 0x22,
            CoreError::UnsupportedTokenizer { .. } => 0x23,
            CoreError::Tokenizer(_) => 0x24,
            CoreError::Candle(_) => 0x30,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            CoreError::NotLoaded,
            CoreError::InvalidArgument("x".into()),
            CoreError::SequenceTooLong { got: 2, max: 1 },
            CoreError::Io(std::io::Error::other("x")),
            CoreError::Config { field: "f".into(), reason: "r".into() },
            CoreError::UnsupportedTokenizer { path: "p".into(), tried: "t".into() },
            CoreError::Tokenizer("x".into()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(CoreError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn unsupported_tokenizer_message_names_path() {
        let err = CoreError::UnsupportedTokenizer {
            path: "tok.bin".into(),
            tried: "HuggingFace, Tiktoken or Llama2.c".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("tok.bin"));
        assert!(msg.contains("Tiktoken"));
    }
}
