//! Fixed special-token vocabulary for LLaMA-3 family tokenizers.
//!
//! The first eleven entries are the named control tokens; the remainder of the
//! table is filled with `<|reserved_special_token_N|>` placeholders so that the
//! special-token block always occupies [`SPECIAL_TOKENS_SIZE`] ids.

/// Total number of special-token slots.
pub const SPECIAL_TOKENS_SIZE: usize = 256;

/// Named control tokens, in id order.
pub const BASE_SPECIAL_TOKENS: &[&str] = &[
    "<|begin_of_text|>",
    "<|end_of_text|>",
    "<|reserved_special_token_0|>",
    "<|reserved_special_token_1|>",
    "<|finetune_right_pad_id|>",
    "<|step_id|>",
    "<|start_header_id|>",
    "<|end_header_id|>",
    "<|eom_id|>",
    "<|eot_id|>",
    "<|python_tag|>",
];

// Reserved names 0 and 1 already appear in the named block.
const FIRST_PADDING_INDEX: usize = 2;

/// Build the default special-token table, padded to [`SPECIAL_TOKENS_SIZE`].
pub fn default_special_tokens() -> Vec<String> {
    let mut tokens: Vec<String> = BASE_SPECIAL_TOKENS.iter().map(|t| t.to_string()).collect();
    let padding = SPECIAL_TOKENS_SIZE.saturating_sub(tokens.len());
    tokens.extend(
        (FIRST_PADDING_INDEX..FIRST_PADDING_INDEX + padding)
            .map(|n| format!("<|reserved_special_token_{n}|>")),
    );
    tokens
}
