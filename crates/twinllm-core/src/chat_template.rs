//! Chat prompt formatting for the LLaMA-3 instruct family.
//!
//! ```text
//! <|begin_of_text|><|start_header_id|>system<|end_header_id|>\n{system}<|eot_id|>
//! <|start_header_id|>user<|end_header_id|>\n{prompt}<|eot_id|>
//! <|start_header_id|>assistant<|end_header_id|>
//! ```
//! (shown wrapped; the real template has no newlines between turns)

/// System prompt used when the caller does not provide one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Format the prompt that is handed to both runners.
///
/// With `apply_template == false` the raw prompt is returned byte-for-byte.
pub fn format_prompt(apply_template: bool, system: &str, prompt: &str) -> String {
    if apply_template {
        build_llama3(system, prompt)
    } else {
        prompt.to_string()
    }
}

/// End-of-turn markers that should terminate generation for this family.
///
/// The caller resolves each string with `Tokenizer::token_id` and keeps the
/// ids that exist in its vocabulary.
pub fn stop_token_strings() -> &'static [&'static str] {
    &["<|eot_id|>", "<|end_of_text|>", "<|eom_id|>"]
}

// The assistant header is left open (no trailing newline) so the model
// continues directly into its reply.
fn build_llama3(system: &str, prompt: &str) -> String {
    let mut s = String::from("<|begin_of_text|>");
    s.push_str(&format!(
        "<|start_header_id|>system<|end_header_id|>\n{system}<|eot_id|>"
    ));
    s.push_str(&format!(
        "<|start_header_id|>user<|end_header_id|>\n\
         {prompt}<|eot_id|>\
         <|start_header_id|>assistant<|end_header_id|>"
    ));
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_off_is_identity() {
        let raw = "What is the meaning of life?\n  trailing spaces  ";
        assert_eq!(format_prompt(false, DEFAULT_SYSTEM_PROMPT, raw), raw);
    }

    #[test]
    fn template_off_adds_no_special_tokens() {
        let out = format_prompt(false, DEFAULT_SYSTEM_PROMPT, "hello");
        assert!(!out.contains("<|"));
    }

    #[test]
    fn template_on_matches_llama3_layout() {
        let out = format_prompt(true, DEFAULT_SYSTEM_PROMPT, "hello");
        assert_eq!(
            out,
            "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\
             You are a helpful assistant.<|eot_id|>\
             <|start_header_id|>user<|end_header_id|>\nhello<|eot_id|>\
             <|start_header_id|>assistant<|end_header_id|>"
        );
    }

    #[test]
    fn template_on_orders_system_prompt_then_assistant() {
        let prompt = "Why is the sky blue?";
        let out = format_prompt(true, "Be brief.", prompt);
        let system = out.find("system<|end_header_id|>").unwrap();
        let user = out.find(prompt).unwrap();
        let assistant = out.find("assistant<|end_header_id|>").unwrap();
        assert!(system < user && user < assistant);
        assert!(out.contains("Be brief.<|eot_id|>"));
    }

    #[test]
    fn prompt_text_is_not_modified() {
        let prompt = "  <odd> spacing\n";
        let out = format_prompt(true, DEFAULT_SYSTEM_PROMPT, prompt);
        assert!(out.contains(&format!("<|end_header_id|>\n{prompt}<|eot_id|>")));
    }

    #[test]
    fn stop_tokens_are_special_tokens() {
        let special = crate::special_tokens::default_special_tokens();
        for tok in stop_token_strings() {
            assert!(special.iter().any(|s| s == tok), "{tok} missing from vocabulary");
        }
    }
}
