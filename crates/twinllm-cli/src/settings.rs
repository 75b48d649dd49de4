use twinllm_core::{DriverConfig, ModelSpec, WeightShards};

use crate::config::{expand_path, AppConfig};
use crate::Cli;

/// Merge command-line flags over the loaded configuration.
///
/// Per-model shard lists (`weights1` / `weights2`) win over the shared
/// `weights` list, whichever layer they come from.
pub fn driver_config(cli: &Cli, cfg: &AppConfig) -> DriverConfig {
    let shared = cli.weights.as_deref().unwrap_or(&cfg.models.weights);
    let weights1 = cli
        .weights1
        .as_deref()
        .or(cfg.models.weights1.as_deref())
        .unwrap_or(shared);
    let weights2 = cli
        .weights2
        .as_deref()
        .or(cfg.models.weights2.as_deref())
        .unwrap_or(shared);

    DriverConfig {
        model1: ModelSpec {
            model: expand_path(cli.model1.as_deref().unwrap_or(&cfg.models.model1)),
            shards: shard_list(weights1),
        },
        model2: ModelSpec {
            model: expand_path(cli.model2.as_deref().unwrap_or(&cfg.models.model2)),
            shards: shard_list(weights2),
        },
        tokenizer_path: expand_path(cli.tokenizer_path.as_deref().unwrap_or(&cfg.tokenizer.path)),
        prompt: cli.prompt.clone().unwrap_or_else(|| cfg.generation.prompt.clone()),
        system_prompt: cli.system.clone().unwrap_or_else(|| cfg.generation.system_prompt.clone()),
        temperature: cli.temperature.unwrap_or(cfg.generation.temperature),
        seq_len: cli.seq_len.unwrap_or(cfg.generation.seq_len),
        apply_chat_template: cli.apply_chat_template.unwrap_or(cfg.generation.apply_chat_template),
        echo: cli.echo.unwrap_or(cfg.generation.echo),
        stats: cli.stats.unwrap_or(cfg.generation.stats),
    }
}

fn shard_list(spec: &str) -> WeightShards {
    let shards = WeightShards::parse(spec);
    WeightShards::new(
        shards
            .paths()
            .iter()
            .map(|p| expand_path(&p.to_string_lossy()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> DriverConfig {
        let cli = Cli::parse_from(std::iter::once("twinllm").chain(args.iter().copied()));
        driver_config(&cli, &AppConfig::default())
    }

    #[test]
    fn defaults_without_flags() {
        let cfg = parse(&[]);
        assert_eq!(cfg.model1.model, PathBuf::from("llama_3_2_1B_lora/config.json"));
        assert_eq!(cfg.model2.model, PathBuf::from("llama_3_2_1B/config.json"));
        assert_eq!(cfg.model1.shards, WeightShards::parse("foundation.safetensors"));
        assert_eq!(cfg.model2.shards, cfg.model1.shards);
        assert_eq!(cfg.tokenizer_path, PathBuf::from("tokenizer.model"));
        assert_eq!(cfg.prompt, "What is the meaning of life?");
        assert_eq!(cfg.temperature, 0.0);
        assert_eq!(cfg.seq_len, 128);
        assert!(!cfg.apply_chat_template);
        assert!(!cfg.echo);
        assert!(!cfg.stats);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = parse(&[
            "--model1", "a.json",
            "--model2", "b.json",
            "--tokenizer-path", "tokenizer.json",
            "--prompt", "hi",
            "--temperature", "0.8",
            "--seq-len", "32",
            "--apply-chat-template",
        ]);
        assert_eq!(cfg.model1.model, PathBuf::from("a.json"));
        assert_eq!(cfg.model2.model, PathBuf::from("b.json"));
        assert_eq!(cfg.tokenizer_path, PathBuf::from("tokenizer.json"));
        assert_eq!(cfg.prompt, "hi");
        assert_eq!(cfg.temperature, 0.8);
        assert_eq!(cfg.seq_len, 32);
        assert!(cfg.apply_chat_template);
    }

    #[test]
    fn shared_weights_apply_to_both_models() {
        let cfg = parse(&["--weights", "shared.safetensors"]);
        assert_eq!(cfg.model1.shards, WeightShards::parse("shared.safetensors"));
        assert_eq!(cfg.model2.shards, WeightShards::parse("shared.safetensors"));
    }

    #[test]
    fn per_model_weights_override_shared() {
        let cfg = parse(&[
            "--weights", "shared.safetensors",
            "--weights1", "foundation.safetensors,,lora.safetensors",
        ]);
        assert_eq!(
            cfg.model1.shards,
            WeightShards::new(vec![
                PathBuf::from("foundation.safetensors"),
                PathBuf::from("lora.safetensors"),
            ])
        );
        assert_eq!(cfg.model2.shards, WeightShards::parse("shared.safetensors"));
    }

    #[test]
    fn toggles_from_config_apply_when_flags_absent() {
        let cli = Cli::parse_from(["twinllm"]);
        let mut app = AppConfig::default();
        app.generation.apply_chat_template = true;
        app.generation.echo = true;
        app.generation.stats = true;
        let cfg = driver_config(&cli, &app);
        assert!(cfg.apply_chat_template);
        assert!(cfg.echo);
        assert!(cfg.stats);
    }

    #[test]
    fn flags_can_switch_off_config_toggles() {
        let cli = Cli::parse_from([
            "twinllm",
            "--apply-chat-template=false",
            "--echo=false",
            "--stats=false",
        ]);
        let mut app = AppConfig::default();
        app.generation.apply_chat_template = true;
        app.generation.echo = true;
        app.generation.stats = true;
        let cfg = driver_config(&cli, &app);
        assert!(!cfg.apply_chat_template);
        assert!(!cfg.echo);
        assert!(!cfg.stats);
    }

    #[test]
    fn bare_toggle_flags_mean_true() {
        let cfg = parse(&["--echo", "--stats"]);
        assert!(cfg.echo);
        assert!(cfg.stats);
    }

    #[test]
    fn config_file_per_model_weights_used_when_flag_absent() {
        let cli = Cli::parse_from(["twinllm"]);
        let mut app = AppConfig::default();
        app.models.weights2 = Some("x.safetensors,y.safetensors".to_string());
        let cfg = driver_config(&cli, &app);
        assert_eq!(cfg.model2.shards.len(), 2);
        assert_eq!(cfg.model1.shards.len(), 1);
    }
}
