//! Demo configuration loaded from TOML or JSON.

use std::{fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use model::{GenerationOptions, ModelConfig};

/// Top-level configuration for the demo binary.
#[derive(Debug, Deserialize)]
pub struct DemoConfig {
    pub model: ModelSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub mode: DemoMode,
    /// Source-side token ids, encoded once when running in seq2seq mode.
    #[serde(default)]
    pub source_ids: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DemoMode {
    LanguageModel,
    Seq2Seq,
}

impl Default for DemoMode {
    fn default() -> Self {
        Self::LanguageModel
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelSection {
    pub vocab_size: usize,
    pub max_seq_len: usize,
    pub hidden_dim: usize,
    pub head_dim: usize,
    pub n_heads: usize,
    pub n_layers: usize,
    #[serde(default)]
    pub dropout_p: f32,
}

#[derive(Debug, Deserialize)]
pub struct GenerationSection {
    #[serde(default = "default_start_id")]
    pub start_id: u32,
    #[serde(default = "default_end_id")]
    pub end_id: u32,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            start_id: default_start_id(),
            end_id: default_end_id(),
            max_steps: default_max_steps(),
        }
    }
}

fn default_start_id() -> u32 {
    1
}

fn default_end_id() -> u32 {
    2
}

fn default_max_steps() -> usize {
    32
}

impl DemoConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: DemoConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | Some("tml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(anyhow!("unsupported configuration extension '{other}'"));
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let vocab = self.model.vocab_size as u32;

        if self.generation.start_id >= vocab {
            errors.push(format!(
                "generation.start_id {} is outside the vocabulary (size {})",
                self.generation.start_id, self.model.vocab_size
            ));
        }
        if self.generation.end_id >= vocab {
            errors.push(format!(
                "generation.end_id {} is outside the vocabulary (size {})",
                self.generation.end_id, self.model.vocab_size
            ));
        }
        if self.mode == DemoMode::Seq2Seq {
            if self.source_ids.is_empty() {
                errors.push("seq2seq mode requires a non-empty source_ids list".to_string());
            }
            if self.source_ids.len() > self.model.max_seq_len {
                errors.push(format!(
                    "source_ids length {} exceeds max_seq_len {}",
                    self.source_ids.len(),
                    self.model.max_seq_len
                ));
            }
            if let Some(bad) = self.source_ids.iter().find(|id| **id >= vocab) {
                errors.push(format!(
                    "source id {bad} is outside the vocabulary (size {})",
                    self.model.vocab_size
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!("invalid configuration: {}", errors.join("; "));
        }
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            vocab_size: self.model.vocab_size,
            max_seq_len: self.model.max_seq_len,
            hidden_dim: self.model.hidden_dim,
            head_dim: self.model.head_dim,
            n_heads: self.model.n_heads,
            n_layers: self.model.n_layers,
            dropout_p: self.model.dropout_p,
        }
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            start_id: self.generation.start_id,
            end_id: self.generation.end_id,
            max_steps: self.generation.max_steps,
        }
    }
}
