use std::path::PathBuf;

use anyhow::{Context as AnyhowCtx, Result};
use serde::{Deserialize, Serialize};

use crate::remote::{Flavor, Persona};
use crate::theme::{Accent, Palette};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub palette:           Palette,
    pub accent:            Accent,
    pub ai_enabled:        bool,
    pub ai_endpoint:       String,
    pub ai_model:          String,
    pub ai_analysis_model: String,
    pub ai_timeout_secs:   u64,
    pub system_prompt:     String,
    pub opacity:           f32,
    pub open_on_launch:    bool,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            palette:           Palette::default(),
            accent:            Accent::Teal,
            ai_enabled:        true,
            ai_endpoint:       "http://localhost:11434/api/generate".into(),
            ai_model:          "qwen2.5:0.5b".into(),
            ai_analysis_model: "qwen2.5:3b".into(),
            ai_timeout_secs:   120,
            system_prompt:     "You are demondOS, a CLI-based personal operating system. \
                                You are helpful, slightly witty, and concise. \
                                Format output as raw text. Do not use markdown code blocks.".into(),
            opacity:           0.97,
            open_on_launch:    true,
        }
    }
}
impl Config {
    pub fn load() -> Self {
        let path = Self::path();
        if !path.exists() {
            let config = Self::default();
            if let Err(e) = config.save() { log::warn!("could not write default config: {e:#}"); }
            return config;
        }
        match Self::read(&path) {
            Ok(c)  => c,
            Err(e) => { log::warn!("ignoring {}: {e:#}", path.display()); Self::default() }
        }
    }

    fn read(path: &PathBuf) -> Result<Self> {
        let data = std::fs::read_to_string(path).context("read config")?;
        serde_json::from_str(&data).context("parse config")
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path();
        if let Some(dir) = path.parent() { std::fs::create_dir_all(dir).context("create config dir")?; }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))
    }

    fn path() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("uplink").join("config.json")
    }

    pub fn persona(&self, flavor: Flavor) -> Persona {
        let model = if flavor == Flavor::Analyze { &self.ai_analysis_model } else { &self.ai_model };
        Persona { model: model.clone(), system: flavor.instruction(&self.system_prompt) }
    }
}
