#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod catalog;
mod command;
mod config;
mod rain;
mod remote;
mod sequence;
mod snake;
mod terminal;
mod theme;
mod transcript;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::app::UplinkApp;
use crate::config::Config;
use crate::remote::{Backend, OllamaBackend};
use crate::terminal::Terminal;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::load();
    let backend: Option<Arc<dyn Backend>> = if config.ai_enabled {
        Some(Arc::new(OllamaBackend::new(&config.ai_endpoint, Duration::from_secs(config.ai_timeout_secs))))
    } else {
        log::info!("neural uplink disabled by config");
        None
    };
    let open_on_launch = config.open_on_launch;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Uplink")
            .with_inner_size([960.0, 640.0])
            .with_min_inner_size([480.0, 360.0]),
        ..Default::default()
    };

    eframe::run_native("Uplink", native_options, Box::new(move |cc| {
        let mut term = Terminal::new(config, backend, StdRng::from_entropy());
        if open_on_launch { term.open(Instant::now()); }
        Box::new(UplinkApp::new(cc, term))
    }))
    .map_err(|e| anyhow::anyhow!("eframe: {e}"))
}
