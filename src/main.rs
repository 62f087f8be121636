mod agent;
mod app;
mod config;
mod event;
mod log;
mod plugin;
mod runtime;
mod theme;

use agent::scripted::{ReplayAgent, ScriptedAgent};
use agent::{AgentBackend, AgentClient};
use app::CatalystApp;
use config::AppConfig;
use eframe::egui;
use std::sync::{mpsc, Arc};
use tracing::info;

fn backend_for(config: &AppConfig) -> Result<Arc<dyn AgentBackend>, agent::AgentError> {
    match &config.agent_replay {
        Some(path) => Ok(Arc::new(ReplayAgent::from_path(path)?)),
        None => Ok(Arc::new(ScriptedAgent)),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    info!(
        convention = config.convention.as_str(),
        time_budget_ms = config.time_budget_ms,
        memory_limit_mb = config.memory_limit_mb,
        replay = config.agent_replay.is_some(),
        "catalyst starting"
    );

    let (tx, rx) = mpsc::channel();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("catalyst-runtime")
        .build()?;

    let backend = backend_for(&config)?;
    let agent = runtime.block_on(async { AgentClient::new(tx, backend, config.delay_scale) })?;

    let app = CatalystApp::new(rx, agent, &config);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Catalyst")
            .with_inner_size([1440.0, 900.0])
            .with_min_inner_size([1024.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Catalyst",
        native_options,
        Box::new(move |_creation_context| Ok(Box::new(app))),
    )?;

    Ok(())
}
