//! BotState construction shared by the `chat` and `run` commands.

use std::sync::Arc;

use anyhow::Context;

use cb_domain::config::{Config, ConfigSeverity};
use cb_history::{HistoryPolicies, InMemoryUserStore};
use cb_providers::BackendRegistry;

use crate::gate::MessageGate;
use crate::service::ChatService;
use crate::state::BotState;

/// Validate config, build the back ends from it, and wire the store,
/// orchestrator, and gate together.
pub fn build_state(config: Arc<Config>) -> anyhow::Result<BotState> {
    let backends = BackendRegistry::from_config(&config);
    build_state_with(config, backends)
}

/// Same as [`build_state`] with caller-supplied back ends.
pub fn build_state_with(config: Arc<Config>, backends: BackendRegistry) -> anyhow::Result<BotState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    // ── History store ────────────────────────────────────────────────
    let policies = HistoryPolicies::from_config(&config.history);
    let store = Arc::new(InMemoryUserStore::new(policies));
    tracing::debug!(
        default_platform = %config.history.default_platform,
        max_context_tokens = config.history.max_context_tokens,
        "history store ready"
    );

    // ── Gate + orchestrator ──────────────────────────────────────────
    let gate = MessageGate::from_config(&config.bot).context("building message gate")?;
    let service = ChatService::new(store, backends, config.bot.temperature);

    Ok(BotState {
        config,
        service: Arc::new(service),
        gate: Arc::new(gate),
    })
}
