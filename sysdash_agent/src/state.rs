//! Shared agent state: provider handle, action dispatcher and settings.
//! Nothing here caches telemetry; every request samples afresh.

use crate::actions::{CommandRunner, HostActionDispatcher};
use crate::config::AgentConfig;
use crate::provider::TelemetryProvider;
use std::sync::Arc;
use std::time::Duration;

pub type SharedProvider = Arc<dyn TelemetryProvider>;

#[derive(Clone)]
pub struct AppState {
    pub provider: SharedProvider,
    pub actions: Arc<HostActionDispatcher>,
    pub default_limit: usize,
    pub cpu_interval: Duration,
}

impl AppState {
    pub fn new(
        provider: SharedProvider,
        runner: Arc<dyn CommandRunner>,
        cfg: &AgentConfig,
    ) -> Self {
        let actions = HostActionDispatcher::new(provider.clone(), runner, cfg.actions.clone());
        Self {
            provider,
            actions: Arc::new(actions),
            default_limit: cfg.process_limit,
            cpu_interval: cfg.cpu_interval,
        }
    }

    pub fn with_actions(mut self, actions: HostActionDispatcher) -> Self {
        self.actions = Arc::new(actions);
        self
    }
}
