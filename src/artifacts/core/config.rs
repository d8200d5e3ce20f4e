use crate::artifacts::graph::snapshot::HeadVisibility;
use crate::artifacts::watch::debounce::DEFAULT_DEBOUNCE;
use crate::artifacts::watch::renderer::RendererCommand;
use derive_new::new;
use std::time::Duration;

/// Settings for one run, in one-shot or watch mode
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct GraphConfig {
    pub head: HeadVisibility,
    /// Only used in watch mode
    pub renderer: RendererCommand,
    /// Quiet period before a re-render in watch mode
    pub debounce: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig::new(
            HeadVisibility::default(),
            RendererCommand::default(),
            DEFAULT_DEBOUNCE,
        )
    }
}
