//! Application State - Single Source of Truth (SSOT)
//!
//! The dataset and control registry are built once and shared read-only.
//! The last successful render is kept so a rejected snapshot can fall back to it.

use crate::config::Config;
use crate::controls::{ControlRegistry, ControlSnapshot, SnapshotError};
use crate::dataset::Dataset;
use crate::pipeline::{self, Render};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dataset: Arc<Dataset>,
    pub registry: Arc<ControlRegistry>,
    pub last_valid: Arc<RwLock<Option<Render>>>,
}

impl AppState {
    pub fn new(config: Config, dataset: Dataset) -> Self {
        let registry = ControlRegistry::from_dataset(&dataset, &config);
        Self {
            config: Arc::new(config),
            dataset: Arc::new(dataset),
            registry: Arc::new(registry),
            last_valid: Arc::new(RwLock::new(None)),
        }
    }

    /// Render a snapshot; on success it becomes the last valid render
    pub async fn render(&self, snapshot: &ControlSnapshot) -> Result<Render, SnapshotError> {
        let render = pipeline::render(&self.dataset, snapshot)?;
        {
            let mut last = self.last_valid.write().await;
            *last = Some(render.clone());
        }
        tracing::debug!("Render stored as last valid ({} warnings)", render.warnings.len());
        Ok(render)
    }

    pub async fn last_valid(&self) -> Option<Render> {
        self.last_valid.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{fixture, test_config};

    #[tokio::test]
    async fn test_failed_render_keeps_last_valid() {
        let state = AppState::new(test_config(), fixture());
        assert!(state.last_valid().await.is_none());

        let good = state.render(&state.registry.default_snapshot()).await.unwrap();
        let bad = ControlSnapshot { year: 1900, ..state.registry.default_snapshot() };
        assert!(state.render(&bad).await.is_err());

        assert_eq!(state.last_valid().await, Some(good));
    }
}
