//! Lazy tool loading — discovery deferred until a query needs tools.
//!
//! Informational queries never pay the discovery cost, and concurrent runs
//! share one immutable registry: discovery runs at most once, guarded by a
//! `OnceCell`, and the result is handed out behind an `Arc`. After that
//! point the registry is never mutated.

use irontask_core::tool::{ToolRegistry, ToolSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

/// A tool registry that materializes on first use.
pub struct LazyToolset {
    sources: Vec<Box<dyn ToolSource>>,
    tool_timeout: Duration,
    registry: OnceCell<Arc<ToolRegistry>>,
}

impl LazyToolset {
    /// Defer discovery of the given sources until first use.
    pub fn new(sources: Vec<Box<dyn ToolSource>>, tool_timeout: Duration) -> Self {
        Self {
            sources,
            tool_timeout,
            registry: OnceCell::new(),
        }
    }

    /// Wrap an already-built registry (eager mode, tests).
    pub fn preloaded(registry: ToolRegistry) -> Self {
        Self {
            sources: Vec::new(),
            tool_timeout: Duration::from_secs(60),
            registry: OnceCell::new_with(Some(Arc::new(registry))),
        }
    }

    /// Get the registry, running discovery exactly once across all callers.
    pub async fn get_or_discover(&self) -> Arc<ToolRegistry> {
        self.registry
            .get_or_init(|| async {
                let mut registry = ToolRegistry::new().with_tool_timeout(self.tool_timeout);
                let count = registry.discover(&self.sources);
                info!(count, sources = self.sources.len(), "Tool discovery completed");
                Arc::new(registry)
            })
            .await
            .clone()
    }

    /// Whether discovery has already run.
    pub fn is_loaded(&self) -> bool {
        self.registry.initialized()
    }
}
