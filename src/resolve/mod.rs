//! Input resolution
//!
//! Turns the loosely typed request fields into resolved values:
//! - **data**: a [`ResolvedGraph`] from inline text, URL, file, endpoint or a
//!   compound of those, with optional entailment
//! - **schema**: a parsed [`Schema`](crate::schema::Schema)
//! - **trigger**: the merged shape map sources and the validation trigger
//!
//! Every resolved graph is counted by a [`ResourceTracker`] from acquisition
//! until it is dropped.

pub mod data;
pub mod schema;
pub mod trigger;

pub use data::{DataParams, DataSource, DataSpec};
pub use schema::{SchemaParams, SchemaSource, SchemaSpec};
pub use trigger::{ShapeMapSources, TriggerModeSpec, TriggerSpec, ValidationTrigger};

use crate::format::FormatRegistry;
use crate::metrics::METRICS;
use crate::rdf::inference::InferenceEngine;
use crate::rdf::prefix::PrefixMap;
use crate::rdf::{ExtractorRegistry, Fetcher, RdfGraph, SparqlClient};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts graph handles from acquisition to release.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    live: Arc<AtomicUsize>,
    acquired: Arc<AtomicUsize>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles acquired and not yet released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn total_acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    fn acquire(&self) {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.acquired.fetch_add(1, Ordering::SeqCst);
        METRICS.graph_acquired();
    }

    fn release(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        METRICS.graph_released();
    }
}

/// Resolved RDF data owned by one request.
///
/// The local graph holds everything parsed, fetched or materialised so far;
/// `endpoints` lists live SPARQL endpoints that still back it. Released on
/// drop.
#[derive(Debug)]
pub struct ResolvedGraph {
    local: RdfGraph,
    endpoints: Vec<String>,
    echo: Option<String>,
    inference: InferenceEngine,
    tracker: ResourceTracker,
}

impl ResolvedGraph {
    pub(crate) fn new(
        local: RdfGraph,
        endpoints: Vec<String>,
        echo: Option<String>,
        tracker: &ResourceTracker,
    ) -> Self {
        tracker.acquire();
        tracing::debug!(
            triples = local.len(),
            endpoints = endpoints.len(),
            "acquired resolved graph"
        );
        Self {
            local,
            endpoints,
            echo,
            inference: InferenceEngine::None,
            tracker: tracker.clone(),
        }
    }

    pub fn graph(&self) -> &RdfGraph {
        &self.local
    }

    pub(crate) fn graph_mut(&mut self) -> &mut RdfGraph {
        &mut self.local
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn is_live(&self) -> bool {
        !self.endpoints.is_empty()
    }

    /// Source text for inline and file data.
    pub fn echo(&self) -> Option<&str> {
        self.echo.as_deref()
    }

    pub fn prefix_map(&self) -> &PrefixMap {
        self.local.prefix_map()
    }

    pub fn inference(&self) -> InferenceEngine {
        self.inference
    }

    /// Applies `engine` to the local graph and remembers it so material
    /// fetched later from endpoints is expanded too.
    pub(crate) fn apply_inference(&mut self, engine: InferenceEngine) -> usize {
        self.inference = engine;
        engine.apply(&mut self.local)
    }
}

impl Drop for ResolvedGraph {
    fn drop(&mut self) {
        self.tracker.release();
        tracing::debug!(live = self.tracker.live(), "released resolved graph");
    }
}

/// Shared collaborators for every resolution step.
#[derive(Clone)]
pub struct Resolver {
    pub registry: Arc<FormatRegistry>,
    pub extractors: Arc<ExtractorRegistry>,
    pub fetcher: Arc<dyn Fetcher>,
    pub sparql: Arc<dyn SparqlClient>,
    pub tracker: ResourceTracker,
}

impl Resolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, sparql: Arc<dyn SparqlClient>) -> Self {
        Self {
            registry: Arc::new(FormatRegistry::standard()),
            extractors: Arc::new(ExtractorRegistry::standard()),
            fetcher,
            sparql,
            tracker: ResourceTracker::new(),
        }
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = Arc::new(extractors);
        self
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("extractors", &self.extractors)
            .field("live_graphs", &self.tracker.live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_counts_until_drop() {
        let tracker = ResourceTracker::new();
        let first = ResolvedGraph::new(RdfGraph::new(), Vec::new(), None, &tracker);
        let second = ResolvedGraph::new(RdfGraph::new(), vec!["http://example.org/sparql".into()], None, &tracker);
        assert_eq!(tracker.live(), 2);
        assert!(second.is_live());
        drop(first);
        assert_eq!(tracker.live(), 1);
        drop(second);
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.total_acquired(), 2);
    }
}
