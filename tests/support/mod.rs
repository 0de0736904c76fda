#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use oxigraph::io::RdfFormat;
use rdfshape_mcp::config::{DEFAULT_BASE_IRI, ServerConfig};
use rdfshape_mcp::convert::{SchemaTranslator, StructuralTranslator};
use rdfshape_mcp::error::{ConversionError, EngineFailure, NetworkError, ResolutionError};
use rdfshape_mcp::rdf::{Fetcher, RdfGraph, SparqlClient};
use rdfshape_mcp::resolve::{Resolver, ValidationTrigger};
use rdfshape_mcp::schema::{Schema, ShaclSchema, ShexSchema, ValidationResult};
use rdfshape_mcp::shapemap::QueryShapeMap;
use rdfshape_mcp::state::AppState;
use rdfshape_mcp::validation::{ValidationEngine, ValidationService};

pub const PERSON_TURTLE: &str = "@prefix ex: <http://example.org/> .
ex:alice a ex:Person ; ex:name \"Alice\" ; ex:knows ex:bob .
ex:bob a ex:Person ; ex:name \"Bob\" .
";

pub const PERSON_SHEX: &str = "PREFIX ex: <http://example.org/>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
ex:Person { ex:name xsd:string ; ex:knows @ex:Person * }
";

pub const PERSON_SHACL: &str = "@prefix ex: <http://example.org/> .
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
ex:PersonShape a sh:NodeShape ;
  sh:targetClass ex:Person ;
  sh:property [ sh:path ex:name ; sh:datatype xsd:string ; sh:minCount 1 ; sh:maxCount 1 ] .
";

/// Serves canned documents by URL; anything else fails like an unreachable host.
#[derive(Default)]
pub struct MapFetcher {
    documents: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.documents.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| NetworkError::Request {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
    }
}

/// Never answers.
pub struct HangingFetcher;

#[async_trait]
impl Fetcher for HangingFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, NetworkError> {
        std::future::pending().await
    }
}

/// Answers every CONSTRUCT with the same graph.
pub struct FixedSparql {
    graph: RdfGraph,
    queries: AtomicUsize,
}

impl FixedSparql {
    pub fn new(turtle: &str) -> Self {
        Self {
            graph: turtle_graph(turtle),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self {
            graph: RdfGraph::new(),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SparqlClient for FixedSparql {
    async fn construct(&self, _endpoint: &str, _query: &str) -> Result<RdfGraph, ResolutionError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.graph.clone())
    }
}

/// Counts calls before delegating to the structural translator.
#[derive(Default)]
pub struct SpyTranslator {
    calls: AtomicUsize,
}

impl SpyTranslator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SchemaTranslator for SpyTranslator {
    fn shacl_to_shex(&self, schema: &ShaclSchema) -> Result<(ShexSchema, QueryShapeMap), ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StructuralTranslator.shacl_to_shex(schema)
    }
}

/// An engine that blows up after doing a little work.
pub struct PanickingEngine;

impl ValidationEngine for PanickingEngine {
    fn validate(
        &self,
        _schema: &Schema,
        _graph: &RdfGraph,
        _trigger: &ValidationTrigger,
    ) -> Result<ValidationResult, EngineFailure> {
        std::thread::sleep(std::time::Duration::from_millis(1));
        panic!("engine exploded");
    }
}

pub fn turtle_graph(turtle: &str) -> RdfGraph {
    RdfGraph::parse(turtle.as_bytes(), RdfFormat::Turtle, Some(DEFAULT_BASE_IRI)).expect("turtle")
}

pub fn resolver(fetcher: MapFetcher) -> Resolver {
    Resolver::new(Arc::new(fetcher), Arc::new(FixedSparql::empty()))
}

pub fn offline_resolver() -> Resolver {
    resolver(MapFetcher::new())
}

pub fn validation_service(resolver: Resolver) -> ValidationService {
    ValidationService::new(resolver).with_default_base(DEFAULT_BASE_IRI)
}

/// Application state with network access replaced by `fetcher`.
pub fn app_state(config: ServerConfig, fetcher: MapFetcher) -> Arc<AppState> {
    Arc::new(AppState::with_resolver(Arc::new(config), resolver(fetcher)))
}
