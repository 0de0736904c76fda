//! RDF plumbing: graphs, prefixes, remote access, extraction and entailment.

pub mod extract;
pub mod graph;
pub mod inference;
pub mod prefix;
pub mod remote;
pub mod vocab;

pub use extract::{Extractor, ExtractorRegistry, HtmlJsonLdExtractor};
pub use graph::RdfGraph;
pub use inference::InferenceEngine;
pub use prefix::PrefixMap;
pub use remote::{Fetcher, HttpClient, SparqlClient};
