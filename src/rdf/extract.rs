//! Extraction of RDF embedded in HTML pages.

use crate::error::ResolutionError;
use crate::rdf::graph::RdfGraph;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use oxigraph::io::RdfFormat;
use regex::Regex;
use std::sync::Arc;

pub const HTML_JSONLD: &str = "html-jsonld";

static JSONLD_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("static regex")
});

/// Turns a document that is not itself RDF syntax into a graph.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, text: &str, base: Option<&str>) -> Result<RdfGraph, ResolutionError>;
}

/// Reads every `<script type="application/ld+json">` block of an HTML page.
#[derive(Debug, Default)]
pub struct HtmlJsonLdExtractor;

impl Extractor for HtmlJsonLdExtractor {
    fn name(&self) -> &str {
        HTML_JSONLD
    }

    fn extract(&self, text: &str, base: Option<&str>) -> Result<RdfGraph, ResolutionError> {
        let blocks = JSONLD_SCRIPT
            .captures_iter(text)
            .filter_map(|captures| captures.get(1))
            .map(|block| block.as_str().trim())
            .filter(|block| !block.is_empty())
            .collect::<Vec<_>>();
        let mut graph = RdfGraph::new();
        if blocks.is_empty() {
            return Ok(graph);
        }
        let format = RdfFormat::from_media_type("application/ld+json").ok_or_else(|| {
            ResolutionError::Extraction {
                extractor: HTML_JSONLD.to_string(),
                message: "JSON-LD parsing is not available".to_string(),
            }
        })?;
        for (index, block) in blocks.into_iter().enumerate() {
            let parsed = RdfGraph::parse(block.as_bytes(), format, base).map_err(|error| {
                ResolutionError::Extraction {
                    extractor: HTML_JSONLD.to_string(),
                    message: format!("script block #{index}: {error}"),
                }
            })?;
            graph.extend_from(&parsed);
        }
        Ok(graph)
    }
}

/// Extractors keyed by lower-cased format name.
#[derive(Clone)]
pub struct ExtractorRegistry {
    extractors: IndexMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self {
            extractors: IndexMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(HtmlJsonLdExtractor));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors
            .insert(extractor.name().to_ascii_lowercase(), extractor);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.extractors.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_without_scripts_yield_empty_graphs() {
        let graph = HtmlJsonLdExtractor
            .extract("<html><body><p>nothing</p></body></html>", None)
            .unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = ExtractorRegistry::standard();
        assert!(registry.get("HTML-JSONLD").is_some());
        assert!(registry.get("html-rdfa").is_none());
    }
}
