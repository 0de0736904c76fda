//! RDF data sources and their resolution into a [`ResolvedGraph`].

use super::{ResolvedGraph, Resolver};
use crate::error::ResolutionError;
use crate::format::{Syntax, non_blank};
use crate::logging::resolution_span;
use crate::rdf::graph::RdfGraph;
use crate::shapemap::NodeSelector;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use indexmap::IndexSet;
use oxigraph::model::Term;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::Instrument;

/// Upper bound on nodes whose neighbourhood is pulled from an endpoint.
pub const MAX_MATERIALIZED_NODES: usize = 10_000;

/// Where the data comes from. Decided once, at the request boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Inline { text: String, format: Option<String> },
    Url { url: String, format: Option<String> },
    File { bytes: Vec<u8>, format: Option<String> },
    Endpoint { url: String },
    Compound(Vec<DataSource>),
    Empty,
}

impl DataSource {
    pub fn kind(&self) -> &'static str {
        match self {
            DataSource::Inline { .. } => "inline",
            DataSource::Url { .. } => "url",
            DataSource::File { .. } => "file",
            DataSource::Endpoint { .. } => "endpoint",
            DataSource::Compound(_) => "compound",
            DataSource::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSpec {
    pub source: DataSource,
    pub inference: Option<String>,
    pub target_format: Option<String>,
}

impl DataSpec {
    pub fn inline(text: impl Into<String>, format: Option<&str>) -> Self {
        Self::from_source(DataSource::Inline {
            text: text.into(),
            format: format.map(str::to_string),
        })
    }

    pub fn from_source(source: DataSource) -> Self {
        Self {
            source,
            inference: None,
            target_format: None,
        }
    }

    pub fn with_inference(mut self, inference: impl Into<String>) -> Self {
        self.inference = Some(inference.into());
        self
    }

    /// Chooses the active source: the explicit selector when present,
    /// otherwise Compound > Url > File > Endpoint > Inline > Empty.
    pub fn from_params(params: &DataParams) -> Result<Self, ResolutionError> {
        Ok(Self {
            source: params.source()?,
            inference: non_blank(params.inference.as_deref()).map(str::to_string),
            target_format: non_blank(params.target_data_format.as_deref()).map(str::to_string),
        })
    }
}

/// Data fields of a request, as a client sends them.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataParams {
    /// RDF data as text
    #[serde(default)]
    pub data: Option<String>,
    /// URL to fetch the data from
    #[serde(default)]
    pub data_url: Option<String>,
    /// Contents of an uploaded data file
    #[serde(default)]
    pub data_file: Option<String>,
    /// SPARQL endpoint backing the data
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Several data sources merged into one graph
    #[serde(default)]
    pub compound_data: Option<Vec<DataParams>>,
    /// Data syntax (default Turtle)
    #[serde(default)]
    pub data_format: Option<String>,
    /// Which source to use: byText, byUrl, byFile, byEndpoint or byCompound
    #[serde(default)]
    pub active_data_source: Option<String>,
    /// Entailment regime: None, RDFS or OWL
    #[serde(default)]
    pub inference: Option<String>,
    /// Output syntax for data conversion
    #[serde(default)]
    pub target_data_format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    Inline,
    Url,
    File,
    Endpoint,
    Compound,
}

impl Selector {
    fn parse(name: &str) -> Result<Self, ResolutionError> {
        let normalized = name.trim().to_ascii_lowercase();
        let normalized = normalized.strip_prefix("by").unwrap_or(&normalized);
        match normalized.trim_start_matches(['-', '_']) {
            "text" | "inline" | "data" => Ok(Selector::Inline),
            "url" | "uri" => Ok(Selector::Url),
            "file" => Ok(Selector::File),
            "endpoint" | "sparql" => Ok(Selector::Endpoint),
            "compound" => Ok(Selector::Compound),
            _ => Err(ResolutionError::UnknownSelector {
                kind: "data",
                name: name.to_string(),
            }),
        }
    }
}

impl DataParams {
    fn source(&self) -> Result<DataSource, ResolutionError> {
        let format = non_blank(self.data_format.as_deref()).map(str::to_string);
        let text = non_blank(self.data.as_deref());
        let url = non_blank(self.data_url.as_deref());
        let file = self.data_file.as_deref().filter(|file| !file.is_empty());
        let endpoint = non_blank(self.endpoint.as_deref());
        let compound = self.compound_data.as_ref().filter(|children| !children.is_empty());

        let inline = |text: &str| DataSource::Inline {
            text: text.to_string(),
            format: format.clone(),
        };
        let by_url = |url: &str| DataSource::Url {
            url: url.to_string(),
            format: format.clone(),
        };
        let by_file = |file: &str| DataSource::File {
            bytes: file.as_bytes().to_vec(),
            format: format.clone(),
        };
        let by_endpoint = |url: &str| DataSource::Endpoint {
            url: url.to_string(),
        };
        let by_compound = |children: &Vec<DataParams>| -> Result<DataSource, ResolutionError> {
            children
                .iter()
                .map(DataParams::source)
                .collect::<Result<Vec<_>, _>>()
                .map(DataSource::Compound)
        };

        if let Some(selector) = non_blank(self.active_data_source.as_deref()) {
            let missing = |field: &str| ResolutionError::MissingSource(format!("data {field}"));
            return match Selector::parse(selector)? {
                Selector::Inline => text.map(inline).ok_or_else(|| missing("text")),
                Selector::Url => url.map(by_url).ok_or_else(|| missing("URL")),
                Selector::File => file.map(by_file).ok_or_else(|| missing("file")),
                Selector::Endpoint => endpoint.map(by_endpoint).ok_or_else(|| missing("endpoint")),
                Selector::Compound => compound.ok_or_else(|| missing("compound"))
                    .and_then(by_compound),
            };
        }

        if let Some(children) = compound {
            return by_compound(children);
        }
        Ok(url
            .map(by_url)
            .or_else(|| file.map(by_file))
            .or_else(|| endpoint.map(by_endpoint))
            .or_else(|| text.map(inline))
            .unwrap_or(DataSource::Empty))
    }
}

struct Loaded {
    graph: RdfGraph,
    endpoints: Vec<String>,
    echo: Option<String>,
}

/// Resolves `spec` into an owned graph handle.
///
/// The entailment regime is checked before anything is fetched. Relative
/// IRIs in every source resolve against `base`.
pub async fn resolve_data(
    resolver: &Resolver,
    spec: &DataSpec,
    base: Option<&str>,
) -> Result<ResolvedGraph, ResolutionError> {
    let inference = resolver.registry.inference_engine(spec.inference.as_deref())?;
    let loaded = load(resolver, &spec.source, base)
        .instrument(resolution_span("data", spec.source.kind()))
        .await?;
    let mut resolved = ResolvedGraph::new(loaded.graph, loaded.endpoints, loaded.echo, &resolver.tracker);
    let added = resolved.apply_inference(inference);
    if added > 0 {
        tracing::debug!(%inference, added, "applied inference to resolved data");
    }
    Ok(resolved)
}

fn load<'a>(
    resolver: &'a Resolver,
    source: &'a DataSource,
    base: Option<&'a str>,
) -> BoxFuture<'a, Result<Loaded, ResolutionError>> {
    async move {
        match source {
            DataSource::Inline { text, format } => Ok(Loaded {
                graph: parse_bytes(resolver, text.as_bytes(), format.as_deref(), base)?,
                endpoints: Vec::new(),
                echo: Some(text.clone()),
            }),
            DataSource::File { bytes, format } => Ok(Loaded {
                graph: parse_bytes(resolver, bytes, format.as_deref(), base)?,
                endpoints: Vec::new(),
                echo: Some(String::from_utf8_lossy(bytes).into_owned()),
            }),
            DataSource::Url { url, format } => {
                resolver.registry.data_format(format.as_deref())?;
                let bytes = resolver.fetcher.fetch(url).await?;
                Ok(Loaded {
                    graph: parse_bytes(resolver, &bytes, format.as_deref(), base)?,
                    endpoints: Vec::new(),
                    echo: None,
                })
            }
            DataSource::Endpoint { url } => {
                url::Url::parse(url).map_err(|error| ResolutionError::invalid_iri(url.as_str(), error))?;
                Ok(Loaded {
                    graph: RdfGraph::new(),
                    endpoints: vec![url.clone()],
                    echo: None,
                })
            }
            DataSource::Compound(children) => {
                let parts = try_join_all(children.iter().enumerate().map(|(index, child)| {
                    load(resolver, child, base).map(move |loaded| {
                        loaded.map_err(|error| ResolutionError::Compound {
                            index,
                            source: Box::new(error),
                        })
                    })
                }))
                .await?;
                let mut merged = Loaded {
                    graph: RdfGraph::new(),
                    endpoints: Vec::new(),
                    echo: None,
                };
                for part in parts {
                    merged.graph.prefix_map_mut().merge(part.graph.prefix_map());
                    merged.graph.extend_from(&part.graph);
                    for endpoint in part.endpoints {
                        if !merged.endpoints.contains(&endpoint) {
                            merged.endpoints.push(endpoint);
                        }
                    }
                }
                Ok(merged)
            }
            DataSource::Empty => Ok(Loaded {
                graph: RdfGraph::new(),
                endpoints: Vec::new(),
                echo: None,
            }),
        }
    }
    .boxed()
}

fn parse_bytes(
    resolver: &Resolver,
    bytes: &[u8],
    format: Option<&str>,
    base: Option<&str>,
) -> Result<RdfGraph, ResolutionError> {
    let data_format = resolver.registry.data_format(format)?;
    match data_format.syntax {
        Syntax::Rdf(rdf) => RdfGraph::parse(bytes, rdf, base),
        Syntax::Extractor => {
            let extractor = resolver.extractors.get(data_format.name).ok_or_else(|| {
                ResolutionError::UnknownFormat {
                    kind: "extractor",
                    name: data_format.name.to_string(),
                }
            })?;
            let text = std::str::from_utf8(bytes).map_err(|error| ResolutionError::Extraction {
                extractor: data_format.name.to_string(),
                message: error.to_string(),
            })?;
            extractor.extract(text, base)
        }
    }
}

/// Runs `query` against every endpoint behind `resolved` and adds the
/// constructed triples to its local graph. Returns the number of new triples.
pub async fn construct_into(
    resolver: &Resolver,
    resolved: &mut ResolvedGraph,
    query: &str,
) -> Result<usize, ResolutionError> {
    let graphs = try_join_all(
        resolved
            .endpoints()
            .iter()
            .map(|endpoint| resolver.sparql.construct(endpoint, query)),
    )
    .await?;
    let before = resolved.graph().len();
    for graph in graphs {
        resolved.graph_mut().extend_from(&graph);
    }
    Ok(resolved.graph().len() - before)
}

/// Pulls the neighbourhood of `seeds` from the endpoints into the local
/// graph, following IRI neighbours up to `depth` hops.
pub async fn materialize(
    resolver: &Resolver,
    resolved: &mut ResolvedGraph,
    seeds: impl IntoIterator<Item = Term>,
    depth: usize,
) -> Result<usize, ResolutionError> {
    if !resolved.is_live() {
        return Ok(0);
    }
    let before = resolved.graph().len();
    let mut visited = IndexSet::new();
    let mut frontier = seeds
        .into_iter()
        .filter(|node| matches!(node, Term::NamedNode(_)))
        .collect::<IndexSet<_>>();

    for _ in 0..=depth {
        let pending = frontier
            .drain(..)
            .filter(|node| !visited.contains(node))
            .collect::<Vec<_>>();
        if pending.is_empty() {
            break;
        }
        for node in pending {
            if visited.len() >= MAX_MATERIALIZED_NODES {
                tracing::warn!(
                    limit = MAX_MATERIALIZED_NODES,
                    "stopped materializing endpoint data at the node limit"
                );
                return Ok(finish(resolved, before));
            }
            if let Term::NamedNode(iri) = &node {
                let query = neighbourhood_query(iri.as_str());
                construct_into(resolver, resolved, &query).await?;
                for (_, object) in resolved.graph().outgoing(&node) {
                    if matches!(object, Term::NamedNode(_)) {
                        frontier.insert(object);
                    }
                }
            }
            visited.insert(node);
        }
    }
    Ok(finish(resolved, before))
}

fn finish(resolved: &mut ResolvedGraph, before: usize) -> usize {
    let engine = resolved.inference();
    resolved.apply_inference(engine);
    let added = resolved.graph().len() - before;
    tracing::debug!(triples = added, "materialized endpoint neighbourhood");
    added
}

fn neighbourhood_query(iri: &str) -> String {
    format!(
        "CONSTRUCT {{ <{iri}> ?p ?o . ?s ?q <{iri}> }} WHERE {{ {{ <{iri}> ?p ?o }} UNION {{ ?s ?q <{iri}> }} }}"
    )
}

/// A `CONSTRUCT` query returning the triples a pattern selector matches.
pub fn selector_query(selector: &NodeSelector) -> Option<String> {
    let term = |term: &Option<Term>, var: &str| match term {
        Some(term) => term.to_string(),
        None => var.to_string(),
    };
    let pattern = match selector {
        NodeSelector::Node(_) => return None,
        NodeSelector::SubjectsOf { predicate, object } => {
            format!("?focus {predicate} {}", term(object, "?o"))
        }
        NodeSelector::ObjectsOf { subject, predicate } => {
            format!("{} {predicate} ?focus", term(subject, "?s"))
        }
    };
    Some(format!("CONSTRUCT {{ {pattern} }} WHERE {{ {pattern} }}"))
}

/// Whether a selector names a node directly or matches a pattern.
pub fn is_pattern(selector: &NodeSelector) -> bool {
    !matches!(selector, NodeSelector::Node(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use oxigraph::model::NamedNode;

    fn params() -> DataParams {
        DataParams {
            data: Some("<http://example.org/x> <http://example.org/p> 1 .".to_string()),
            data_url: Some("http://example.org/data.ttl".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn url_wins_over_inline_without_a_selector() {
        let spec = DataSpec::from_params(&params()).unwrap();
        assert_eq!(spec.source.kind(), "url");
    }

    #[test]
    fn explicit_selector_wins() {
        let mut params = params();
        params.active_data_source = Some("byText".to_string());
        assert_eq!(DataSpec::from_params(&params).unwrap().source.kind(), "inline");
    }

    #[test]
    fn selector_pointing_at_absent_field_is_an_error() {
        let mut params = params();
        params.active_data_source = Some("byEndpoint".to_string());
        assert_matches!(
            DataSpec::from_params(&params),
            Err(ResolutionError::MissingSource(field)) if field == "data endpoint"
        );
        params.active_data_source = Some("byCarrierPigeon".to_string());
        assert_matches!(
            DataSpec::from_params(&params),
            Err(ResolutionError::UnknownSelector { kind: "data", .. })
        );
    }

    #[test]
    fn compound_has_top_precedence_and_nests() {
        let params = DataParams {
            data: Some("ignored".to_string()),
            compound_data: Some(vec![params(), DataParams::default()]),
            ..Default::default()
        };
        let spec = DataSpec::from_params(&params).unwrap();
        assert_matches!(&spec.source, DataSource::Compound(children)
            if children.len() == 2 && children[1] == DataSource::Empty);
    }

    #[test]
    fn no_fields_means_empty() {
        let spec = DataSpec::from_params(&DataParams::default()).unwrap();
        assert_eq!(spec.source, DataSource::Empty);
        assert!(spec.inference.is_none());
    }

    #[test]
    fn pattern_selectors_become_construct_queries() {
        let selector = NodeSelector::SubjectsOf {
            predicate: NamedNode::new("http://example.org/p").unwrap(),
            object: None,
        };
        assert!(is_pattern(&selector));
        assert_eq!(
            selector_query(&selector).unwrap(),
            "CONSTRUCT { ?focus <http://example.org/p> ?o } WHERE { ?focus <http://example.org/p> ?o }"
        );
        let node = NodeSelector::Node(Term::NamedNode(NamedNode::new("http://example.org/x").unwrap()));
        assert!(selector_query(&node).is_none());
    }
}
