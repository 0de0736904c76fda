//! Introspection and reserialisation of data and schemas.

use crate::error::{ConversionError, ResolutionError};
use crate::format::{FormatCatalog, SchemaEngine, SchemaFormat};
use crate::resolve::data::resolve_data;
use crate::resolve::schema::resolve_schema;
use crate::resolve::{DataSpec, Resolver, SchemaSpec};
use indexmap::IndexMap;

/// Summary of resolved data.
#[derive(Debug, Clone, PartialEq)]
pub struct DataInfo {
    pub triples: usize,
    pub subjects: usize,
    pub predicates: Vec<String>,
    pub prefixes: IndexMap<String, String>,
    pub endpoints: Vec<String>,
    pub inference: String,
    pub echo: Option<String>,
}

/// Resolved data serialised in another syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct DataConversion {
    pub text: String,
    pub format: String,
    pub media_type: String,
    pub triples: usize,
}

#[derive(Clone)]
pub struct DataService {
    resolver: Resolver,
    default_base: Option<String>,
}

impl DataService {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            default_base: None,
        }
    }

    pub fn with_default_base(mut self, base: impl Into<String>) -> Self {
        self.default_base = Some(base.into());
        self
    }

    pub async fn info(&self, spec: &DataSpec, base: Option<&str>) -> Result<DataInfo, ResolutionError> {
        let base = base.or(self.default_base.as_deref());
        let resolved = resolve_data(&self.resolver, spec, base).await?;
        let graph = resolved.graph();
        let mut predicates = graph
            .predicates()
            .into_iter()
            .map(|predicate| predicate.as_str().to_string())
            .collect::<Vec<_>>();
        predicates.sort();
        Ok(DataInfo {
            triples: graph.len(),
            subjects: graph.subjects().len(),
            predicates,
            prefixes: prefixes_of(resolved.prefix_map()),
            endpoints: resolved.endpoints().to_vec(),
            inference: resolved.inference().to_string(),
            echo: resolved.echo().map(str::to_string),
        })
    }

    /// Serialises the data in `spec.target_format` (Turtle when absent).
    ///
    /// SPARQL endpoints are only queried on demand, so data backed by one
    /// cannot be converted as a whole.
    pub async fn convert(&self, spec: &DataSpec, base: Option<&str>) -> Result<DataConversion, ConversionError> {
        let base = base.or(self.default_base.as_deref());
        let (target, rdf_format) = self.resolver.registry.rdf_format(spec.target_format.as_deref())?;
        let resolved = resolve_data(&self.resolver, spec, base).await?;
        if resolved.is_live() {
            return Err(ResolutionError::MissingSource(
                "serialisable data; SPARQL endpoints cannot be converted as a whole".to_string(),
            )
            .into());
        }
        let graph = resolved.graph();
        let text = graph.serialize(rdf_format)?;
        tracing::debug!(format = target.name, triples = graph.len(), "converted data");
        Ok(DataConversion {
            text,
            format: target.name.to_string(),
            media_type: target.media_type.to_string(),
            triples: graph.len(),
        })
    }
}

/// Summary of a parsed schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaInfo {
    pub engine: SchemaEngine,
    /// `None` for shapes embedded in the data.
    pub format: Option<SchemaFormat>,
    pub shapes: Vec<String>,
    pub prefixes: IndexMap<String, String>,
}

#[derive(Clone)]
pub struct SchemaService {
    resolver: Resolver,
    default_base: Option<String>,
}

impl SchemaService {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            default_base: None,
        }
    }

    pub fn with_default_base(mut self, base: impl Into<String>) -> Self {
        self.default_base = Some(base.into());
        self
    }

    /// Parses the schema; shapes embedded in data need `data`.
    pub async fn info(
        &self,
        spec: &SchemaSpec,
        data: Option<&DataSpec>,
        base: Option<&str>,
    ) -> Result<SchemaInfo, ResolutionError> {
        let base = base.or(self.default_base.as_deref());
        let resolved = match (spec.embedded_in_data, data) {
            (true, Some(data)) => Some(resolve_data(&self.resolver, data, base).await?),
            _ => None,
        };
        let schema = resolve_schema(&self.resolver, spec, resolved.as_ref(), base).await?;
        let engine = schema.engine();
        let format = if spec.embedded_in_data {
            None
        } else {
            Some(self.resolver.registry.schema_format(engine, spec.format.as_deref())?)
        };
        Ok(SchemaInfo {
            engine,
            format,
            shapes: schema.shapes(),
            prefixes: prefixes_of(schema.prefix_map()),
        })
    }

    pub fn list_formats(&self) -> FormatCatalog {
        self.resolver.registry.catalog()
    }
}

fn prefixes_of(prefixes: &crate::rdf::prefix::PrefixMap) -> IndexMap<String, String> {
    prefixes
        .iter()
        .map(|(prefix, namespace)| (prefix.to_string(), namespace.to_string()))
        .collect()
}
