//! Validation orchestration: resolve every input, derive the trigger, run
//! the engine off the async runtime and time it.

use crate::error::{EngineFailure, ResolutionError};
use crate::logging::{record_validation_inputs, record_validation_outcome, validation_span};
use crate::metrics::METRICS;
use crate::rdf::graph::RdfGraph;
use crate::resolve::data::{construct_into, materialize, resolve_data, selector_query};
use crate::resolve::schema::resolve_schema;
use crate::resolve::trigger::{derive_trigger, fetch_shape_map, merge};
use crate::resolve::{
    DataSpec, ResolvedGraph, Resolver, SchemaSpec, ShapeMapSources, ValidationTrigger,
};
use crate::schema::shacl::{ShaclValidator, Target};
use crate::schema::{Schema, ValidationResult};
use crate::shapemap::NodeSelector;
use indexmap::IndexSet;
use oxigraph::model::vocab::{rdf, rdfs};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Span};

/// Runs a parsed schema against a graph. Called on a blocking thread.
pub trait ValidationEngine: Send + Sync + 'static {
    fn validate(
        &self,
        schema: &Schema,
        graph: &RdfGraph,
        trigger: &ValidationTrigger,
    ) -> Result<ValidationResult, EngineFailure>;
}

/// The engines shipped with the crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinEngine;

impl ValidationEngine for BuiltinEngine {
    fn validate(
        &self,
        schema: &Schema,
        graph: &RdfGraph,
        trigger: &ValidationTrigger,
    ) -> Result<ValidationResult, EngineFailure> {
        schema.validate(graph, trigger)
    }
}

/// What a validation request produced.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub result: ValidationResult,
    /// `None` when the inputs could not be resolved.
    pub trigger: Option<ValidationTrigger>,
    /// Wall time spent in the engine; 0 when it never ran.
    pub elapsed_nanos: u64,
    pub active_tab: Option<String>,
    /// Source text of inline or uploaded data.
    pub data_echo: Option<String>,
}

impl ValidationOutcome {
    /// Outcome for inputs that never reached the engine.
    pub fn unresolved(error: &ResolutionError, active_tab: Option<String>) -> Self {
        Self {
            result: ValidationResult::error(error.to_string()),
            trigger: None,
            elapsed_nanos: 0,
            active_tab,
            data_echo: None,
        }
    }
}

struct StageError {
    stage: &'static str,
    error: ResolutionError,
}

fn at(stage: &'static str) -> impl Fn(ResolutionError) -> StageError {
    move |error| StageError { stage, error }
}

struct Prepared {
    data: ResolvedGraph,
    schema: Schema,
    trigger: ValidationTrigger,
    active_tab: Option<String>,
}

#[derive(Clone)]
pub struct ValidationService {
    resolver: Resolver,
    engine: Arc<dyn ValidationEngine>,
    follow_depth: usize,
    default_base: Option<String>,
}

impl ValidationService {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            engine: Arc::new(BuiltinEngine),
            follow_depth: 2,
            default_base: None,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn ValidationEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_follow_depth(mut self, depth: usize) -> Self {
        self.follow_depth = depth;
        self
    }

    pub fn with_default_base(mut self, base: impl Into<String>) -> Self {
        self.default_base = Some(base.into());
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Validates `data` against `schema` as selected by `shape_maps`.
    ///
    /// Never fails: unresolvable inputs and engine failures come back as
    /// error results.
    pub async fn validate(
        &self,
        data: &DataSpec,
        schema: &SchemaSpec,
        shape_maps: &ShapeMapSources,
        base: Option<&str>,
    ) -> ValidationOutcome {
        let span = validation_span(data.source.kind());
        self.run(data, schema, shape_maps, base)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        data: &DataSpec,
        schema: &SchemaSpec,
        shape_maps: &ShapeMapSources,
        base: Option<&str>,
    ) -> ValidationOutcome {
        let span = Span::current();
        let base = base.or(self.default_base.as_deref());
        let prepared = match self.prepare(data, schema, shape_maps, base).await {
            Ok(prepared) => prepared,
            Err(StageError { stage, error }) => {
                tracing::info!(stage, kind = error.kind(), error = %error, "validation inputs could not be resolved");
                METRICS.record_resolution_error(stage, error.kind());
                METRICS.record_validation("unresolved", "resolution_error", None);
                record_validation_outcome(&span, "resolution_error");
                return ValidationOutcome::unresolved(&error, shape_maps.active_shape_map_tab.clone());
            }
        };

        let Prepared {
            data,
            schema,
            trigger,
            active_tab,
        } = prepared;
        let data_echo = data.echo().map(str::to_string);
        let engine_name = schema.name();
        record_validation_inputs(&span, &engine_name, &trigger.mode().to_string());
        let engine = self.engine.clone();
        let engine_trigger = trigger.clone();

        let started = Instant::now();
        let joined = tokio::task::spawn_blocking(move || {
            let outcome = engine.validate(&schema, data.graph(), &engine_trigger);
            drop(data);
            outcome
        })
        .await;
        let elapsed = started.elapsed();
        let elapsed_nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX).max(1);

        let (result, outcome) = match joined {
            Ok(Ok(result)) => {
                let outcome = if result.valid { "conformant" } else { "non_conformant" };
                (result, outcome)
            }
            Ok(Err(failure)) => (ValidationResult::error(failure.to_string()), "engine_failure"),
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    join_error.to_string()
                };
                tracing::error!(engine = %engine_name, %message, "validation engine panicked");
                (
                    ValidationResult::error(EngineFailure::new(message).to_string()),
                    "engine_failure",
                )
            }
        };
        METRICS.record_validation(&engine_name, outcome, Some(elapsed));
        record_validation_outcome(&span, outcome);
        tracing::info!(elapsed_nanos, "validation finished");

        ValidationOutcome {
            result,
            trigger: Some(trigger),
            elapsed_nanos,
            active_tab,
            data_echo,
        }
    }

    async fn prepare(
        &self,
        data: &DataSpec,
        schema: &SchemaSpec,
        shape_maps: &ShapeMapSources,
        base: Option<&str>,
    ) -> Result<Prepared, StageError> {
        let resolver = &self.resolver;
        let (mut resolved, parsed, fetched) = if schema.embedded_in_data {
            let resolved = resolve_data(resolver, data, base).await.map_err(at("data"))?;
            let (parsed, fetched) = tokio::join!(
                resolve_schema(resolver, schema, Some(&resolved), base),
                fetch_shape_map(resolver, shape_maps),
            );
            (resolved, parsed, fetched)
        } else {
            let (resolved, parsed, fetched) = tokio::join!(
                resolve_data(resolver, data, base),
                resolve_schema(resolver, schema, None, base),
                fetch_shape_map(resolver, shape_maps),
            );
            (resolved.map_err(at("data"))?, parsed, fetched)
        };
        let parsed = parsed.map_err(at("schema"))?;
        let fetched = fetched.map_err(at("trigger"))?;

        let merged = merge(shape_maps, fetched.as_deref(), &resolver.registry).map_err(at("trigger"))?;
        let trigger = derive_trigger(&merged, resolved.prefix_map(), parsed.prefix_map(), base)
            .map_err(at("trigger"))?;

        if resolved.is_live() {
            self.materialize_focus(&mut resolved, &parsed, &trigger).await?;
        }

        Ok(Prepared {
            data: resolved,
            schema: parsed,
            trigger,
            active_tab: merged.active_tab,
        })
    }

    /// Pulls from the endpoints only what the trigger needs: the nodes it
    /// selects and their neighbourhood.
    async fn materialize_focus(
        &self,
        resolved: &mut ResolvedGraph,
        schema: &Schema,
        trigger: &ValidationTrigger,
    ) -> Result<(), StageError> {
        let resolver = &self.resolver;
        let mut seeds = IndexSet::new();
        match trigger {
            ValidationTrigger::NodeShape { node, .. } => {
                seeds.insert(node.clone());
            }
            ValidationTrigger::ShapeMap(query) => {
                for association in &query.associations {
                    if let Some(pattern) = selector_query(&association.node) {
                        construct_into(resolver, resolved, &pattern).await.map_err(at("data"))?;
                    }
                }
                seeds.extend(query.fix(resolved.graph()).into_iter().map(|(node, _)| node));
            }
            ValidationTrigger::TargetDecls => {
                let Schema::Shacl(shacl) = schema else {
                    return Err(StageError {
                        stage: "trigger",
                        error: ResolutionError::MissingSource(
                            "shape map for ShEx validation over a SPARQL endpoint".to_string(),
                        ),
                    });
                };
                for shape in shacl.shapes() {
                    for target in &shape.targets {
                        match target_query(target) {
                            Some(query) => {
                                construct_into(resolver, resolved, &query).await.map_err(at("data"))?;
                            }
                            None => {
                                if let Target::Node(node) = target {
                                    seeds.insert(node.clone());
                                }
                            }
                        }
                    }
                }
                let validator = ShaclValidator::new(shacl, resolved.graph());
                let focus = shacl
                    .shapes()
                    .iter()
                    .flat_map(|shape| validator.focus_nodes(shape))
                    .collect::<Vec<_>>();
                seeds.extend(focus);
            }
        }
        let added = materialize(resolver, resolved, seeds, self.follow_depth)
            .await
            .map_err(at("data"))?;
        tracing::debug!(triples = added, endpoints = resolved.endpoints().len(), "materialized focus nodes");
        Ok(())
    }
}

fn target_query(target: &Target) -> Option<String> {
    match target {
        Target::Node(_) => None,
        Target::Class(class) => Some(format!(
            "CONSTRUCT {{ ?focus <{}> {class} }} WHERE {{ ?focus <{}>/<{}>* {class} }}",
            rdf::TYPE.as_str(),
            rdf::TYPE.as_str(),
            rdfs::SUB_CLASS_OF.as_str(),
        )),
        Target::SubjectsOf(predicate) => selector_query(&NodeSelector::SubjectsOf {
            predicate: predicate.clone(),
            object: None,
        }),
        Target::ObjectsOf(predicate) => selector_query(&NodeSelector::ObjectsOf {
            subject: None,
            predicate: predicate.clone(),
        }),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "validation engine panicked".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::{NamedNode, Term};

    #[test]
    fn class_targets_follow_subclasses_on_the_endpoint() {
        let query = target_query(&Target::Class(NamedNode::new("http://example.org/C").unwrap())).unwrap();
        assert!(query.contains("<http://www.w3.org/2000/01/rdf-schema#subClassOf>*"));
        assert!(query.starts_with("CONSTRUCT { ?focus <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://example.org/C> }"));
        assert!(target_query(&Target::Node(Term::NamedNode(NamedNode::new("http://example.org/x").unwrap()))).is_none());
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("bang".to_string())), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "validation engine panicked");
    }
}
