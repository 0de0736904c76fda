mod support;

use std::sync::Arc;

use assert_matches::assert_matches;
use rdfshape_mcp::config::DEFAULT_BASE_IRI;
use rdfshape_mcp::convert::ConversionService;
use rdfshape_mcp::error::{ConversionError, InferenceError, ResolutionError};
use rdfshape_mcp::format::{SchemaEngine, SchemaFormat};
use rdfshape_mcp::infer::{InferenceOptions, InferenceRequest, InferenceService};
use rdfshape_mcp::info::{DataService, SchemaService};
use rdfshape_mcp::resolve::{DataSource, DataSpec, SchemaSpec, ShapeMapSources};
use support::*;

fn conversion(translator: Arc<SpyTranslator>) -> ConversionService {
    ConversionService::new(offline_resolver())
        .with_translator(translator)
        .with_default_base(DEFAULT_BASE_IRI)
}

fn inference_request(selector: &str) -> InferenceRequest {
    InferenceRequest {
        data: DataSpec::inline(PERSON_TURTLE, None),
        node_selector: selector.to_string(),
        engine: None,
        label: Some("<http://example.org/PersonShape>".to_string()),
        format: None,
        options: InferenceOptions::default(),
        visualize: false,
        base: None,
    }
}

#[tokio::test]
async fn shex_round_trips_through_shexj() {
    let spy = Arc::new(SpyTranslator::default());
    let service = conversion(spy.clone());

    let json = service
        .convert_schema(&SchemaSpec::inline(PERSON_SHEX, None, None), Some("ShExJ"), None, None)
        .await
        .unwrap();
    assert_eq!(json.target_format, SchemaFormat::ShExJ);
    assert!(json.shape_map.is_empty());

    let compact = service
        .convert_schema(&SchemaSpec::inline(&json.text, Some("ShExJ"), None), Some("ShExC"), None, None)
        .await
        .unwrap();
    let json_again = service
        .convert_schema(&SchemaSpec::inline(&compact.text, None, None), Some("ShExJ"), None, None)
        .await
        .unwrap();

    let first: serde_json::Value = serde_json::from_str(&json.text).unwrap();
    let second: serde_json::Value = serde_json::from_str(&json_again.text).unwrap();
    assert_eq!(first, second);
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn shacl_to_shex_carries_targets_into_a_shape_map() {
    let spy = Arc::new(SpyTranslator::default());
    let output = conversion(spy.clone())
        .convert_schema(
            &SchemaSpec::inline(PERSON_SHACL, Some("Turtle"), Some("SHACL")),
            None,
            Some("ShEx"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(spy.calls(), 1);
    assert_eq!(output.source_engine, SchemaEngine::Shacl);
    assert_eq!(output.target_engine, SchemaEngine::ShEx);
    assert_eq!(output.target_format, SchemaFormat::ShExC);
    assert!(!output.shape_map.is_empty());
    assert!(output.text.contains("PersonShape"));
}

#[tokio::test]
async fn shex_cannot_become_shacl() {
    let error = conversion(Arc::new(SpyTranslator::default()))
        .convert_schema(&SchemaSpec::inline(PERSON_SHEX, None, None), None, Some("SHACL"), None)
        .await
        .unwrap_err();
    assert_matches!(error, ConversionError::UnsupportedEnginePair { .. });
}

#[tokio::test]
async fn unknown_target_format_fails_before_parsing() {
    let error = conversion(Arc::new(SpyTranslator::default()))
        .convert_schema(&SchemaSpec::inline("not shex at all {", None, None), Some("Rot13"), None, None)
        .await
        .unwrap_err();
    assert_matches!(
        error,
        ConversionError::Resolution(ResolutionError::UnsupportedFormat { .. })
    );
}

#[tokio::test]
async fn inferred_schema_validates_its_own_examples() {
    let service = InferenceService::new(offline_resolver()).with_default_base(DEFAULT_BASE_IRI);
    let output = service
        .infer_schema(&inference_request("{FOCUS a ex:Person}"))
        .await
        .unwrap();

    assert_eq!(output.engine, SchemaEngine::ShEx);
    assert_eq!(output.shape_map.len(), 2);
    assert!(output.shapes.contains(&"http://example.org/PersonShape".to_string()));
    assert!(output.uml.is_none());

    let outcome = validation_service(offline_resolver())
        .validate(
            &DataSpec::inline(PERSON_TURTLE, None),
            &SchemaSpec::inline(&output.text, None, None),
            &ShapeMapSources::shape_map("ex:alice@<http://example.org/PersonShape>"),
            None,
        )
        .await;
    assert!(outcome.result.valid, "{}", outcome.result.message);
}

#[tokio::test]
async fn inference_reports_selector_problems() {
    let service = InferenceService::new(offline_resolver());

    let error = service.infer_schema(&inference_request("{FOCUS a")).await.unwrap_err();
    assert_matches!(error, InferenceError::InvalidSelector { .. });

    let error = service.infer_schema(&inference_request("ex:nobody")).await.unwrap_err();
    assert_matches!(error, InferenceError::NoMatchingNodes(_));

    let mut request = inference_request("ex:alice");
    request.engine = Some("OWL".to_string());
    let error = service.infer_schema(&request).await.unwrap_err();
    assert_matches!(error, InferenceError::Resolution(ResolutionError::UnknownEngine(_)));
}

#[tokio::test]
async fn visualized_inference_includes_a_diagram() {
    let service = InferenceService::new(offline_resolver());
    let mut request = inference_request("ex:alice");
    request.visualize = true;
    request.engine = Some("SHACL".to_string());

    let output = service.infer_schema(&request).await.unwrap();
    assert_eq!(output.format.name(), "Turtle");
    assert!(output.uml.as_deref().is_some_and(|uml| uml.starts_with("@startuml")));
    assert!(output.svg.is_some());
}

#[tokio::test]
async fn data_info_and_conversion_describe_the_graph() {
    let service = DataService::new(offline_resolver());
    let spec = DataSpec::inline(PERSON_TURTLE, None);

    let info = service.info(&spec, None).await.unwrap();
    assert_eq!(info.triples, 5);
    assert_eq!(info.subjects, 2);
    assert_eq!(info.prefixes.get("ex").map(String::as_str), Some("http://example.org/"));
    assert_eq!(info.echo.as_deref(), Some(PERSON_TURTLE));

    let mut spec = spec;
    spec.target_format = Some("N-Triples".to_string());
    let converted = service.convert(&spec, None).await.unwrap();
    assert_eq!(converted.triples, 5);
    assert_eq!(converted.text.lines().filter(|line| !line.trim().is_empty()).count(), 5);

    let endpoint = DataSpec::from_source(DataSource::Endpoint {
        url: "http://example.org/sparql".to_string(),
    });
    assert_matches!(
        service.convert(&endpoint, None).await,
        Err(ConversionError::Resolution(ResolutionError::MissingSource(_)))
    );
}

#[tokio::test]
async fn schema_info_lists_shapes_and_prefixes() {
    let service = SchemaService::new(offline_resolver());
    let info = service
        .info(&SchemaSpec::inline(PERSON_SHACL, Some("Turtle"), Some("SHACL")), None, None)
        .await
        .unwrap();
    assert_eq!(info.engine, SchemaEngine::Shacl);
    assert_eq!(info.shapes, vec!["http://example.org/PersonShape".to_string()]);
    assert_eq!(info.prefixes.get("sh").map(String::as_str), Some("http://www.w3.org/ns/shacl#"));

    let catalog = service.list_formats();
    assert!(catalog.schema_engines.iter().any(|formats| formats.engine == "ShEx"));
}
