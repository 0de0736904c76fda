//! End-to-end validation through the orchestrator, with the network faked.

mod support;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use oxigraph::model::{NamedNode, Term};
use rdfshape_mcp::config::DEFAULT_BASE_IRI;
use rdfshape_mcp::error::ResolutionError;
use rdfshape_mcp::resolve::data::{construct_into, resolve_data};
use rdfshape_mcp::resolve::{DataSource, DataSpec, Resolver, SchemaSpec, ShapeMapSources};
use rdfshape_mcp::shapemap::{ShapeLabel, Status};
use support::*;

fn iri(value: &str) -> NamedNode {
    NamedNode::new(value).unwrap()
}

#[tokio::test]
async fn relative_iris_conform_against_the_default_base() {
    let resolver = offline_resolver();
    let service = validation_service(resolver.clone());

    let outcome = service
        .validate(
            &DataSpec::inline("<a> <b> <c> .", Some("Turtle")),
            &SchemaSpec::inline("<S> { <b> . }", Some("ShExC"), Some("ShEx")),
            &ShapeMapSources::shape_map("<a>@<S>"),
            None,
        )
        .await;

    assert!(outcome.result.valid, "{}", outcome.result.message);
    assert!(!outcome.result.is_error());
    let status = outcome.result.shape_map.status(
        &Term::NamedNode(iri("internal://base/a")),
        &ShapeLabel::Iri(iri("internal://base/S")),
    );
    assert_eq!(status, Some(Status::Conformant));
    assert!(outcome.trigger.is_some());
    assert!(outcome.elapsed_nanos > 0);
    assert_eq!(outcome.data_echo.as_deref(), Some("<a> <b> <c> ."));
    assert_eq!(resolver.tracker.live(), 0);
}

#[tokio::test]
async fn nonconformant_nodes_are_a_result_not_an_error() {
    let service = validation_service(offline_resolver());
    let data = "@prefix ex: <http://example.org/> .\nex:carol a ex:Person ; ex:name 42 .";

    let outcome = service
        .validate(
            &DataSpec::inline(data, None),
            &SchemaSpec::inline(PERSON_SHEX, None, None),
            &ShapeMapSources::shape_map("ex:carol@ex:Person"),
            None,
        )
        .await;

    assert!(!outcome.result.valid);
    assert!(!outcome.result.is_error());
    let status = outcome.result.shape_map.status(
        &Term::NamedNode(iri("http://example.org/carol")),
        &ShapeLabel::Iri(iri("http://example.org/Person")),
    );
    assert_eq!(status, Some(Status::Nonconformant));
}

#[tokio::test]
async fn shape_map_nodes_use_every_prefix_the_data_declares() {
    let service = validation_service(offline_resolver());
    let data = "@prefix foo: <http://foo.org/> . @prefix ex: <http://example.org/> .\nex:bob a ex:Person ; ex:name \"Bob\" .";

    let outcome = service
        .validate(
            &DataSpec::inline(data, None),
            &SchemaSpec::inline(PERSON_SHEX, None, None),
            &ShapeMapSources::shape_map("ex:bob@ex:Person"),
            None,
        )
        .await;

    assert!(!outcome.result.is_error(), "{}", outcome.result.message);
    assert!(outcome.result.valid);
    let status = outcome.result.shape_map.status(
        &Term::NamedNode(iri("http://example.org/bob")),
        &ShapeLabel::Iri(iri("http://example.org/Person")),
    );
    assert_eq!(status, Some(Status::Conformant));
}

#[tokio::test]
async fn shex_without_start_checks_every_shape_against_every_subject() {
    let service = validation_service(offline_resolver());

    let outcome = service
        .validate(
            &DataSpec::inline(PERSON_TURTLE, None),
            &SchemaSpec::inline(PERSON_SHEX, None, None),
            &ShapeMapSources::default(),
            None,
        )
        .await;

    assert!(!outcome.result.is_error(), "{}", outcome.result.message);
    assert!(outcome.result.valid);
    assert_eq!(outcome.result.shape_map.len(), 2);
    for person in ["http://example.org/alice", "http://example.org/bob"] {
        let status = outcome.result.shape_map.status(
            &Term::NamedNode(iri(person)),
            &ShapeLabel::Iri(iri("http://example.org/Person")),
        );
        assert_eq!(status, Some(Status::Conformant), "{person}");
    }
}

#[tokio::test]
async fn shacl_target_declarations_drive_validation_without_a_shape_map() {
    let service = validation_service(offline_resolver());
    let broken = format!("{PERSON_TURTLE}@prefix ex: <http://example.org/> .\nex:dave a ex:Person .\n");

    let conforming = service
        .validate(
            &DataSpec::inline(PERSON_TURTLE, None),
            &SchemaSpec::inline(PERSON_SHACL, Some("Turtle"), Some("SHACL")),
            &ShapeMapSources::default(),
            None,
        )
        .await;
    assert!(conforming.result.valid, "{}", conforming.result.message);

    let failing = service
        .validate(
            &DataSpec::inline(broken, None),
            &SchemaSpec::inline(PERSON_SHACL, Some("Turtle"), Some("SHACL")),
            &ShapeMapSources::default(),
            None,
        )
        .await;
    assert!(!failing.result.valid);
    assert!(!failing.result.is_error());
    assert_eq!(failing.result.report.len(), 1);
}

#[tokio::test]
async fn node_shape_trigger_checks_a_single_pair() {
    let service = validation_service(offline_resolver());
    let sources = ShapeMapSources {
        trigger_mode: Some("NodeShape".to_string()),
        node: Some("ex:bob".to_string()),
        shape: Some("ex:Person".to_string()),
        active_shape_map_tab: Some("byNode".to_string()),
        ..Default::default()
    };

    let outcome = service
        .validate(
            &DataSpec::inline(PERSON_TURTLE, None),
            &SchemaSpec::inline(PERSON_SHEX, None, None),
            &sources,
            None,
        )
        .await;

    assert!(outcome.result.valid, "{}", outcome.result.message);
    assert_eq!(outcome.result.shape_map.len(), 1);
    assert_eq!(outcome.active_tab.as_deref(), Some("byNode"));
}

#[tokio::test]
async fn unreachable_url_is_reported_without_running_the_engine() {
    let resolver = offline_resolver();
    let service = validation_service(resolver.clone());
    let spec = DataSpec::from_source(DataSource::Url {
        url: "http://unreachable.invalid/data.ttl".to_string(),
        format: None,
    });

    let outcome = service
        .validate(
            &spec,
            &SchemaSpec::inline(PERSON_SHEX, None, None),
            &ShapeMapSources::shape_map("ex:alice@ex:Person"),
            None,
        )
        .await;

    assert!(outcome.result.is_error());
    assert!(!outcome.result.valid);
    assert!(!outcome.result.message.is_empty());
    assert!(outcome.trigger.is_none());
    assert_eq!(outcome.elapsed_nanos, 0);

    let direct = resolve_data(&resolver, &spec, None).await;
    assert_matches!(direct, Err(ResolutionError::Network(_)));
    assert_eq!(resolver.tracker.live(), 0);
}

#[tokio::test]
async fn unknown_inference_engine_is_rejected() {
    let resolver = offline_resolver();
    let spec = DataSpec::inline(PERSON_TURTLE, None).with_inference("bogus");

    let direct = resolve_data(&resolver, &spec, None).await;
    assert_matches!(direct, Err(ResolutionError::InferenceEngine(ref error)) if error.name == "bogus");

    let outcome = validation_service(resolver.clone())
        .validate(
            &spec,
            &SchemaSpec::inline(PERSON_SHEX, None, None),
            &ShapeMapSources::shape_map("ex:alice@ex:Person"),
            None,
        )
        .await;
    assert!(outcome.result.is_error());
    assert!(outcome.result.message.contains("bogus"));
    assert_eq!(resolver.tracker.total_acquired(), 0);
}

#[tokio::test]
async fn every_source_kind_yields_the_same_graph() {
    let url = "http://example.org/people.ttl";
    let (first_half, second_half) = PERSON_TURTLE.split_at(
        PERSON_TURTLE
            .find("ex:bob a")
            .expect("second statement"),
    );
    let second_half = format!("@prefix ex: <http://example.org/> .\n{second_half}");
    let resolver = Resolver::new(
        Arc::new(MapFetcher::new().with(url, PERSON_TURTLE).with("http://example.org/bob.ttl", &second_half)),
        Arc::new(FixedSparql::new(PERSON_TURTLE)),
    );
    let expected = turtle_graph(PERSON_TURTLE);

    let sources = vec![
        DataSource::Inline {
            text: PERSON_TURTLE.to_string(),
            format: None,
        },
        DataSource::Url {
            url: url.to_string(),
            format: Some("Turtle".to_string()),
        },
        DataSource::File {
            bytes: PERSON_TURTLE.as_bytes().to_vec(),
            format: Some("ttl".to_string()),
        },
        DataSource::Compound(vec![
            DataSource::Inline {
                text: first_half.to_string(),
                format: None,
            },
            DataSource::Url {
                url: "http://example.org/bob.ttl".to_string(),
                format: None,
            },
        ]),
    ];
    for source in sources {
        let kind = source.kind();
        let resolved = resolve_data(&resolver, &DataSpec::from_source(source), None)
            .await
            .unwrap();
        assert!(resolved.graph().is_isomorphic(&expected), "{kind} graph differs");
    }

    let endpoint = DataSpec::from_source(DataSource::Endpoint {
        url: "http://example.org/sparql".to_string(),
    });
    let mut resolved = resolve_data(&resolver, &endpoint, None).await.unwrap();
    assert!(resolved.is_live());
    assert!(resolved.graph().is_empty());
    construct_into(&resolver, &mut resolved, "CONSTRUCT WHERE { ?s ?p ?o }")
        .await
        .unwrap();
    assert!(resolved.graph().is_isomorphic(&expected), "endpoint graph differs");
}

#[tokio::test]
async fn compound_sources_fail_as_a_whole() {
    let resolver = offline_resolver();
    let spec = DataSpec::from_source(DataSource::Compound(vec![
        DataSource::Inline {
            text: PERSON_TURTLE.to_string(),
            format: None,
        },
        DataSource::Url {
            url: "http://unreachable.invalid/more.ttl".to_string(),
            format: None,
        },
    ]));

    let result = resolve_data(&resolver, &spec, None).await;
    assert_matches!(
        result,
        Err(ResolutionError::Compound { index: 1, ref source }) if matches!(**source, ResolutionError::Network(_))
    );
    assert_eq!(resolver.tracker.live(), 0);
}

#[tokio::test]
async fn engine_panics_become_timed_error_results() {
    let resolver = offline_resolver();
    let service = validation_service(resolver.clone()).with_engine(Arc::new(PanickingEngine));

    let outcome = service
        .validate(
            &DataSpec::inline(PERSON_TURTLE, None),
            &SchemaSpec::inline(PERSON_SHEX, None, None),
            &ShapeMapSources::shape_map("ex:alice@ex:Person"),
            None,
        )
        .await;

    assert!(outcome.result.is_error());
    assert!(outcome.result.message.contains("engine exploded"));
    assert!(outcome.trigger.is_some());
    assert!(outcome.elapsed_nanos >= 1);
    assert_eq!(resolver.tracker.live(), 0);
}

#[tokio::test]
async fn graphs_are_released_when_a_request_is_cancelled() {
    let resolver = Resolver::new(Arc::new(HangingFetcher), Arc::new(FixedSparql::empty()));
    let service = Arc::new(validation_service(resolver.clone()));
    let schema = SchemaSpec {
        source: Some(rdfshape_mcp::resolve::SchemaSource::Url {
            url: "http://slow.example.org/schema.shex".to_string(),
        }),
        ..Default::default()
    };

    let task = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .validate(
                    &DataSpec::inline(PERSON_TURTLE, None),
                    &schema,
                    &ShapeMapSources::shape_map("ex:alice@ex:Person"),
                    Some(DEFAULT_BASE_IRI),
                )
                .await
        }
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while resolver.tracker.live() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("data graph acquired");

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert_eq!(resolver.tracker.live(), 0);
    assert_eq!(resolver.tracker.total_acquired(), 1);
}
