use proptest::prelude::*;
use rdfshape_mcp::format::{FormatRegistry, ShapeMapFormat};
use rdfshape_mcp::resolve::trigger::merge;
use rdfshape_mcp::resolve::{ShapeMapSources, TriggerSpec};

const FIELDS: [&str; 4] = ["shapeMap", "shapeMapAlt", "shapeMapUrl", "shapeMapFile"];

fn sources(present: [bool; 4]) -> (ShapeMapSources, Option<String>) {
    let text = |index: usize| present[index].then(|| format!("<n{index}>@<S{index}>"));
    let sources = ShapeMapSources {
        shape_map: text(0),
        shape_map_alt: text(1),
        shape_map_url: present[2].then(|| "http://example.org/map.sm".to_string()),
        shape_map_file: text(3),
        ..Default::default()
    };
    (sources, text(2))
}

proptest! {
    #[test]
    fn highest_priority_source_wins(present in proptest::array::uniform4(any::<bool>())) {
        let registry = FormatRegistry::standard();
        let (sources, fetched) = sources(present);
        let merged = merge(&sources, fetched.as_deref(), &registry).unwrap();

        match present.iter().position(|&flag| flag) {
            Some(winner) => {
                let expected = format!("<n{winner}>@<S{winner}>");
                prop_assert_eq!(
                    merged.trigger,
                    TriggerSpec::ShapeMap { source: expected, format: ShapeMapFormat::Compact },
                    "expected {} to win", FIELDS[winner]
                );
            }
            None => prop_assert_eq!(merged.trigger, TriggerSpec::TargetDecls),
        }
    }

    #[test]
    fn repeated_text_resolves_to_the_first_present_field(
        picks in proptest::array::uniform4(proptest::option::of(0usize..2))
    ) {
        const POOL: [&str; 2] = ["<a>@<S>", "<b>@<T>"];
        let text = |index: usize| picks[index].map(|pick| POOL[pick].to_string());
        let sources = ShapeMapSources {
            shape_map: text(0),
            shape_map_alt: text(1),
            shape_map_url: picks[2].map(|_| "http://example.org/map.sm".to_string()),
            shape_map_file: text(3),
            ..Default::default()
        };
        let registry = FormatRegistry::standard();
        let merged = merge(&sources, text(2).as_deref(), &registry).unwrap();

        match picks.iter().flatten().next() {
            Some(&pick) => prop_assert_eq!(
                merged.trigger,
                TriggerSpec::ShapeMap { source: POOL[pick].to_string(), format: ShapeMapFormat::Compact }
            ),
            None => prop_assert_eq!(merged.trigger, TriggerSpec::TargetDecls),
        }
    }

    #[test]
    fn explicit_target_mode_ignores_shape_maps(present in proptest::array::uniform4(any::<bool>())) {
        let registry = FormatRegistry::standard();
        let (mut sources, fetched) = sources(present);
        sources.trigger_mode = Some("TargetDecls".to_string());
        let merged = merge(&sources, fetched.as_deref(), &registry).unwrap();
        prop_assert_eq!(merged.trigger, TriggerSpec::TargetDecls);
    }

    #[test]
    fn blank_fields_count_as_absent(padding in "[ \t\n]{0,4}") {
        let registry = FormatRegistry::standard();
        let sources = ShapeMapSources {
            shape_map: Some(padding),
            shape_map_file: Some("<a>@<S>".to_string()),
            ..Default::default()
        };
        let merged = merge(&sources, None, &registry).unwrap();
        prop_assert_eq!(
            merged.trigger,
            TriggerSpec::ShapeMap { source: "<a>@<S>".to_string(), format: ShapeMapFormat::Compact }
        );
    }
}

#[test]
fn equal_shape_map_fields_merge_to_that_value() {
    let registry = FormatRegistry::standard();
    let sources = ShapeMapSources {
        shape_map: Some("<z>@<Z>".to_string()),
        shape_map_alt: Some("<z>@<Z>".to_string()),
        ..Default::default()
    };
    let merged = merge(&sources, None, &registry).unwrap();
    assert_eq!(
        merged.trigger,
        TriggerSpec::ShapeMap { source: "<z>@<Z>".to_string(), format: ShapeMapFormat::Compact }
    );
}

#[test]
fn node_shape_mode_needs_both_fields() {
    let registry = FormatRegistry::standard();
    let sources = ShapeMapSources {
        trigger_mode: Some("NodeShape".to_string()),
        node: Some("<a>".to_string()),
        ..Default::default()
    };
    assert!(merge(&sources, None, &registry).is_err());
}
