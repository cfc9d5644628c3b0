//! Synthetic children, summaries and refresh

mod common;

use common::*;
use synthlens::memory::samples;
use synthlens::*;

fn names<H>(children: &[Child<H>]) -> Vec<&str> {
    children.iter().map(|child| child.name.as_str()).collect()
}

#[test]
fn test_dynamic_array_children() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let mut children = inspector.children(&image.symbol("numbers").unwrap()).unwrap();

    assert_eq!(children.num_children(), 8);
    let listed = children.children();
    assert_eq!(
        names(&listed),
        vec!["m_uiCount", "m_uiCapacity", "m_pAllocator", "[0]", "[1]", "[2]", "[3]", "[4]"]
    );
    let ChildValue::Value(third) = &listed[5].value else {
        panic!("elements are values");
    };
    assert_eq!(image.unsigned_value(third, 0), 3);
    assert!(children.child_at_index(8).is_none());
}

#[test]
fn test_display_limit_caps_element_children() {
    let image = samples::standard().unwrap();
    let config = EngineConfig::default().with_display_limit(4);
    let inspector = Inspector::new(&image, ShapeRegistry::with_defaults(), config);
    let mut children = inspector.children(&image.symbol("large").unwrap()).unwrap();

    assert_eq!(children.view().count(), 10);
    assert_eq!(children.num_children(), 3 + 4);
    assert_eq!(names(&children.children())[3..], ["[0]", "[1]", "[2]", "[3]"]);
}

#[test]
fn test_hybrid_string_children() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let mut children = inspector.children(&image.symbol("greeting").unwrap()).unwrap();

    let listed = children.children();
    assert_eq!(
        names(&listed),
        vec!["contents", "m_uiCount", "m_uiCharacterCount", "m_pAllocator"]
    );
    assert_eq!(listed[0].value, ChildValue::Content(b"hello".to_vec()));
    let ChildValue::Value(characters) = &listed[2].value else {
        panic!("header fields are values");
    };
    assert_eq!(image.unsigned_value(characters, 0), 5);
}

#[test]
fn test_string_view_has_single_child() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let mut children = inspector.children(&image.symbol("view").unwrap()).unwrap();

    assert_eq!(children.num_children(), 1);
    let contents = children.child_at_index(0).unwrap();
    assert_eq!(contents.name, provider::CONTENTS);
    assert_eq!(contents.value, ChildValue::Content(b"world".to_vec()));
}

#[test]
fn test_empty_string_view_has_no_content_child() {
    let mut builder = ImageBuilder::new();
    let value = samples::string_view(&mut builder, "").unwrap();
    let image = builder.finish();
    let inspector = inspector(&image);

    let mut children = inspector.children(&value).unwrap();
    assert_eq!(children.num_children(), 1);
    assert!(children.child_at_index(0).is_none());
    assert_eq!(inspector.summary(&value).as_deref(), Some("<empty>"));
}

#[test]
fn test_map_children_are_nodes_in_key_order() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let mut children = inspector.children(&image.symbol("lookup").unwrap()).unwrap();

    let listed = children.children();
    assert_eq!(
        names(&listed),
        vec!["m_uiCount", "[0]", "[1]", "[2]", "[3]", "[4]"]
    );
    let keys: Vec<u64> = listed[1..]
        .iter()
        .map(|child| match &child.value {
            ChildValue::Value(node) => node_key(&image, node),
            ChildValue::Content(_) => panic!("map elements are nodes"),
        })
        .collect();
    assert_eq!(keys, vec![1, 3, 5, 7, 9]);
}

#[test]
fn test_enum_summaries() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);

    let axis = image.symbol("axis").unwrap();
    assert_eq!(inspector.summary(&axis).as_deref(), Some("PositiveZ (2)"));
    let bad_axis = image.symbol("bad_axis").unwrap();
    assert_eq!(inspector.summary(&bad_axis).as_deref(), Some("? (42)"));
}

#[test]
fn test_enum_summary_without_type_information() {
    // LiveImage cannot look types up by name
    let live = LiveImage::new(samples::standard().unwrap());
    let axis = live.symbol("axis");
    let inspector = Inspector::new(&live, ShapeRegistry::with_defaults(), EngineConfig::default());
    assert_eq!(inspector.summary(&axis).as_deref(), Some("? (2)"));
}

#[test]
fn test_containers_without_summary() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    for symbol in ["numbers", "small", "lookup"] {
        let value = image.symbol(symbol).unwrap();
        assert_eq!(inspector.summary(&value), None, "{symbol}");
    }
}

#[test]
fn test_refresh_detects_header_change() {
    let live = LiveImage::new(samples::standard().unwrap());
    let array = live.symbol("numbers");
    let inspector = Inspector::new(&live, ShapeRegistry::with_defaults(), EngineConfig::default());
    let mut view = inspector.view(&array).unwrap();

    assert_eq!(view.count(), 5);
    assert!(!view.refresh().unwrap());

    live.set_field(array, "m_uiCount", 2);
    assert!(view.refresh().unwrap());
    assert_eq!(view.count(), 2);
    assert!(!view.refresh().unwrap());
}

#[test]
fn test_tree_update_drops_cached_cursor() {
    let live = LiveImage::new(samples::standard().unwrap());
    let map = live.symbol("lookup");
    let inspector = Inspector::new(&live, ShapeRegistry::with_defaults(), EngineConfig::default());
    let mut children = inspector.children(&map).unwrap();

    assert_eq!(children.num_children(), 6);
    assert!(children.child_at_index(1).is_some());

    live.set_field(map, "m_uiCount", 3);
    children.update().unwrap();
    assert_eq!(children.num_children(), 4);
    assert_eq!(children.view().stats().restarts, 0);
    assert_eq!(names(&children.children()), vec!["m_uiCount", "[0]", "[1]", "[2]"]);
}

#[test]
fn test_image_survives_json_round_trip() {
    let image = samples::standard().unwrap();
    let json = image.to_json_pretty().unwrap();
    let restored = MemoryImage::from_json(&json).unwrap();
    assert_eq!(restored, image);

    let inspector = inspector(&restored);
    let greeting = restored.symbol("greeting").unwrap();
    assert_eq!(inspector.summary(&greeting).as_deref(), Some("\"hello\""));
    let mut lookup = view(&inspector, &restored, "lookup");
    assert_eq!(keys_at(&mut lookup, 0..5), vec![1, 3, 5, 7, 9]);
}

#[test]
fn test_kind_of_standard_symbols() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let kind = |symbol: &str| inspector.kind_of(&image.symbol(symbol).unwrap()).ok();

    assert_eq!(kind("numbers"), Some(ContainerKind::DynamicArray));
    assert_eq!(kind("slice"), Some(ContainerKind::ArrayPointer));
    assert_eq!(kind("bytes"), Some(ContainerKind::ArrayPointer));
    assert_eq!(kind("small"), Some(ContainerKind::HybridArray));
    assert_eq!(kind("greeting"), Some(ContainerKind::HybridString));
    assert_eq!(kind("builder"), Some(ContainerKind::HybridString));
    assert_eq!(kind("view"), Some(ContainerKind::StringView));
    assert_eq!(kind("tags"), Some(ContainerKind::OrderedTree));
    assert_eq!(kind("axis"), None);
    assert_eq!(ContainerKind::OrderedTree.to_string(), "ordered-tree");
}

#[test]
fn test_config_round_trips_through_json() {
    let config = EngineConfig::default()
        .with_max_steps(32)
        .with_view_preview_limit(16);
    let json = serde_json::to_string(&config).unwrap();
    let restored: EngineConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, config);
}
