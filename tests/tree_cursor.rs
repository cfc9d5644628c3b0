//! Ordered map/set traversal over sentinel trees

mod common;

use common::*;
use synthlens::memory::samples::{self, TreeKind, TreeSample, TreeShape};
use synthlens::shape::{describe, Indexer};
use synthlens::tree::Direction;
use synthlens::*;

fn tree_image(keys: &[u32], shape: TreeShape) -> (MemoryImage, TreeSample) {
    let mut builder = ImageBuilder::new();
    let tree = samples::ordered_tree(&mut builder, TreeKind::Map, keys, shape).unwrap();
    (builder.finish(), tree)
}

fn cursor_for(image: &MemoryImage, tree: &TreeSample) -> OrderedTreeCursor<MemoryImage> {
    let descriptor = describe(
        image,
        ContainerKind::OrderedTree,
        &tree.value,
        &EngineConfig::default(),
    )
    .unwrap();
    match descriptor.indexer {
        Indexer::OrderedTree(cursor) => cursor,
        other => panic!("unexpected indexer {other:?}"),
    }
}

#[test]
fn test_keys_inserted_in_order_scenario() {
    let (image, tree) = tree_image(&[1, 3, 5, 7, 9], TreeShape::InsertionOrder);
    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();

    assert_eq!(view.count(), 5);
    assert_eq!(keys_at(&mut view, [0]), vec![1]);
    assert_eq!(keys_at(&mut view, [4]), vec![9]);
    assert_eq!(
        view.try_element_at(5),
        Err(LensError::OutOfRange { index: 5, count: 5 })
    );
}

#[test]
fn test_balanced_tree_yields_sorted_keys() {
    let keys: Vec<u32> = (0..100).map(|k| (k * 37) % 101).collect();
    let (image, tree) = tree_image(&keys, TreeShape::Balanced);
    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();

    let mut expected: Vec<u64> = keys.iter().map(|k| u64::from(*k)).collect();
    expected.sort_unstable();
    assert_eq!(keys_at(&mut view, 0..100), expected);
}

#[test]
fn test_degenerate_chain_yields_sorted_keys() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let mut view = view(&inspector, &image, "chain");
    assert_eq!(keys_at(&mut view, 0..32), (1..=32).collect::<Vec<u64>>());
}

#[test]
fn test_set_yields_sorted_keys() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let mut view = view(&inspector, &image, "tags");
    assert_eq!(view.count(), 4);
    assert_eq!(keys_at(&mut view, 0..4), vec![10, 20, 30, 40]);
}

#[test]
fn test_empty_tree() {
    let image = samples::standard().unwrap();
    let inspector = inspector(&image);
    let mut view = view(&inspector, &image, "no_entries");
    assert_eq!(view.count(), 0);
    assert_eq!(
        view.try_element_at(0),
        Err(LensError::OutOfRange { index: 0, count: 0 })
    );
}

#[test]
fn test_sequential_access_is_amortized() {
    let keys: Vec<u32> = (1..=20).collect();
    let (image, tree) = tree_image(&keys, TreeShape::Balanced);
    let inspector = inspector(&image);

    let mut forward = inspector.view(&tree.value).unwrap();
    let ascending = keys_at(&mut forward, 0..20);
    let stats = forward.stats();
    assert_eq!(stats.restarts, 1);
    assert_eq!(stats.cache_hits, 19);
    assert_eq!(stats.successor_steps, 19);

    let mut backward = inspector.view(&tree.value).unwrap();
    let mut descending = keys_at(&mut backward, (0..20).rev());
    let stats = backward.stats();
    assert_eq!(stats.restarts, 20);
    assert_eq!(stats.cache_hits, 0);
    assert_eq!(stats.successor_steps, 19 * 20 / 2);

    descending.reverse();
    assert_eq!(ascending, descending);
}

#[test]
fn test_out_of_range_keeps_cache() {
    let (image, tree) = tree_image(&[1, 2, 3, 4, 5], TreeShape::Balanced);
    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();

    assert_eq!(keys_at(&mut view, 0..3), vec![1, 2, 3]);
    assert!(view.try_element_at(99).is_err());
    assert_eq!(keys_at(&mut view, [3]), vec![4]);
    assert_eq!(view.stats().restarts, 1);
}

#[test]
fn test_invalidate_forces_restart() {
    let (image, tree) = tree_image(&[1, 2, 3, 4, 5], TreeShape::Balanced);
    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();

    keys_at(&mut view, 0..2);
    view.invalidate();
    assert_eq!(keys_at(&mut view, [2]), vec![3]);
    assert_eq!(view.stats().restarts, 2);
}

#[test]
fn test_descending_walk_via_predecessor() {
    let (image, tree) = tree_image(&[4, 2, 6, 1, 3, 5, 7], TreeShape::InsertionOrder);
    let mut cursor = cursor_for(&image, &tree);

    let mut keys = Vec::new();
    let mut node = cursor.rightmost(&image).unwrap();
    while let Some(current) = node {
        keys.push(node_key(&image, &current));
        node = cursor.predecessor(&image, &current).unwrap();
    }
    assert_eq!(keys, vec![7, 6, 5, 4, 3, 2, 1]);

    let first = cursor.leftmost(&image).unwrap().unwrap();
    assert_eq!(node_key(&image, &first), 1);
}

#[test]
fn test_self_linked_node_exhausts_step_guard() {
    let (mut image, tree) = tree_image(&[1, 3, 5, 7, 9], TreeShape::Balanced);
    let node = tree.node(1).unwrap();
    samples::set_link(&mut image, node, Direction::Left, node.address).unwrap();

    let config = EngineConfig::default().with_max_steps(64);
    let inspector = Inspector::new(&image, ShapeRegistry::with_defaults(), config);
    let mut view = inspector.view(&tree.value).unwrap();

    assert_eq!(view.try_element_at(0), Err(LensError::Exhausted { steps: 64 }));
    assert_eq!(view.element_at(0), Slot::Unavailable);
    assert_eq!(view.stats().exhausted, 2);
}

/// Key or error of each requested element
fn outcomes(
    view: &mut ContainerView<'_, MemoryImage>,
    indices: impl IntoIterator<Item = usize>,
) -> Vec<Result<u64, LensError>> {
    let image = view.accessor();
    indices
        .into_iter()
        .map(|index| view.try_element_at(index).map(|node| node_key(image, &node)))
        .collect()
}

fn is_exhausted(outcome: &Result<u64, LensError>) -> bool {
    matches!(outcome, Err(LensError::Exhausted { .. }))
}

/// Balanced {1,3,5,7,9} whose largest node links back to the root
fn looped_to_root(count: u64) -> (MemoryImage, TreeSample) {
    let (mut image, tree) = tree_image(&[1, 3, 5, 7, 9], TreeShape::Balanced);
    let last = tree.node(9).unwrap();
    let root = tree.node(5).unwrap();
    samples::set_link(&mut image, last, Direction::Right, root.address).unwrap();
    image.set_field(tree.value, "m_uiCount", count).unwrap();
    (image, tree)
}

#[test]
fn test_successor_cycle_is_detected_sequentially() {
    let (image, tree) = looped_to_root(12);
    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();

    let walked = outcomes(&mut view, 0..12);
    let keys: Vec<u64> = walked[..5].iter().map(|o| *o.as_ref().unwrap()).collect();
    assert_eq!(keys, vec![1, 3, 5, 7, 9]);
    assert!(walked[5..].iter().all(is_exhausted), "{walked:?}");
    assert_eq!(view.element_at(5), Slot::Unavailable);
}

#[test]
fn test_successor_cycle_is_detected_on_restart() {
    let (image, tree) = looped_to_root(50);
    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();

    assert_eq!(keys_at(&mut view, [4]), vec![9]);
    view.invalidate();
    for index in [5, 7, 40] {
        assert!(is_exhausted(&outcomes(&mut view, [index])[0]), "index {index}");
    }
}

#[test]
fn test_loop_back_to_ancestor_within_count() {
    // Chain 1 → 3 → 5 → 7 → 9; 7 now leads back to 1
    let (mut image, tree) = tree_image(&[1, 3, 5, 7, 9], TreeShape::InsertionOrder);
    let seventh = tree.node(7).unwrap();
    let first = tree.node(1).unwrap();
    samples::set_link(&mut image, seventh, Direction::Right, first.address).unwrap();

    let inspector = inspector(&image);

    let mut restarted = inspector.view(&tree.value).unwrap();
    assert!(is_exhausted(&outcomes(&mut restarted, [4])[0]));

    let mut sequential = inspector.view(&tree.value).unwrap();
    let walked = outcomes(&mut sequential, 0..5);
    assert_eq!(&walked[..4], &[Ok(1), Ok(3), Ok(5), Ok(7)][..]);
    assert!(is_exhausted(&walked[4]), "{walked:?}");
}

#[test]
fn test_loop_that_skips_first_node_is_detected() {
    // 9 leads to its own left child 7: 1 3 5 7 9 7 9 ...
    let (mut image, tree) = tree_image(&[1, 3, 5, 7, 9], TreeShape::Balanced);
    let last = tree.node(9).unwrap();
    let seventh = tree.node(7).unwrap();
    samples::set_link(&mut image, last, Direction::Right, seventh.address).unwrap();
    image.set_field(tree.value, "m_uiCount", 12).unwrap();

    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();
    let walked = outcomes(&mut view, 0..12);

    let produced: Vec<u64> = walked.iter().filter_map(|o| o.as_ref().ok().copied()).collect();
    assert_eq!(produced, vec![1, 3, 5, 7, 9]);
    assert!(walked[5..].iter().all(is_exhausted), "{walked:?}");
}

#[test]
fn test_node_without_identity_is_not_the_sentinel() {
    let image = samples::standard().unwrap();
    let live = LiveImage::new(image);
    let map = live.symbol("lookup");
    let first = {
        let image = live.0.borrow();
        let inspector = inspector(&image);
        let mut view = inspector.view(&map).unwrap();
        view.try_element_at(0).unwrap()
    };
    live.hide_address(first.address);

    let inspector = Inspector::new(&live, ShapeRegistry::with_defaults(), EngineConfig::default());
    let mut view = inspector.view(&map).unwrap();
    assert!(matches!(
        view.try_element_at(0),
        Err(LensError::AccessFailed(AccessError::Unreadable { .. }))
    ));
}

#[test]
fn test_sentinel_without_identity_fails_describe() {
    let live = LiveImage::new(samples::standard().unwrap());
    let map = live.symbol("lookup");
    let sentinel = live.0.borrow().field(&map, "m_NilNode").unwrap();
    live.hide_address(sentinel.address);

    let inspector = Inspector::new(&live, ShapeRegistry::with_defaults(), EngineConfig::default());
    assert!(matches!(
        inspector.view(&map),
        Err(LensError::AccessFailed(AccessError::Unreadable { .. }))
    ));
}

#[test]
fn test_node_that_is_not_its_parents_child() {
    let (mut image, tree) = tree_image(&[1, 3, 5, 7, 9], TreeShape::Balanced);
    // 1 claims 7 as parent; 7 has no child 1
    let orphan = tree.node(1).unwrap();
    let stranger = tree.node(7).unwrap();
    samples::set_parent(&mut image, orphan, stranger.address).unwrap();

    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();
    assert!(matches!(
        view.try_element_at(1),
        Err(LensError::AccessFailed(AccessError::Inconsistent(_)))
    ));
}

#[test]
fn test_tree_shorter_than_declared_count() {
    let (mut image, tree) = tree_image(&[1, 3, 5], TreeShape::Balanced);
    image.set_field(tree.value, "m_uiCount", 4).unwrap();

    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();
    assert_eq!(keys_at(&mut view, 0..3), vec![1, 3, 5]);
    assert!(matches!(
        view.try_element_at(3),
        Err(LensError::AccessFailed(AccessError::Inconsistent(_)))
    ));
}

#[test]
fn test_null_parent_is_treated_as_root() {
    let (mut image, tree) = tree_image(&[1, 3, 5, 7, 9], TreeShape::Balanced);
    samples::set_parent(&mut image, tree.node(5).unwrap(), 0).unwrap();

    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();
    assert_eq!(keys_at(&mut view, 0..5), vec![1, 3, 5, 7, 9]);
}

#[test]
fn test_null_child_link_is_unavailable() {
    let (mut image, tree) = tree_image(&[1, 3, 5], TreeShape::Balanced);
    samples::set_link(&mut image, tree.node(1).unwrap(), Direction::Right, 0).unwrap();

    let inspector = inspector(&image);
    let mut view = inspector.view(&tree.value).unwrap();
    assert!(matches!(
        view.try_element_at(1),
        Err(LensError::AccessFailed(AccessError::BadPointer { .. }))
    ));
    assert_eq!(keys_at(&mut view, [0]), vec![1]);
}
