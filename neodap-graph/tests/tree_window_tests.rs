//! Integration tests for bounded tree windows

use neodap_graph::testing::Node;
use neodap_graph::{EntityStore, Link, TreeError, TreeWindow, TreeWindowOptions};
use proptest::prelude::*;

const FANOUT: usize = 100;

/// root with `FANOUT` children of `FANOUT` grandchildren each
fn wide_tree() -> (EntityStore, Vec<String>) {
    let store = EntityStore::new();
    let root = store.add(Node::new("dap:root", "root"), &[]).unwrap();
    let mut preorder = vec!["root".to_string()];
    for c in 0..FANOUT {
        let child = store
            .add(
                Node::new(format!("dap:root/c{c}"), format!("child {c}")),
                &[Link::From(root.id(), "children")],
            )
            .unwrap();
        preorder.push(format!("root/c{c}"));
        for g in 0..FANOUT {
            store
                .add(
                    Node::new(format!("dap:root/c{c}/g{g}"), format!("grandchild {g}")),
                    &[Link::From(child.id(), "children")],
                )
                .unwrap();
            preorder.push(format!("root/c{c}/g{g}"));
        }
    }
    store.scheduler().flush();
    (store, preorder)
}

#[derive(Debug, Clone)]
enum Move {
    Down,
    Up,
    Jump(usize),
}

fn moves() -> impl Strategy<Value = Vec<Move>> {
    prop::collection::vec(
        prop_oneof![
            4 => Just(Move::Down),
            2 => Just(Move::Up),
            1 => (0usize..FANOUT).prop_map(Move::Jump),
        ],
        1..80,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6))]

    #[test]
    fn prop_viewport_is_bounded_on_large_trees(
        above in 0usize..25,
        below in 0usize..25,
        script in moves(),
    ) {
        let (store, preorder) = wide_tree();
        prop_assert!(store.len() > 10_000);

        let options = TreeWindowOptions::new(["children"]).above(above).below(below);
        let tree = TreeWindow::new(&store, "dap:root", options);
        let mut index = 0usize;

        for step in script {
            match step {
                Move::Down => match tree.move_down() {
                    Ok(_) => index += 1,
                    Err(err) => prop_assert_eq!(err, TreeError::AtEnd),
                },
                Move::Up => match tree.move_up() {
                    Ok(_) => index -= 1,
                    Err(err) => prop_assert_eq!(err, TreeError::AtStart),
                },
                Move::Jump(c) => {
                    let target = format!("root/c{c}/g{}", FANOUT / 2);
                    tree.focus_on(&target).unwrap();
                    index = preorder.iter().position(|v| *v == target).unwrap();
                }
            }

            let info = tree.info();
            prop_assert!(info.viewport <= above + 1 + below);
            prop_assert_eq!(tree.items().len(), info.viewport);
            prop_assert!(info.tracked <= info.viewport * 3);
            prop_assert_eq!(info.focus.as_deref(), Some(preorder[index].as_str()));
        }
    }
}

#[test]
fn test_window_reports_truncation() {
    let (store, _) = wide_tree();
    let options = TreeWindowOptions::new(["children"]).above(3).below(3);
    let tree = TreeWindow::new(&store, "dap:root", options);

    let info = tree.info();
    assert_eq!(info.viewport, 4);
    assert_eq!(info.focus_index, Some(0));
    assert!(!info.more_above);
    assert!(info.more_below);

    tree.focus_on("root/c50/g50").unwrap();
    let info = tree.info();
    assert_eq!(info.viewport, 7);
    assert_eq!(info.focus_index, Some(3));
    assert!(info.more_above && info.more_below);
    assert_eq!(info.tracked, 9);
}

#[test]
fn test_scroll_margin_triggers_rebuild() {
    let (store, _) = wide_tree();
    let options = TreeWindowOptions::new(["children"])
        .above(5)
        .below(5)
        .scroll_margin(2);
    let tree = TreeWindow::new(&store, "dap:root", options);
    tree.focus_on("root/c10/g10").unwrap();
    let rebuilt = tree.rebuild_count();

    tree.move_down().unwrap();
    tree.move_down().unwrap();
    assert_eq!(tree.rebuild_count(), rebuilt);

    tree.move_down().unwrap();
    tree.move_down().unwrap();
    assert!(tree.rebuild_count() > rebuilt);
    assert_eq!(tree.info().focus_index, Some(5));
}

#[test]
fn test_collapse_focus_and_expand_rules() {
    let (store, _) = wide_tree();
    let options = TreeWindowOptions::new(["children"]).above(2).below(2);
    let tree = TreeWindow::new(&store, "dap:root", options);

    tree.focus_on("root/c3/g7").unwrap();
    tree.collapse("root/c3/g7");
    tree.collapse("root/c3");
    assert_eq!(tree.info().focus.as_deref(), Some("root/c3"));
    assert_eq!(
        tree.items().iter().map(|i| i.vuri.as_str()).collect::<Vec<_>>(),
        vec!["root/c2/g98", "root/c2/g99", "root/c3", "root/c4", "root/c4/g0"]
    );

    tree.expand("root/c3");
    assert!(tree.is_collapsed("root/c3/g7"));
    assert!(!tree.is_collapsed("root/c3"));

    assert!(tree.toggle("root/c4"));
    assert!(!tree.toggle("root/c4"));
}

#[test]
fn test_new_children_arrive_after_debounce() {
    let store = EntityStore::new();
    let tree = TreeWindow::new(&store, "dap:root", TreeWindowOptions::new(["children"]));
    assert!(tree.items().is_empty());

    let root = store.add(Node::new("dap:root", "root"), &[]).unwrap();
    store
        .add(Node::new("dap:root/a", "a"), &[Link::From(root.id(), "children")])
        .unwrap();
    assert!(tree.items().is_empty());

    store.scheduler().flush();
    assert_eq!(tree.items().len(), 2);
}
