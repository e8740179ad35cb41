//! Incremental depth-first walking over store edges
//!
//! A position in the tree is a [`Path`] of [`Step`]s from the root. Each
//! step records the edge slot it was reached through, so sibling moves are
//! index lookups into the parent's edge lists instead of full child scans.
//! Only the nodes on the requested route are ever touched.

use super::predicate::Predicate;
use super::TreeItem;
use crate::entity::{EdgeType, EntityId};
use crate::store::EntityStore;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Step {
    pub id: EntityId,
    /// Index into the window's edge list; 0 for the root
    pub slot: usize,
}

pub(crate) type Path = Vec<Step>;

pub(crate) struct Walker<'a> {
    pub store: &'a EntityStore,
    pub edges: &'a [EdgeType],
    pub collapsed: &'a HashSet<String>,
    pub filter: Option<&'a Predicate>,
    pub prune: Option<&'a Predicate>,
    pub search: Option<&'a str>,
}

impl Walker<'_> {
    pub fn key(&self, id: EntityId) -> String {
        self.store
            .get(id)
            .map(|entity| entity.key())
            .unwrap_or_default()
    }

    pub fn keys(&self, path: &[Step]) -> Vec<String> {
        path.iter().map(|step| self.key(step.id)).collect()
    }

    pub fn vuri(&self, path: &[Step]) -> String {
        self.keys(path).join("/")
    }

    pub fn is_collapsed(&self, path: &[Step]) -> bool {
        !self.collapsed.is_empty() && self.collapsed.contains(&self.vuri(path))
    }

    /// Pruned nodes and their subtrees are skipped entirely
    pub fn pruned(&self, id: EntityId) -> bool {
        match (self.prune, self.store.get(id)) {
            (Some(prune), Some(entity)) => prune.test(&entity),
            (_, None) => true,
            _ => false,
        }
    }

    /// Whether a walked node becomes an item
    pub fn shown(&self, id: EntityId) -> bool {
        let Some(entity) = self.store.get(id) else {
            return false;
        };
        if let Some(filter) = self.filter {
            if !filter.test(&entity) {
                return false;
            }
        }
        match self.search {
            Some(needle) => entity
                .display_name()
                .unwrap_or_else(|| entity.key())
                .to_lowercase()
                .contains(needle),
            None => true,
        }
    }

    fn admissible(&self, ancestors: &[Step], id: EntityId) -> bool {
        !ancestors.iter().any(|step| step.id == id) && !self.pruned(id)
    }

    fn scan_forward(&self, parent: &[Step], slot: usize, pos: usize) -> Option<Step> {
        let owner = parent.last()?.id;
        let mut slot = slot;
        let mut pos = pos;
        while slot < self.edges.len() {
            let edge = self.edges[slot];
            let len = self.store.edge_len(owner, edge);
            while pos < len {
                if let Some(id) = self.store.edge_at(owner, edge, pos) {
                    if self.admissible(parent, id) {
                        return Some(Step { id, slot });
                    }
                }
                pos += 1;
            }
            slot += 1;
            pos = 0;
        }
        None
    }

    fn scan_backward(&self, parent: &[Step], slot: usize, end: usize) -> Option<Step> {
        let owner = parent.last()?.id;
        let mut slot = slot;
        let mut end = end;
        loop {
            let edge = self.edges.get(slot).copied()?;
            while end > 0 {
                end -= 1;
                if let Some(id) = self.store.edge_at(owner, edge, end) {
                    if self.admissible(parent, id) {
                        return Some(Step { id, slot });
                    }
                }
            }
            if slot == 0 {
                return None;
            }
            slot -= 1;
            end = self.store.edge_len(owner, self.edges[slot]);
        }
    }

    pub fn first_child(&self, path: &[Step]) -> Option<Step> {
        self.scan_forward(path, 0, 0)
    }

    pub fn last_child(&self, path: &[Step]) -> Option<Step> {
        let slot = self.edges.len().checked_sub(1)?;
        let owner = path.last()?.id;
        self.scan_backward(path, slot, self.store.edge_len(owner, self.edges[slot]))
    }

    fn sibling_position(&self, path: &[Step]) -> Option<(usize, usize)> {
        let (current, parent) = split(path)?;
        let edge = self.edges.get(current.slot).copied()?;
        let pos = self
            .store
            .edge_position(parent.last()?.id, edge, current.id)?;
        Some((current.slot, pos))
    }

    fn next_sibling(&self, path: &[Step]) -> Option<Step> {
        let (slot, pos) = self.sibling_position(path)?;
        self.scan_forward(&path[..path.len() - 1], slot, pos + 1)
    }

    fn prev_sibling(&self, path: &[Step]) -> Option<Step> {
        let (slot, pos) = self.sibling_position(path)?;
        self.scan_backward(&path[..path.len() - 1], slot, pos)
    }

    /// Next walked node in preorder, hidden or not
    fn raw_next(&self, path: &[Step]) -> Option<Path> {
        if !self.is_collapsed(path) {
            if let Some(child) = self.first_child(path) {
                let mut next = path.to_vec();
                next.push(child);
                return Some(next);
            }
        }
        let mut cursor = path.to_vec();
        while cursor.len() > 1 {
            if let Some(sibling) = self.next_sibling(&cursor) {
                if let Some(last) = cursor.last_mut() {
                    *last = sibling;
                }
                return Some(cursor);
            }
            cursor.pop();
        }
        None
    }

    /// Previous walked node in preorder, hidden or not
    fn raw_prev(&self, path: &[Step]) -> Option<Path> {
        if path.len() <= 1 {
            return None;
        }
        let Some(sibling) = self.prev_sibling(path) else {
            return Some(path[..path.len() - 1].to_vec());
        };
        let mut cursor = path.to_vec();
        if let Some(last) = cursor.last_mut() {
            *last = sibling;
        }
        while !self.is_collapsed(&cursor) {
            match self.last_child(&cursor) {
                Some(child) => cursor.push(child),
                None => break,
            }
        }
        Some(cursor)
    }

    pub fn next_visible(&self, path: &[Step]) -> Option<Path> {
        let mut cursor = self.raw_next(path)?;
        while !self.shown(cursor.last()?.id) {
            cursor = self.raw_next(&cursor)?;
        }
        Some(cursor)
    }

    pub fn prev_visible(&self, path: &[Step]) -> Option<Path> {
        let mut cursor = self.raw_prev(path)?;
        while !self.shown(cursor.last()?.id) {
            cursor = self.raw_prev(&cursor)?;
        }
        Some(cursor)
    }

    /// Whether `path` is reachable: no proper ancestor is collapsed
    pub fn reachable(&self, path: &[Step]) -> bool {
        (1..path.len()).all(|depth| !self.is_collapsed(&path[..depth]))
    }

    /// Longest still-valid prefix of `previous`, relocated to a visible node
    ///
    /// The prefix stops at removed edges, pruned nodes and collapsed
    /// ancestors. If its last node is hidden the nearest visible node after
    /// it (or else before it) is used.
    pub fn settle(&self, root: EntityId, previous: Option<&[Step]>) -> Option<Path> {
        if self.pruned(root) {
            return None;
        }
        let mut valid = vec![Step { id: root, slot: 0 }];
        if let Some(previous) = previous.filter(|p| p.first().map(|s| s.id) == Some(root)) {
            for step in &previous[1..] {
                if self.is_collapsed(&valid) {
                    break;
                }
                let parent = valid[valid.len() - 1].id;
                let Some(edge) = self.edges.get(step.slot).copied() else {
                    break;
                };
                if self.store.edge_position(parent, edge, step.id).is_none()
                    || !self.admissible(&valid, step.id)
                {
                    break;
                }
                valid.push(*step);
            }
        }
        if valid.last().is_some_and(|step| self.shown(step.id)) {
            return Some(valid);
        }
        self.next_visible(&valid)
            .or_else(|| self.prev_visible(&valid))
    }

    /// Resolve a `/`-joined key path starting at the root
    pub fn resolve(&self, root: EntityId, vuri: &str) -> Option<Path> {
        let mut keys = vuri.split('/');
        if keys.next()? != self.key(root) || self.pruned(root) {
            return None;
        }
        let mut path = vec![Step { id: root, slot: 0 }];
        for key in keys {
            let mut child = self.first_child(&path);
            loop {
                let step = child?;
                if self.key(step.id) == key {
                    path.push(step);
                    break;
                }
                let mut sibling = path.clone();
                sibling.push(step);
                child = self.next_sibling(&sibling);
            }
        }
        Some(path)
    }

    pub fn item(&self, path: &[Step]) -> Option<TreeItem> {
        let last = path.last()?;
        let entity = self.store.get(last.id)?;
        let keys = self.keys(path);
        let vuri = keys.join("/");
        Some(TreeItem {
            collapsed: self.collapsed.contains(&vuri),
            has_children: self.first_child(path).is_some(),
            depth: path.len() - 1,
            pathkeys: keys[..keys.len() - 1].to_vec(),
            vuri,
            entity,
        })
    }
}

fn split(path: &[Step]) -> Option<(&Step, &[Step])> {
    if path.len() < 2 {
        return None;
    }
    path.split_last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Link;
    use crate::testing::Node;

    fn walker<'a>(store: &'a EntityStore, collapsed: &'a HashSet<String>) -> Walker<'a> {
        Walker {
            store,
            edges: &["children"],
            collapsed,
            filter: None,
            prune: None,
            search: None,
        }
    }

    #[test]
    fn test_preorder_walk_both_directions() {
        let store = EntityStore::new();
        let root = store.add(Node::new("dap:r", "r"), &[]).unwrap();
        let a = store
            .add(Node::new("dap:r/a", "a"), &[Link::From(root.id(), "children")])
            .unwrap();
        store
            .add(Node::new("dap:r/a/x", "x"), &[Link::From(a.id(), "children")])
            .unwrap();
        store
            .add(Node::new("dap:r/b", "b"), &[Link::From(root.id(), "children")])
            .unwrap();

        let collapsed = HashSet::new();
        let walk = walker(&store, &collapsed);
        let mut cursor = vec![Step { id: root.id(), slot: 0 }];
        let mut forward = vec![walk.vuri(&cursor)];
        while let Some(next) = walk.next_visible(&cursor) {
            forward.push(walk.vuri(&next));
            cursor = next;
        }
        assert_eq!(forward, vec!["r", "r/a", "r/a/x", "r/b"]);

        let mut backward = vec![walk.vuri(&cursor)];
        while let Some(prev) = walk.prev_visible(&cursor) {
            backward.push(walk.vuri(&prev));
            cursor = prev;
        }
        assert_eq!(backward, vec!["r/b", "r/a/x", "r/a", "r"]);
    }

    #[test]
    fn test_collapsed_node_is_not_descended() {
        let store = EntityStore::new();
        let root = store.add(Node::new("dap:r", "r"), &[]).unwrap();
        let a = store
            .add(Node::new("dap:r/a", "a"), &[Link::From(root.id(), "children")])
            .unwrap();
        store
            .add(Node::new("dap:r/a/x", "x"), &[Link::From(a.id(), "children")])
            .unwrap();

        let collapsed: HashSet<String> = ["r/a".to_string()].into_iter().collect();
        let walk = walker(&store, &collapsed);
        let start = vec![Step { id: root.id(), slot: 0 }];
        let a_path = walk.next_visible(&start).unwrap();
        assert_eq!(walk.vuri(&a_path), "r/a");
        assert!(walk.next_visible(&a_path).is_none());

        let x_path = walk.resolve(root.id(), "r/a/x").unwrap();
        assert!(!walk.reachable(&x_path));
        assert_eq!(walk.settle(root.id(), Some(&x_path)), Some(a_path));
    }
}
