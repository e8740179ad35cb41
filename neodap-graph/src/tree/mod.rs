//! Bounded-viewport tree projection over store edges
//!
//! A [`TreeWindow`] shows the depth-first, insertion-ordered tree reachable
//! from a root entity over a fixed list of edge types. Only a window of
//! `above + 1 + below` items around the focused node is materialized. The
//! walk touches the nodes it emits plus their ancestor paths, so the cost
//! of a rebuild does not depend on the size of the tree.
//!
//! Items are addressed by virtual URI: the `/`-joined entity keys from the
//! root. Collapse state is keyed by virtual URI, so it is independent per
//! node (expanding an ancestor never expands a collapsed descendant).
//!
//! Store mutations on the followed edge types and entity removals schedule
//! a debounced rebuild on the store's [`Scheduler`](neodap_reactive::Scheduler).
//! User operations rebuild synchronously.

mod predicate;
mod walk;

pub use predicate::PredicateFn;

use crate::entity::{EdgeType, EntityRef};
use crate::store::{EntityStore, StoreEvent, Topic};
use neodap_reactive::{Disposable, MaybeSignal, Signal, Subscription, TaskKey};
use predicate::Predicate;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::debug;
use walk::{Path, Step, Walker};

/// Navigation and lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("already at the last item")]
    AtEnd,

    #[error("already at the first item")]
    AtStart,

    #[error("{0} has no children")]
    Leaf(String),

    #[error("already at the root")]
    AtRoot,

    #[error("no node at {0}")]
    NotFound(String),

    #[error("{0} is hidden")]
    Hidden(String),

    #[error("the window has no focus")]
    NoFocus,

    #[error("the window has been disposed")]
    Disposed,
}

/// Result type using TreeError
pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// Shape of a [`TreeWindow`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeWindowOptions {
    /// Edge types walked from every node, in order
    pub edges: Vec<EdgeType>,
    /// Items kept before the focus
    pub above: usize,
    /// Items kept after the focus
    pub below: usize,
    /// Distance from a truncated window edge that triggers a rebuild;
    /// defaults to `min(above, below)`
    pub scroll_margin: Option<usize>,
}

impl Default for TreeWindowOptions {
    fn default() -> Self {
        Self {
            edges: Vec::new(),
            above: 50,
            below: 50,
            scroll_margin: None,
        }
    }
}

impl TreeWindowOptions {
    pub fn new(edges: impl IntoIterator<Item = EdgeType>) -> Self {
        Self {
            edges: edges.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn above(mut self, above: usize) -> Self {
        self.above = above;
        self
    }

    pub fn below(mut self, below: usize) -> Self {
        self.below = below;
        self
    }

    pub fn scroll_margin(mut self, margin: usize) -> Self {
        self.scroll_margin = Some(margin);
        self
    }

    fn margin(&self) -> usize {
        self.scroll_margin
            .unwrap_or_else(|| self.above.min(self.below))
    }

    /// Upper bound on the number of items
    pub fn capacity(&self) -> usize {
        self.above + 1 + self.below
    }
}

/// One materialized row
#[derive(Debug, Clone, PartialEq)]
pub struct TreeItem {
    /// Virtual URI: `/`-joined keys from the root
    pub vuri: String,
    pub entity: EntityRef,
    pub depth: usize,
    /// Keys of the ancestors, root first
    pub pathkeys: Vec<String>,
    pub collapsed: bool,
    pub has_children: bool,
}

/// Snapshot of the window state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeInfo {
    pub focus: Option<String>,
    pub focus_index: Option<usize>,
    /// Number of materialized items
    pub viewport: usize,
    /// Items plus the distinct ancestor paths they hang from
    pub tracked: usize,
    pub more_above: bool,
    pub more_below: bool,
}

#[derive(Default)]
struct Window {
    paths: Vec<Path>,
    focus_index: Option<usize>,
    more_above: bool,
    more_below: bool,
    tracked: usize,
}

struct TreeInner {
    store: EntityStore,
    root_uri: String,
    options: TreeWindowOptions,
    task: TaskKey,
    collapsed: RefCell<HashSet<String>>,
    filter: RefCell<Option<Predicate>>,
    prune: RefCell<Option<Predicate>>,
    search: RefCell<Option<String>>,
    focus: RefCell<Option<Path>>,
    window: RefCell<Window>,
    items: Signal<Vec<TreeItem>>,
    subscriptions: RefCell<Vec<Subscription>>,
    rebuilds: Cell<u64>,
    disposed: Cell<bool>,
}

impl TreeInner {
    fn walk<R>(&self, f: impl FnOnce(&Walker<'_>) -> R) -> R {
        let collapsed = self.collapsed.borrow();
        let filter = self.filter.borrow();
        let prune = self.prune.borrow();
        let search = self.search.borrow();
        let walker = Walker {
            store: &self.store,
            edges: &self.options.edges,
            collapsed: &collapsed,
            filter: filter.as_ref(),
            prune: prune.as_ref(),
            search: search.as_deref(),
        };
        f(&walker)
    }

    fn schedule(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        let weak = Rc::downgrade(self);
        self.store.scheduler().schedule(self.task, move || {
            if let Some(inner) = weak.upgrade() {
                inner.rebuild();
            }
        });
    }

    fn rebuild(&self) {
        if self.disposed.get() {
            return;
        }
        self.store.scheduler().cancel(self.task);
        let root = self.store.get_by_uri(&self.root_uri).map(|entity| entity.id());
        let previous = self.focus.borrow().clone();

        let (window, focus, items) = self.walk(|walker| {
            let Some(focus) = root.and_then(|root| walker.settle(root, previous.as_deref()))
            else {
                return (Window::default(), None, Vec::new());
            };

            let mut above = Vec::new();
            let mut cursor = focus.clone();
            while above.len() < self.options.above {
                match walker.prev_visible(&cursor) {
                    Some(prev) => {
                        cursor = prev.clone();
                        above.push(prev);
                    }
                    None => break,
                }
            }
            let more_above = walker.prev_visible(&cursor).is_some();

            let mut below = Vec::new();
            let mut cursor = focus.clone();
            while below.len() < self.options.below {
                match walker.next_visible(&cursor) {
                    Some(next) => {
                        cursor = next.clone();
                        below.push(next);
                    }
                    None => break,
                }
            }
            let more_below = walker.next_visible(&cursor).is_some();

            let focus_index = above.len();
            let mut paths: Vec<Path> = above.into_iter().rev().collect();
            paths.push(focus.clone());
            paths.extend(below);

            let tracked = {
                let mut prefixes: HashSet<&[Step]> = HashSet::new();
                for path in &paths {
                    for depth in 1..=path.len() {
                        prefixes.insert(&path[..depth]);
                    }
                }
                prefixes.len()
            };

            let items: Vec<TreeItem> = paths.iter().filter_map(|path| walker.item(path)).collect();
            let window = Window {
                focus_index: Some(focus_index),
                more_above,
                more_below,
                tracked,
                paths,
            };
            (window, Some(focus), items)
        });

        debug!(
            root = %self.root_uri,
            viewport = items.len(),
            tracked = window.tracked,
            "tree window rebuilt"
        );
        *self.focus.borrow_mut() = focus;
        *self.window.borrow_mut() = window;
        self.rebuilds.set(self.rebuilds.get() + 1);
        self.items.set(items);
    }

    fn near_edge(&self, index: usize) -> bool {
        let window = self.window.borrow();
        let margin = self.options.margin();
        let after = window.paths.len().saturating_sub(index + 1);
        (window.more_above && index < margin) || (window.more_below && after < margin)
    }

    fn move_focus(&self, path: Path) -> TreeResult<TreeItem> {
        *self.focus.borrow_mut() = Some(path.clone());
        let position = self.window.borrow().paths.iter().position(|p| *p == path);
        match position {
            Some(index) if !self.near_edge(index) => {
                self.window.borrow_mut().focus_index = Some(index);
            }
            _ => self.rebuild(),
        }
        self.focused_item().ok_or(TreeError::NoFocus)
    }

    fn focused_item(&self) -> Option<TreeItem> {
        let index = self.window.borrow().focus_index?;
        self.items.with(|items| items.get(index).cloned())
    }

    fn current_focus(&self) -> TreeResult<Path> {
        if self.disposed.get() {
            return Err(TreeError::Disposed);
        }
        self.focus.borrow().clone().ok_or(TreeError::NoFocus)
    }

    fn predicate(self: &Rc<Self>, eval: PredicateFn) -> Predicate {
        let weak: Weak<Self> = Rc::downgrade(self);
        Predicate::new(
            eval,
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.schedule();
                }
            }),
        )
    }
}

/// A budgeted, navigable window over a tree of entities
#[derive(Clone)]
pub struct TreeWindow {
    inner: Rc<TreeInner>,
}

impl TreeWindow {
    /// Build a window rooted at the entity with `root_uri`
    ///
    /// The root may be added later; the window stays empty until then.
    pub fn new(store: &EntityStore, root_uri: impl Into<String>, options: TreeWindowOptions) -> Self {
        let inner = Rc::new(TreeInner {
            store: store.clone(),
            root_uri: root_uri.into(),
            task: store.scheduler().key(),
            options,
            collapsed: RefCell::new(HashSet::new()),
            filter: RefCell::new(None),
            prune: RefCell::new(None),
            search: RefCell::new(None),
            focus: RefCell::new(None),
            window: RefCell::new(Window::default()),
            items: Signal::new(Vec::new()),
            subscriptions: RefCell::new(Vec::new()),
            rebuilds: Cell::new(0),
            disposed: Cell::new(false),
        });

        let weak = Rc::downgrade(&inner);
        let subscription = store.watch(Topic::All, move |event| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let relevant = match event {
                StoreEvent::EdgeAdded { edge, .. } | StoreEvent::EdgeRemoved { edge, .. } => {
                    inner.options.edges.contains(edge)
                }
                StoreEvent::Removed(entity) => {
                    for slot in [&inner.filter, &inner.prune] {
                        if let Some(predicate) = slot.borrow().as_ref() {
                            predicate.forget(entity.id());
                        }
                    }
                    true
                }
                StoreEvent::Added(entity) => entity.uri() == inner.root_uri,
                StoreEvent::Rebucketed { .. } => false,
            };
            if relevant {
                inner.schedule();
            }
        });
        inner.subscriptions.borrow_mut().push(subscription);

        inner.rebuild();
        Self { inner }
    }

    pub fn root_uri(&self) -> &str {
        &self.inner.root_uri
    }

    pub fn options(&self) -> &TreeWindowOptions {
        &self.inner.options
    }

    /// Materialized items, top to bottom
    pub fn items(&self) -> Vec<TreeItem> {
        self.inner.items.get()
    }

    /// Signal updated after every rebuild that changes the items
    pub fn items_signal(&self) -> Signal<Vec<TreeItem>> {
        self.inner.items.clone()
    }

    /// The focused item
    pub fn focus(&self) -> Option<TreeItem> {
        self.inner.focused_item()
    }

    pub fn info(&self) -> TreeInfo {
        let window = self.inner.window.borrow();
        TreeInfo {
            focus: self.inner.focused_item().map(|item| item.vuri),
            focus_index: window.focus_index,
            viewport: window.paths.len(),
            tracked: window.tracked,
            more_above: window.more_above,
            more_below: window.more_below,
        }
    }

    /// Number of rebuilds performed so far
    pub fn rebuild_count(&self) -> u64 {
        self.inner.rebuilds.get()
    }

    /// Rebuild now, dropping any scheduled rebuild
    pub fn refresh(&self) {
        self.inner.rebuild();
    }

    // ---- navigation ----

    pub fn move_down(&self) -> TreeResult<TreeItem> {
        let focus = self.inner.current_focus()?;
        let next = self
            .inner
            .walk(|walker| walker.next_visible(&focus))
            .ok_or(TreeError::AtEnd)?;
        self.inner.move_focus(next)
    }

    pub fn move_up(&self) -> TreeResult<TreeItem> {
        let focus = self.inner.current_focus()?;
        let prev = self
            .inner
            .walk(|walker| walker.prev_visible(&focus))
            .ok_or(TreeError::AtStart)?;
        self.inner.move_focus(prev)
    }

    /// Focus the first child, expanding the focus if it is collapsed
    pub fn move_into(&self) -> TreeResult<TreeItem> {
        let focus = self.inner.current_focus()?;
        let (vuri, child) = self
            .inner
            .walk(|walker| (walker.vuri(&focus), walker.first_child(&focus)));
        let Some(child) = child else {
            return Err(TreeError::Leaf(vuri));
        };
        self.inner.collapsed.borrow_mut().remove(&vuri);

        let mut path = focus;
        path.push(child);
        let target = self.inner.walk(|walker| {
            if walker.shown(child.id) {
                Some(path.clone())
            } else {
                walker.next_visible(&path)
            }
        });
        *self.inner.focus.borrow_mut() = Some(target.unwrap_or(path));
        self.inner.rebuild();
        self.focus().ok_or(TreeError::NoFocus)
    }

    /// Focus the nearest visible ancestor
    pub fn move_out(&self) -> TreeResult<TreeItem> {
        let focus = self.inner.current_focus()?;
        let parent = self.inner.walk(|walker| {
            (1..focus.len())
                .rev()
                .map(|depth| focus[..depth].to_vec())
                .find(|prefix| prefix.last().is_some_and(|step| walker.shown(step.id)))
        });
        self.inner.move_focus(parent.ok_or(TreeError::AtRoot)?)
    }

    /// Jump to the node at `vuri`
    pub fn focus_on(&self, vuri: &str) -> TreeResult<TreeItem> {
        if self.inner.disposed.get() {
            return Err(TreeError::Disposed);
        }
        let root = self
            .inner
            .store
            .get_by_uri(&self.inner.root_uri)
            .ok_or_else(|| TreeError::NotFound(vuri.to_string()))?;
        let path = self.inner.walk(|walker| {
            let path = walker
                .resolve(root.id(), vuri)
                .ok_or_else(|| TreeError::NotFound(vuri.to_string()))?;
            let visible = walker.reachable(&path)
                && path.last().is_some_and(|step| walker.shown(step.id));
            if visible {
                Ok(path)
            } else {
                Err(TreeError::Hidden(vuri.to_string()))
            }
        })?;
        self.inner.move_focus(path)
    }

    // ---- collapse state ----

    /// Hide the descendants of `vuri`
    ///
    /// If the focus is inside the collapsed subtree it moves to `vuri`.
    /// Returns false if it was already collapsed.
    pub fn collapse(&self, vuri: &str) -> bool {
        if !self.inner.collapsed.borrow_mut().insert(vuri.to_string()) {
            return false;
        }
        let prefix = format!("{vuri}/");
        let relocated = {
            let focus = self.inner.focus.borrow();
            focus.as_ref().and_then(|path| {
                let current = self.inner.walk(|walker| walker.vuri(path));
                current
                    .starts_with(&prefix)
                    .then(|| path[..vuri.split('/').count()].to_vec())
            })
        };
        if let Some(path) = relocated {
            *self.inner.focus.borrow_mut() = Some(path);
        }
        self.inner.rebuild();
        true
    }

    /// Show the descendants of `vuri`; nested collapsed nodes stay collapsed
    pub fn expand(&self, vuri: &str) -> bool {
        let changed = self.inner.collapsed.borrow_mut().remove(vuri);
        if changed {
            self.inner.rebuild();
        }
        changed
    }

    /// Flip the collapse state, returning the new state
    pub fn toggle(&self, vuri: &str) -> bool {
        if self.is_collapsed(vuri) {
            self.expand(vuri);
            false
        } else {
            self.collapse(vuri);
            true
        }
    }

    pub fn is_collapsed(&self, vuri: &str) -> bool {
        self.inner.collapsed.borrow().contains(vuri)
    }

    // ---- visibility ----

    /// Hide nodes for which `predicate` is false; their descendants are
    /// still walked
    pub fn set_filter(&self, predicate: impl Fn(&EntityRef) -> MaybeSignal<bool> + 'static) {
        let predicate = self.inner.predicate(Rc::new(predicate));
        let previous = self.inner.filter.borrow_mut().replace(predicate);
        drop(previous);
        self.inner.rebuild();
    }

    pub fn clear_filter(&self) {
        let previous = self.inner.filter.borrow_mut().take();
        if previous.is_some() {
            drop(previous);
            self.inner.rebuild();
        }
    }

    /// Show only nodes whose display name contains `text`, ignoring case
    pub fn set_search(&self, text: &str) {
        *self.inner.search.borrow_mut() = Some(text.to_lowercase());
        self.inner.rebuild();
    }

    pub fn clear_search(&self) {
        let previous = self.inner.search.borrow_mut().take();
        if previous.is_some() {
            self.inner.rebuild();
        }
    }

    /// Skip every subtree whose root satisfies `predicate`
    pub fn prune(&self, predicate: impl Fn(&EntityRef) -> MaybeSignal<bool> + 'static) {
        let predicate = self.inner.predicate(Rc::new(predicate));
        let previous = self.inner.prune.borrow_mut().replace(predicate);
        drop(previous);
        self.inner.rebuild();
    }

    pub fn clear_prune(&self) {
        let previous = self.inner.prune.borrow_mut().take();
        if previous.is_some() {
            drop(previous);
            self.inner.rebuild();
        }
    }
}

impl Disposable for TreeWindow {
    fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.store.scheduler().cancel(self.inner.task);
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.borrow_mut());
        drop(subscriptions);
        let filter = self.inner.filter.borrow_mut().take();
        let prune = self.inner.prune.borrow_mut().take();
        drop((filter, prune));
        *self.inner.focus.borrow_mut() = None;
        *self.inner.window.borrow_mut() = Window::default();
        self.inner.items.set(Vec::new());
        self.inner.items.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl fmt::Debug for TreeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeWindow")
            .field("root", &self.inner.root_uri)
            .field("info", &self.info())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Link;
    use crate::testing::Node;

    /// r
    /// ├── a
    /// │   ├── a1
    /// │   └── a2
    /// └── b
    ///     └── b1
    fn sample() -> EntityStore {
        let store = EntityStore::new();
        let r = store.add(Node::new("dap:r", "root"), &[]).unwrap();
        let a = store
            .add(Node::new("dap:r/a", "Alpha"), &[Link::From(r.id(), "children")])
            .unwrap();
        for name in ["a1", "a2"] {
            store
                .add(
                    Node::new(format!("dap:r/a/{name}"), name),
                    &[Link::From(a.id(), "children")],
                )
                .unwrap();
        }
        let b = store
            .add(Node::new("dap:r/b", "Beta"), &[Link::From(r.id(), "children")])
            .unwrap();
        store
            .add(Node::new("dap:r/b/b1", "b1"), &[Link::From(b.id(), "children")])
            .unwrap();
        store
    }

    fn vuris(tree: &TreeWindow) -> Vec<String> {
        tree.items().into_iter().map(|item| item.vuri).collect()
    }

    #[test]
    fn test_full_tree_in_dfs_order() {
        let store = sample();
        let tree = TreeWindow::new(&store, "dap:r", TreeWindowOptions::new(["children"]));

        assert_eq!(vuris(&tree), vec!["r", "r/a", "r/a/a1", "r/a/a2", "r/b", "r/b/b1"]);
        let items = tree.items();
        assert_eq!(items[2].depth, 2);
        assert_eq!(items[2].pathkeys, vec!["r", "a"]);
        assert!(items[1].has_children);
        assert!(!items[2].has_children);
    }

    #[test]
    fn test_navigation_bounds() {
        let store = sample();
        let tree = TreeWindow::new(&store, "dap:r", TreeWindowOptions::new(["children"]));

        assert_eq!(tree.move_up(), Err(TreeError::AtStart));
        assert_eq!(tree.move_out(), Err(TreeError::AtRoot));
        assert_eq!(tree.move_into().map(|i| i.vuri), Ok("r/a".into()));
        assert_eq!(tree.move_down().map(|i| i.vuri), Ok("r/a/a1".into()));
        assert_eq!(tree.move_into(), Err(TreeError::Leaf("r/a/a1".into())));
        assert_eq!(tree.move_out().map(|i| i.vuri), Ok("r/a".into()));

        tree.focus_on("r/b/b1").unwrap();
        assert_eq!(tree.move_down(), Err(TreeError::AtEnd));
        assert_eq!(
            tree.focus_on("r/nope"),
            Err(TreeError::NotFound("r/nope".into()))
        );
    }

    #[test]
    fn test_collapse_moves_focus_and_keeps_nested_state() {
        let store = sample();
        let tree = TreeWindow::new(&store, "dap:r", TreeWindowOptions::new(["children"]));
        tree.focus_on("r/a/a2").unwrap();

        tree.collapse("r/a");
        assert_eq!(tree.info().focus.as_deref(), Some("r/a"));
        assert_eq!(vuris(&tree), vec!["r", "r/a", "r/b", "r/b/b1"]);

        tree.collapse("r/b");
        tree.collapse("r");
        assert_eq!(vuris(&tree), vec!["r"]);
        assert_eq!(tree.info().focus.as_deref(), Some("r"));

        tree.expand("r");
        assert_eq!(vuris(&tree), vec!["r", "r/a", "r/b"]);
        assert!(tree.items()[1].collapsed);

        assert_eq!(
            tree.focus_on("r/a/a1"),
            Err(TreeError::Hidden("r/a/a1".into()))
        );
    }

    #[test]
    fn test_move_into_expands_collapsed() {
        let store = sample();
        let tree = TreeWindow::new(&store, "dap:r", TreeWindowOptions::new(["children"]));
        tree.collapse("r/a");
        tree.focus_on("r/a").unwrap();

        assert_eq!(tree.move_into().map(|i| i.vuri), Ok("r/a/a1".into()));
        assert!(!tree.is_collapsed("r/a"));
    }

    #[test]
    fn test_filter_search_and_prune() {
        let store = sample();
        let tree = TreeWindow::new(&store, "dap:r", TreeWindowOptions::new(["children"]));

        tree.set_search("ALPHA");
        assert_eq!(vuris(&tree), vec!["r/a"]);
        tree.clear_search();

        tree.set_filter(|entity| MaybeSignal::Value(entity.key().ends_with('1')));
        assert_eq!(vuris(&tree), vec!["r/a/a1", "r/b/b1"]);
        tree.clear_filter();

        tree.prune(|entity| MaybeSignal::Value(entity.key() == "a"));
        assert_eq!(vuris(&tree), vec!["r", "r/b", "r/b/b1"]);
    }

    #[test]
    fn test_signal_predicate_schedules_rebuild() {
        let store = sample();
        let tree = TreeWindow::new(&store, "dap:r", TreeWindowOptions::new(["children"]));
        let hide_b = Signal::new(false);

        let flag = hide_b.clone();
        tree.prune(move |entity| {
            if entity.key() == "b" {
                flag.clone().into()
            } else {
                MaybeSignal::Value(false)
            }
        });
        assert_eq!(tree.items().len(), 6);

        hide_b.set(true);
        store.scheduler().flush();
        assert_eq!(vuris(&tree), vec!["r", "r/a", "r/a/a1", "r/a/a2"]);
    }

    #[test]
    fn test_store_mutations_are_debounced() {
        let store = sample();
        let tree = TreeWindow::new(&store, "dap:r", TreeWindowOptions::new(["children"]));
        let root = store.get_by_uri("dap:r").unwrap();
        let before = tree.rebuild_count();

        for i in 0..20 {
            store
                .add(
                    Node::new(format!("dap:r/n{i}"), "n"),
                    &[Link::From(root.id(), "children")],
                )
                .unwrap();
        }
        assert_eq!(tree.rebuild_count(), before);
        assert_eq!(store.scheduler().flush(), 1);
        assert_eq!(tree.rebuild_count(), before + 1);
        assert_eq!(tree.items().len(), 26);
    }

    #[test]
    fn test_removed_focus_moves_to_parent() {
        let store = sample();
        let tree = TreeWindow::new(&store, "dap:r", TreeWindowOptions::new(["children"]));
        tree.focus_on("r/a/a2").unwrap();

        let a2 = store.get_by_uri("dap:r/a/a2").unwrap();
        store.remove(a2.id());
        tree.refresh();
        assert_eq!(tree.info().focus.as_deref(), Some("r/a"));
    }

    #[test]
    fn test_dispose_stops_rebuilds() {
        let store = sample();
        let tree = TreeWindow::new(&store, "dap:r", TreeWindowOptions::new(["children"]));
        tree.dispose();

        let root = store.get_by_uri("dap:r").unwrap();
        store
            .add(Node::new("dap:r/late", "late"), &[Link::From(root.id(), "children")])
            .unwrap();
        assert_eq!(store.scheduler().pending(), 0);
        assert!(tree.items().is_empty());
        assert_eq!(tree.move_down(), Err(TreeError::Disposed));
    }
}
