//! Cached, shared, chainable live queries
//!
//! Every distinct [`ViewSpec`] is materialized once per store as a
//! `ViewNode`. The store's cache maps the canonical [`ViewKey`] to a `Weak`
//! node, and every [`View`] handle holds the node strongly:
//!
//! ```text
//!   View ──Rc──▶ ViewNode(Thread>stacks:Stack[index=0])
//!                   │ base
//!                   ▼
//!                ViewNode(Thread>stacks:Stack) ──source──▶ ViewNode(Thread)
//! ```
//!
//! A node keeps its members current by listening to store topics and to
//! the membership of the node below it. When the last handle (or dependent
//! node) goes away the node drops its subscriptions and leaves the cache.

use crate::entity::{EdgeType, EntityId, EntityKind, EntityRef, EntityType, IndexName, IndexValue};
use crate::error::{GraphError, Result};
use crate::key::{Filter, StageSource, ViewKey, ViewSpec};
use crate::store::{EntityStore, StoreEvent, Topic};
use neodap_reactive::{Collection, CollectionEvent, Disposable, MaybeSignal, Signal, Subscription};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;

enum NodeKind {
    Root,
    Filter {
        base: Rc<ViewNode>,
        filters: Vec<Filter>,
    },
    Follow {
        source: Rc<ViewNode>,
        edge: EdgeType,
        target: Option<EntityType>,
        counts: RefCell<HashMap<EntityId, usize>>,
    },
    Empty,
}

pub(crate) struct ViewNode {
    key: ViewKey,
    spec: Option<ViewSpec>,
    kind: NodeKind,
    members: Collection<EntityRef>,
    store: EntityStore,
    subscriptions: RefCell<Vec<Subscription>>,
}

fn node_for(store: &EntityStore, spec: &ViewSpec) -> Rc<ViewNode> {
    let key = spec.key();
    let cached = store
        .inner
        .views
        .borrow()
        .get(&key)
        .and_then(Weak::upgrade);
    if let Some(node) = cached {
        return node;
    }

    let node = build(store, spec, key.clone());
    store
        .inner
        .views
        .borrow_mut()
        .insert(key, Rc::downgrade(&node));
    debug!(view = %node.key, key = %node.key.short_hex(), members = node.members.len(), "view node created");
    node
}

fn build(store: &EntityStore, spec: &ViewSpec, key: ViewKey) -> Rc<ViewNode> {
    let Some(stage) = spec.last() else {
        return ViewNode::empty(store);
    };
    if !stage.filters.is_empty() {
        let base = node_for(store, &spec.unfiltered());
        let filters = stage.filters.iter().cloned().collect();
        return ViewNode::filtered(store, key, spec, base, filters);
    }
    match &stage.source {
        StageSource::Type(entity_type) => ViewNode::root(store, key, spec, *entity_type),
        StageSource::Follow { edge, target } => match spec.parent() {
            Some(parent) => {
                let source = node_for(store, &parent);
                ViewNode::follow(store, key, spec, source, *edge, *target)
            }
            None => ViewNode::empty(store),
        },
    }
}

impl ViewNode {
    fn new(store: &EntityStore, key: ViewKey, spec: Option<ViewSpec>, kind: NodeKind) -> Rc<Self> {
        Rc::new(Self {
            key,
            spec,
            kind,
            members: Collection::new(),
            store: store.clone(),
            subscriptions: RefCell::new(Vec::new()),
        })
    }

    fn empty(store: &EntityStore) -> Rc<Self> {
        Self::new(store, ViewKey::empty(), None, NodeKind::Empty)
    }

    fn hold(&self, subscription: Subscription) {
        self.subscriptions.borrow_mut().push(subscription);
    }

    fn root(store: &EntityStore, key: ViewKey, spec: &ViewSpec, entity_type: EntityType) -> Rc<Self> {
        let node = Self::new(store, key, Some(spec.clone()), NodeKind::Root);
        for entity in store.of_type(entity_type) {
            node.members.insert(entity);
        }

        let weak = Rc::downgrade(&node);
        node.hold(store.watch(Topic::Type(entity_type), move |event| {
            let Some(node) = weak.upgrade() else {
                return;
            };
            match event {
                StoreEvent::Added(entity) => {
                    node.members.insert(entity.clone());
                }
                StoreEvent::Removed(entity) => {
                    node.members.remove(entity);
                }
                _ => {}
            }
        }));
        node
    }

    fn filtered(
        store: &EntityStore,
        key: ViewKey,
        spec: &ViewSpec,
        base: Rc<ViewNode>,
        filters: Vec<Filter>,
    ) -> Rc<Self> {
        let names: BTreeSet<IndexName> = filters.iter().map(|f| f.index).collect();
        let node = Self::new(
            store,
            key,
            Some(spec.clone()),
            NodeKind::Filter {
                base: base.clone(),
                filters,
            },
        );
        for entity in base.members.to_vec() {
            if node.matches(&entity) {
                node.members.insert(entity);
            }
        }

        let weak = Rc::downgrade(&node);
        node.hold(base.members.watch(move |event| {
            let Some(node) = weak.upgrade() else {
                return;
            };
            match event {
                CollectionEvent::Added(entity) => {
                    if node.matches(entity) {
                        node.members.insert(entity.clone());
                    }
                }
                CollectionEvent::Removed(entity) => {
                    node.members.remove(entity);
                }
            }
        }));

        for name in names {
            let weak = Rc::downgrade(&node);
            node.hold(store.watch(Topic::Index(name), move |event| {
                if let (Some(node), StoreEvent::Rebucketed { entity, .. }) = (weak.upgrade(), event) {
                    node.reconsider(entity);
                }
            }));
        }
        node
    }

    fn follow(
        store: &EntityStore,
        key: ViewKey,
        spec: &ViewSpec,
        source: Rc<ViewNode>,
        edge: EdgeType,
        target: Option<EntityType>,
    ) -> Rc<Self> {
        let node = Self::new(
            store,
            key,
            Some(spec.clone()),
            NodeKind::Follow {
                source: source.clone(),
                edge,
                target,
                counts: RefCell::new(HashMap::new()),
            },
        );
        for member in source.members.to_vec() {
            node.count_targets(member.id(), true);
        }

        let weak = Rc::downgrade(&node);
        node.hold(source.members.watch(move |event| {
            let Some(node) = weak.upgrade() else {
                return;
            };
            match event {
                CollectionEvent::Added(member) => node.count_targets(member.id(), true),
                CollectionEvent::Removed(member) => node.count_targets(member.id(), false),
            }
        }));

        let weak = Rc::downgrade(&node);
        let watched_source = Rc::downgrade(&source);
        node.hold(store.watch(Topic::Edge(edge), move |event| {
            let (Some(node), Some(source)) = (weak.upgrade(), watched_source.upgrade()) else {
                return;
            };
            match event {
                StoreEvent::EdgeAdded { from, to, .. } if source.members.contains(from) => {
                    node.bump(to, true);
                }
                StoreEvent::EdgeRemoved { from, to, .. } if source.members.contains(from) => {
                    node.bump(to, false);
                }
                _ => {}
            }
        }));
        node
    }

    fn matches(&self, entity: &EntityRef) -> bool {
        match &self.kind {
            NodeKind::Filter { filters, .. } => filters.iter().all(|filter| {
                self.store
                    .index_value(entity.id(), filter.index)
                    .unwrap_or_default()
                    == filter.value
            }),
            NodeKind::Empty => false,
            _ => true,
        }
    }

    fn reconsider(&self, entity: &EntityRef) {
        let NodeKind::Filter { base, .. } = &self.kind else {
            return;
        };
        if !base.members.contains(entity) {
            return;
        }
        if self.matches(entity) {
            self.members.insert(entity.clone());
        } else {
            self.members.remove(entity);
        }
    }

    fn count_targets(&self, member: EntityId, added: bool) {
        let NodeKind::Follow { edge, .. } = &self.kind else {
            return;
        };
        for target in self.store.edges_from(member, *edge) {
            self.bump(&target, added);
        }
    }

    fn bump(&self, target: &EntityRef, added: bool) {
        let NodeKind::Follow {
            target: wanted,
            counts,
            ..
        } = &self.kind
        else {
            return;
        };
        if wanted.is_some_and(|ty| ty != target.entity_type()) {
            return;
        }
        let transition = {
            let mut counts = counts.borrow_mut();
            if added {
                let count = counts.entry(target.id()).or_insert(0);
                *count += 1;
                *count == 1
            } else {
                match counts.get_mut(&target.id()) {
                    Some(count) if *count > 1 => {
                        *count -= 1;
                        false
                    }
                    Some(_) => {
                        counts.remove(&target.id());
                        true
                    }
                    None => false,
                }
            }
        };
        if transition {
            if added {
                self.members.insert(target.clone());
            } else {
                self.members.remove(target);
            }
        }
    }

    /// Members in view order
    ///
    /// Root nodes use insertion order, filters keep their base's order and
    /// follows walk source members and then each edge list.
    fn ordered(&self) -> Vec<EntityRef> {
        match &self.kind {
            NodeKind::Root | NodeKind::Empty => self.members.to_vec(),
            NodeKind::Filter { base, .. } => base
                .ordered()
                .into_iter()
                .filter(|entity| self.members.contains(entity))
                .collect(),
            NodeKind::Follow { source, edge, .. } => {
                let mut seen = HashSet::new();
                let mut out = Vec::with_capacity(self.members.len());
                for member in source.ordered() {
                    for target in self.store.edges_from(member.id(), *edge) {
                        if seen.insert(target.id()) && self.members.contains(&target) {
                            out.push(target);
                        }
                    }
                }
                out
            }
        }
    }
}

impl Drop for ViewNode {
    fn drop(&mut self) {
        if matches!(self.kind, NodeKind::Empty) {
            return;
        }
        if let Ok(mut views) = self.store.inner.views.try_borrow_mut() {
            let released = views
                .get(&self.key)
                .is_some_and(|node| node.strong_count() == 0);
            if released {
                views.remove(&self.key);
            }
        }
        debug!(view = %self.key, key = %self.key.short_hex(), "view node released");
    }
}

/// A live, read-only query over an [`EntityStore`]
///
/// Cloning a view acquires another reference to the same cache entry.
/// [`View::dispose`] releases this handle only.
pub struct View {
    node: RefCell<Option<Rc<ViewNode>>>,
    key: ViewKey,
    store: EntityStore,
}

impl View {
    pub(crate) fn from_spec(store: &EntityStore, spec: &ViewSpec) -> Self {
        Self::from_node(store, node_for(store, spec))
    }

    pub(crate) fn empty(store: &EntityStore) -> Self {
        Self::from_node(store, ViewNode::empty(store))
    }

    fn from_node(store: &EntityStore, node: Rc<ViewNode>) -> Self {
        Self {
            key: node.key.clone(),
            node: RefCell::new(Some(node)),
            store: store.clone(),
        }
    }

    fn node(&self) -> Option<Rc<ViewNode>> {
        self.node.borrow().clone()
    }

    /// Canonical cache key shared by set-equal views
    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    pub fn spec(&self) -> Option<ViewSpec> {
        self.node().and_then(|node| node.spec.clone())
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Whether this view can never have members
    pub fn is_empty_view(&self) -> bool {
        self.node()
            .map_or(true, |node| matches!(node.kind, NodeKind::Empty))
    }

    /// Entity type of the members, when known
    pub fn entity_type(&self) -> Option<EntityType> {
        let spec = self.spec()?;
        match &spec.last()?.source {
            StageSource::Type(entity_type) => Some(*entity_type),
            StageSource::Follow { target, .. } => *target,
        }
    }

    // ---- chaining ----

    /// Keep members whose `index` equals `value`
    pub fn filter(&self, index: IndexName, value: impl Into<IndexValue>) -> View {
        match self.spec() {
            Some(spec) => View::from_spec(&self.store, &spec.filter(index, value.into())),
            None => View::empty(&self.store),
        }
    }

    /// Targets of `edge` from every member, optionally restricted by type
    pub fn follow(&self, edge: EdgeType, target: Option<EntityType>) -> View {
        match self.spec() {
            Some(spec) => View::from_spec(&self.store, &spec.follow(edge, target)),
            None => View::empty(&self.store),
        }
    }

    // ---- reads ----

    /// Snapshot of the members in view order
    pub fn to_vec(&self) -> Vec<EntityRef> {
        self.node().map(|node| node.ordered()).unwrap_or_default()
    }

    pub fn iter(&self) -> std::vec::IntoIter<EntityRef> {
        self.to_vec().into_iter()
    }

    /// Members of kind `E`, in view order
    pub fn iter_as<E: EntityKind>(&self) -> Vec<Rc<E>> {
        self.iter().filter_map(|entity| entity.downcast::<E>()).collect()
    }

    pub fn count(&self) -> usize {
        self.node().map_or(0, |node| node.members.len())
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn first(&self) -> Option<EntityRef> {
        self.iter().next()
    }

    pub fn first_as<E: EntityKind>(&self) -> Option<Rc<E>> {
        self.first().and_then(|entity| entity.downcast::<E>())
    }

    pub fn find(&self, predicate: impl Fn(&EntityRef) -> bool) -> Option<EntityRef> {
        self.iter().find(|entity| predicate(entity))
    }

    /// Point lookup through an index, restricted to current members
    pub fn get_one(&self, index: IndexName, value: impl Into<IndexValue>) -> Option<EntityRef> {
        let node = self.node()?;
        let value = value.into();
        match self.entity_type() {
            Some(entity_type) => self
                .store
                .lookup(entity_type, index, &value)
                .into_iter()
                .find(|entity| node.members.contains(entity)),
            None => node
                .ordered()
                .into_iter()
                .find(|entity| self.store.index_value(entity.id(), index) == Some(value.clone())),
        }
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.node()
            .is_some_and(|node| node.members.contains(entity))
    }

    /// Run `f` on every current member, returning how many were visited
    pub fn call(&self, mut f: impl FnMut(&EntityRef)) -> usize {
        let members = self.to_vec();
        for entity in &members {
            f(entity);
        }
        members.len()
    }

    /// Run `f` on every member of kind `E`
    pub fn call_as<E: EntityKind>(&self, mut f: impl FnMut(&E)) -> usize {
        let members = self.iter_as::<E>();
        for entity in &members {
            f(entity);
        }
        members.len()
    }

    // ---- reactive ----

    /// Listen for membership changes
    ///
    /// The subscription keeps the underlying cache entry alive.
    pub fn watch(&self, listener: impl Fn(&CollectionEvent<EntityRef>) + 'static) -> Subscription {
        let Some(node) = self.node() else {
            return Subscription::empty();
        };
        let subscription = node.members.watch(listener);
        Subscription::from_fn(move || {
            drop(subscription);
            drop(node);
        })
    }

    /// Derive a signal over the members, see [`Collection::aggregate`]
    pub fn aggregate<V, R>(
        &self,
        extract: impl Fn(&EntityRef) -> MaybeSignal<V> + 'static,
        combine: impl Fn(&[V]) -> R + 'static,
    ) -> Signal<R>
    where
        V: Clone + 'static,
        R: Clone + PartialEq + 'static,
    {
        let node = self.node().unwrap_or_else(|| ViewNode::empty(&self.store));
        let output = node.members.aggregate(extract, combine);
        output.attach(node);
        output
    }

    pub fn some(&self, predicate: impl Fn(&EntityRef) -> MaybeSignal<bool> + 'static) -> Signal<bool> {
        self.aggregate(predicate, |values: &[bool]| values.iter().any(|v| *v))
    }

    pub fn every(&self, predicate: impl Fn(&EntityRef) -> MaybeSignal<bool> + 'static) -> Signal<bool> {
        self.aggregate(predicate, |values: &[bool]| values.iter().all(|v| *v))
    }

    /// Live member count
    pub fn count_signal(&self) -> Signal<usize> {
        self.aggregate(|_| MaybeSignal::Value(()), |values: &[()]| values.len())
    }

    // ---- mutation is not allowed ----

    pub fn add<E: EntityKind>(&self, _entity: Rc<E>) -> Result<EntityRef> {
        Err(GraphError::ReadOnlyView)
    }

    pub fn remove(&self, _id: EntityId) -> Result<()> {
        Err(GraphError::ReadOnlyView)
    }

    pub fn add_edge(&self, _from: EntityId, _edge: EdgeType, _to: EntityId) -> Result<()> {
        Err(GraphError::ReadOnlyView)
    }

    pub fn prepend_edge(&self, _from: EntityId, _edge: EdgeType, _to: EntityId) -> Result<()> {
        Err(GraphError::ReadOnlyView)
    }

    pub fn remove_edge(&self, _from: EntityId, _edge: EdgeType, _to: EntityId) -> Result<()> {
        Err(GraphError::ReadOnlyView)
    }
}

impl Disposable for View {
    /// Release this handle; other handles to the same entry are unaffected
    fn dispose(&self) {
        let node = self.node.borrow_mut().take();
        drop(node);
    }

    fn is_disposed(&self) -> bool {
        self.node.borrow().is_none()
    }
}

impl Clone for View {
    fn clone(&self) -> Self {
        Self {
            node: RefCell::new(self.node()),
            key: self.key.clone(),
            store: self.store.clone(),
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("key", &self.key)
            .field("count", &self.count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
