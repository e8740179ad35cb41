//! Multi-type entity store with typed edges and reactive indices
//!
//! The store owns every entity record, the outgoing and incoming edge lists,
//! and one bucket map per `(entity type, index)`. Index extractors may
//! return a signal; the store then keeps a subscription per entity and
//! re-buckets the entity whenever the signal changes.
//!
//! Every mutation is announced as a [`StoreEvent`] on one or more
//! [`Topic`]s. Views and tree windows are built entirely on these events.
//! No store borrow is held while listeners run, so listeners may read or
//! mutate the store reentrantly.

use crate::entity::{EdgeType, EntityId, EntityKind, EntityRef, EntityType, IndexName, IndexValue};
use crate::error::{GraphError, Result};
use crate::key::{ViewKey, ViewSpec};
use crate::view::{View, ViewNode};
use indexmap::{IndexMap, IndexSet};
use neodap_reactive::{Disposable, ListenerTable, MaybeSignal, Scheduler, Signal, Subscription};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Store tuning
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Debounce window of scheduled rebuilds
    pub debounce: Duration,
    /// Emit a trace event for every index and position signal change
    pub trace_signals: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(10),
            trace_signals: false,
        }
    }
}

/// An edge created together with an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// `parent --edge--> new`, appended to the parent's list
    From(EntityId, EdgeType),
    /// `parent --edge--> new`, placed first in the parent's list
    PrependFrom(EntityId, EdgeType),
    /// `new --edge--> target`
    To(EdgeType, EntityId),
}

/// Channel a store listener subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Added/Removed of one entity type
    Type(EntityType),
    /// EdgeAdded/EdgeRemoved of one edge type
    Edge(EdgeType),
    /// Rebucketed of one index name (any entity type)
    Index(IndexName),
    /// Everything
    All,
}

/// A store mutation
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Added(EntityRef),
    Removed(EntityRef),
    EdgeAdded {
        from: EntityRef,
        edge: EdgeType,
        to: EntityRef,
    },
    EdgeRemoved {
        from: EntityRef,
        edge: EdgeType,
        to: EntityRef,
    },
    Rebucketed {
        entity: EntityRef,
        index: IndexName,
        old: IndexValue,
        new: IndexValue,
    },
}

impl StoreEvent {
    fn topics(&self) -> [Topic; 2] {
        let specific = match self {
            StoreEvent::Added(entity) | StoreEvent::Removed(entity) => {
                Topic::Type(entity.entity_type())
            }
            StoreEvent::EdgeAdded { edge, .. } | StoreEvent::EdgeRemoved { edge, .. } => {
                Topic::Edge(*edge)
            }
            StoreEvent::Rebucketed { index, .. } => Topic::Index(*index),
        };
        [specific, Topic::All]
    }
}

/// Index key extraction function
pub type IndexExtractor = Rc<dyn Fn(&EntityRef) -> MaybeSignal<IndexValue>>;

struct IndexBinding {
    name: IndexName,
    _source: MaybeSignal<IndexValue>,
    _subscription: Option<Subscription>,
}

struct Record {
    entity: EntityRef,
    keys: HashMap<IndexName, IndexValue>,
    bindings: Vec<IndexBinding>,
}

type EdgeMap = HashMap<EntityId, IndexMap<EdgeType, IndexSet<EntityId>>>;
type Buckets = BTreeMap<IndexValue, IndexSet<EntityId>>;

pub(crate) struct StoreInner {
    config: StoreConfig,
    next_id: Cell<u64>,
    records: RefCell<HashMap<EntityId, Record>>,
    by_uri: RefCell<HashMap<String, EntityId>>,
    by_type: RefCell<HashMap<EntityType, IndexSet<EntityId>>>,
    out_edges: RefCell<EdgeMap>,
    in_edges: RefCell<EdgeMap>,
    indexes: RefCell<HashMap<EntityType, IndexMap<IndexName, IndexExtractor>>>,
    buckets: RefCell<HashMap<(EntityType, IndexName), Buckets>>,
    positions: RefCell<HashMap<EntityId, Vec<(EdgeType, Signal<Option<usize>>)>>>,
    topics: RefCell<HashMap<Topic, ListenerTable<StoreEvent>>>,
    pub(crate) views: RefCell<HashMap<ViewKey, Weak<ViewNode>>>,
    scheduler: Scheduler,
}

/// Shared handle to an entity store
#[derive(Clone)]
pub struct EntityStore {
    pub(crate) inner: Rc<StoreInner>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Create an empty store with default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        let scheduler = Scheduler::new(config.debounce);
        Self {
            inner: Rc::new(StoreInner {
                config,
                next_id: Cell::new(1),
                records: RefCell::new(HashMap::new()),
                by_uri: RefCell::new(HashMap::new()),
                by_type: RefCell::new(HashMap::new()),
                out_edges: RefCell::new(HashMap::new()),
                in_edges: RefCell::new(HashMap::new()),
                indexes: RefCell::new(HashMap::new()),
                buckets: RefCell::new(HashMap::new()),
                positions: RefCell::new(HashMap::new()),
                topics: RefCell::new(HashMap::new()),
                views: RefCell::new(HashMap::new()),
                scheduler,
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The scheduler used for debounced rebuilds
    pub fn scheduler(&self) -> Scheduler {
        self.inner.scheduler.clone()
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Rc<StoreInner>) -> Self {
        Self { inner }
    }

    /// Listen to store events on a topic
    pub fn watch(&self, topic: Topic, listener: impl Fn(&StoreEvent) + 'static) -> Subscription {
        let table = self
            .inner
            .topics
            .borrow_mut()
            .entry(topic)
            .or_default()
            .clone();
        table.subscribe(listener)
    }

    fn emit(&self, event: StoreEvent) {
        let tables: Vec<ListenerTable<StoreEvent>> = {
            let topics = self.inner.topics.borrow();
            event
                .topics()
                .iter()
                .filter_map(|topic| topics.get(topic).cloned())
                .collect()
        };
        for table in tables {
            table.emit(&event);
        }
    }

    // ---- entities ----

    /// Insert an entity together with `links`
    ///
    /// Listeners see `Added` first, then one `EdgeAdded` per link. Index
    /// keys are assigned before `Added` is announced.
    pub fn add<E: EntityKind>(&self, entity: Rc<E>, links: &[Link]) -> Result<EntityRef> {
        let uri = entity.uri().to_string();
        if entity.lifecycle().ensure_live().is_err() {
            return Err(GraphError::Disposed { uri });
        }
        if self.inner.by_uri.borrow().contains_key(&uri) {
            return Err(GraphError::DuplicateUri(uri));
        }
        for link in links {
            let endpoint = match link {
                Link::From(id, _) | Link::PrependFrom(id, _) | Link::To(_, id) => *id,
            };
            if !self.contains(endpoint) {
                return Err(GraphError::UnknownEntity(endpoint));
            }
        }

        let id = EntityId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        let entity_ref = EntityRef::new(id, entity);

        self.inner.records.borrow_mut().insert(
            id,
            Record {
                entity: entity_ref.clone(),
                keys: HashMap::new(),
                bindings: Vec::new(),
            },
        );
        self.inner.by_uri.borrow_mut().insert(uri.clone(), id);
        self.inner
            .by_type
            .borrow_mut()
            .entry(E::TYPE)
            .or_default()
            .insert(id);

        let extractors: Vec<(IndexName, IndexExtractor)> = self
            .inner
            .indexes
            .borrow()
            .get(E::TYPE)
            .map(|indexes| indexes.iter().map(|(n, f)| (*n, f.clone())).collect())
            .unwrap_or_default();
        for (name, extractor) in extractors {
            self.bind_index(&entity_ref, name, &extractor);
        }

        trace!(%id, uri = %uri, entity_type = E::TYPE, "entity added");
        self.emit(StoreEvent::Added(entity_ref.clone()));

        for link in links {
            match *link {
                Link::From(parent, edge) => self.insert_edge(parent, edge, id, false),
                Link::PrependFrom(parent, edge) => self.insert_edge(parent, edge, id, true),
                Link::To(edge, target) => self.insert_edge(id, edge, target, false),
            };
        }
        Ok(entity_ref)
    }

    /// Remove an entity and every edge touching it
    ///
    /// `EdgeRemoved` events precede the `Removed` event; the entity's
    /// lifecycle is disposed last.
    pub fn remove(&self, id: EntityId) -> Option<EntityRef> {
        let entity = self.get(id)?;

        let outgoing: Vec<(EdgeType, EntityId)> = self.adjacent(&self.inner.out_edges, id);
        for (edge, to) in outgoing {
            self.remove_edge(id, edge, to);
        }
        let incoming: Vec<(EdgeType, EntityId)> = self.adjacent(&self.inner.in_edges, id);
        for (edge, from) in incoming {
            self.remove_edge(from, edge, id);
        }
        self.inner.out_edges.borrow_mut().remove(&id);
        self.inner.in_edges.borrow_mut().remove(&id);

        let record = self.inner.records.borrow_mut().remove(&id);
        {
            let mut by_uri = self.inner.by_uri.borrow_mut();
            if by_uri.get(entity.uri()) == Some(&id) {
                by_uri.remove(entity.uri());
            }
        }
        if let Some(ids) = self.inner.by_type.borrow_mut().get_mut(entity.entity_type()) {
            ids.shift_remove(&id);
        }
        if let Some(record) = &record {
            let mut buckets = self.inner.buckets.borrow_mut();
            for (name, value) in &record.keys {
                if let Some(map) = buckets.get_mut(&(entity.entity_type(), *name)) {
                    remove_from_bucket(map, value, id);
                }
            }
        }
        let positions = self.inner.positions.borrow_mut().remove(&id);
        drop(positions);
        drop(record);

        debug!(%id, uri = %entity.uri(), "entity removed");
        self.emit(StoreEvent::Removed(entity.clone()));
        entity.entity().lifecycle().dispose();
        Some(entity)
    }

    /// Remove an entity and everything reachable from it over `edges`
    ///
    /// Descendants are removed before their ancestors. Returns the number
    /// of removed entities.
    pub fn remove_cascade(&self, id: EntityId, edges: &[EdgeType]) -> usize {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if !seen.insert(next) || !self.contains(next) {
                continue;
            }
            order.push(next);
            for edge in edges {
                let children = self.edge_ids_from(next, *edge);
                stack.extend(children.into_iter().rev());
            }
        }
        order
            .into_iter()
            .rev()
            .filter_map(|id| self.remove(id))
            .count()
    }

    pub fn get(&self, id: EntityId) -> Option<EntityRef> {
        self.inner
            .records
            .borrow()
            .get(&id)
            .map(|record| record.entity.clone())
    }

    pub fn get_by_uri(&self, uri: &str) -> Option<EntityRef> {
        let id = self.inner.by_uri.borrow().get(uri).copied()?;
        self.get(id)
    }

    /// Typed lookup by URI
    pub fn get_as<E: EntityKind>(&self, uri: &str) -> Option<Rc<E>> {
        self.get_by_uri(uri).and_then(|entity| entity.downcast::<E>())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.inner.records.borrow().contains_key(&id)
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.inner.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entities of a type in insertion order
    pub fn of_type(&self, entity_type: EntityType) -> Vec<EntityRef> {
        self.type_ids(entity_type)
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub(crate) fn type_ids(&self, entity_type: EntityType) -> Vec<EntityId> {
        self.inner
            .by_type
            .borrow()
            .get(entity_type)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    // ---- edges ----

    /// Append `from --edge--> to`; returns false if the edge exists
    pub fn add_edge(&self, from: EntityId, edge: EdgeType, to: EntityId) -> Result<bool> {
        self.check_endpoints(from, to)?;
        Ok(self.insert_edge(from, edge, to, false))
    }

    /// Insert `from --edge--> to` before the existing edges of `from`
    pub fn prepend_edge(&self, from: EntityId, edge: EdgeType, to: EntityId) -> Result<bool> {
        self.check_endpoints(from, to)?;
        Ok(self.insert_edge(from, edge, to, true))
    }

    /// Remove `from --edge--> to`; returns false if absent
    pub fn remove_edge(&self, from: EntityId, edge: EdgeType, to: EntityId) -> bool {
        let removed = self
            .inner
            .out_edges
            .borrow_mut()
            .get_mut(&from)
            .and_then(|edges| edges.get_mut(edge))
            .is_some_and(|targets| targets.shift_remove(&to));
        if !removed {
            return false;
        }
        let orphaned = {
            let mut in_edges = self.inner.in_edges.borrow_mut();
            match in_edges.get_mut(&to).and_then(|edges| edges.get_mut(edge)) {
                Some(sources) => {
                    sources.shift_remove(&from);
                    sources.is_empty()
                }
                None => true,
            }
        };

        self.refresh_positions(from, edge);
        if orphaned {
            for signal in self.position_signals(to, edge) {
                signal.set(None);
            }
        }

        if let (Some(from), Some(to)) = (self.get(from), self.get(to)) {
            trace!(from = %from.id(), edge, to = %to.id(), "edge removed");
            self.emit(StoreEvent::EdgeRemoved { from, edge, to });
        }
        true
    }

    fn check_endpoints(&self, from: EntityId, to: EntityId) -> Result<()> {
        for id in [from, to] {
            if !self.contains(id) {
                return Err(GraphError::UnknownEntity(id));
            }
        }
        Ok(())
    }

    fn insert_edge(&self, from: EntityId, edge: EdgeType, to: EntityId, prepend: bool) -> bool {
        let inserted = {
            let mut out_edges = self.inner.out_edges.borrow_mut();
            let targets = out_edges.entry(from).or_default().entry(edge).or_default();
            if targets.contains(&to) {
                false
            } else if prepend {
                targets.shift_insert(0, to);
                true
            } else {
                targets.insert(to);
                true
            }
        };
        if !inserted {
            return false;
        }
        self.inner
            .in_edges
            .borrow_mut()
            .entry(to)
            .or_default()
            .entry(edge)
            .or_default()
            .insert(from);

        self.refresh_positions(from, edge);

        if let (Some(from), Some(to)) = (self.get(from), self.get(to)) {
            trace!(from = %from.id(), edge, to = %to.id(), prepend, "edge added");
            self.emit(StoreEvent::EdgeAdded { from, edge, to });
        }
        true
    }

    fn adjacent(&self, edges: &RefCell<EdgeMap>, id: EntityId) -> Vec<(EdgeType, EntityId)> {
        let edges = edges.borrow();
        let mut out = Vec::new();
        if let Some(by_edge) = edges.get(&id) {
            for (edge, ids) in by_edge {
                for other in ids {
                    out.push((*edge, *other));
                }
            }
        }
        out
    }

    /// Targets of `from --edge-->` in edge-list order
    pub fn edges_from(&self, from: EntityId, edge: EdgeType) -> Vec<EntityRef> {
        self.edge_ids_from(from, edge)
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Sources of `--edge--> to`
    pub fn edges_to(&self, to: EntityId, edge: EdgeType) -> Vec<EntityRef> {
        self.inner
            .in_edges
            .borrow()
            .get(&to)
            .and_then(|edges| edges.get(edge))
            .map(|ids| ids.iter().copied().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// First source of `--edge--> to`
    pub fn parent(&self, to: EntityId, edge: EdgeType) -> Option<EntityRef> {
        let id = self
            .inner
            .in_edges
            .borrow()
            .get(&to)
            .and_then(|edges| edges.get(edge))
            .and_then(|ids| ids.first().copied())?;
        self.get(id)
    }

    pub(crate) fn edge_ids_from(&self, from: EntityId, edge: EdgeType) -> Vec<EntityId> {
        self.inner
            .out_edges
            .borrow()
            .get(&from)
            .and_then(|edges| edges.get(edge))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_edge(&self, from: EntityId, edge: EdgeType, to: EntityId) -> bool {
        self.edge_position(from, edge, to).is_some()
    }

    /// Number of `from --edge-->` edges
    pub fn edge_len(&self, from: EntityId, edge: EdgeType) -> usize {
        self.inner
            .out_edges
            .borrow()
            .get(&from)
            .and_then(|edges| edges.get(edge))
            .map_or(0, IndexSet::len)
    }

    /// Target at position `index` of the `from --edge-->` list
    pub fn edge_at(&self, from: EntityId, edge: EdgeType, index: usize) -> Option<EntityId> {
        self.inner
            .out_edges
            .borrow()
            .get(&from)
            .and_then(|edges| edges.get(edge))
            .and_then(|ids| ids.get_index(index).copied())
    }

    /// Position of `to` in the `from --edge-->` list
    pub fn edge_position(&self, from: EntityId, edge: EdgeType, to: EntityId) -> Option<usize> {
        self.inner
            .out_edges
            .borrow()
            .get(&from)
            .and_then(|edges| edges.get(edge))
            .and_then(|ids| ids.get_index_of(&to))
    }

    // ---- derived positions ----

    /// Keep `signal` equal to the entity's position among its parent's
    /// `edge` targets
    ///
    /// The signal holds `None` while the entity has no incoming `edge`.
    pub fn bind_position(&self, id: EntityId, edge: EdgeType, signal: Signal<Option<usize>>) {
        if self.inner.config.trace_signals {
            signal.set_traced(true);
        }
        self.inner
            .positions
            .borrow_mut()
            .entry(id)
            .or_default()
            .push((edge, signal.clone()));
        let position = self
            .parent(id, edge)
            .and_then(|parent| self.edge_position(parent.id(), edge, id));
        signal.set(position);
    }

    fn position_signals(&self, id: EntityId, edge: EdgeType) -> Vec<Signal<Option<usize>>> {
        self.inner
            .positions
            .borrow()
            .get(&id)
            .map(|bound| {
                bound
                    .iter()
                    .filter(|(e, _)| *e == edge)
                    .map(|(_, signal)| signal.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn refresh_positions(&self, from: EntityId, edge: EdgeType) {
        let updates: Vec<(Signal<Option<usize>>, usize)> = {
            let positions = self.inner.positions.borrow();
            if positions.is_empty() {
                return;
            }
            self.edge_ids_from(from, edge)
                .into_iter()
                .enumerate()
                .flat_map(|(i, target)| {
                    positions
                        .get(&target)
                        .into_iter()
                        .flatten()
                        .filter(|(e, _)| *e == edge)
                        .map(move |(_, signal)| (signal.clone(), i))
                })
                .collect()
        };
        for (signal, position) in updates {
            signal.set(Some(position));
        }
    }

    // ---- indices ----

    /// Register an index over every entity of `entity_type`
    ///
    /// Existing entities are indexed immediately. Registering a name twice
    /// replaces the extractor.
    pub fn add_index(
        &self,
        entity_type: EntityType,
        name: IndexName,
        extractor: impl Fn(&EntityRef) -> MaybeSignal<IndexValue> + 'static,
    ) {
        let extractor: IndexExtractor = Rc::new(extractor);
        self.inner
            .indexes
            .borrow_mut()
            .entry(entity_type)
            .or_default()
            .insert(name, extractor.clone());
        for entity in self.of_type(entity_type) {
            self.bind_index(&entity, name, &extractor);
        }
        debug!(entity_type, index = name, "index registered");
    }

    /// Register an index with a typed extractor
    pub fn add_typed_index<E: EntityKind>(
        &self,
        name: IndexName,
        extractor: impl Fn(&E) -> MaybeSignal<IndexValue> + 'static,
    ) {
        self.add_index(E::TYPE, name, move |entity| match entity.downcast::<E>() {
            Some(typed) => extractor(&typed),
            None => MaybeSignal::Value(IndexValue::Nil),
        });
    }

    fn bind_index(&self, entity: &EntityRef, name: IndexName, extractor: &IndexExtractor) {
        let id = entity.id();
        let source = extractor(entity);
        let value = source.get();
        let subscription = source.as_signal().map(|signal| {
            if self.inner.config.trace_signals {
                signal.set_traced(true);
            }
            let weak = self.downgrade();
            signal.watch(move |value: &IndexValue| {
                if let Some(inner) = weak.upgrade() {
                    EntityStore::from_inner(inner).rebucket(id, name, value.clone());
                }
            })
        });

        let replaced = {
            let mut records = self.inner.records.borrow_mut();
            let Some(record) = records.get_mut(&id) else {
                return;
            };
            let previous = record.keys.insert(name, value.clone());
            let old_binding = record
                .bindings
                .iter()
                .position(|binding| binding.name == name)
                .map(|i| record.bindings.remove(i));
            record.bindings.push(IndexBinding {
                name,
                _source: source,
                _subscription: subscription,
            });
            (previous, old_binding)
        };

        {
            let mut buckets = self.inner.buckets.borrow_mut();
            let map = buckets.entry((entity.entity_type(), name)).or_default();
            if let Some(previous) = &replaced.0 {
                remove_from_bucket(map, previous, id);
            }
            map.entry(value).or_default().insert(id);
        }
        drop(replaced);
    }

    fn rebucket(&self, id: EntityId, name: IndexName, new: IndexValue) {
        let (entity, old) = {
            let mut records = self.inner.records.borrow_mut();
            let Some(record) = records.get_mut(&id) else {
                return;
            };
            let old = record.keys.insert(name, new.clone()).unwrap_or_default();
            (record.entity.clone(), old)
        };
        if old == new {
            return;
        }
        {
            let mut buckets = self.inner.buckets.borrow_mut();
            let map = buckets.entry((entity.entity_type(), name)).or_default();
            remove_from_bucket(map, &old, id);
            map.entry(new.clone()).or_default().insert(id);
        }
        trace!(%id, index = name, %old, %new, "entity rebucketed");
        self.emit(StoreEvent::Rebucketed {
            entity,
            index: name,
            old,
            new,
        });
    }

    /// Current key of an entity under `name`
    pub fn index_value(&self, id: EntityId, name: IndexName) -> Option<IndexValue> {
        self.inner
            .records
            .borrow()
            .get(&id)
            .and_then(|record| record.keys.get(name).cloned())
    }

    /// Point lookup through an index
    pub fn lookup(
        &self,
        entity_type: EntityType,
        name: IndexName,
        value: &IndexValue,
    ) -> Vec<EntityRef> {
        let ids: Vec<EntityId> = self
            .inner
            .buckets
            .borrow()
            .get(&(entity_type, name))
            .and_then(|map| map.get(value))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    // ---- views ----

    /// The live view of every entity of a type
    pub fn view(&self, entity_type: EntityType) -> View {
        View::from_spec(self, &ViewSpec::of_type(entity_type))
    }

    /// A live view for an explicit spec
    pub fn view_of(&self, spec: &ViewSpec) -> View {
        View::from_spec(self, spec)
    }

    /// A view that never has members
    pub fn empty_view(&self) -> View {
        View::empty(self)
    }

    /// Number of live view cache entries
    pub fn cached_views(&self) -> usize {
        self.inner
            .views
            .borrow()
            .values()
            .filter(|node| node.strong_count() > 0)
            .count()
    }
}

fn remove_from_bucket(map: &mut Buckets, value: &IndexValue, id: EntityId) {
    if let Some(ids) = map.get_mut(value) {
        ids.shift_remove(&id);
        if ids.is_empty() {
            map.remove(value);
        }
    }
}

impl fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("entities", &self.len())
            .field("views", &self.cached_views())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Node;

    #[test]
    fn test_add_and_lookup_by_uri() {
        let store = EntityStore::new();
        let node = store.add(Node::new("dap:n:1", "one"), &[]).unwrap();

        assert_eq!(store.get_by_uri("dap:n:1"), Some(node.clone()));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.add(Node::new("dap:n:1", "again"), &[]).unwrap_err(),
            GraphError::DuplicateUri("dap:n:1".into())
        );
    }

    #[test]
    fn test_prepend_orders_newest_first() {
        let store = EntityStore::new();
        let parent = store.add(Node::new("dap:p", "p"), &[]).unwrap();
        let a = store
            .add(Node::new("dap:p/a", "a"), &[Link::PrependFrom(parent.id(), "children")])
            .unwrap();
        let b = store
            .add(Node::new("dap:p/b", "b"), &[Link::PrependFrom(parent.id(), "children")])
            .unwrap();

        assert_eq!(store.edges_from(parent.id(), "children"), vec![b, a]);
    }

    #[test]
    fn test_unknown_link_endpoint_rejected() {
        let store = EntityStore::new();
        let err = store
            .add(Node::new("dap:x", "x"), &[Link::From(EntityId(99), "children")])
            .unwrap_err();
        assert_eq!(err, GraphError::UnknownEntity(EntityId(99)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_emits_edge_removals_first() {
        let store = EntityStore::new();
        let parent = store.add(Node::new("dap:p", "p"), &[]).unwrap();
        let child = store
            .add(Node::new("dap:p/c", "c"), &[Link::From(parent.id(), "children")])
            .unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let _sub = store.watch(Topic::All, move |event| {
            let entry = match event {
                StoreEvent::EdgeRemoved { .. } => "edge-removed",
                StoreEvent::Removed(_) => "removed",
                _ => "other",
            };
            sink.borrow_mut().push(entry);
        });

        store.remove(child.id());
        assert_eq!(*log.borrow(), vec!["edge-removed", "removed"]);
        assert!(child.is_disposed());
        assert!(store.edges_from(parent.id(), "children").is_empty());
    }

    #[test]
    fn test_signal_index_rebuckets() {
        let store = EntityStore::new();
        store.add_typed_index::<Node>("label", |node| {
            MaybeSignal::Signal(node.label.map(|l| IndexValue::from(l.as_str())))
        });
        let node = Node::new("dap:n", "before");
        store.add(node.clone(), &[]).unwrap();

        assert_eq!(store.lookup(Node::TYPE, "label", &"before".into()).len(), 1);
        node.label.set("after".into());
        assert!(store.lookup(Node::TYPE, "label", &"before".into()).is_empty());
        assert_eq!(store.lookup(Node::TYPE, "label", &"after".into()).len(), 1);
    }

    #[test]
    fn test_bound_position_follows_prepends() {
        let store = EntityStore::new();
        let parent = store.add(Node::new("dap:p", "p"), &[]).unwrap();
        let first = Signal::new(None);
        let second = Signal::new(None);

        let a = store
            .add(Node::new("dap:p/a", "a"), &[Link::PrependFrom(parent.id(), "children")])
            .unwrap();
        store.bind_position(a.id(), "children", first.clone());
        assert_eq!(first.get(), Some(0));

        let b = store
            .add(Node::new("dap:p/b", "b"), &[Link::PrependFrom(parent.id(), "children")])
            .unwrap();
        store.bind_position(b.id(), "children", second.clone());

        assert_eq!(second.get(), Some(0));
        assert_eq!(first.get(), Some(1));

        store.remove(b.id());
        assert_eq!(first.get(), Some(0));
    }

    #[test]
    fn test_remove_cascade_follows_edges() {
        let store = EntityStore::new();
        let root = store.add(Node::new("dap:r", "r"), &[]).unwrap();
        let mid = store
            .add(Node::new("dap:r/m", "m"), &[Link::From(root.id(), "children")])
            .unwrap();
        store
            .add(Node::new("dap:r/m/l", "l"), &[Link::From(mid.id(), "children")])
            .unwrap();
        let shared = store
            .add(Node::new("dap:shared", "s"), &[Link::From(mid.id(), "uses")])
            .unwrap();

        assert_eq!(store.remove_cascade(root.id(), &["children"]), 3);
        assert_eq!(store.len(), 1);
        assert!(store.contains(shared.id()));
    }
}
