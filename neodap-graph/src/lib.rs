//! # neodap-graph
//!
//! In-process entity graph with live queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  StoreEvent (by topic)  ┌──────────────┐
//! │ EntityStore  │ ──────────────────────▶ │  ViewNode    │ cached per ViewKey
//! │  entities    │                         │  (members)   │
//! │  edges       │                         └──────┬───────┘
//! │  indexes     │                                │ Rc
//! └──────┬───────┘                         ┌──────▼───────┐
//!        │                                 │    View      │ handles
//!        │ debounced rebuilds              └──────────────┘
//! ┌──────▼───────┐
//! │  TreeWindow  │  bounded DFS viewport
//! └──────────────┘
//! ```
//!
//! - **EntityStore**: entities keyed by id and URI, typed ordered edges,
//!   static and signal-valued indexes, derived edge positions.
//! - **View**: chainable `filter`/`follow` queries. Views with the same
//!   canonical spec share one node, released with its last handle.
//! - **TreeWindow**: navigable tree projection that only materializes the
//!   rows around the focus.
//!
//! ## Example
//!
//! ```
//! use neodap_graph::testing::Node;
//! use neodap_graph::{EntityStore, IndexValue, Link};
//! use neodap_reactive::MaybeSignal;
//!
//! let store = EntityStore::new();
//! store.add_typed_index::<Node>("label", |node| {
//!     MaybeSignal::Signal(node.label.map(|label| IndexValue::from(label.as_str())))
//! });
//!
//! let root = store.add(Node::new("dap:root", "root"), &[]).unwrap();
//! let child = Node::new("dap:root/a", "a");
//! store
//!     .add(child.clone(), &[Link::From(root.id(), "children")])
//!     .unwrap();
//!
//! let children = store.view("Node").filter("label", "root").follow("children", None);
//! assert_eq!(children.count(), 1);
//!
//! let renamed = store.view("Node").filter("label", "b");
//! child.label.set("b".to_string());
//! assert_eq!(renamed.count(), 1);
//! ```

pub mod entity;
pub mod error;
pub mod key;
pub mod store;
pub mod testing;
pub mod tree;
pub mod view;

pub use entity::{EdgeType, Entity, EntityId, EntityKind, EntityRef, EntityType, IndexName, IndexValue};
pub use error::{GraphError, Result};
pub use key::{Filter, Stage, StageSource, ViewKey, ViewSpec};
pub use store::{EntityStore, IndexExtractor, Link, StoreConfig, StoreEvent, Topic};
pub use tree::{PredicateFn, TreeError, TreeInfo, TreeItem, TreeResult, TreeWindow, TreeWindowOptions};
pub use view::View;
