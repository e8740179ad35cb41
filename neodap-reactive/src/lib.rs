//! # neodap-reactive
//!
//! Single-threaded reactive primitives for the neodap entity graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   watch / observe   ┌──────────────┐
//! │   Signal<T>  │ ──────────────────▶ │  listeners   │
//! └──────┬───────┘                     └──────────────┘
//!        │ owned by
//! ┌──────▼───────┐
//! │  Lifecycle   │  uri, owned signals, held subscriptions, hooks
//! └──────────────┘
//!
//! ┌──────────────┐  aggregate / some / every   ┌──────────────┐
//! │ Collection<T>│ ──────────────────────────▶ │ derived Signal│
//! └──────────────┘      (weak chain)           └──────────────┘
//! ```
//!
//! - **Signal**: value cell with a version counter. Equal sets are ignored,
//!   propagation is synchronous and depth-first.
//! - **Subscription**: RAII registration handle. Sources hold derived
//!   listeners weakly, derived values own their subscriptions.
//! - **Lifecycle**: the disposable base carried by every entity.
//! - **Collection**: ordered set with derived aggregates.
//! - **Scheduler**: debounced, coalescing task queue.
//!
//! ## Example
//!
//! ```
//! use neodap_reactive::prelude::*;
//!
//! let stopped = Signal::new(false);
//! let threads = Collection::new();
//! threads.insert(1u64);
//!
//! let flag = stopped.clone();
//! let any_stopped = threads.some(move |_| flag.clone().into());
//! assert!(!any_stopped.get());
//!
//! stopped.set(true);
//! assert!(any_stopped.get());
//! ```

pub mod collection;
pub mod error;
pub mod lifecycle;
pub mod scheduler;
pub mod signal;
pub mod subscription;

pub use collection::{Collection, CollectionEvent};
pub use error::{ReactiveError, Result};
pub use lifecycle::{Disposable, Lifecycle};
pub use scheduler::{Scheduler, TaskKey};
pub use signal::{MaybeSignal, Signal, WeakSignal};
pub use subscription::{Listener, ListenerId, ListenerTable, Subscription};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::collection::{Collection, CollectionEvent};
    pub use crate::error::{ReactiveError, Result};
    pub use crate::lifecycle::{Disposable, Lifecycle};
    pub use crate::scheduler::Scheduler;
    pub use crate::signal::{MaybeSignal, Signal, WeakSignal};
    pub use crate::subscription::Subscription;
}
