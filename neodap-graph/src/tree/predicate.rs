//! Per-entity cached tree predicates

use crate::entity::{EntityId, EntityRef};
use neodap_reactive::{MaybeSignal, Subscription};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Filter or prune function
pub type PredicateFn = Rc<dyn Fn(&EntityRef) -> MaybeSignal<bool>>;

struct Cached {
    source: MaybeSignal<bool>,
    _subscription: Option<Subscription>,
}

/// A predicate evaluated at most once per entity
///
/// When the predicate returns a signal, later reads use the signal's
/// current value and `on_change` runs whenever it changes. The predicate
/// function itself is never called again for that entity.
pub(crate) struct Predicate {
    eval: PredicateFn,
    on_change: Rc<dyn Fn()>,
    cache: RefCell<HashMap<EntityId, Cached>>,
}

impl Predicate {
    pub(crate) fn new(eval: PredicateFn, on_change: Rc<dyn Fn()>) -> Self {
        Self {
            eval,
            on_change,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn test(&self, entity: &EntityRef) -> bool {
        if let Some(cached) = self.cache.borrow().get(&entity.id()) {
            return cached.source.get();
        }
        let source = (self.eval)(entity);
        let value = source.get();
        let on_change = self.on_change.clone();
        let subscription = source.watch(move |_| on_change());
        self.cache.borrow_mut().insert(
            entity.id(),
            Cached {
                source,
                _subscription: subscription,
            },
        );
        value
    }

    pub(crate) fn forget(&self, id: EntityId) {
        let removed = self.cache.borrow_mut().remove(&id);
        drop(removed);
    }

    #[cfg(test)]
    pub(crate) fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityStore;
    use crate::testing::Node;
    use neodap_reactive::Signal;
    use std::cell::Cell;

    #[test]
    fn test_evaluates_once_per_entity() {
        let store = EntityStore::new();
        let entity = store.add(Node::new("dap:a", "a"), &[]).unwrap();
        let calls = Rc::new(Cell::new(0));
        let changes = Rc::new(Cell::new(0));

        let flag = Signal::new(true);
        let (counter, source) = (calls.clone(), flag.clone());
        let changed = changes.clone();
        let predicate = Predicate::new(
            Rc::new(move |_| {
                counter.set(counter.get() + 1);
                source.clone().into()
            }),
            Rc::new(move || changed.set(changed.get() + 1)),
        );

        assert!(predicate.test(&entity));
        flag.set(false);
        assert!(!predicate.test(&entity));
        assert_eq!(calls.get(), 1);
        assert_eq!(changes.get(), 1);

        predicate.forget(entity.id());
        assert_eq!(predicate.cached(), 0);
        assert_eq!(flag.listener_count(), 0);
    }
}
