//! Entity identity and index values

use neodap_reactive::{Disposable, Lifecycle};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Type tag of an entity ("Session", "Frame", ...)
pub type EntityType = &'static str;

/// Name of a typed directed edge ("threads", "frames", ...)
pub type EdgeType = &'static str;

/// Name of a secondary index
pub type IndexName = &'static str;

/// Store-assigned entity identifier
///
/// Identifiers are never reused within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An object that can live in an [`EntityStore`](crate::EntityStore)
pub trait Entity: Any {
    /// Type tag used for views and indices
    fn entity_type(&self) -> EntityType;

    /// Lifecycle holding the URI and owned signals
    fn lifecycle(&self) -> &Lifecycle;

    /// Stable address
    fn uri(&self) -> &str {
        self.lifecycle().uri()
    }

    /// Short key used for tree paths
    ///
    /// Defaults to the last `/`-separated URI segment without the scheme.
    fn key(&self) -> String {
        let uri = self.uri();
        let tail = uri.rsplit('/').next().unwrap_or(uri);
        tail.strip_prefix("dap:").unwrap_or(tail).to_string()
    }

    /// Human readable name, matched by tree search
    fn display_name(&self) -> Option<String> {
        None
    }
}

/// An entity type with a static tag
pub trait EntityKind: Entity + Sized {
    const TYPE: EntityType;
}

/// Shared handle to a stored entity
///
/// Equality and hashing use the store identifier only.
#[derive(Clone)]
pub struct EntityRef {
    id: EntityId,
    entity: Rc<dyn Entity>,
    any: Rc<dyn Any>,
}

impl EntityRef {
    pub(crate) fn new<E: EntityKind>(id: EntityId, entity: Rc<E>) -> Self {
        Self {
            id,
            entity: entity.clone(),
            any: entity,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn entity(&self) -> &Rc<dyn Entity> {
        &self.entity
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity.entity_type()
    }

    pub fn uri(&self) -> &str {
        self.entity.uri()
    }

    pub fn key(&self) -> String {
        self.entity.key()
    }

    pub fn display_name(&self) -> Option<String> {
        self.entity.display_name()
    }

    /// Whether the entity is of kind `E`
    pub fn is<E: EntityKind>(&self) -> bool {
        self.any.is::<E>()
    }

    /// Get the concrete entity
    pub fn downcast<E: EntityKind>(&self) -> Option<Rc<E>> {
        self.any.clone().downcast::<E>().ok()
    }

    pub fn is_disposed(&self) -> bool {
        self.entity.lifecycle().is_disposed()
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityRef {}

impl Hash for EntityRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("id", &self.id)
            .field("type", &self.entity_type())
            .field("uri", &self.uri())
            .finish()
    }
}

/// Key produced by an index extractor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum IndexValue {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl IndexValue {
    pub fn is_nil(&self) -> bool {
        matches!(self, IndexValue::Nil)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            IndexValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            IndexValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Nil => write!(f, "nil"),
            IndexValue::Bool(value) => write!(f, "{value}"),
            IndexValue::Int(value) => write!(f, "{value}"),
            IndexValue::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for IndexValue {
    fn from(value: bool) -> Self {
        IndexValue::Bool(value)
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        IndexValue::Int(value)
    }
}

impl From<i32> for IndexValue {
    fn from(value: i32) -> Self {
        IndexValue::Int(value.into())
    }
}

impl From<u32> for IndexValue {
    fn from(value: u32) -> Self {
        IndexValue::Int(value.into())
    }
}

impl From<u64> for IndexValue {
    fn from(value: u64) -> Self {
        IndexValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for IndexValue {
    fn from(value: usize) -> Self {
        IndexValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        IndexValue::Str(value.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        IndexValue::Str(value)
    }
}

impl<T: Into<IndexValue>> From<Option<T>> for IndexValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(IndexValue::Nil, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        lifecycle: Lifecycle,
    }

    impl Entity for Sample {
        fn entity_type(&self) -> EntityType {
            Self::TYPE
        }

        fn lifecycle(&self) -> &Lifecycle {
            &self.lifecycle
        }
    }

    impl EntityKind for Sample {
        const TYPE: EntityType = "Sample";
    }

    #[test]
    fn test_key_is_last_segment() {
        let nested = Sample {
            lifecycle: Lifecycle::new("dap:session:1/thread:7"),
        };
        let root = Sample {
            lifecycle: Lifecycle::new("dap:session:1"),
        };
        assert_eq!(nested.key(), "thread:7");
        assert_eq!(root.key(), "session:1");
    }

    #[test]
    fn test_entity_ref_downcast_and_identity() {
        let sample = Rc::new(Sample {
            lifecycle: Lifecycle::new("dap:sample:1"),
        });
        let a = EntityRef::new(EntityId(1), sample.clone());
        let b = EntityRef::new(EntityId(1), sample);

        assert_eq!(a, b);
        assert!(a.is::<Sample>());
        assert_eq!(a.downcast::<Sample>().map(|p| p.uri().to_string()), Some("dap:sample:1".into()));
    }

    #[test]
    fn test_index_value_conversions() {
        assert_eq!(IndexValue::from(Some(3usize)), IndexValue::Int(3));
        assert_eq!(IndexValue::from(None::<bool>), IndexValue::Nil);
        assert_eq!(IndexValue::from("x").to_string(), "\"x\"");
    }
}
