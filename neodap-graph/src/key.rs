//! Canonical view specifications and cache keys
//!
//! A view is described by a chain of stages. Each stage has a source
//! (an entity type, or an edge followed from the previous stage) and a set
//! of index filters. Filters are kept in a `BTreeSet`, so two views built
//! from the same filters in any order have the same canonical form and
//! therefore the same [`ViewKey`].

use crate::entity::{EdgeType, EntityType, IndexName, IndexValue};
use blake3::Hasher;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;

/// One `index == value` clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Filter {
    pub index: IndexName,
    pub value: IndexValue,
}

/// Where a stage takes its candidates from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StageSource {
    /// Every entity of a type
    Type(EntityType),
    /// Targets of `edge` from the previous stage's members
    Follow {
        edge: EdgeType,
        target: Option<EntityType>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Stage {
    pub source: StageSource,
    pub filters: BTreeSet<Filter>,
}

/// A full view description
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewSpec {
    stages: Vec<Stage>,
}

impl ViewSpec {
    /// All entities of `entity_type`
    pub fn of_type(entity_type: EntityType) -> Self {
        Self {
            stages: vec![Stage {
                source: StageSource::Type(entity_type),
                filters: BTreeSet::new(),
            }],
        }
    }

    /// Add a filter to the last stage
    pub fn filter(&self, index: IndexName, value: IndexValue) -> Self {
        let mut spec = self.clone();
        if let Some(stage) = spec.stages.last_mut() {
            stage.filters.insert(Filter { index, value });
        }
        spec
    }

    /// Append a follow stage
    pub fn follow(&self, edge: EdgeType, target: Option<EntityType>) -> Self {
        let mut spec = self.clone();
        spec.stages.push(Stage {
            source: StageSource::Follow { edge, target },
            filters: BTreeSet::new(),
        });
        spec
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn last(&self) -> Option<&Stage> {
        self.stages.last()
    }

    /// The same spec with the last stage's filters removed
    pub(crate) fn unfiltered(&self) -> Self {
        let mut spec = self.clone();
        if let Some(stage) = spec.stages.last_mut() {
            stage.filters.clear();
        }
        spec
    }

    /// The spec without its last stage
    pub(crate) fn parent(&self) -> Option<Self> {
        if self.stages.len() <= 1 {
            return None;
        }
        let mut spec = self.clone();
        spec.stages.pop();
        Some(spec)
    }

    /// Canonical text form, e.g. `Thread[state="stopped"]>stacks:Stack[index=0]`
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                out.push('>');
            }
            match &stage.source {
                StageSource::Type(ty) => out.push_str(ty),
                StageSource::Follow { edge, target } => {
                    out.push_str(edge);
                    out.push(':');
                    out.push_str(target.unwrap_or("*"));
                }
            }
            if !stage.filters.is_empty() {
                let clauses: Vec<String> = stage
                    .filters
                    .iter()
                    .map(|f| format!("{}={}", f.index, f.value))
                    .collect();
                out.push('[');
                out.push_str(&clauses.join(","));
                out.push(']');
            }
        }
        out
    }

    pub fn key(&self) -> ViewKey {
        ViewKey::from_canonical(self.canonical())
    }
}

/// Cache key of a view
///
/// Identity is the blake3 digest of the canonical form; the canonical text
/// is kept for display.
#[derive(Clone)]
pub struct ViewKey {
    canonical: String,
    digest: [u8; 32],
}

impl ViewKey {
    fn from_canonical(canonical: String) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(canonical.as_bytes());
        Self {
            digest: *hasher.finalize().as_bytes(),
            canonical,
        }
    }

    /// Key of the view that never has members
    pub fn empty() -> Self {
        Self::from_canonical(String::new())
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Get the digest as a hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// First 12 hex digits of the digest, used in logs
    pub fn short_hex(&self) -> String {
        hex::encode(&self.digest[..6])
    }
}

impl PartialEq for ViewKey {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Eq for ViewKey {}

impl Hash for ViewKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.digest.hash(state);
    }
}

impl fmt::Debug for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewKey({} {})", self.short_hex(), self.canonical)
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_order_does_not_change_key() {
        let base = ViewSpec::of_type("Frame");
        let a = base
            .filter("current", true.into())
            .filter("index", 0i64.into());
        let b = base
            .filter("index", 0i64.into())
            .filter("current", true.into());

        assert_eq!(a.key(), b.key());
        assert_eq!(a.canonical(), "Frame[current=true,index=0]");
    }

    #[test]
    fn test_follow_stages_are_positional() {
        let threads = ViewSpec::of_type("Thread");
        let filtered_then_followed = threads
            .filter("state", "stopped".into())
            .follow("stacks", Some("Stack"));
        let followed_then_filtered = threads
            .follow("stacks", Some("Stack"))
            .filter("state", "stopped".into());

        assert_ne!(filtered_then_followed.key(), followed_then_filtered.key());
        assert_eq!(
            filtered_then_followed.canonical(),
            "Thread[state=\"stopped\"]>stacks:Stack"
        );
    }

    #[test]
    fn test_value_types_are_distinguished() {
        let spec = ViewSpec::of_type("Variable");
        let as_int = spec.filter("name", 1i64.into());
        let as_str = spec.filter("name", "1".into());
        assert_ne!(as_int.key(), as_str.key());
    }

    #[test]
    fn test_parent_and_unfiltered() {
        let spec = ViewSpec::of_type("Thread")
            .follow("stacks", None)
            .filter("index", 0i64.into());
        assert_eq!(spec.unfiltered().canonical(), "Thread>stacks:*");
        assert_eq!(spec.parent().map(|p| p.canonical()), Some("Thread".into()));
        assert!(ViewSpec::of_type("Thread").parent().is_none());
    }

    #[test]
    fn test_digest_identifies_the_key() {
        let key = ViewSpec::of_type("Session").key();
        let again = ViewSpec::of_type("Session").key();
        assert_eq!(key.to_hex().len(), 64);
        assert_eq!(key.to_hex(), again.to_hex());
        assert!(key.to_hex().starts_with(&key.short_hex()));
        assert_ne!(key.digest(), ViewSpec::of_type("Thread").key().digest());

        let mut cache = std::collections::HashMap::new();
        cache.insert(key, 1);
        assert_eq!(cache.get(&again), Some(&1));
    }
}
