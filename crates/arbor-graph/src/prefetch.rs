//! Ancestor prefetch
//!
//! Resolves the transitive closure of parent ids layer by layer before any
//! traversal starts, so the number of store round-trips is bounded by the
//! hierarchy depth instead of the node count. Traversal and aggregation then
//! read only from the frozen [`AncestorSnapshot`].

use crate::cache::AncestorLookup;
use crate::error::GraphError;
use arbor_model::{AncestorProjection, DocumentId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Frozen set of ancestor projections for one batch
#[derive(Debug, Clone, Default)]
pub struct AncestorSnapshot {
    projections: HashMap<DocumentId, Arc<AncestorProjection>>,
    missing: HashSet<DocumentId>,
    layers: usize,
}

impl AncestorSnapshot {
    /// Load every ancestor reachable from `parents`
    ///
    /// Each layer is one [`AncestorLookup::get_all`] call; ids already
    /// loaded (or known to be missing) are never requested twice, so cyclic
    /// data terminates.
    ///
    /// # Errors
    /// Returns `GraphError::CacheLoad` if a layer cannot be read.
    pub fn prefetch<'a, I>(lookup: &dyn AncestorLookup, parents: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = &'a DocumentId>,
    {
        let mut snapshot = Self::default();
        let mut frontier: BTreeSet<DocumentId> = parents.into_iter().cloned().collect();

        while !frontier.is_empty() {
            let request: Vec<DocumentId> = frontier.into_iter().collect();
            let mut loaded = lookup.get_all(&request)?;
            snapshot.layers += 1;

            let mut next = BTreeSet::new();
            for id in request {
                let Some(projection) = loaded.remove(&id) else {
                    snapshot.missing.insert(id);
                    continue;
                };
                for parent in &projection.up {
                    if !snapshot.is_known(parent) {
                        next.insert(parent.clone());
                    }
                }
                snapshot.projections.insert(id, projection);
            }
            next.retain(|id| !snapshot.is_known(id));
            frontier = next;
        }
        Ok(snapshot)
    }

    /// Load only the given ids, without following their parents
    ///
    /// # Errors
    /// Returns `GraphError::CacheLoad` if the read fails.
    pub fn load_direct<'a, I>(lookup: &dyn AncestorLookup, ids: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = &'a DocumentId>,
    {
        let request: Vec<DocumentId> = ids
            .into_iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut snapshot = Self::default();
        if request.is_empty() {
            return Ok(snapshot);
        }

        let mut loaded = lookup.get_all(&request)?;
        snapshot.layers = 1;
        for id in request {
            match loaded.remove(&id) {
                Some(projection) => {
                    snapshot.projections.insert(id, projection);
                }
                None => {
                    snapshot.missing.insert(id);
                }
            }
        }
        Ok(snapshot)
    }

    /// Projection of a unit, if loaded
    #[inline]
    #[must_use]
    pub fn get(&self, id: &DocumentId) -> Option<&AncestorProjection> {
        self.projections.get(id).map(Arc::as_ref)
    }

    /// Whether the id was requested and is absent from the store
    #[inline]
    #[must_use]
    pub fn is_missing(&self, id: &DocumentId) -> bool {
        self.missing.contains(id)
    }

    /// Number of loaded projections
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.projections.len()
    }

    /// No projection loaded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    /// Number of `get_all` layers used to build the snapshot
    #[inline]
    #[must_use]
    pub fn layers(&self) -> usize {
        self.layers
    }

    /// Add a projection without going through the lookup
    pub fn insert(&mut self, projection: AncestorProjection) {
        self.missing.remove(&projection.id);
        self.projections
            .insert(projection.id.clone(), Arc::new(projection));
    }

    fn is_known(&self, id: &DocumentId) -> bool {
        self.projections.contains_key(id) || self.missing.contains(id)
    }
}
