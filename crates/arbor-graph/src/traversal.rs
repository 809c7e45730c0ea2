//! Ancestor traversal
//!
//! Walks the parents of one root document over a prefetched
//! [`AncestorSnapshot`] and emits [`GraphRelation`]s.
//!
//! # Termination
//!
//! Both walks are explicit work queues; nothing recurses. A depth-first
//! scan first checks whether the ancestors reachable from the root contain
//! a cycle, then one of two walks runs:
//!
//! - **Acyclic**: the queue holds `(node, depth)` states, so every relation
//!   of every path is emitted. Per-agency depths are minimal and the maximal
//!   depth is the longest path.
//! - **Cyclic**: each node is expanded once, at its shortest depth, and every
//!   parent edge of an expanded node is emitted at that depth plus one. Work
//!   is linear in the number of reachable edges. Per-agency depths stay
//!   minimal; the maximal depth is one past the deepest expanded node.
//!
//! A cycle `U1 -> U2 -> U1` walked from `U1` yields `(U1, U2, 1)` and
//! `(U2, U1, 2)`. A leaf `L -> A -> C -> B -> A` yields depths 1 to 4, the
//! last being the edge closing the cycle back onto `A`.

use crate::error::AggregationError;
use crate::prefetch::AncestorSnapshot;
use arbor_model::{AgencyId, DocumentId, GraphCandidate, GraphRelation};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Traversal port
pub trait GraphTraversal: Send + Sync {
    /// Relations reachable from `root`, resolved through `snapshot` only
    ///
    /// # Errors
    /// Returns `AggregationError` if the root or an ancestor lacks an agency
    /// or a parent id does not resolve.
    fn traverse(
        &self,
        root: &GraphCandidate,
        snapshot: &AncestorSnapshot,
    ) -> Result<Vec<GraphRelation>, AggregationError>;
}

/// Depth-first scan state of a node
#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnPath,
    Done,
}

/// Breadth-first work-queue traversal
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkQueueTraversal;

impl WorkQueueTraversal {
    /// Create traversal
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Check whether the ancestors reachable from the root contain a cycle
    ///
    /// A parent pointing back at the root counts as a cycle.
    fn has_cycle(root: &GraphCandidate, snapshot: &AncestorSnapshot) -> Result<bool, AggregationError> {
        let mut visits: HashMap<&DocumentId, Visit> = HashMap::from([(&root.id, Visit::OnPath)]);
        let mut stack: Vec<(&DocumentId, &[DocumentId], usize)> =
            vec![(&root.id, root.up.as_slice(), 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, parents, next) = *frame;
            let Some(parent) = parents.get(next) else {
                visits.insert(node, Visit::Done);
                stack.pop();
                continue;
            };
            frame.2 += 1;

            match visits.get(parent) {
                Some(Visit::OnPath) => return Ok(true),
                Some(Visit::Done) => {}
                None => {
                    let projection =
                        snapshot
                            .get(parent)
                            .ok_or_else(|| AggregationError::DanglingParent {
                                child: node.clone(),
                                parent: parent.clone(),
                            })?;
                    visits.insert(parent, Visit::OnPath);
                    stack.push((parent, projection.up.as_slice(), 0));
                }
            }
        }
        Ok(false)
    }

    /// Breadth-first walk; `every_depth` keys expansion by `(node, depth)`
    /// instead of by node
    fn walk(
        root: &GraphCandidate,
        root_agency: &AgencyId,
        snapshot: &AncestorSnapshot,
        every_depth: bool,
    ) -> Result<Vec<GraphRelation>, AggregationError> {
        let mut relations = BTreeSet::new();
        let mut expanded: HashSet<(&DocumentId, u32)> = HashSet::from([(&root.id, 0)]);
        let mut queue: VecDeque<(&DocumentId, &AgencyId, &[DocumentId], u32)> =
            VecDeque::from([(&root.id, root_agency, root.up.as_slice(), 0)]);

        while let Some((child, child_agency, parents, depth)) = queue.pop_front() {
            let depth = depth + 1;
            for parent in parents {
                let projection =
                    snapshot
                        .get(parent)
                        .ok_or_else(|| AggregationError::DanglingParent {
                            child: child.clone(),
                            parent: parent.clone(),
                        })?;
                let parent_agency = projection
                    .originating_agency
                    .as_ref()
                    .ok_or_else(|| AggregationError::MissingAgency(parent.clone()))?;

                relations.insert(GraphRelation {
                    child_id: child.clone(),
                    child_agency: child_agency.clone(),
                    parent_id: parent.clone(),
                    parent_agency: parent_agency.clone(),
                    depth,
                });
                let key = if every_depth { depth } else { 0 };
                if expanded.insert((parent, key)) {
                    queue.push_back((parent, parent_agency, projection.up.as_slice(), depth));
                }
            }
        }
        Ok(relations.into_iter().collect())
    }
}

impl GraphTraversal for WorkQueueTraversal {
    fn traverse(
        &self,
        root: &GraphCandidate,
        snapshot: &AncestorSnapshot,
    ) -> Result<Vec<GraphRelation>, AggregationError> {
        let root_agency = root
            .originating_agency
            .as_ref()
            .ok_or_else(|| AggregationError::MissingAgency(root.id.clone()))?;

        if Self::has_cycle(root, snapshot)? {
            tracing::debug!("Cycle above {}, expanding each ancestor once", root.id);
            Self::walk(root, root_agency, snapshot, false)
        } else {
            Self::walk(root, root_agency, snapshot, true)
        }
    }
}
