//! Inherited rule resolver

use crate::error::ResolveError;
use arbor_graph::MetadataStore;
use arbor_model::{
    DocumentId, FinalAction, InheritedPropertyModel, InheritedRuleModel, PropertyName,
    PropertyValue, ResolvedRules, RuleCategory, RuleConflict, RuleId, Unit,
};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Resolves the rules in force on units stored in a [`MetadataStore`]
pub struct RuleResolver {
    store: Arc<dyn MetadataStore>,
}

impl RuleResolver {
    /// Create resolver
    #[must_use]
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Resolve the rules of one unit
    ///
    /// Reads the unit, then all of its persisted ancestors in one batch.
    ///
    /// # Errors
    /// Returns `ResolveError::UnitNotFound` for an unknown id,
    /// `ResolveError::GraphNotComputed` if the unit graph is missing and
    /// `ResolveError::Store` if a read fails.
    pub fn resolve(&self, unit_id: &DocumentId) -> Result<ResolvedRules, ResolveError> {
        let unit = self
            .store
            .find_units(std::slice::from_ref(unit_id))?
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::UnitNotFound(unit_id.clone()))?;
        let graph = unit
            .graph
            .as_ref()
            .ok_or_else(|| ResolveError::GraphNotComputed(unit_id.clone()))?;

        let ancestor_ids: Vec<DocumentId> = graph.ancestor_unit_ids.iter().cloned().collect();
        let ancestors: HashMap<DocumentId, Unit> = if ancestor_ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .find_units(&ancestor_ids)?
                .into_iter()
                .map(|u| (u.id.clone(), u))
                .collect()
        };
        if ancestors.len() < ancestor_ids.len() {
            tracing::warn!(
                "Unit {} references {} ancestors missing from the store",
                unit_id,
                ancestor_ids.len() - ancestors.len()
            );
        }

        let resolved = resolve_rules(&unit, &ancestors);
        tracing::debug!(
            "Resolved {} rules for unit {} ({} overridden, {} conflicts)",
            resolved.rules.len(),
            unit_id,
            resolved.overridden.len(),
            resolved.conflicts.len()
        );
        Ok(resolved)
    }

    /// Resolve several units
    ///
    /// # Errors
    /// Returns the first `ResolveError` encountered.
    pub fn resolve_many(&self, unit_ids: &[DocumentId]) -> Result<Vec<ResolvedRules>, ResolveError> {
        unit_ids.iter().map(|id| self.resolve(id)).collect()
    }
}

impl std::fmt::Debug for RuleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleResolver").finish_non_exhaustive()
    }
}

/// Declaring unit reached from the resolved unit
struct Reach<'a> {
    origin: &'a Unit,
    depth: u32,
    path: Vec<DocumentId>,
}

/// Resolve the rules and properties of `unit` given its loaded ancestors
///
/// Only parents present in `ancestors` are followed.
#[must_use]
pub fn resolve_rules(unit: &Unit, ancestors: &HashMap<DocumentId, Unit>) -> ResolvedRules {
    let mut resolved = ResolvedRules {
        unit_id: unit.id.clone(),
        rules: Vec::new(),
        overridden: Vec::new(),
        conflicts: Vec::new(),
        properties: resolve_properties(unit, ancestors),
    };
    let mut rules = Vec::new();
    let mut overridden = Vec::new();
    let mut conflicts = Vec::new();

    for category in RuleCategory::ALL {
        let rule_ids: BTreeSet<&RuleId> = std::iter::once(unit)
            .chain(ancestors.values())
            .filter_map(|u| u.management.category(category))
            .flat_map(|rules| rules.rules.iter().map(|d| &d.rule))
            .collect();

        for rule_id in rule_ids {
            let reaches = reach(
                unit,
                ancestors,
                |u| {
                    u.management
                        .category(category)
                        .and_then(|r| r.declaration(rule_id))
                        .is_some()
                },
                |u| {
                    u.management
                        .category(category)
                        .is_some_and(|r| r.blocks(rule_id))
                },
            );
            let Some(closest) = reaches.iter().map(|r| r.depth).min() else {
                continue;
            };

            let (winners, shadowed): (Vec<&Reach<'_>>, Vec<&Reach<'_>>) =
                reaches.iter().partition(|r| r.depth == closest);
            let winner_ids: Vec<DocumentId> = winners.iter().map(|r| r.origin.id.clone()).collect();

            if let [winner] = winners.as_slice() {
                rules.push(model(winner, category, rule_id, &resolved));
            } else {
                conflicts.push(RuleConflict {
                    category,
                    rule_id: rule_id.clone(),
                    depth: closest,
                    candidates: winners
                        .iter()
                        .map(|r| model(r, category, rule_id, &resolved))
                        .collect(),
                });
            }
            overridden.extend(shadowed.into_iter().map(|r| {
                let mut superseded = model(r, category, rule_id, &resolved);
                superseded.override_by.clone_from(&winner_ids);
                superseded
            }));
        }
    }

    resolved.rules = rules;
    resolved.overridden = overridden;
    resolved.conflicts = conflicts;
    resolved
}

/// Category and global properties in force on `unit`
///
/// Each property is taken from its closest declarations; a category
/// property stops at a unit preventing inheritance of that category.
fn resolve_properties(
    unit: &Unit,
    ancestors: &HashMap<DocumentId, Unit>,
) -> Vec<InheritedPropertyModel> {
    let mut properties = Vec::new();

    for category in RuleCategory::ALL {
        let start = properties.len();
        for name in PropertyName::CATEGORY {
            let value_of = |u: &Unit| {
                u.management
                    .category(category)
                    .and_then(|r| r.property(name))
            };
            let reaches = reach(
                unit,
                ancestors,
                |u| value_of(u).is_some(),
                |u| {
                    u.management
                        .category(category)
                        .is_some_and(|r| r.inheritance.prevent_inheritance)
                },
            );
            properties.extend(closest(&reaches).filter_map(|r| {
                value_of(r.origin).map(|value| property_model(r, Some(category), name, value))
            }));
        }
        if category == RuleCategory::AppraisalRule {
            let mut appraisal = properties.split_off(start);
            assume_keep(unit, &mut appraisal);
            properties.append(&mut appraisal);
        }
    }

    let name = PropertyName::NeedAuthorization;
    let reaches = reach(
        unit,
        ancestors,
        |u| u.management.global_property(name).is_some(),
        |_| false,
    );
    properties.extend(closest(&reaches).filter_map(|r| {
        r.origin
            .management
            .global_property(name)
            .map(|value| property_model(r, None, name, value))
    }));
    properties
}

/// Implicit `Keep` final action of an appraisal category
///
/// Applies unless the unit's own agency declared a final action on the way;
/// it then replaces final actions inherited from other agencies. Holding
/// units (no agency) get no default.
fn assume_keep(unit: &Unit, appraisal: &mut Vec<InheritedPropertyModel>) {
    let Some(agency) = unit.originating_agency.as_ref() else {
        return;
    };
    let declared_by_agency = appraisal.iter().any(|p| {
        p.name == PropertyName::FinalAction && p.originating_agency.as_ref() == Some(agency)
    });
    if declared_by_agency {
        return;
    }
    appraisal.retain(|p| p.name != PropertyName::FinalAction);
    appraisal.insert(
        0,
        InheritedPropertyModel {
            category: Some(RuleCategory::AppraisalRule),
            name: PropertyName::FinalAction,
            value: PropertyValue::FinalAction(FinalAction::Keep),
            origin_unit: unit.id.clone(),
            originating_agency: Some(agency.clone()),
            depth: 0,
            path: vec![unit.id.clone()],
            implicit: true,
        },
    );
}

/// Every unit matching `declares` that a value can flow from, with its
/// shortest depth and path
///
/// Expansion stops above a unit matching `blocks`; that unit's own
/// declaration still counts.
fn reach<'a>(
    unit: &'a Unit,
    ancestors: &'a HashMap<DocumentId, Unit>,
    declares: impl Fn(&Unit) -> bool,
    blocks: impl Fn(&Unit) -> bool,
) -> Vec<Reach<'a>> {
    let mut reaches = Vec::new();
    let mut visited: HashSet<&DocumentId> = HashSet::from([&unit.id]);
    let mut queue: VecDeque<(&Unit, u32, Vec<DocumentId>)> =
        VecDeque::from([(unit, 0, vec![unit.id.clone()])]);

    while let Some((node, depth, path)) = queue.pop_front() {
        if declares(node) {
            reaches.push(Reach {
                origin: node,
                depth,
                path: path.clone(),
            });
        }
        if blocks(node) {
            continue;
        }
        for parent_id in &node.up {
            let Some(parent) = ancestors.get(parent_id) else {
                continue;
            };
            if visited.insert(&parent.id) {
                let mut parent_path = path.clone();
                parent_path.push(parent.id.clone());
                queue.push_back((parent, depth + 1, parent_path));
            }
        }
    }
    reaches
}

/// Reaches at the smallest depth
fn closest<'r, 'a>(reaches: &'r [Reach<'a>]) -> impl Iterator<Item = &'r Reach<'a>> {
    let min = reaches.iter().map(|r| r.depth).min();
    reaches.iter().filter(move |r| Some(r.depth) == min)
}

fn property_model(
    reach: &Reach<'_>,
    category: Option<RuleCategory>,
    name: PropertyName,
    value: PropertyValue,
) -> InheritedPropertyModel {
    InheritedPropertyModel {
        category,
        name,
        value,
        origin_unit: reach.origin.id.clone(),
        originating_agency: reach.origin.originating_agency.clone(),
        depth: reach.depth,
        path: reach.path.clone(),
        implicit: false,
    }
}

fn model(
    reach: &Reach<'_>,
    category: RuleCategory,
    rule_id: &RuleId,
    resolved: &ResolvedRules,
) -> InheritedRuleModel {
    let declaration = reach
        .origin
        .management
        .category(category)
        .and_then(|r| r.declaration(rule_id));
    let property = |name| resolved.property(Some(category), name);

    InheritedRuleModel {
        rule_id: rule_id.clone(),
        category,
        start_date: declaration.and_then(|d| d.start_date),
        end_date: declaration.and_then(|d| d.end_date),
        origin_unit: reach.origin.id.clone(),
        originating_agency: reach.origin.originating_agency.clone(),
        depth: reach.depth,
        path: reach.path.clone(),
        final_action: match property(PropertyName::FinalAction) {
            Some(PropertyValue::FinalAction(action)) => Some(*action),
            _ => None,
        },
        classification_level: match property(PropertyName::ClassificationLevel) {
            Some(PropertyValue::Text(level)) => Some(level.clone()),
            _ => None,
        },
        classification_owner: match property(PropertyName::ClassificationOwner) {
            Some(PropertyValue::Text(owner)) => Some(owner.clone()),
            _ => None,
        },
        classification_reassessing_date: match property(
            PropertyName::ClassificationReassessingDate,
        ) {
            Some(PropertyValue::Date(date)) => Some(*date),
            _ => None,
        },
        need_reassessing_authorization: match property(
            PropertyName::NeedReassessingAuthorization,
        ) {
            Some(PropertyValue::Flag(flag)) => Some(*flag),
            _ => None,
        },
        override_by: Vec::new(),
    }
}
