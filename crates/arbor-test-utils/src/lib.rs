//! Testing utilities for the Arbor workspace
//!
//! Shared builders, hierarchy fixtures and lookups.

#![allow(missing_docs)]

use arbor_graph::{GraphComputeConfig, GraphComputeService, InMemoryMetadataStore};
use arbor_model::{
    CategoryRules, DocumentId, Management, ObjectGroup, ObjectGroupGraph, RuleCategory,
    RuleDeclaration, Unit, UnitGraph,
};
use std::sync::Arc;

pub fn create_unit(id: &str, agency: &str, up: &[&str]) -> Unit {
    Unit::new(id, agency).with_up(up.iter().copied())
}

pub fn create_object_group(id: &str, up: &[&str]) -> ObjectGroup {
    ObjectGroup::new(id, up.iter().copied())
}

/// Management block declaring `rules` in one category
pub fn create_management(category: RuleCategory, rules: &[&str]) -> Management {
    Management::default().with_category(
        category,
        CategoryRules::with_rules(rules.iter().map(|r| RuleDeclaration::new(*r))),
    )
}

pub fn setup_store(units: Vec<Unit>, object_groups: Vec<ObjectGroup>) -> Arc<InMemoryMetadataStore> {
    let store = InMemoryMetadataStore::new();
    for unit in units {
        store.insert_unit(unit);
    }
    for object_group in object_groups {
        store.insert_object_group(object_group);
    }
    Arc::new(store)
}

/// Chain `u0 <- u1 <- ... <- u{len-1}`, unit `i` owned by agency `A{i}`
pub fn setup_chain_store(len: usize) -> Arc<InMemoryMetadataStore> {
    let units = (0..len)
        .map(|i| {
            let unit = Unit::new(format!("u{i}"), format!("A{i}"));
            if i == 0 {
                unit
            } else {
                unit.with_up([format!("u{}", i - 1)])
            }
        })
        .collect();
    setup_store(units, Vec::new())
}

/// Two-unit cycle `u1 -> u2 -> u1`
pub fn setup_cycle_store() -> Arc<InMemoryMetadataStore> {
    setup_store(
        vec![create_unit("u1", "A1", &["u2"]), create_unit("u2", "A2", &["u1"])],
        Vec::new(),
    )
}

pub fn test_config() -> GraphComputeConfig {
    GraphComputeConfig::default()
        .with_batch_size(10)
        .with_worker_threads(2)
}

pub fn setup_service(store: Arc<InMemoryMetadataStore>) -> GraphComputeService {
    GraphComputeService::new(store, test_config()).unwrap()
}

pub fn unit_graph(store: &InMemoryMetadataStore, id: &str) -> UnitGraph {
    store
        .unit(&DocumentId::from(id))
        .and_then(|u| u.graph)
        .unwrap_or_else(|| panic!("unit {id} has no computed graph"))
}

pub fn object_group_graph(store: &InMemoryMetadataStore, id: &str) -> ObjectGroupGraph {
    store
        .object_group(&DocumentId::from(id))
        .and_then(|og| og.graph)
        .unwrap_or_else(|| panic!("object group {id} has no computed graph"))
}
