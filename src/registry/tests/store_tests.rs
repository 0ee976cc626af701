//! Persistence behaviour of the registry service.

use super::lifecycle_tests::{add_and_echo, catalog_with_calc};
use crate::registry::adapters::InMemoryRegistryStore;
use crate::registry::domain::{ItemKind, ItemState, RegistryItem};
use crate::registry::ports::{MockRegistryStore, StoreError};
use crate::registry::services::{RegistryError, RegistryService};
use rstest::rstest;
use std::sync::Arc;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_save_leaves_state_unchanged() {
    let mut store = MockRegistryStore::new();
    let mut saves = 0_u32;
    store.expect_save().returning(move |_, _, _| {
        saves = saves.saturating_add(1);
        if saves == 1 {
            Ok(())
        } else {
            Err(StoreError::runtime(std::io::Error::other("disk full")))
        }
    });
    let registry = RegistryService::new(Arc::new(store), catalog_with_calc());
    registry
        .load(RegistryItem::Skill(add_and_echo()))
        .await
        .expect("first save succeeds");

    let result = registry.activate(ItemKind::Skill, "add-and-echo").await;

    assert!(matches!(result, Err(RegistryError::Store(_))));
    let skill = registry
        .get(ItemKind::Skill, "add-and-echo")
        .await
        .expect("get");
    assert_eq!(skill.state(), ItemState::Draft);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stored_document_keeps_declaration_order() {
    let store = Arc::new(InMemoryRegistryStore::new());
    let registry = RegistryService::new(store.clone(), catalog_with_calc());
    registry
        .load(RegistryItem::Skill(add_and_echo()))
        .await
        .expect("load");

    let document = store
        .document(ItemKind::Skill, "add-and-echo")
        .expect("store readable")
        .expect("document stored");
    let keys: Vec<&str> = document
        .as_object()
        .map(|fields| fields.keys().map(String::as_str).collect())
        .unwrap_or_default();

    assert_eq!(keys, ["name", "description", "state", "inputs", "steps"]);
}
