//! End-to-end tests for collection definitions, queries and filtering.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use synccol::{
    BaseCollection, BaseModel, Checkable, Extension, FilteredCollection, LocalStorage, MockRemote,
    Model, SyncConfig, SyncEngine, SyncError,
};

fn engine(remote: &Arc<MockRemote>) -> SyncEngine {
    SyncEngine::new(
        SyncConfig::new("https://api.example.com").with_name("tests"),
        Arc::new(LocalStorage::in_memory("tests")),
        remote.clone(),
    )
}

fn serve(remote: &MockRemote, name: &str, counter: u64, records: Value) {
    remote.set_counter(name, counter);
    remote.set_collection(name, records);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Category {
    id: u32,
    name: String,
    #[serde(default)]
    checked: bool,
}

impl Model for Category {}

impl Checkable for Category {
    fn is_checked(&self) -> bool {
        self.checked
    }

    fn set_checked(&mut self, checked: bool) {
        self.checked = checked;
    }
}

#[tokio::test]
async fn extend_leaves_the_original_untouched() {
    let remote = Arc::new(MockRemote::new());
    let base = BaseCollection::new(engine(&remote));

    let users = base.extend(Extension::named("users"));

    assert_eq!(base.name(), "bases");
    assert_eq!(users.name(), "users");
    assert!(users.pending().is_none());
    assert_eq!(base.extend(Extension::new()).name(), "bases");
    assert!(remote.requests().is_empty());
}

#[tokio::test]
async fn extend_and_persist_registers_with_the_loader() {
    let remote = Arc::new(MockRemote::new());
    serve(&remote, "users", 2, json!([{"id": 1, "name": "ada"}]));
    let engine = engine(&remote);

    let users = BaseCollection::new(engine.clone()).extend_and_persist(Extension::named("users"));
    assert!(users.pending().is_some());
    assert!(engine.is_loading());
    assert!(matches!(users.all(), Err(SyncError::NotFound { .. })));

    engine.load(false).await;

    assert_eq!(users.all().unwrap().len(), 1);
    assert!(!engine.is_loading());
}

#[tokio::test]
async fn instances_are_built_through_the_model() {
    let remote = Arc::new(MockRemote::new());
    serve(
        &remote,
        "categories",
        1,
        json!([{"id": 1, "name": "books"}, {"id": 2, "name": "games", "checked": true}]),
    );

    let categories = BaseCollection::new(engine(&remote))
        .with_model::<Category>()
        .extend_and_persist(Extension::named("categories"));
    let records = categories.loaded().await.unwrap();

    assert_eq!(
        records.to_vec(),
        vec![
            Category { id: 1, name: "books".into(), checked: false },
            Category { id: 2, name: "games".into(), checked: true },
        ]
    );
}

#[tokio::test]
async fn find_and_find_one() {
    let remote = Arc::new(MockRemote::new());
    serve(
        &remote,
        "items",
        3,
        json!([
            {"id": 1, "a": 1, "b": 2},
            {"id": 2, "a": 1, "b": 3},
            {"id": 3, "a": 1, "b": 2},
        ]),
    );
    let items = BaseCollection::new(engine(&remote)).extend_and_persist(Extension::named("items"));
    items.loaded().await.unwrap();

    let ids = |records: Vec<BaseModel>| -> Vec<Value> {
        records.iter().filter_map(|r| r.id().cloned()).collect()
    };

    assert_eq!(ids(items.find(&json!({"a": 1, "b": 2}), None).unwrap()), vec![json!(1), json!(3)]);
    assert_eq!(ids(items.find(&json!(3), Some("b")).unwrap()), vec![json!(2)]);
    assert!(items.find(&json!(3), None).unwrap().is_empty());
    assert!(items.find(&json!({"a": 2}), None).unwrap().is_empty());

    let first = items.find_one(&json!({"a": 1}), None).unwrap().unwrap();
    assert_eq!(first.id(), Some(&json!(1)));
    assert!(items.find_one(&json!({"b": 9}), None).unwrap().is_none());
    assert!(items.find_one(&json!("x"), None).unwrap().is_none());
}

#[tokio::test]
async fn queries_on_unknown_collections_fail() {
    let remote = Arc::new(MockRemote::new());
    let ghosts = BaseCollection::new(engine(&remote)).extend(Extension::named("ghosts"));

    let err = ghosts.find(&json!({"a": 1}), None).unwrap_err();
    assert_eq!(err.to_string(), "Collection ghosts does not exist");
    assert!(ghosts.find_one(&json!({"a": 1}), None).is_err());
}

#[tokio::test]
async fn reset_drops_collections() {
    let remote = Arc::new(MockRemote::new());
    serve(&remote, "users", 1, json!([{"id": 1}]));
    let engine = engine(&remote);
    let users = BaseCollection::new(engine.clone()).extend_and_persist(Extension::named("users"));
    users.loaded().await.unwrap();

    engine.reset().await.unwrap();

    assert!(matches!(users.all(), Err(SyncError::NotFound { .. })));
    assert_eq!(engine.storage().get("users").await.unwrap(), None);
}

#[tokio::test]
async fn filter_selection() {
    let remote = Arc::new(MockRemote::new());
    serve(
        &remote,
        "tags",
        1,
        json!([{"id": 1, "name": "red"}, {"id": 2, "name": "blue"}, {"id": 3, "name": "green"}]),
    );
    let tags = FilteredCollection::new(engine(&remote)).extend_and_persist(Extension::named("tags"));
    tags.loaded().await.unwrap();

    assert!(tags.show_all());
    assert!(tags.is_selected(&json!("anything"), None).unwrap());

    assert_eq!(tags.toggle_filter(0).unwrap(), Some(true));
    assert!(!tags.show_all());
    assert!(tags.is_selected(&json!("red"), None).unwrap());
    assert!(!tags.is_selected(&json!("blue"), None).unwrap());
    assert!(tags.is_selected(&json!(["blue", "red"]), None).unwrap());
    assert!(!tags.is_selected(&json!(["blue", "green"]), None).unwrap());
    assert!(tags.is_selected(&json!(1), Some("id")).unwrap());

    assert_eq!(tags.toggle_filter(1).unwrap(), Some(true));
    assert_eq!(tags.toggle_filter(0).unwrap(), Some(false));
    assert!(!tags.show_all());

    assert_eq!(tags.toggle_filter(1).unwrap(), Some(false));
    assert!(tags.show_all());

    assert_eq!(tags.toggle_filter(10).unwrap(), None);
}

#[tokio::test]
async fn reset_filter_unchecks_everything() {
    let remote = Arc::new(MockRemote::new());
    serve(&remote, "categories", 1, json!([{"id": 1, "name": "books"}, {"id": 2, "name": "games"}]));
    let base = FilteredCollection::new(engine(&remote));
    assert_eq!(base.name(), "baseFiltered");

    let categories = base
        .with_model::<Category>()
        .extend_and_persist(Extension::named("categories"));
    categories.loaded().await.unwrap();

    categories.toggle_filter(0).unwrap();
    categories.toggle_filter(1).unwrap();
    assert!(!categories.show_all());

    categories.reset_filter().unwrap();

    assert!(categories.show_all());
    assert!(categories.all().unwrap().read().iter().all(|c| !c.checked));
    assert!(base.show_all());
}

#[tokio::test]
async fn filter_state_is_shared_between_clones() {
    let remote = Arc::new(MockRemote::new());
    serve(&remote, "tags", 1, json!([{"id": 1, "name": "red"}]));
    let tags = FilteredCollection::new(engine(&remote)).extend_and_persist(Extension::named("tags"));
    tags.loaded().await.unwrap();

    let view = tags.clone();
    tags.toggle_filter(0).unwrap();
    assert!(!view.show_all());
    assert!(view.all().unwrap().get(0).unwrap().is_checked());
}
