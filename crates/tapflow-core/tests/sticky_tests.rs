use tapflow_core::{
    DisabledBackend, JsonFileBackend, Origin, StickyOptions, StickyValue, StorageArea,
    StorageContext, StorageScope, StoredRecord,
};

fn stored(origin: &Origin, key: &str) -> Option<StoredRecord<u32>> {
    origin
        .local_area()
        .get_item(key)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

fn seed(origin: &Origin, key: &str, raw: &str) {
    let writer = origin.open_context();
    writer.area(StorageScope::Local).set_item(key, raw).unwrap();
}

#[test]
fn test_default_is_written_through() {
    let origin = Origin::in_memory();
    let ctx = origin.open_context();
    let mut tempo = StickyValue::new(120u32, "reference-tempo", &ctx, StickyOptions::default());

    assert_eq!(tempo.get(), None);
    assert_eq!(*tempo.activate().unwrap(), 120);
    assert_eq!(tempo.get(), Some(&120));
    assert_eq!(
        stored(&origin, "reference-tempo"),
        Some(StoredRecord {
            value: 120,
            version: "default".to_string()
        })
    );
}

#[test]
fn test_value_survives_reload() {
    let origin = Origin::in_memory();
    {
        let ctx = origin.open_context();
        let mut window = StickyValue::new(8u32, "window-size", &ctx, StickyOptions::default());
        window.activate().unwrap();
        window.set(12);
    }

    let ctx = origin.open_context();
    let mut window = StickyValue::new(8u32, "window-size", &ctx, StickyOptions::default());
    assert_eq!(*window.activate().unwrap(), 12);
}

#[test]
fn test_other_version_is_ignored_and_replaced() {
    let origin = Origin::in_memory();
    seed(&origin, "window-size", r#"{"value":4,"version":"v1"}"#);

    let ctx = origin.open_context();
    let mut window = StickyValue::new(
        8u32,
        "window-size",
        &ctx,
        StickyOptions::default().with_version("v2"),
    );
    assert_eq!(*window.activate().unwrap(), 8);
    assert_eq!(
        stored(&origin, "window-size").map(|r| (r.value, r.version)),
        Some((8, "v2".to_string()))
    );
}

#[test]
fn test_malformed_record_falls_back_to_default() {
    for raw in [
        "not json",
        r#"{"version":"default"}"#,
        r#"{"value":"eight","version":"default"}"#,
        r#"{"value":null,"version":"default"}"#,
    ] {
        let origin = Origin::in_memory();
        seed(&origin, "window-size", raw);

        let ctx = origin.open_context();
        let mut window = StickyValue::new(8u32, "window-size", &ctx, StickyOptions::default());
        assert_eq!(*window.activate().unwrap(), 8, "record {raw}");
    }
}

#[test]
fn test_change_reaches_other_context() {
    let origin = Origin::in_memory();
    let tab_a = origin.open_context();
    let tab_b = origin.open_context();

    let mut a = StickyValue::new(120u32, "reference-tempo", &tab_a, StickyOptions::default());
    let mut b = StickyValue::new(120u32, "reference-tempo", &tab_b, StickyOptions::default());
    a.activate().unwrap();
    b.activate().unwrap();

    a.set(90);
    assert_eq!(b.get(), Some(&120));
    assert!(b.sync());
    assert_eq!(b.get(), Some(&90));

    // Writer never hears its own change, and the write-back is silent
    assert!(!a.sync());
    assert_eq!(a.get(), Some(&90));
}

#[test]
fn test_other_version_in_other_context_is_not_adopted() {
    let origin = Origin::in_memory();
    let mut old = StickyValue::new(
        8u32,
        "window-size",
        &origin.open_context(),
        StickyOptions::default().with_version("v1"),
    );
    let mut new = StickyValue::new(
        8u32,
        "window-size",
        &origin.open_context(),
        StickyOptions::default().with_version("v2"),
    );
    old.activate().unwrap();
    new.activate().unwrap();

    old.set(3);
    assert!(!new.sync());
    assert_eq!(new.get(), Some(&8));
}

#[test]
fn test_removal_is_ignored() {
    let origin = Origin::in_memory();
    let tab_a = origin.open_context();
    let mut b = StickyValue::new(
        8u32,
        "window-size",
        &origin.open_context(),
        StickyOptions::default(),
    );
    b.activate().unwrap();

    tab_a.area(StorageScope::Local).remove_item("window-size").unwrap();
    assert!(!b.sync());
    assert_eq!(b.get(), Some(&8));
}

#[test]
fn test_session_scope_is_not_shared() {
    let origin = Origin::in_memory();
    let options = || StickyOptions::scoped(StorageScope::Session);
    let mut a = StickyValue::new(8u32, "window-size", &origin.open_context(), options());
    let mut b = StickyValue::new(8u32, "window-size", &origin.open_context(), options());
    a.activate().unwrap();
    b.activate().unwrap();

    a.set(5);
    assert!(!b.sync());
    assert_eq!(b.get(), Some(&8));
    assert_eq!(origin.local_area().get_item("window-size").unwrap(), None);
}

#[test]
fn test_deactivate_stops_notifications() {
    let origin = Origin::in_memory();
    let tab_a = origin.open_context();
    let mut a = StickyValue::new(8u32, "window-size", &tab_a, StickyOptions::default());
    let mut b = StickyValue::new(
        8u32,
        "window-size",
        &origin.open_context(),
        StickyOptions::default(),
    );

    for _ in 0..5 {
        b.activate().unwrap();
        b.deactivate();
    }
    assert_eq!(origin.local_area().listener_count(), 0);

    a.activate().unwrap();
    a.set(6);
    assert!(!b.sync());
    assert_eq!(b.get(), Some(&8));
}

#[test]
fn test_unavailable_storage_fails_activation() {
    let origin = Origin::new(DisabledBackend::default());
    let ctx = origin.open_context();
    let mut window = StickyValue::new(8u32, "window-size", &ctx, StickyOptions::default());

    assert!(window.activate().is_err());
    assert_eq!(*window.activate_or_fallback(), 8);
    assert!(!window.is_persistent());

    // Keeps working in memory
    window.set(10);
    assert_eq!(window.get(), Some(&10));
}

#[test]
fn test_file_backed_contexts_in_two_processes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local_storage.json");

    // Two independent areas on one file stand in for two processes
    let area_a = StorageArea::new(StorageScope::Local, JsonFileBackend::open(&path).unwrap());
    let area_b = StorageArea::new(StorageScope::Local, JsonFileBackend::open(&path).unwrap());
    let tab_a = StorageContext::new(area_a);
    let tab_b = StorageContext::new(area_b.clone());

    let mut a = StickyValue::new(120u32, "reference-tempo", &tab_a, StickyOptions::default());
    let mut b = StickyValue::new(120u32, "reference-tempo", &tab_b, StickyOptions::default());
    a.activate().unwrap();
    b.activate().unwrap();

    a.set(140);
    assert_eq!(area_b.refresh().unwrap(), 1);
    assert!(b.sync());
    assert_eq!(b.get(), Some(&140));

    // A fresh start reads the persisted value
    let area_c = StorageArea::new(StorageScope::Local, JsonFileBackend::open(&path).unwrap());
    let mut c = StickyValue::new(
        120u32,
        "reference-tempo",
        &StorageContext::new(area_c),
        StickyOptions::default(),
    );
    assert_eq!(*c.activate().unwrap(), 140);
}

#[test]
fn test_retry_after_failed_write_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let origin = Origin::new(JsonFileBackend::open(&path).unwrap());
    let mut a = StickyValue::new(
        120u32,
        "reference-tempo",
        &origin.open_context(),
        StickyOptions::default(),
    );
    let mut b = StickyValue::new(
        120u32,
        "reference-tempo",
        &origin.open_context(),
        StickyOptions::default(),
    );
    a.activate().unwrap();
    b.activate().unwrap();

    let blocker = path.with_extension("json.tmp");
    std::fs::create_dir(&blocker).unwrap();
    a.set(140);
    assert_eq!(a.get(), Some(&140));
    assert!(!b.sync());

    std::fs::remove_dir(&blocker).unwrap();
    a.set(140);
    assert!(b.sync());
    assert_eq!(b.get(), Some(&140));

    let reopened = Origin::new(JsonFileBackend::open(&path).unwrap());
    assert_eq!(stored(&reopened, "reference-tempo").map(|r| r.value), Some(140));
}

#[test]
fn test_reactivation_after_fallback_adopts_stored_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let origin = Origin::new(JsonFileBackend::open(&path).unwrap());
    let mut window = StickyValue::new(
        8u32,
        "window-size",
        &origin.open_context(),
        StickyOptions::default(),
    );

    let blocker = path.with_extension("json.tmp");
    std::fs::create_dir(&blocker).unwrap();
    assert_eq!(*window.activate_or_fallback(), 8);
    assert!(!window.is_persistent());

    // Storage recovers and another context stores a value meanwhile
    std::fs::remove_dir(&blocker).unwrap();
    seed(&origin, "window-size", r#"{"value":12,"version":"default"}"#);

    assert_eq!(*window.activate().unwrap(), 12);
    assert!(window.is_persistent());
    assert_eq!(stored(&origin, "window-size").map(|r| r.value), Some(12));
}

#[test]
fn test_set_before_activation_persists() {
    let origin = Origin::in_memory();
    let mut window = StickyValue::new(
        8u32,
        "window-size",
        &origin.open_context(),
        StickyOptions::default().with_server_state(2),
    );
    window.update(|prev| prev + 1);
    assert_eq!(window.get(), Some(&3));
    assert_eq!(stored(&origin, "window-size").map(|r| r.value), Some(3));

    // Activation keeps the value and starts listening
    assert_eq!(*window.activate().unwrap(), 3);
    assert!(window.is_persistent());
}
