use super::*;
use crate::settings::model::Pattern;

fn temp_store(name: &str) -> JsonStore {
    let dir = std::env::temp_dir().join(format!(
        "filigrane_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    JsonStore::open(dir).unwrap()
}

#[test]
fn fresh_store_yields_defaults() {
    let store = temp_store("store_defaults");
    assert_eq!(store.load_settings(), WatermarkSettings::default());
    assert!(store.recent_sessions().is_empty());
    assert!(store.presets().is_empty());
    std::fs::remove_dir_all(store.root()).unwrap();
}

#[test]
fn settings_round_trip_through_the_settings_key() {
    let store = temp_store("store_settings");
    let s = WatermarkSettings {
        pattern: Pattern::Grid,
        quantity: 6,
        text: "© studio".to_owned(),
        ..Default::default()
    };
    store.save_settings(&s).unwrap();
    assert!(store.root().join("watermark-settings.json").is_file());
    assert_eq!(store.load_settings(), s);
    std::fs::remove_dir_all(store.root()).unwrap();
}

#[test]
fn corrupt_document_loads_as_default() {
    let store = temp_store("store_corrupt");
    std::fs::write(store.root().join("recent-sessions.json"), b"{not json").unwrap();
    assert!(store.recent_sessions().is_empty());
    std::fs::remove_dir_all(store.root()).unwrap();
}

#[test]
fn sessions_keep_the_five_newest_first() {
    let mut store = temp_store("store_sessions");
    let settings = WatermarkSettings::default();
    for count in 1..=7 {
        store.record_session(count, &settings).unwrap();
    }
    let counts: Vec<usize> = store.recent_sessions().iter().map(|s| s.image_count).collect();
    assert_eq!(counts, vec![7, 6, 5, 4, 3]);

    let ids: std::collections::HashSet<Uuid> =
        store.recent_sessions().iter().map(|s| s.id).collect();
    assert_eq!(ids.len(), MAX_RECENT_SESSIONS);

    store.clear_sessions().unwrap();
    assert!(store.recent_sessions().is_empty());
    std::fs::remove_dir_all(store.root()).unwrap();
}

#[test]
fn session_json_uses_camel_case_and_rfc3339_dates() {
    let session = RecentSession::new(3, WatermarkSettings::default());
    let v: serde_json::Value = serde_json::to_value(&session).unwrap();
    assert_eq!(v["imageCount"], 3);
    let date = v["date"].as_str().unwrap();
    assert!(DateTime::parse_from_rfc3339(date).is_ok());
    assert_eq!(v["settings"]["edgeMargin"], 20.0);
}

#[test]
fn presets_replace_by_name_and_delete() {
    let store = temp_store("store_presets");
    let a = WatermarkSettings {
        opacity: 40.0,
        ..Default::default()
    };
    let b = WatermarkSettings {
        opacity: 90.0,
        ..Default::default()
    };
    store.save_preset("Soft", &a).unwrap();
    store.save_preset("Bold", &b).unwrap();
    store.save_preset(" Soft ", &b).unwrap();

    let names: Vec<String> = store.presets().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Bold", "Soft"]);
    assert_eq!(store.preset("Soft").unwrap().settings.opacity, 90.0);

    assert!(store.delete_preset("Bold").unwrap());
    assert!(!store.delete_preset("Bold").unwrap());
    assert_eq!(store.presets().len(), 1);

    let err = store.save_preset("  ", &a).unwrap_err();
    assert!(matches!(err, FiligraneError::Validation(_)));
    std::fs::remove_dir_all(store.root()).unwrap();
}
