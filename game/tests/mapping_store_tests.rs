use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use genius::color::Color;
use genius::mapping::{ColorMapping, MappingStore};
use genius::storage::{FileStore, KeyValueStore, MAPPING_KEY, MemoryStore};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("genius_{tag}_{nanos}"))
}

fn custom_mapping() -> ColorMapping {
    let mut mapping = ColorMapping::new();
    for (color, button) in Color::ALL.into_iter().zip([7, 3, 12, 0, 9, 4]) {
        mapping.bind(color, button).unwrap();
    }
    mapping
}

#[test]
fn load_without_save_returns_the_default_layout() {
    let mut mappings = MappingStore::open(MemoryStore::new());
    let loaded = mappings.load().clone();
    assert_eq!(loaded, ColorMapping::default_layout());
    for color in Color::ALL {
        assert_eq!(loaded.get(color), Some(color.index()));
    }
}

#[test]
fn load_after_save_round_trips_through_files() {
    let dir = unique_temp_dir("mapping");
    let mapping = custom_mapping();

    let mut mappings = MappingStore::open(FileStore::new(&dir));
    mappings.save(mapping.clone()).unwrap();

    let text = fs::read_to_string(dir.join("gamepadMapping.json")).unwrap();
    assert_eq!(text, r#"{"1":7,"2":3,"3":12,"4":0,"5":9,"6":4}"#);

    let mut reopened = MappingStore::open(FileStore::new(&dir));
    assert_eq!(reopened.load(), &mapping);
    assert_eq!(reopened.resolve(12), Some(Color::Amber));
    assert_eq!(reopened.resolve(1), None);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn malformed_saved_mapping_falls_back_to_default() {
    let store = MemoryStore::new();
    store.set(MAPPING_KEY, "[1, 2, 3]").unwrap();
    let mappings = MappingStore::open(store.clone());
    assert_eq!(mappings.current(), &ColorMapping::default_layout());

    store.set(MAPPING_KEY, r#"{"1":0,"2":0}"#).unwrap();
    let mappings = MappingStore::open(store);
    assert_eq!(mappings.current(), &ColorMapping::default_layout());
}

#[test]
fn reset_persists_the_default_and_clear_forgets_it() {
    let store = MemoryStore::new();
    let mut mappings = MappingStore::open(store.clone());
    mappings.save(custom_mapping()).unwrap();

    assert_eq!(mappings.reset().unwrap(), &ColorMapping::default_layout());
    assert_eq!(
        store.get(MAPPING_KEY).unwrap().as_deref(),
        Some(r#"{"1":0,"2":1,"3":2,"4":3,"5":4,"6":5}"#)
    );

    mappings.save(custom_mapping()).unwrap();
    mappings.clear().unwrap();
    assert_eq!(store.get(MAPPING_KEY).unwrap(), None);
    assert_eq!(mappings.load(), &ColorMapping::default_layout());
}

#[test]
fn default_mapping_resolves_button_zero_to_red() {
    let mappings = MappingStore::open(MemoryStore::new());
    assert_eq!(mappings.resolve(0), Some(Color::Red));
    assert_eq!(mappings.resolve(5), Some(Color::Green));
    assert_eq!(mappings.resolve(6), None);
}
