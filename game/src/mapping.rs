use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Color;
use crate::storage::{KeyValueStore, MAPPING_KEY, StorageError, load_json, save_json};

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("button {button} is already mapped to {owner}")]
    ButtonInUse { button: usize, owner: Color },
    #[error("mapping is incomplete: {bound} of 6 colors bound")]
    Incomplete { bound: usize },
    #[error("invalid mapping entry {key:?}")]
    InvalidEntry { key: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Logical color -> physical gamepad button index.
///
/// No two colors share a button. A mapping may be partial; it is complete
/// when all six colors are bound. On disk it is a JSON object keyed by the
/// color id as a string: `{"1": 0, "2": 1, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, usize>",
    into = "BTreeMap<String, usize>"
)]
pub struct ColorMapping {
    bindings: BTreeMap<Color, usize>,
}

impl ColorMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Red..Green on buttons 0..5.
    pub fn default_layout() -> Self {
        Self {
            bindings: Color::ALL.into_iter().map(|c| (c, c.index())).collect(),
        }
    }

    pub fn get(&self, color: Color) -> Option<usize> {
        self.bindings.get(&color).copied()
    }

    /// Reverse lookup: which color owns this physical button.
    pub fn color_for(&self, button: usize) -> Option<Color> {
        self.bindings
            .iter()
            .find_map(|(&color, &b)| (b == button).then_some(color))
    }

    pub fn is_bound(&self, button: usize) -> bool {
        self.color_for(button).is_some()
    }

    /// Binds `color` to `button`, replacing any previous binding of `color`.
    /// Fails when a different color already owns `button`.
    pub fn bind(&mut self, color: Color, button: usize) -> Result<(), MappingError> {
        if let Some(owner) = self.color_for(button) {
            if owner != color {
                return Err(MappingError::ButtonInUse { button, owner });
            }
        }
        self.bindings.insert(color, button);
        Ok(())
    }

    pub fn unbind(&mut self, color: Color) -> Option<usize> {
        self.bindings.remove(&color)
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.bindings.len() == Color::ALL.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Color, usize)> + '_ {
        self.bindings.iter().map(|(&c, &b)| (c, b))
    }

    pub fn unbound(&self) -> impl Iterator<Item = Color> + '_ {
        Color::ALL
            .into_iter()
            .filter(|c| !self.bindings.contains_key(c))
    }
}

impl TryFrom<BTreeMap<String, usize>> for ColorMapping {
    type Error = MappingError;

    fn try_from(raw: BTreeMap<String, usize>) -> Result<Self, Self::Error> {
        let mut mapping = ColorMapping::new();
        for (key, button) in raw {
            let color = key
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(Color::from_id)
                .ok_or_else(|| MappingError::InvalidEntry { key: key.clone() })?;
            mapping.bind(color, button)?;
        }
        Ok(mapping)
    }
}

impl From<ColorMapping> for BTreeMap<String, usize> {
    fn from(mapping: ColorMapping) -> Self {
        mapping
            .bindings
            .into_iter()
            .map(|(color, button)| (color.id().to_string(), button))
            .collect()
    }
}

/// The persisted mapping plus a cached copy used for lookups.
#[derive(Debug)]
pub struct MappingStore<S> {
    store: S,
    current: ColorMapping,
}

impl<S: KeyValueStore> MappingStore<S> {
    pub fn open(store: S) -> Self {
        let current = read_mapping(&store);
        Self { store, current }
    }

    /// Re-reads storage. Absent or malformed data yields the default layout;
    /// a partial mapping is returned as stored.
    pub fn load(&mut self) -> &ColorMapping {
        self.current = read_mapping(&self.store);
        &self.current
    }

    pub fn current(&self) -> &ColorMapping {
        &self.current
    }

    pub fn save(&mut self, mapping: ColorMapping) -> Result<(), MappingError> {
        save_json(&self.store, MAPPING_KEY, &mapping)?;
        info!("gamepad mapping saved ({} colors)", mapping.len());
        self.current = mapping;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<&ColorMapping, MappingError> {
        self.save(ColorMapping::default_layout())?;
        Ok(&self.current)
    }

    /// Forgets the saved mapping; lookups fall back to the default layout.
    pub fn clear(&mut self) -> Result<(), MappingError> {
        self.store.remove(MAPPING_KEY)?;
        self.current = ColorMapping::default_layout();
        info!("gamepad mapping cleared");
        Ok(())
    }

    pub fn resolve(&self, button: usize) -> Option<Color> {
        self.current.color_for(button)
    }
}

fn read_mapping<S: KeyValueStore>(store: &S) -> ColorMapping {
    match load_json::<ColorMapping, _>(store, MAPPING_KEY) {
        Some(mapping) => {
            if !mapping.is_complete() {
                warn!("loaded a partial gamepad mapping ({} of 6)", mapping.len());
            }
            mapping
        }
        None => ColorMapping::default_layout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn bind_rejects_a_button_owned_by_another_color() {
        let mut m = ColorMapping::new();
        m.bind(Color::Red, 3).unwrap();
        let err = m.bind(Color::White, 3).unwrap_err();
        assert!(matches!(
            err,
            MappingError::ButtonInUse {
                button: 3,
                owner: Color::Red
            }
        ));
        assert_eq!(m.len(), 1);

        // Rebinding the owner itself is fine.
        m.bind(Color::Red, 3).unwrap();
        m.bind(Color::Red, 4).unwrap();
        assert_eq!(m.get(Color::Red), Some(4));
        assert!(!m.is_bound(3));
    }

    #[test]
    fn json_uses_string_color_ids() {
        let json = serde_json::to_string(&ColorMapping::default_layout()).unwrap();
        assert_eq!(json, r#"{"1":0,"2":1,"3":2,"4":3,"5":4,"6":5}"#);

        let parsed: ColorMapping = serde_json::from_str(r#"{"2":7,"6":1}"#).unwrap();
        assert_eq!(parsed.get(Color::White), Some(7));
        assert_eq!(parsed.get(Color::Green), Some(1));
        assert_eq!(parsed.unbound().count(), 4);
    }

    #[test]
    fn json_with_bad_keys_or_shared_buttons_is_rejected() {
        assert!(serde_json::from_str::<ColorMapping>(r#"{"9":0}"#).is_err());
        assert!(serde_json::from_str::<ColorMapping>(r#"{"red":0}"#).is_err());
        assert!(serde_json::from_str::<ColorMapping>(r#"{"1":0,"2":0}"#).is_err());
    }

    #[test]
    fn partial_mapping_loads_as_stored() {
        let store = MemoryStore::new();
        store.set(MAPPING_KEY, r#"{"1":4}"#).unwrap();
        let mappings = MappingStore::open(store);
        assert_eq!(mappings.current().len(), 1);
        assert_eq!(mappings.resolve(4), Some(Color::Red));
        assert_eq!(mappings.resolve(0), None);
    }
}
