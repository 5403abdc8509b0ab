/*++

Licensed under the Apache-2.0 license.

File Name:

   inventory.rs

Abstract:

    File contains a TOML file backed inventory keyword store.

--*/

use marker_lid_verify::{KeywordStore, LidError, LidResult, PolicyKey};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Inventory object path -> record -> keyword -> value
type Inventory = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// Inventory keywords kept in a TOML file
pub(crate) struct TomlInventoryStore {
    path: PathBuf,
}

impl TomlInventoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn unavailable(&self, key: &PolicyKey, reason: impl ToString) -> LidError {
        LidError::PolicyStoreUnavailable {
            key: key.to_string(),
            reason: format!("{}: {}", self.path.display(), reason.to_string()),
        }
    }

    fn load(&self, key: &PolicyKey) -> LidResult<Inventory> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => toml::from_str(&contents).map_err(|e| self.unavailable(key, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Inventory::new()),
            Err(e) => Err(self.unavailable(key, e)),
        }
    }
}

impl KeywordStore for TomlInventoryStore {
    fn read(&self, key: &PolicyKey) -> LidResult<Vec<u8>> {
        let inventory = self.load(key)?;
        Ok(inventory
            .get(key.fru)
            .and_then(|records| records.get(key.record))
            .and_then(|keywords| keywords.get(key.keyword))
            .map(|value| value.as_bytes().to_vec())
            .unwrap_or_default())
    }

    fn write(&self, key: &PolicyKey, value: &[u8]) -> LidResult<()> {
        let mut inventory = self.load(key)?;
        inventory
            .entry(key.fru.to_string())
            .or_default()
            .entry(key.record.to_string())
            .or_default()
            .insert(
                key.keyword.to_string(),
                String::from_utf8_lossy(value).into_owned(),
            );
        let contents = toml::to_string(&inventory).map_err(|e| self.unavailable(key, e))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.unavailable(key, e))?;
        }
        std::fs::write(&self.path, contents).map_err(|e| self.unavailable(key, e))
    }
}
