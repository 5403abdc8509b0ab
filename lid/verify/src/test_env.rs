// Licensed under the Apache-2.0 license

use crate::*;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Default)]
pub(crate) struct MemoryStore {
    values: RefCell<HashMap<PolicyKey, Vec<u8>>>,
    pub unavailable: Cell<bool>,
    pub writes: Cell<usize>,
}

impl MemoryStore {
    pub fn set(&self, key: &PolicyKey, value: &str) {
        self.values
            .borrow_mut()
            .insert(*key, value.as_bytes().to_vec());
    }

    pub fn get(&self, key: &PolicyKey) -> String {
        self.values
            .borrow()
            .get(key)
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .unwrap_or_default()
    }
}

impl KeywordStore for MemoryStore {
    fn read(&self, key: &PolicyKey) -> LidResult<Vec<u8>> {
        if self.unavailable.get() {
            return Err(LidError::PolicyStoreUnavailable {
                key: key.to_string(),
                reason: "service not running".into(),
            });
        }
        Ok(self.values.borrow().get(key).cloned().unwrap_or_default())
    }

    fn write(&self, key: &PolicyKey, value: &[u8]) -> LidResult<()> {
        if self.unavailable.get() {
            return Err(LidError::PolicyStoreUnavailable {
                key: key.to_string(),
                reason: "service not running".into(),
            });
        }
        self.writes.set(self.writes.get() + 1);
        self.values.borrow_mut().insert(*key, value.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct TestEnv {
    pub inventory: MemoryStore,
    pub flash: MemoryStore,
    pub version: String,
    pub extended_version: String,
    pub reset: Cell<bool>,
}

impl TestEnv {
    pub fn running(version: &str, extended_version: &str) -> Self {
        Self {
            version: version.into(),
            extended_version: extended_version.into(),
            ..Default::default()
        }
    }
}

impl LidVerificationEnv for TestEnv {
    fn inventory(&self) -> &dyn KeywordStore {
        &self.inventory
    }

    fn flash(&self) -> &dyn KeywordStore {
        &self.flash
    }

    fn running_version(&self) -> LidResult<String> {
        Ok(self.version.clone())
    }

    fn running_extended_version(&self) -> LidResult<String> {
        Ok(self.extended_version.clone())
    }

    fn reset_requested(&self) -> bool {
        self.reset.get()
    }

    fn request_reset(&self) -> LidResult<()> {
        self.reset.set(true);
        Ok(())
    }

    fn clear_reset(&self) -> LidResult<()> {
        self.reset.set(false);
        Ok(())
    }
}
