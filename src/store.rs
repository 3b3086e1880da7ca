use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Error};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Remembers the last device address a connection succeeded with, so the next
/// session can offer it as the default.
pub trait AddressStore {
    fn load(&self) -> Option<String>;
    fn save(&self, address: &str) -> Result<(), Error>;
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct SavedState {
    device_address: Option<String>,
}

/// Keeps the address in a small RON file
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AddressStore for FileStore {
    fn load(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match ron::from_str::<SavedState>(&contents) {
            Ok(state) => state.device_address,
            Err(e) => {
                warn!("Ignoring unreadable {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn save(&self, address: &str) -> Result<(), Error> {
        let state = SavedState {
            device_address: Some(address.to_string()),
        };
        let contents = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::default())?;

        std::fs::write(&self.path, contents)
            .with_context(|| format!("writing {}", self.path.display()))?;
        debug!("Saved device address to {}", self.path.display());

        Ok(())
    }
}

/// Keeps the address for the life of the process only. Clones share the
/// same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    address: Arc<Mutex<Option<String>>>,
}

impl AddressStore for MemoryStore {
    fn load(&self) -> Option<String> {
        self.address.lock().ok()?.clone()
    }

    fn save(&self, address: &str) -> Result<(), Error> {
        let mut slot = self
            .address
            .lock()
            .map_err(|_| anyhow::anyhow!("address store poisoned"))?;
        *slot = Some(address.to_string());
        Ok(())
    }
}
