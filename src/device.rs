//! Device contact provider: the seam to the platform address book.
//!
//! The shipped implementation is file-backed; it keeps the same three
//! operations a platform bridge would offer (list, fetch by id, upsert)
//! without any OS marshaling.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{DeviceContact, DeviceContactDraft, DeviceContactRef};

/// Access to the contacts living on the device itself.
#[allow(async_fn_in_trait)]
pub trait DeviceProvider {
    /// List id and display name of every device contact.
    async fn list(&self) -> Result<Vec<DeviceContactRef>>;

    /// Fetch one device contact in full. Absence is not an error.
    async fn get(&self, id: i64) -> Result<Option<DeviceContact>>;

    /// Write one contact. An existing contact with the same display name is
    /// updated in place, otherwise a new one is created. Returns its id.
    async fn upsert(&self, draft: &DeviceContactDraft) -> Result<i64>;
}

/// Device provider backed by a JSON file.
///
/// The file is read on every operation and replaced atomically
/// (write to a temp file, then rename) on writes; an interior lock
/// serializes writers so concurrent upserts cannot lose one another's
/// changes. A missing file is an empty address book.
pub struct FileDeviceProvider {
    path: PathBuf,
    write_lock: Mutex<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DeviceFile {
    contacts: Vec<DeviceContact>,
}

impl FileDeviceProvider {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Vec<DeviceContact>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| Error::provider(format!("read {}: {}", self.path.display(), e)))?;
        let file: DeviceFile = serde_json::from_str(&content)
            .map_err(|e| Error::provider(format!("parse {}: {}", self.path.display(), e)))?;
        Ok(file.contacts)
    }

    fn save(&self, contacts: Vec<DeviceContact>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::provider(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        let json = serde_json::to_string_pretty(&DeviceFile { contacts })
            .map_err(|e| Error::provider(format!("serialize device contacts: {}", e)))?;

        let mut tmp = self.path.clone();
        tmp.set_extension("tmp");
        fs::write(&tmp, json)
            .map_err(|e| Error::provider(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            Error::provider(format!(
                "rename {} to {}: {}",
                tmp.display(),
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

impl DeviceProvider for FileDeviceProvider {
    async fn list(&self) -> Result<Vec<DeviceContactRef>> {
        let contacts = self.load()?;
        Ok(contacts
            .into_iter()
            .map(|c| DeviceContactRef {
                id: c.id,
                display_name: c.display_name,
            })
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Option<DeviceContact>> {
        Ok(self.load()?.into_iter().find(|c| c.id == id))
    }

    async fn upsert(&self, draft: &DeviceContactDraft) -> Result<i64> {
        let name = draft.display_name();
        if name.is_empty() {
            return Err(Error::validation("a device contact needs a name"));
        }

        // Recover the guard even if a previous caller panicked mid-write.
        let _write = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut contacts = self.load()?;
        let id = match contacts.iter_mut().find(|c| c.display_name == name) {
            Some(existing) => {
                if let Some(phone) = &draft.phone {
                    existing.phone = phone.clone();
                }
                if let Some(email) = &draft.email {
                    existing.email = email.clone();
                }
                debug!(id = existing.id, name = %name, "updated device contact");
                existing.id
            }
            None => {
                let id = contacts.iter().map(|c| c.id).max().unwrap_or(0) + 1;
                contacts.push(DeviceContact {
                    id,
                    display_name: name.clone(),
                    phone: draft.phone.clone().unwrap_or_default(),
                    email: draft.email.clone().unwrap_or_default(),
                });
                debug!(id, name = %name, "created device contact");
                id
            }
        };
        self.save(contacts)?;
        Ok(id)
    }
}
