//! Contact data model.
//!
//! Three layers live here:
//! - wire types decoded from the remote profile endpoint (`RemotePage` and
//!   friends),
//! - the persisted `ContactRecord` with its normalization and merge rules,
//! - read projections for the two listing sources (`ContactSummary` for the
//!   cache, `DeviceContact` for the device provider).

use serde::{Deserialize, Serialize};

/// One page of profiles as served by the remote endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemotePage {
    pub results: Vec<RemoteContact>,
    pub info: PageInfo,
}

/// Page-level metadata; stamped onto every record of the batch.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInfo {
    pub seed: String,
    pub results: u32,
    pub page: u32,
    pub version: String,
}

/// A single profile as it appears on the wire. Every group and leaf is
/// optional; the endpoint omits fields freely depending on the requested
/// inclusion list and locale.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteContact {
    pub gender: Option<String>,
    pub name: Option<RemoteName>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cell: Option<String>,
    pub id: Option<RemoteId>,
    pub picture: Option<RemotePicture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteName {
    pub title: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
}

/// National identifier; `value` is null for many locales.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteId {
    pub name: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePicture {
    pub large: Option<String>,
    pub medium: Option<String>,
    pub thumbnail: Option<String>,
}

/// A contact as stored locally.
///
/// `id` is assigned by the store and is `None` until the record has been
/// persisted. Every other field is independently optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContactRecord {
    pub id: Option<i64>,
    /// Provenance of fetched records: which page of which seeded request
    /// produced this row. User-created records leave all four unset.
    pub source_seed: Option<String>,
    pub source_results: Option<i64>,
    pub source_page: Option<i64>,
    pub source_version: Option<String>,
    pub gender: Option<String>,
    pub name_title: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cell: Option<String>,
    /// Upstream identifier scheme and value (e.g. a national id), kept
    /// verbatim for round-tripping, never used as a key.
    pub external_id_name: Option<String>,
    pub external_id_value: Option<String>,
    pub picture_large: Option<String>,
    pub picture_medium: Option<String>,
    pub picture_thumbnail: Option<String>,
}

impl ContactRecord {
    /// Flatten one wire profile into a storable record, stamping the page
    /// provenance. The id stays unassigned; the store hands one out on
    /// insert.
    pub fn from_remote(remote: &RemoteContact, info: &PageInfo) -> Self {
        let name = remote.name.as_ref();
        let ext = remote.id.as_ref();
        let pic = remote.picture.as_ref();
        ContactRecord {
            id: None,
            source_seed: Some(info.seed.clone()),
            source_results: Some(i64::from(info.results)),
            source_page: Some(i64::from(info.page)),
            source_version: Some(info.version.clone()),
            gender: remote.gender.clone(),
            name_title: name.and_then(|n| n.title.clone()),
            first_name: name.and_then(|n| n.first.clone()),
            last_name: name.and_then(|n| n.last.clone()),
            email: remote.email.clone(),
            phone: remote.phone.clone(),
            cell: remote.cell.clone(),
            external_id_name: ext.and_then(|i| i.name.clone()),
            external_id_value: ext.and_then(|i| i.value.clone()),
            picture_large: pic.and_then(|p| p.large.clone()),
            picture_medium: pic.and_then(|p| p.medium.clone()),
            picture_thumbnail: pic.and_then(|p| p.thumbnail.clone()),
        }
    }

    /// Merge a partial update onto this record.
    ///
    /// Only `first_name`, `last_name`, `email` and `phone` are editable:
    /// each is taken from `partial` when set there, otherwise kept. All
    /// remaining fields (id, provenance, pictures, ...) are carried over
    /// from `self` regardless of what `partial` says.
    pub fn apply_partial(&self, partial: &ContactRecord) -> ContactRecord {
        ContactRecord {
            first_name: partial.first_name.clone().or_else(|| self.first_name.clone()),
            last_name: partial.last_name.clone().or_else(|| self.last_name.clone()),
            email: partial.email.clone().or_else(|| self.email.clone()),
            phone: partial.phone.clone().or_else(|| self.phone.clone()),
            ..self.clone()
        }
    }

    /// Listing projection. `None` until the record has a stored id.
    pub fn summary(&self) -> Option<ContactSummary> {
        Some(ContactSummary {
            id: self.id?,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            picture_medium: self.picture_medium.clone(),
        })
    }

    pub fn display_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

/// Cached-contact listing row.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactSummary {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub picture_medium: Option<String>,
}

impl ContactSummary {
    pub fn display_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

/// A contact as the device provider reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceContact {
    pub id: i64,
    pub display_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

/// Listing entry from the device provider: id plus display name only.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceContactRef {
    pub id: i64,
    pub display_name: String,
}

/// Fields a caller supplies when writing a contact to the device.
#[derive(Debug, Clone, Default)]
pub struct DeviceContactDraft {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl DeviceContactDraft {
    pub fn display_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

/// A listing row tagged with the source it came from. Merged listings keep
/// the two shapes distinct instead of faking one record type.
#[derive(Debug, Clone)]
pub enum ListedContact {
    Cached(ContactSummary),
    Device(DeviceContact),
}

impl ListedContact {
    pub fn display_name(&self) -> String {
        match self {
            ListedContact::Cached(c) => c.display_name(),
            ListedContact::Device(d) => d.display_name.clone(),
        }
    }
}

fn full_name(first: &Option<String>, last: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(f) = first {
        out.push_str(f);
    }
    if let Some(l) = last {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(l);
    }
    out
}
