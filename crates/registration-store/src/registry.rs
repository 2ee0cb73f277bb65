//! In-memory registration index with unique email and access-token constraints.

use crate::error::StoreError;
use crate::page::{Page, PageRequest};
use crate::types::{NewRegistration, Registration, RegistrationPatch, RegistrationStatus};
use crate::validate::{normalize_email, normalize_name, normalize_phone};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Snapshot schema version.
const DATA_VERSION: u32 = 1;

/// Size of a generated access token in bytes (hex-encoded to twice this).
const ACCESS_TOKEN_BYTES: usize = 32;

/// A stored registration with its insertion sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub seq: u64,
    pub registration: Registration,
}

/// Serialized form of the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub next_seq: u64,
    pub entries: Vec<Entry>,
}

/// Registrations indexed by id, with unique email and access-token indexes.
///
/// Every mutation checks the unique indexes, so this is where duplicate
/// emails are ultimately rejected.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    next_seq: u64,
    entries: HashMap<String, Entry>,
    /// email -> id
    emails: HashMap<String, String>,
    tokens: HashSet<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from a snapshot, re-checking unique constraints.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        let mut registry = Self {
            next_seq: snapshot.next_seq,
            ..Self::default()
        };

        for entry in snapshot.entries {
            let reg = &entry.registration;
            if registry.entries.contains_key(&reg.id) {
                return Err(StoreError::DuplicateId(reg.id.clone()));
            }
            if registry.emails.contains_key(&reg.email) {
                return Err(StoreError::DuplicateEmail(reg.email.clone()));
            }
            if !registry.tokens.insert(reg.access_token.clone()) {
                return Err(StoreError::DuplicateAccessToken);
            }
            registry.emails.insert(reg.email.clone(), reg.id.clone());
            registry.next_seq = registry.next_seq.max(entry.seq + 1);
            registry.entries.insert(reg.id.clone(), entry);
        }

        Ok(registry)
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut entries: Vec<Entry> = self.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.seq);

        Snapshot {
            version: DATA_VERSION,
            next_seq: self.next_seq,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Registration> {
        self.entries.get(id).map(|e| &e.registration)
    }

    /// Look up by email, case-insensitively.
    pub fn find_by_email(&self, email: &str) -> Option<&Registration> {
        let email = email.trim().to_lowercase();
        self.emails.get(&email).and_then(|id| self.get(id))
    }

    /// Insert a new registration, assigning its id, access token and
    /// timestamps.
    pub fn insert(
        &mut self,
        new: NewRegistration,
        now: DateTime<Utc>,
    ) -> Result<Registration, StoreError> {
        let NewRegistration {
            fields,
            image,
            access_token,
        } = new;

        let email = normalize_email(&fields.email).map_err(StoreError::Validation)?;
        if self.emails.contains_key(&email) {
            return Err(StoreError::DuplicateEmail(email));
        }

        let access_token = match access_token {
            Some(token) if self.tokens.contains(&token) => {
                return Err(StoreError::DuplicateAccessToken)
            }
            Some(token) => token,
            None => self.generate_access_token(),
        };

        let registration = Registration {
            id: Uuid::new_v4().to_string(),
            name: normalize_name(&fields.name).map_err(StoreError::Validation)?,
            email,
            phone: normalize_phone(&fields.phone).map_err(StoreError::Validation)?,
            class_interest: fields.class_interest,
            section_interest: fields.section_interest,
            image: non_empty_image(image)?,
            status: RegistrationStatus::Pending,
            access_token,
            registration_date: now,
            created_at: now,
            updated_at: now,
        };

        let seq = self.next_seq;
        self.next_seq += 1;

        self.emails
            .insert(registration.email.clone(), registration.id.clone());
        self.tokens.insert(registration.access_token.clone());
        self.entries.insert(
            registration.id.clone(),
            Entry {
                seq,
                registration: registration.clone(),
            },
        );

        Ok(registration)
    }

    /// Merge a partial update into an existing registration.
    pub fn update(
        &mut self,
        id: &str,
        patch: RegistrationPatch,
        now: DateTime<Utc>,
    ) -> Result<Registration, StoreError> {
        let current = self
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut updated = current.clone();

        if let Some(name) = patch.name {
            updated.name = normalize_name(&name).map_err(StoreError::Validation)?;
        }
        if let Some(email) = patch.email {
            let email = normalize_email(&email).map_err(StoreError::Validation)?;
            if let Some(owner) = self.emails.get(&email) {
                if owner != id {
                    return Err(StoreError::DuplicateEmail(email));
                }
            }
            updated.email = email;
        }
        if let Some(phone) = patch.phone {
            updated.phone = normalize_phone(&phone).map_err(StoreError::Validation)?;
        }
        if let Some(class_interest) = patch.class_interest {
            updated.class_interest = class_interest;
        }
        if let Some(section_interest) = patch.section_interest {
            updated.section_interest = section_interest;
        }
        if let Some(status) = patch.status {
            updated.status = status;
        }
        if let Some(image) = patch.image {
            updated.image = non_empty_image(image)?;
        }
        updated.updated_at = now;

        if updated.email != current.email {
            self.emails.remove(&current.email);
            self.emails.insert(updated.email.clone(), id.to_string());
        }
        if let Some(entry) = self.entries.get_mut(id) {
            entry.registration = updated.clone();
        }

        Ok(updated)
    }

    /// Remove a registration, releasing its email and access token.
    pub fn remove(&mut self, id: &str) -> Result<Registration, StoreError> {
        let entry = self
            .entries
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        self.emails.remove(&entry.registration.email);
        self.tokens.remove(&entry.registration.access_token);
        Ok(entry.registration)
    }

    /// Newest-first page of registrations.
    pub fn page(&self, request: PageRequest) -> Page<Registration> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            b.registration
                .created_at
                .cmp(&a.registration.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(request.limit).unwrap_or(usize::MAX);

        let items = entries
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|e| e.registration.clone())
            .collect();

        Page::new(items, self.entries.len() as u64, request)
    }

    fn generate_access_token(&self) -> String {
        loop {
            let mut bytes = [0u8; ACCESS_TOKEN_BYTES];
            rand::thread_rng().fill_bytes(&mut bytes);
            let token = hex::encode(bytes);
            if !self.tokens.contains(&token) {
                return token;
            }
        }
    }
}

fn non_empty_image(image: String) -> Result<String, StoreError> {
    let image = image.trim().to_string();
    if image.is_empty() {
        return Err(StoreError::Validation(
            "Please upload proof of payment".into(),
        ));
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassInterest, RegistrationFields, SectionInterest};
    use chrono::Duration;

    fn new_registration(email: &str) -> NewRegistration {
        RegistrationFields {
            name: "Ada Lovelace".into(),
            email: email.into(),
            phone: "1234567890".into(),
            class_interest: ClassInterest::SqlMasterClass,
            section_interest: SectionInterest::MorningClass,
        }
        .with_image("https://cdn.test/image/upload/v1/f/a.png")
    }

    #[test]
    fn test_insert_assigns_defaults() {
        let mut registry = Registry::new();
        let now = Utc::now();
        let reg = registry.insert(new_registration("ADA@X.COM"), now).unwrap();

        assert_eq!(reg.email, "ada@x.com");
        assert_eq!(reg.status, RegistrationStatus::Pending);
        assert_eq!(reg.access_token.len(), 64);
        assert!(reg.access_token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(reg.registration_date, now);
        assert_eq!(reg.created_at, reg.updated_at);
        assert!(!reg.id.is_empty());
    }

    #[test]
    fn test_duplicate_email_case_insensitive() {
        let mut registry = Registry::new();
        registry
            .insert(new_registration("ada@x.com"), Utc::now())
            .unwrap();

        let err = registry
            .insert(new_registration("Ada@X.com"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(e) if e == "ada@x.com"));
        assert_eq!(registry.len(), 1);
        assert!(registry.find_by_email(" ADA@x.COM").is_some());
    }

    #[test]
    fn test_supplied_access_token_is_kept_and_unique() {
        let mut registry = Registry::new();
        let mut first = new_registration("a@x.com");
        first.access_token = Some("token-1".into());
        let reg = registry.insert(first, Utc::now()).unwrap();
        assert_eq!(reg.access_token, "token-1");

        let mut second = new_registration("b@x.com");
        second.access_token = Some("token-1".into());
        assert!(matches!(
            registry.insert(second, Utc::now()),
            Err(StoreError::DuplicateAccessToken)
        ));
    }

    #[test]
    fn test_insert_rejects_empty_image() {
        let mut registry = Registry::new();
        let mut new = new_registration("a@x.com");
        new.image = "  ".into();
        assert!(matches!(
            registry.insert(new, Utc::now()),
            Err(StoreError::Validation(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_merges_and_keeps_token() {
        let mut registry = Registry::new();
        let created = registry
            .insert(new_registration("a@x.com"), Utc::now())
            .unwrap();

        let later = created.created_at + Duration::seconds(5);
        let patch = RegistrationPatch {
            status: Some(RegistrationStatus::Approved),
            phone: Some("0987654321".into()),
            ..Default::default()
        };
        let updated = registry.update(&created.id, patch, later).unwrap();

        assert_eq!(updated.status, RegistrationStatus::Approved);
        assert_eq!(updated.phone, "0987654321");
        assert_eq!(updated.name, created.name);
        assert_eq!(updated.access_token, created.access_token);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn test_update_email_reindexes_and_checks_uniqueness() {
        let mut registry = Registry::new();
        let a = registry.insert(new_registration("a@x.com"), Utc::now()).unwrap();
        registry.insert(new_registration("b@x.com"), Utc::now()).unwrap();

        let taken = RegistrationPatch {
            email: Some("B@X.COM".into()),
            ..Default::default()
        };
        assert!(matches!(
            registry.update(&a.id, taken, Utc::now()),
            Err(StoreError::DuplicateEmail(_))
        ));

        // Re-submitting your own email is not a conflict
        let same = RegistrationPatch {
            email: Some("A@x.com".into()),
            ..Default::default()
        };
        registry.update(&a.id, same, Utc::now()).unwrap();

        let moved = RegistrationPatch {
            email: Some("c@x.com".into()),
            ..Default::default()
        };
        registry.update(&a.id, moved, Utc::now()).unwrap();
        assert!(registry.find_by_email("a@x.com").is_none());
        assert_eq!(registry.find_by_email("c@x.com").unwrap().id, a.id);

        // The old address is free again
        registry.insert(new_registration("a@x.com"), Utc::now()).unwrap();
    }

    #[test]
    fn test_update_invalid_field_leaves_record_untouched() {
        let mut registry = Registry::new();
        let a = registry.insert(new_registration("a@x.com"), Utc::now()).unwrap();

        let patch = RegistrationPatch {
            name: Some("Bea".into()),
            phone: Some("12".into()),
            ..Default::default()
        };
        assert!(registry.update(&a.id, patch, Utc::now()).is_err());
        assert_eq!(registry.get(&a.id).unwrap(), &a);
    }

    #[test]
    fn test_update_and_remove_missing() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.update("missing", RegistrationPatch::default(), Utc::now()),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            registry.remove("missing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_releases_email() {
        let mut registry = Registry::new();
        let a = registry.insert(new_registration("a@x.com"), Utc::now()).unwrap();
        registry.remove(&a.id).unwrap();

        assert!(registry.get(&a.id).is_none());
        assert!(registry.find_by_email("a@x.com").is_none());
        registry.insert(new_registration("a@x.com"), Utc::now()).unwrap();
    }

    #[test]
    fn test_page_newest_first() {
        let mut registry = Registry::new();
        let start = Utc::now();
        for i in 0..23 {
            registry
                .insert(
                    new_registration(&format!("user{}@x.com", i)),
                    start + Duration::seconds(i),
                )
                .unwrap();
        }

        let first = registry.page(PageRequest::new(1, 10));
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.items[0].email, "user22@x.com");
        assert_eq!(first.total_items, 23);
        assert_eq!(first.total_pages, 3);

        let last = registry.page(PageRequest::new(3, 10));
        assert_eq!(last.items.len(), 3);
        assert_eq!(last.items[2].email, "user0@x.com");

        let beyond = registry.page(PageRequest::new(4, 10));
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_items, 23);
    }

    #[test]
    fn test_page_orders_ties_by_insertion() {
        let mut registry = Registry::new();
        let now = Utc::now();
        registry.insert(new_registration("first@x.com"), now).unwrap();
        registry.insert(new_registration("second@x.com"), now).unwrap();

        let page = registry.page(PageRequest::default());
        assert_eq!(page.items[0].email, "second@x.com");
        assert_eq!(page.items[1].email, "first@x.com");
    }

    #[test]
    fn test_snapshot_round_trip_preserves_constraints() {
        let mut registry = Registry::new();
        let a = registry.insert(new_registration("a@x.com"), Utc::now()).unwrap();
        registry.insert(new_registration("b@x.com"), Utc::now()).unwrap();

        let json = serde_json::to_string(&registry.snapshot()).unwrap();
        let mut restored = Registry::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(&a.id), Some(&a));
        assert!(matches!(
            restored.insert(new_registration("a@x.com"), Utc::now()),
            Err(StoreError::DuplicateEmail(_))
        ));
    }

    #[test]
    fn test_snapshot_with_duplicate_email_is_rejected() {
        let mut registry = Registry::new();
        registry.insert(new_registration("a@x.com"), Utc::now()).unwrap();
        let mut snapshot = registry.snapshot();

        let mut dup = snapshot.entries[0].clone();
        dup.seq = 7;
        dup.registration.id = "other".into();
        dup.registration.access_token = "other-token".into();
        snapshot.entries.push(dup);

        assert!(matches!(
            Registry::from_snapshot(snapshot),
            Err(StoreError::DuplicateEmail(_))
        ));
    }

    #[test]
    fn test_snapshot_with_duplicate_id_is_rejected() {
        let mut registry = Registry::new();
        registry.insert(new_registration("a@x.com"), Utc::now()).unwrap();
        let mut snapshot = registry.snapshot();

        let mut dup = snapshot.entries[0].clone();
        dup.seq = 7;
        dup.registration.email = "b@x.com".into();
        dup.registration.access_token = "other-token".into();
        snapshot.entries.push(dup);

        assert!(matches!(
            Registry::from_snapshot(snapshot),
            Err(StoreError::DuplicateId(_))
        ));
    }
}
