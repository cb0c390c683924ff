use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use super::id::UserId;
use crate::service::password;
use crate::Result;

/// Room-scoped user
///
/// Users never point back at their room; the room looks them up by id or
/// name in its own registry.
#[derive(Debug)]
pub struct User {
    id: UserId,
    name: String,
    password_hash: RwLock<String>,
    admin: AtomicBool,
    root: bool,
    version: AtomicU32,
    last_act: AtomicI64,
}

/// User view for API responses; never carries credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub name: String,
    pub admin: bool,
    pub root: bool,
    pub version: u32,
    pub last_act: DateTime<Utc>,
}

/// Stored user, including the password hash, for bulk loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub password_hash: String,
    pub admin: bool,
    pub root: bool,
    pub version: u32,
    pub last_act: DateTime<Utc>,
}

impl User {
    pub(crate) fn new(id: UserId, name: String, password_hash: String, admin: bool, root: bool) -> Self {
        Self {
            id,
            name,
            password_hash: RwLock::new(password_hash),
            admin: AtomicBool::new(admin),
            root,
            version: AtomicU32::new(rand::random()),
            last_act: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub(crate) fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            password_hash: RwLock::new(record.password_hash),
            admin: AtomicBool::new(record.admin),
            root: record.root,
            version: AtomicU32::new(record.version),
            last_act: AtomicI64::new(record.last_act.timestamp_millis()),
        }
    }

    #[must_use]
    pub const fn id(&self) -> &UserId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.root
    }

    /// Root users are implicitly admins.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.root || self.admin.load(Ordering::Acquire)
    }

    pub fn set_admin(&self, admin: bool) {
        self.admin.store(admin, Ordering::Release);
        self.update_last_act();
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn check_version(&self, version: u32) -> bool {
        self.version() == version
    }

    pub async fn check_password(&self, password: &str) -> Result<bool> {
        let hash = self.password_hash.read().clone();
        password::verify_password(password, &hash).await
    }

    /// Swap in an already validated hash and invalidate tokens carrying the
    /// old version. Callers go through `Room::set_user_password`.
    pub(crate) fn set_password_hash(&self, hash: String) {
        *self.password_hash.write() = hash;
        self.version.fetch_add(1, Ordering::AcqRel);
        self.update_last_act();
    }

    pub fn update_last_act(&self) {
        self.last_act
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    #[must_use]
    pub fn last_act(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_act.load(Ordering::Acquire)).unwrap_or_default()
    }

    #[must_use]
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            admin: self.is_admin(),
            root: self.root,
            version: self.version(),
            last_act: self.last_act(),
        }
    }

    #[must_use]
    pub fn record(&self) -> UserRecord {
        UserRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            password_hash: self.password_hash.read().clone(),
            admin: self.admin.load(Ordering::Acquire),
            root: self.root,
            version: self.version(),
            last_act: self.last_act(),
        }
    }
}
