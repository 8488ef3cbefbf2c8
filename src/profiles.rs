//! Profiles
//!
//! One row per address in `profiles`, created lazily with a generated
//! username the first time the profile page is opened.

use crate::address::WalletAddress;
use crate::attachments::{AttachmentStore, FileUpload};
use crate::backend::rest::{ilike_filter, sanitize_term};
use crate::backend::{BackendClient, BackendError, BackendResult, TableQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const PROFILES_TABLE: &str = "profiles";

/// Maximum rows returned by a profile search
const SEARCH_LIMIT: usize = 20;

/// A user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub address: String,
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bio: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub avatar_url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Profile {
    /// Profile created on first visit: `User_` + address characters 2..8
    pub fn default_for(address: &WalletAddress) -> Self {
        let now = Utc::now();
        Self {
            address: address.to_string(),
            username: default_username(address),
            bio: String::new(),
            avatar_url: String::new(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

pub fn default_username(address: &WalletAddress) -> String {
    format!("User_{}", &address.as_str()[2..8])
}

/// Editable profile fields
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEdit {
    pub username: String,
    pub bio: String,
    pub avatar_url: String,
}

impl From<&Profile> for ProfileEdit {
    fn from(profile: &Profile) -> Self {
        Self {
            username: profile.username.clone(),
            bio: profile.bio.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

/// Upsert payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileUpsert {
    pub address: String,
    pub username: String,
    pub bio: String,
    pub avatar_url: String,
    pub updated_at: DateTime<Utc>,
}

/// Profile persistence seam
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, address: &str) -> BackendResult<Option<Profile>>;

    async fn insert_profile(&self, profile: &Profile) -> BackendResult<Profile>;

    /// Insert or merge on `address`
    async fn upsert_profile(&self, row: &ProfileUpsert) -> BackendResult<Profile>;

    /// Profiles whose address or username contains `term`
    async fn search_profiles(&self, term: &str, limit: usize) -> BackendResult<Vec<Profile>>;
}

#[async_trait]
impl ProfileStore for BackendClient {
    async fn find_profile(&self, address: &str) -> BackendResult<Option<Profile>> {
        let query = TableQuery::new(PROFILES_TABLE)
            .select("*")
            .eq("address", address);
        self.select_maybe_single(&query).await
    }

    async fn insert_profile(&self, profile: &Profile) -> BackendResult<Profile> {
        self.insert(PROFILES_TABLE, profile).await
    }

    async fn upsert_profile(&self, row: &ProfileUpsert) -> BackendResult<Profile> {
        self.upsert(PROFILES_TABLE, row, "address").await
    }

    async fn search_profiles(&self, term: &str, limit: usize) -> BackendResult<Vec<Profile>> {
        let query = TableQuery::new(PROFILES_TABLE)
            .select("*")
            .or(&[ilike_filter("address", term), ilike_filter("username", term)])
            .order("username", true)
            .limit(limit);
        self.select(&query).await
    }
}

/// Profile errors
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Username cannot be empty")]
    EmptyUsername,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Result type alias for profile operations
pub type ProfileResult<T> = Result<T, ProfileError>;

/// Profile page operations
#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    attachments: AttachmentStore,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>, attachments: AttachmentStore) -> Self {
        Self { store, attachments }
    }

    /// The profile for `address`, creating the default one if missing
    pub async fn load_or_create(&self, address: &WalletAddress) -> ProfileResult<Profile> {
        if let Some(profile) = self.store.find_profile(address.as_str()).await? {
            return Ok(profile);
        }
        let created = self.store.insert_profile(&Profile::default_for(address)).await?;
        tracing::info!(address = %address, username = %created.username, "Created default profile");
        Ok(created)
    }

    /// Save edits (and an optional new avatar), then reload
    pub async fn save(
        &self,
        address: &WalletAddress,
        edit: ProfileEdit,
        avatar: Option<&FileUpload>,
    ) -> ProfileResult<Profile> {
        let username = edit.username.trim().to_string();
        if username.is_empty() {
            return Err(ProfileError::EmptyUsername);
        }

        let avatar_url = match avatar {
            Some(file) => self.attachments.upload_avatar(address, file).await?,
            None => edit.avatar_url,
        };

        self.store
            .upsert_profile(&ProfileUpsert {
                address: address.to_string(),
                username,
                bio: edit.bio,
                avatar_url,
                updated_at: Utc::now(),
            })
            .await?;
        tracing::info!(address = %address, "Profile saved");

        self.load_or_create(address).await
    }

    /// Search by address or username; a blank query finds nothing
    pub async fn search(&self, query: &str) -> ProfileResult<Vec<Profile>> {
        if sanitize_term(query).is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.search_profiles(query, SEARCH_LIMIT).await?)
    }
}
