//! In-memory fakes for the service seams

use crate::backend::realtime::ChangeKind;
use crate::backend::{
    AuthEvent, AuthProvider, AuthUser, BackendError, BackendResult, BlobStore, ChangeEvent,
    ChangeFeed, ChangeFilter, Credentials, Session, Subscription,
};
use crate::market::{Asset, MarketError, MarketResult, MarketSource, PricePoint, Timeframe};
use crate::messaging::{
    Attachment, ChatStore, Conversation, Message, NewAttachment, NewConversation, NewMessage,
};
use crate::profiles::{Profile, ProfileStore, ProfileUpsert};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

pub fn fake_session(user_id: &str) -> Session {
    Session {
        access_token: format!("{}-access", user_id),
        refresh_token: format!("{}-refresh", user_id),
        token_type: "bearer".to_string(),
        expires_in: 3600,
        expires_at: Some(Utc::now().timestamp() + 3600),
        user: AuthUser {
            id: user_id.to_string(),
            email: None,
            user_metadata: Value::Null,
        },
    }
}

pub fn conversation(id: &str, participants: &[&str]) -> Conversation {
    let now = Utc::now();
    Conversation {
        id: id.to_string(),
        participants: participants.iter().map(|p| p.to_string()).collect(),
        is_group: false,
        group_name: None,
        group_avatar: None,
        last_message: None,
        last_message_time: Some(now),
        created_at: now,
        updated_at: now,
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================
// Auth
// ============================================

/// Password accounts kept in memory
pub struct FakeAuth {
    accounts: Mutex<HashMap<String, String>>,
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
    sign_up_error: Option<String>,
    sign_up_sessions: bool,
    sign_out_fails: bool,
    session_lookup_fails: bool,
    metadata: Mutex<Option<Value>>,
    pub sign_in_calls: AtomicUsize,
    pub sign_up_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub restore_calls: AtomicUsize,
}

impl FakeAuth {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            events,
            sign_up_error: None,
            sign_up_sessions: true,
            sign_out_fails: false,
            session_lookup_fails: false,
            metadata: Mutex::new(None),
            sign_in_calls: AtomicUsize::new(0),
            sign_up_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            restore_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), password.to_string());
        self
    }

    pub fn failing_sign_up(mut self, message: &str) -> Self {
        self.sign_up_error = Some(message.to_string());
        self
    }

    pub fn without_sign_up_sessions(mut self) -> Self {
        self.sign_up_sessions = false;
        self
    }

    pub fn failing_sign_out(mut self) -> Self {
        self.sign_out_fails = true;
        self
    }

    /// `get_session` fails as an unreachable refresh would
    pub fn failing_session_lookup(mut self) -> Self {
        self.session_lookup_fails = true;
        self
    }

    pub fn last_metadata(&self) -> Option<Value> {
        self.metadata.lock().unwrap().clone()
    }

    fn start_session(&self, email: &str) -> Session {
        let session = fake_session(email);
        *self.session.lock().unwrap() = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        session
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn sign_in_with_password(&self, credentials: &Credentials) -> BackendResult<Session> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let known = self.accounts.lock().unwrap().get(&credentials.email).cloned();
        match known {
            Some(password) if password == credentials.password => Ok(self.start_session(&credentials.email)),
            _ => Err(BackendError::Api {
                status: 400,
                message: "Invalid login credentials".to_string(),
            }),
        }
    }

    async fn sign_up(&self, credentials: &Credentials, metadata: Value) -> BackendResult<Option<Session>> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        *self.metadata.lock().unwrap() = Some(metadata);
        if let Some(message) = &self.sign_up_error {
            return Err(BackendError::Api {
                status: 422,
                message: message.clone(),
            });
        }
        self.accounts
            .lock()
            .unwrap()
            .insert(credentials.email.clone(), credentials.password.clone());
        if !self.sign_up_sessions {
            return Ok(None);
        }
        Ok(Some(self.start_session(&credentials.email)))
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        if self.session_lookup_fails {
            return Err(BackendError::Unavailable);
        }
        Ok(self.session.lock().unwrap().clone())
    }

    async fn restore_session(&self, session: Session) {
        self.restore_calls.fetch_add(1, Ordering::SeqCst);
        *self.session.lock().unwrap() = Some(session);
    }

    async fn sign_out(&self) -> BackendResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        let had_session = self.session.lock().unwrap().take().is_some();
        if had_session {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
        if self.sign_out_fails {
            return Err(BackendError::Unavailable);
        }
        Ok(())
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

// ============================================
// Relational store
// ============================================

/// Conversations, messages and attachments in memory
#[derive(Default)]
pub struct MemoryChatStore {
    conversations: Mutex<Vec<Conversation>>,
    messages: Mutex<Vec<Message>>,
    attachments: Mutex<Vec<Attachment>>,
    message_fetches: AtomicUsize,
    fail_attachments: AtomicBool,
}

impl MemoryChatStore {
    pub fn add_conversation(&self, conversation: Conversation) {
        self.conversations.lock().unwrap().push(conversation);
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }

    /// Insert a message as if another client had sent it
    pub fn push_message(&self, conversation_id: &str, sender: &str, content: &str) -> Message {
        let message = Message {
            id: new_id(),
            conversation_id: conversation_id.to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            read: false,
            attachments: Vec::new(),
        };
        self.messages.lock().unwrap().push(message.clone());
        message
    }

    pub fn all_messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn message_fetches(&self) -> usize {
        self.message_fetches.load(Ordering::SeqCst)
    }

    pub fn fail_attachment_inserts(&self) {
        self.fail_attachments.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn conversations_for(&self, participant: &str) -> BackendResult<Vec<Conversation>> {
        let mut list: Vec<Conversation> = self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.participants.iter().any(|p| p == participant))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn find_direct(&self, a: &str, b: &str) -> BackendResult<Vec<Conversation>> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !c.is_group)
            .filter(|c| c.participants.iter().any(|p| p == a) && c.participants.iter().any(|p| p == b))
            .cloned()
            .collect())
    }

    async fn insert_conversation(&self, row: &NewConversation) -> BackendResult<Conversation> {
        let now = Utc::now();
        let created = Conversation {
            id: new_id(),
            participants: row.participants.clone(),
            is_group: row.is_group,
            group_name: None,
            group_avatar: None,
            last_message: row.last_message.clone(),
            last_message_time: Some(row.last_message_time),
            created_at: now,
            updated_at: now,
        };
        self.add_conversation(created.clone());
        Ok(created)
    }

    async fn messages(&self, conversation_id: &str) -> BackendResult<Vec<Message>> {
        self.message_fetches.fetch_add(1, Ordering::SeqCst);
        let attachments = self.attachments.lock().unwrap().clone();
        let mut list: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .map(|mut m| {
                m.attachments = attachments
                    .iter()
                    .filter(|a| a.message_id == m.id)
                    .cloned()
                    .collect();
                m
            })
            .collect();
        list.sort_by_key(|m| m.created_at);
        Ok(list)
    }

    async fn insert_message(&self, row: &NewMessage) -> BackendResult<Message> {
        Ok(self.push_message(&row.conversation_id, &row.sender, &row.content))
    }

    async fn insert_attachment(&self, row: &NewAttachment) -> BackendResult<Attachment> {
        if self.fail_attachments.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 403,
                message: "new row violates row-level security policy".to_string(),
            });
        }
        let attachment = Attachment {
            id: new_id(),
            message_id: row.message_id.clone(),
            file_path: row.file_path.clone(),
            file_name: row.file_name.clone(),
            file_size: row.file_size,
            file_type: row.file_type.clone(),
            created_at: Utc::now(),
        };
        self.attachments.lock().unwrap().push(attachment.clone());
        Ok(attachment)
    }
}

// ============================================
// Blob storage
// ============================================

/// Buckets of objects in memory
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<(String, String), (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn objects_in(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, path)| path.clone())
            .collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> BackendResult<String> {
        let key = (bucket.to_string(), path.to_string());
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(BackendError::Api {
                status: 409,
                message: "The resource already exists".to_string(),
            });
        }
        objects.insert(key, (bytes, content_type.to_string()));
        Ok(path.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{}/{}", bucket, path)
    }
}

// ============================================
// Change feed
// ============================================

/// Change feed driven by [`FakeFeed::emit`]
#[derive(Default)]
pub struct FakeFeed {
    subscribers: Mutex<Vec<(ChangeFilter, mpsc::UnboundedSender<ChangeEvent>)>>,
    active: Arc<AtomicUsize>,
    failing: AtomicBool,
}

impl FakeFeed {
    /// Deliver an event to every matching, still-open subscription
    pub fn emit(&self, event: ChangeEvent) {
        let subscribers = self.subscribers.lock().unwrap();
        for (filter, tx) in subscribers.iter() {
            if filter.table != event.table || filter.kind != event.kind {
                continue;
            }
            let matches = match filter.filter.as_deref().and_then(|f| f.split_once("=eq.")) {
                Some((column, value)) => event.field(column) == Some(value),
                None => true,
            };
            if matches {
                let _ = tx.send(event.clone());
            }
        }
    }

    pub fn filters(&self) -> Vec<ChangeFilter> {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(filter, _)| filter.clone())
            .collect()
    }

    /// Reject new subscriptions as a refused join would
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeFeed for FakeFeed {
    async fn subscribe(&self, filter: ChangeFilter) -> BackendResult<Subscription> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Realtime("unauthorized".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push((filter, tx));
        self.active.fetch_add(1, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        Ok(Subscription::new(rx, move || {
            active.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}

/// An insert on `messages`
pub fn message_insert(conversation_id: &str, sender: &str) -> ChangeEvent {
    ChangeEvent {
        kind: ChangeKind::Insert,
        table: "messages".to_string(),
        record: serde_json::json!({"conversation_id": conversation_id, "sender": sender}),
    }
}

// ============================================
// Market
// ============================================

/// Canned market data with call counters
#[derive(Default)]
pub struct FakeMarket {
    failing: AtomicBool,
    overview_calls: AtomicUsize,
    history_calls: AtomicUsize,
    last_history: Mutex<Option<(String, Timeframe)>>,
}

impl FakeMarket {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn overview_calls(&self) -> usize {
        self.overview_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn last_history_request(&self) -> Option<(String, Timeframe)> {
        self.last_history.lock().unwrap().clone()
    }

    /// Distinct series per timeframe so replacements are observable
    pub fn series_for(timeframe: Timeframe) -> Vec<PricePoint> {
        let days = timeframe.days() as i64;
        (0..3)
            .map(|i| PricePoint {
                time: 1_700_000_000 + i * days * 60,
                value: 100.0 * days as f64 + i as f64,
            })
            .collect()
    }

    pub fn assets() -> Vec<Asset> {
        vec![
            Asset {
                id: "bitcoin".into(),
                symbol: "btc".into(),
                name: "Bitcoin".into(),
                current_price: Some(64_250.12),
                price_change_percentage_24h: Some(2.5),
                total_volume: Some(3.1e10),
                market_cap: Some(1.26e12),
                image: None,
            },
            Asset {
                id: "ethereum".into(),
                symbol: "eth".into(),
                name: "Ethereum".into(),
                current_price: Some(3_120.5),
                price_change_percentage_24h: Some(-1.75),
                total_volume: Some(1.4e10),
                market_cap: Some(3.7e11),
                image: None,
            },
        ]
    }
}

#[async_trait]
impl MarketSource for FakeMarket {
    async fn top_assets(&self) -> MarketResult<Vec<Asset>> {
        self.overview_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MarketError::RateLimited);
        }
        Ok(Self::assets())
    }

    async fn price_history(&self, asset_id: &str, timeframe: Timeframe) -> MarketResult<Vec<PricePoint>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_history.lock().unwrap() = Some((asset_id.to_string(), timeframe));
        if self.failing.load(Ordering::SeqCst) {
            return Err(MarketError::Unavailable);
        }
        Ok(Self::series_for(timeframe))
    }
}

// ============================================
// Profiles
// ============================================

/// Profiles keyed by address
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<BTreeMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn len(&self) -> usize {
        self.profiles.lock().unwrap().len()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_profile(&self, address: &str) -> BackendResult<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().get(address).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> BackendResult<Profile> {
        let mut profiles = self.profiles.lock().unwrap();
        if profiles.contains_key(&profile.address) {
            return Err(BackendError::Api {
                status: 409,
                message: "duplicate key value violates unique constraint \"profiles_pkey\"".to_string(),
            });
        }
        profiles.insert(profile.address.clone(), profile.clone());
        Ok(profile.clone())
    }

    async fn upsert_profile(&self, row: &ProfileUpsert) -> BackendResult<Profile> {
        let mut profiles = self.profiles.lock().unwrap();
        let created_at = profiles.get(&row.address).and_then(|p| p.created_at);
        let profile = Profile {
            address: row.address.clone(),
            username: row.username.clone(),
            bio: row.bio.clone(),
            avatar_url: row.avatar_url.clone(),
            created_at: created_at.or(Some(row.updated_at)),
            updated_at: Some(row.updated_at),
        };
        profiles.insert(row.address.clone(), profile.clone());
        Ok(profile)
    }

    async fn search_profiles(&self, term: &str, limit: usize) -> BackendResult<Vec<Profile>> {
        let needle = term.to_lowercase();
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.address.contains(&needle) || p.username.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }
}
