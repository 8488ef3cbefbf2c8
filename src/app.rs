//! Application wiring
//!
//! Builds every service from [`Config`] and owns the authentication context
//! the pages are guarded by.

use crate::attachments::AttachmentStore;
use crate::backend::{AuthEvent, AuthProvider, BackendClient, BackendConfig, BackendError, ChangeFeed};
use crate::config::{Config, ConfigError};
use crate::identity::{
    AuthContext, Identity, IdentityError, JsonRpcWallet, StaticWallet, WalletProvider,
};
use crate::local_store::{LocalStore, LocalStoreError};
use crate::market::{CoinGeckoClient, MarketError, MarketSource, MarketWatcher, PriceChart};
use crate::messaging::{ChatStore, ConversationService, LiveConversation, MessageService, MessagingError};
use crate::profiles::{ProfileError, ProfileService, ProfileStore};
use crate::views::{resolve, Route};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors surfaced to the terminal
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Local storage error: {0}")]
    LocalStore(#[from] LocalStoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not signed in. Run `kraken login` first")]
    NotSignedIn,

    #[error("No conversation {0} for this wallet")]
    UnknownConversation(String),
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

/// The running application
pub struct App {
    config: Config,
    backend: Arc<BackendClient>,
    feed: Arc<dyn ChangeFeed>,
    market: Arc<dyn MarketSource>,
    auth: AuthContext,
    auth_events: broadcast::Receiver<AuthEvent>,
    conversations: ConversationService,
    messages: MessageService,
    profiles: ProfileService,
}

impl App {
    /// Connect every service and restore any persisted session
    pub async fn from_config(config: Config) -> AppResult<Self> {
        config.validate()?;

        let backend = Arc::new(BackendClient::new(BackendConfig::from(&config.backend))?);
        let store = LocalStore::open(&config.storage.data_dir)?;
        tracing::debug!(path = ?store.path(), "Local storage opened");

        let auth_provider: Arc<dyn AuthProvider> = backend.clone();
        let auth_events = auth_provider.auth_events();
        let auth = AuthContext::restore(auth_provider, store).await?;

        let chat: Arc<dyn ChatStore> = backend.clone();
        let profile_store: Arc<dyn ProfileStore> = backend.clone();
        let attachments = AttachmentStore::new(backend.clone());
        let market = CoinGeckoClient::new((&config.market).into())?;

        Ok(Self {
            feed: Arc::new(backend.realtime()),
            market: Arc::new(market),
            conversations: ConversationService::new(chat.clone()),
            messages: MessageService::new(chat, attachments.clone()),
            profiles: ProfileService::new(profile_store, attachments),
            auth,
            auth_events,
            backend,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn conversations(&self) -> &ConversationService {
        &self.conversations
    }

    pub fn messages(&self) -> &MessageService {
        &self.messages
    }

    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    /// Apply the route guard to a requested page
    pub fn route(&self, requested: Route) -> Route {
        resolve(requested, self.auth.is_authenticated())
    }

    /// The signed-in identity, or [`AppError::NotSignedIn`]
    pub fn identity(&self) -> AppResult<&Identity> {
        self.auth.identity().ok_or(AppError::NotSignedIn)
    }

    /// Wallet for `login`: an explicit address, the configured one, or the
    /// local JSON-RPC wallet
    pub fn wallet(&self, address: Option<&str>) -> AppResult<Box<dyn WalletProvider>> {
        let fixed = address
            .map(str::to_string)
            .or_else(|| self.config.wallet.address.clone());
        match fixed {
            Some(address) => Ok(Box::new(StaticWallet::new(address))),
            None => Ok(Box::new(
                JsonRpcWallet::new(&self.config.wallet.rpc_url).map_err(IdentityError::from)?,
            )),
        }
    }

    pub async fn login(&mut self, address: Option<&str>) -> AppResult<Identity> {
        let wallet = self.wallet(address)?;
        Ok(self.auth.sign_in(wallet.as_ref()).await?)
    }

    pub async fn logout(&mut self) -> AppResult<()> {
        Ok(self.auth.logout().await?)
    }

    /// Fold auth-state changes published since the last call (token
    /// refreshes, remote sign-outs) into the context
    pub fn sync_auth(&mut self) -> AppResult<()> {
        loop {
            match self.auth_events.try_recv() {
                Ok(event) => self.auth.apply(event)?,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed auth events");
                }
                Err(_) => return Ok(()),
            }
        }
    }

    /// Open a conversation with realtime refresh
    pub async fn live_conversation(&self, conversation_id: &str) -> AppResult<LiveConversation> {
        let me = self.identity()?.address.clone();
        let chat: Arc<dyn ChatStore> = self.backend.clone();
        Ok(LiveConversation::start(chat, Arc::clone(&self.feed), me, conversation_id).await?)
    }

    pub fn price_chart(&self) -> PriceChart {
        PriceChart::new(Arc::clone(&self.market))
    }

    pub fn market_watcher(&self) -> MarketWatcher {
        MarketWatcher::spawn(
            Arc::clone(&self.market),
            Duration::from_secs(self.config.market.refresh_interval_secs.max(1)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_store::{SESSION_KEY, WALLET_ADDRESS_KEY};

    fn offline_config(data_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        // Nothing listens here; restore must not need the network
        config.backend.url = "http://127.0.0.1:9".into();
        config.backend.anon_key = "anon-key".into();
        config.storage.data_dir = data_dir.to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn test_fresh_app_routes_to_login() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::from_config(offline_config(dir.path())).await.unwrap();

        assert!(!app.auth().is_authenticated());
        assert_eq!(app.route(Route::Messages), Route::Login);
        assert_eq!(app.route(Route::Login), Route::Login);
        assert!(matches!(app.identity(), Err(AppError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_expired_session_with_unreachable_backend_starts_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        store
            .set(WALLET_ADDRESS_KEY, "0xab5801a7d398351b8be11c439e05c5b3259aec9b")
            .unwrap();
        let mut session = crate::testing::fake_session("user-1");
        session.expires_at = Some(1);
        store
            .set(SESSION_KEY, &serde_json::to_string(&session).unwrap())
            .unwrap();

        let mut app = App::from_config(offline_config(dir.path())).await.unwrap();
        assert!(!app.auth().is_authenticated());
        assert_eq!(app.route(Route::Home), Route::Login);
        assert!(store.get(WALLET_ADDRESS_KEY).is_none());
        assert!(store.get(SESSION_KEY).is_none());

        app.logout().await.unwrap();
        assert!(!app.auth().is_authenticated());
    }

    #[tokio::test]
    async fn test_missing_backend_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.backend.url.clear();

        let err = App::from_config(config).await.err().unwrap();
        assert!(matches!(err, AppError::Config(ConfigError::MissingBackend)));
    }

    #[tokio::test]
    async fn test_wallet_prefers_explicit_address() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.wallet.address = Some("0x1111111111111111111111111111111111111111".into());
        let app = App::from_config(config).await.unwrap();

        let explicit = app
            .wallet(Some("0x2222222222222222222222222222222222222222"))
            .unwrap();
        assert_eq!(
            explicit.request_accounts().await.unwrap(),
            vec!["0x2222222222222222222222222222222222222222".to_string()]
        );

        let configured = app.wallet(None).unwrap();
        assert_eq!(
            configured.request_accounts().await.unwrap(),
            vec!["0x1111111111111111111111111111111111111111".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sync_auth_without_events_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = App::from_config(offline_config(dir.path())).await.unwrap();
        app.sync_auth().unwrap();
        assert!(!app.auth().is_authenticated());
    }
}
