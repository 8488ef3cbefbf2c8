//! Live Conversation
//!
//! Keeps the open conversation's message list current: every insert by
//! someone else triggers a full re-fetch, published on a watch channel.
//! Own inserts are ignored since the sender already reloads after sending.

use super::models::Message;
use super::store::{ChatStore, MESSAGES_TABLE};
use super::MessagingResult;
use crate::address::WalletAddress;
use crate::backend::{ChangeEvent, ChangeFeed, ChangeFilter, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background refresher for one conversation
struct Refresher {
    task: JoinHandle<()>,
    active: Arc<AtomicBool>,
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

/// The selected conversation, refreshed on remote inserts
///
/// Dropping it (or switching away) tears down the subscription; nothing is
/// published afterwards.
pub struct LiveConversation {
    store: Arc<dyn ChatStore>,
    feed: Arc<dyn ChangeFeed>,
    me: WalletAddress,
    conversation_id: String,
    snapshots: watch::Receiver<Vec<Message>>,
    refresher: Option<Refresher>,
}

impl LiveConversation {
    /// Load `conversation_id` and start listening for inserts
    pub async fn start(
        store: Arc<dyn ChatStore>,
        feed: Arc<dyn ChangeFeed>,
        me: WalletAddress,
        conversation_id: &str,
    ) -> MessagingResult<Self> {
        let (snapshots, refresher) = open(&store, &feed, &me, conversation_id).await?;
        Ok(Self {
            store,
            feed,
            me,
            conversation_id: conversation_id.to_string(),
            snapshots,
            refresher: Some(refresher),
        })
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Latest published message list
    pub fn snapshot(&self) -> Vec<Message> {
        self.snapshots.borrow().clone()
    }

    /// Wait for the next refresh; `None` once the refresher has stopped
    pub async fn changed(&mut self) -> Option<Vec<Message>> {
        self.snapshots.changed().await.ok()?;
        Some(self.snapshots.borrow_and_update().clone())
    }

    /// Move to another conversation, tearing the current one down first
    ///
    /// On error the value names `conversation_id` with an empty, closed
    /// snapshot: `snapshot` is empty and `changed` returns `None` until a
    /// later `switch` succeeds.
    pub async fn switch(&mut self, conversation_id: &str) -> MessagingResult<()> {
        self.refresher.take();
        self.conversation_id = conversation_id.to_string();
        match open(&self.store, &self.feed, &self.me, conversation_id).await {
            Ok((snapshots, refresher)) => {
                self.snapshots = snapshots;
                self.refresher = Some(refresher);
                tracing::debug!(conversation_id = %conversation_id, "Switched live conversation");
                Ok(())
            }
            Err(e) => {
                let (_, closed) = watch::channel(Vec::new());
                self.snapshots = closed;
                Err(e)
            }
        }
    }
}

async fn open(
    store: &Arc<dyn ChatStore>,
    feed: &Arc<dyn ChangeFeed>,
    me: &WalletAddress,
    conversation_id: &str,
) -> MessagingResult<(watch::Receiver<Vec<Message>>, Refresher)> {
    // Subscribe first so inserts landing during the join are in the fetch
    let subscription = feed
        .subscribe(ChangeFilter::inserts(MESSAGES_TABLE).where_eq("conversation_id", conversation_id))
        .await?;
    let initial = store.messages(conversation_id).await?;

    let (tx, rx) = watch::channel(initial);
    let active = Arc::new(AtomicBool::new(true));
    let task = tokio::spawn(refresh_loop(
        Arc::clone(store),
        me.clone(),
        conversation_id.to_string(),
        subscription,
        tx,
        Arc::clone(&active),
    ));
    Ok((rx, Refresher { task, active }))
}

fn is_remote_insert(event: &ChangeEvent, me: &WalletAddress) -> bool {
    match event.field("sender") {
        Some(sender) => !me.matches(sender),
        None => false,
    }
}

async fn refresh_loop(
    store: Arc<dyn ChatStore>,
    me: WalletAddress,
    conversation_id: String,
    mut subscription: Subscription,
    tx: watch::Sender<Vec<Message>>,
    active: Arc<AtomicBool>,
) {
    while let Some(event) = subscription.recv().await {
        if !is_remote_insert(&event, &me) {
            continue;
        }
        match store.messages(&conversation_id).await {
            Ok(messages) => {
                if !active.load(Ordering::SeqCst) {
                    break;
                }
                tracing::debug!(conversation_id = %conversation_id, count = messages.len(), "Refreshed after remote insert");
                if tx.send(messages).is_err() {
                    break;
                }
            }
            Err(e) => tracing::error!(conversation_id = %conversation_id, "Error loading messages: {}", e),
        }
    }
    tracing::debug!(conversation_id = %conversation_id, "Live conversation stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendResult;
    use crate::testing::{message_insert as insert, FakeFeed, MemoryChatStore};
    use async_trait::async_trait;
    use std::time::Duration;

    const ME: &str = "0xab5801a7d398351b8be11c439e05c5b3259aec9b";
    const OTHER: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fn setup() -> (Arc<MemoryChatStore>, Arc<FakeFeed>, WalletAddress) {
        (
            Arc::new(MemoryChatStore::default()),
            Arc::new(FakeFeed::default()),
            WalletAddress::parse(ME).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_remote_insert_triggers_refetch() {
        let (store, feed, me) = setup();
        store.push_message("c1", OTHER, "gm");
        let mut live = LiveConversation::start(store.clone(), feed.clone(), me, "c1")
            .await
            .unwrap();
        assert_eq!(live.snapshot().len(), 1);
        assert_eq!(
            feed.filters()[0].filter.as_deref(),
            Some("conversation_id=eq.c1")
        );

        store.push_message("c1", OTHER, "you there?");
        feed.emit(insert("c1", OTHER));

        let messages = live.changed().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(store.message_fetches(), 2);
    }

    #[tokio::test]
    async fn test_own_inserts_are_ignored() {
        let (store, feed, me) = setup();
        let _live = LiveConversation::start(store.clone(), feed.clone(), me, "c1")
            .await
            .unwrap();

        feed.emit(insert("c1", &ME.to_uppercase().replace("0X", "0x")));
        settle().await;
        assert_eq!(store.message_fetches(), 1);
    }

    #[tokio::test]
    async fn test_drop_stops_refetches() {
        let (store, feed, me) = setup();
        let mut live = LiveConversation::start(store.clone(), feed.clone(), me, "c1")
            .await
            .unwrap();
        feed.emit(insert("c1", OTHER));
        live.changed().await.unwrap();
        assert_eq!(store.message_fetches(), 2);

        drop(live);
        settle().await;
        assert_eq!(feed.active_subscriptions(), 0);

        feed.emit(insert("c1", OTHER));
        settle().await;
        assert_eq!(store.message_fetches(), 2);
    }

    #[tokio::test]
    async fn test_switch_tears_down_previous_subscription() {
        let (store, feed, me) = setup();
        store.push_message("c2", OTHER, "over here");
        let mut live = LiveConversation::start(store.clone(), feed.clone(), me, "c1")
            .await
            .unwrap();

        live.switch("c2").await.unwrap();
        settle().await;
        assert_eq!(live.conversation_id(), "c2");
        assert_eq!(live.snapshot().len(), 1);
        assert_eq!(feed.active_subscriptions(), 1);
        assert_eq!(
            feed.filters().last().unwrap().filter.as_deref(),
            Some("conversation_id=eq.c2")
        );
    }

    #[tokio::test]
    async fn test_failed_switch_leaves_consistent_state() {
        let (store, feed, me) = setup();
        store.push_message("c1", OTHER, "gm");
        let mut live = LiveConversation::start(store.clone(), feed.clone(), me, "c1")
            .await
            .unwrap();

        feed.set_failing(true);
        assert!(live.switch("c2").await.is_err());
        settle().await;
        assert_eq!(live.conversation_id(), "c2");
        assert!(live.snapshot().is_empty());
        assert!(live.changed().await.is_none());
        assert_eq!(feed.active_subscriptions(), 0);

        feed.set_failing(false);
        live.switch("c1").await.unwrap();
        assert_eq!(live.snapshot().len(), 1);
    }

    /// Feed on which a message lands while the join is in flight
    struct SlowJoin {
        store: Arc<MemoryChatStore>,
        inner: FakeFeed,
    }

    #[async_trait]
    impl ChangeFeed for SlowJoin {
        async fn subscribe(&self, filter: ChangeFilter) -> BackendResult<Subscription> {
            let subscription = self.inner.subscribe(filter).await?;
            self.store.push_message("c1", OTHER, "sent during join");
            Ok(subscription)
        }
    }

    #[tokio::test]
    async fn test_insert_during_join_is_in_initial_snapshot() {
        let (store, _, me) = setup();
        let feed = Arc::new(SlowJoin {
            store: store.clone(),
            inner: FakeFeed::default(),
        });

        let live = LiveConversation::start(store.clone(), feed, me, "c1")
            .await
            .unwrap();
        let snapshot = live.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].content, "sent during join");
    }
}
