//! Board session orchestration.
//!
//! A [`BoardSession`] composes the codec, fee engine, sync controller
//! and thread builder behind a small async API. All mutable session
//! state lives in the controller task; the handle only sends commands
//! and reads store snapshots, so it can be shared and cloned freely by
//! reference.

mod events;

pub use events::BoardEvent;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::board::{Post, PostStore, ThreadBuilder};
use crate::config::Config;
use crate::identity::PublicKey;
use crate::sync::{Command, SyncController};
use crate::transport::Transport;
use crate::{BoardError, Result};

/// Maximum length for post content (in characters).
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Validate post content.
fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(BoardError::Validation(
            "post content must not be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(BoardError::Validation(format!(
            "post content too long (at most {MAX_CONTENT_LENGTH} characters)"
        )));
    }
    Ok(())
}

/// A post to be published.
#[derive(Debug, Clone)]
pub struct PostDraft {
    /// Post body text; the first line becomes the title.
    pub content: String,
    /// Display-hash prefix of the post being replied to. Required for
    /// everyone but the board owner.
    pub reply_to: Option<String>,
}

impl PostDraft {
    /// Create a new top-level post draft.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reply_to: None,
        }
    }

    /// Create a reply draft.
    pub fn reply(content: impl Into<String>, reply_to: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reply_to: Some(reply_to.into()),
        }
    }
}

/// Outcome of a post submission.
#[derive(Debug, Clone)]
pub struct PostReceipt {
    /// Whether the network acknowledged the transaction.
    pub accepted: bool,
    /// Display hash of the post's transaction.
    pub txid: String,
}

/// A live session against one board.
pub struct BoardSession {
    self_key: PublicKey,
    cmds: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<BoardEvent>,
    store: Arc<RwLock<PostStore>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BoardSession {
    /// Open a session against `host`'s board.
    ///
    /// Derives the session identity, then spawns the sync task, which
    /// resolves the board owner and scans ledger history in the
    /// background. Subscribe to [`BoardEvent`]s to follow progress;
    /// posts submitted before the scan completes are queued and
    /// replayed in order once it does.
    pub async fn open(
        config: Config,
        transport: Arc<dyn Transport>,
        host: impl Into<String>,
        passphrase: &str,
    ) -> Result<Self> {
        let host = host.into();
        let self_key = transport.derive_identity(&host, passphrase).await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = Arc::new(RwLock::new(PostStore::new()));

        let controller = SyncController::new(
            config,
            transport,
            host,
            self_key.clone(),
            event_tx.clone(),
            Arc::clone(&store),
            cmd_rx,
        );
        let task = tokio::spawn(controller.run());

        Ok(Self {
            self_key,
            cmds: cmd_tx,
            events: event_tx,
            store,
            task: Mutex::new(Some(task)),
        })
    }

    /// The session's own public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.self_key
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Publish a post, paying `author_payment` extra to the board owner
    /// (zero for none).
    ///
    /// Waits for the outcome; a post submitted while the historical
    /// scan is still running is queued and executed once the session is
    /// ready. Submission order is preserved.
    pub async fn post(&self, draft: PostDraft, author_payment: u64) -> Result<PostReceipt> {
        validate_content(&draft.content)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmds
            .send(Command::Post {
                draft,
                payment: author_payment,
                reply: reply_tx,
            })
            .map_err(|_| BoardError::Closed)?;
        reply_rx.await.map_err(|_| BoardError::Closed)?
    }

    /// The board's threads: root posts newest-first, each with its
    /// replies nested oldest-first.
    pub async fn list(&self) -> Vec<Post> {
        let posts = self.store.read().await.all();
        ThreadBuilder::build_forest(posts)
    }

    /// Look up a single post by a display-hash prefix.
    ///
    /// Returns the first match without its reply tree.
    pub async fn find(&self, prefix: &str) -> Option<Post> {
        self.store.read().await.find_by_prefix(prefix).cloned()
    }

    /// Close the session: stop the scan loop and release all transport
    /// subscriptions. Idempotent.
    pub async fn close(&self) {
        let _ = self.cmds.send(Command::Close);
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}
