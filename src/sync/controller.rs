//! The synchronization controller.
//!
//! One controller task owns the whole session lifecycle: it resolves
//! the board's owner identity, waits for the readiness signals, sweeps
//! ledger history window by window, and only then starts executing
//! posts. Post requests that arrive earlier are queued and replayed in
//! submission order. The scan window, the readiness set and the post
//! queue are owned exclusively by this task; nothing else touches them.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use crate::board::{Post, PostPayload, PostStore};
use crate::codec;
use crate::config::Config;
use crate::fee::{self, OutputTarget};
use crate::identity::{Identity, PublicKey};
use crate::record::{self, BoardRecord};
use crate::session::{BoardEvent, PostDraft, PostReceipt};
use crate::transport::{BroadcastOutcome, LedgerTx, SignedTx, Transport, TxId, TxOut};
use crate::{BoardError, Result};

use super::state::{PendingSignals, ReadySignal, ScanWindow, SyncState};

/// A request sent from the session handle to the controller task.
pub(crate) enum Command {
    /// Execute (or queue) a post.
    Post {
        /// The post draft.
        draft: PostDraft,
        /// Extra value paid to the board owner, zero for none.
        payment: u64,
        /// Channel for the outcome.
        reply: oneshot::Sender<Result<PostReceipt>>,
    },
    /// Shut the session down.
    Close,
}

/// A post held back until scanning completes.
pub(crate) struct QueuedPost {
    draft: PostDraft,
    payment: u64,
    reply: oneshot::Sender<Result<PostReceipt>>,
}

/// The board's resolved owner identity, fixed for the session.
struct OwnerInfo {
    key: PublicKey,
    address: String,
    is_owner: bool,
    epoch: DateTime<Utc>,
}

/// What ended a scan pass.
enum PassOutcome {
    Completed(Result<Vec<LedgerTx>>),
    Closed,
}

pub(crate) struct SyncController {
    config: Config,
    transport: Arc<dyn Transport>,
    host: String,
    self_key: PublicKey,
    events: broadcast::Sender<BoardEvent>,
    store: Arc<RwLock<PostStore>>,
    cmds: mpsc::UnboundedReceiver<Command>,
    queue: VecDeque<QueuedPost>,
    pending_broadcasts: Vec<SignedTx>,
    state: SyncState,
    signals: PendingSignals,
}

impl SyncController {
    pub(crate) fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        host: String,
        self_key: PublicKey,
        events: broadcast::Sender<BoardEvent>,
        store: Arc<RwLock<PostStore>>,
        cmds: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            config,
            transport,
            host,
            self_key,
            events,
            store,
            cmds,
            queue: VecDeque::new(),
            pending_broadcasts: Vec::new(),
            state: SyncState::Resolving,
            signals: PendingSignals::new(),
        }
    }

    /// Run the session to completion.
    pub(crate) async fn run(mut self) {
        let mut updates = self.transport.updates().await;

        let Some((owner, scan_start)) = self.resolve_and_gate().await else {
            self.shutdown(None).await;
            return;
        };

        if self.scan_history(&owner, scan_start).await {
            self.transition(SyncState::Ready);
            info!(host = %self.host, "scan complete, posting open");
            self.emit(BoardEvent::ScanComplete);

            self.rebroadcast_pending().await;
            self.replay_queue(&owner).await;
            self.serve(&owner, &mut updates).await;
        }

        self.shutdown(Some(&owner)).await;
    }

    /// Resolve the owner identity and wait for all readiness signals.
    ///
    /// Returns the owner info and the scan start time, or `None` when a
    /// close arrived first.
    async fn resolve_and_gate(&mut self) -> Option<(OwnerInfo, DateTime<Utc>)> {
        // A failed TXT lookup is treated exactly like an absent record:
        // the session falls back to owning the board.
        let records = match self.transport.resolve_txt(&self.host).await {
            Ok(records) => records,
            Err(e) => {
                warn!(host = %self.host, error = %e, "TXT resolution failed");
                Vec::new()
            }
        };

        let (owner_key, epoch) = match record::first_valid(&records) {
            Some(found) => {
                info!(host = %self.host, "board record found");
                (found.public_key, found.created_at)
            }
            None => {
                info!(host = %self.host, "no board record, session becomes owner");
                let now = Utc::now();
                let fresh = BoardRecord::new(self.self_key.clone(), now);
                self.emit(BoardEvent::RecordNeeded {
                    record: fresh.format(),
                });
                (self.self_key.clone(), now)
            }
        };

        let identity = Identity::resolve(&self.self_key, &owner_key);
        let owner = OwnerInfo {
            address: self.transport.address(&owner_key),
            key: owner_key,
            is_owner: identity.is_owner,
            epoch,
        };
        self.emit(BoardEvent::IdentityResolved {
            owner: owner.key.clone(),
            is_owner: owner.is_owner,
        });

        // Readiness gate: both identities registered and the transport
        // caught up, each signal consumed exactly once.
        let self_loaded = match self.transport.watch(&self.self_key).await {
            Ok(ts) => ts,
            Err(e) => {
                warn!(error = %e, "failed to watch own identity");
                None
            }
        };
        self.signals.fire(ReadySignal::SelfIdentity);

        let owner_loaded = if owner.is_owner {
            self_loaded
        } else {
            match self.transport.watch(&owner.key).await {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(error = %e, "failed to watch owner identity");
                    None
                }
            }
        };
        self.signals.fire(ReadySignal::OwnerIdentity);

        if !self.gate_synced().await {
            return None;
        }
        if self.signals.fire(ReadySignal::TransportSynced) {
            debug!("transport fully synced");
        }

        if !self.signals.is_drained() {
            // Unreachable by construction; the gate exists so a future
            // signal source cannot start the scan early.
            warn!("readiness gate not drained, waiting on nothing");
        }
        self.transition(SyncState::Scanning);

        let scan_start = [self_loaded, owner_loaded]
            .into_iter()
            .flatten()
            .fold(owner.epoch, |a, b| a.min(b));

        Some((owner, scan_start))
    }

    /// Wait for the transport to become fully synced, staying
    /// responsive to commands. Returns `false` when a close arrived.
    async fn gate_synced(&mut self) -> bool {
        let transport = Arc::clone(&self.transport);
        let synced = async move { transport.wait_synced().await };
        tokio::pin!(synced);

        loop {
            tokio::select! {
                _ = &mut synced => return true,
                cmd = self.cmds.recv() => match cmd {
                    Some(Command::Post { draft, payment, reply }) => {
                        self.queue.push_back(QueuedPost { draft, payment, reply });
                    }
                    Some(Command::Close) | None => return false,
                },
            }
        }
    }

    /// Sweep ledger history from `scan_start` to the present.
    ///
    /// Returns `false` when the session was closed mid-scan.
    async fn scan_history(&mut self, owner: &OwnerInfo, scan_start: DateTime<Utc>) -> bool {
        let step = self.config.sync.scan_step();
        let mut window = ScanWindow::new(scan_start, (scan_start + step).min(Utc::now()));

        loop {
            match self.scan_pass(owner, window).await {
                PassOutcome::Closed => return false,
                PassOutcome::Completed(Err(e)) => {
                    warn!(error = %e, "scan pass failed, retrying");
                    if !self.wait(self.config.sync.retry_delay()).await {
                        return false;
                    }
                    // Same window, new attempt.
                }
                PassOutcome::Completed(Ok(txs)) => {
                    for tx in &txs {
                        self.ingest(tx, owner).await;
                    }
                    let now = Utc::now();
                    self.emit(BoardEvent::ScanProgress {
                        scanned_through: window.end,
                        target: now,
                    });
                    if window.reached(now) {
                        return true;
                    }
                    if !self.wait(self.config.sync.pass_delay()).await {
                        return false;
                    }
                    window = window.next(step, Utc::now());
                }
            }
        }
    }

    /// Run one scan pass, staying responsive to commands.
    ///
    /// Posts arriving mid-pass are queued; a close drops the in-flight
    /// pass, discarding its results.
    async fn scan_pass(&mut self, owner: &OwnerInfo, window: ScanWindow) -> PassOutcome {
        let transport = Arc::clone(&self.transport);
        let key = owner.key.clone();
        let pass = async move { transport.scan(&key, window).await };
        tokio::pin!(pass);

        loop {
            tokio::select! {
                result = &mut pass => return PassOutcome::Completed(result),
                cmd = self.cmds.recv() => match cmd {
                    Some(Command::Post { draft, payment, reply }) => {
                        self.queue.push_back(QueuedPost { draft, payment, reply });
                    }
                    Some(Command::Close) | None => return PassOutcome::Closed,
                },
            }
        }
    }

    /// Sleep while staying responsive to commands. Returns `false` when
    /// a close arrived.
    async fn wait(&mut self, duration: std::time::Duration) -> bool {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                cmd = self.cmds.recv() => match cmd {
                    Some(Command::Post { draft, payment, reply }) => {
                        self.queue.push_back(QueuedPost { draft, payment, reply });
                    }
                    Some(Command::Close) | None => return false,
                },
            }
        }
    }

    /// Serve posts and live updates until the session closes.
    async fn serve(&mut self, owner: &OwnerInfo, updates: &mut mpsc::Receiver<LedgerTx>) {
        let mut updates_open = true;
        loop {
            tokio::select! {
                cmd = self.cmds.recv() => match cmd {
                    Some(Command::Post { draft, payment, reply }) => {
                        let result = self.execute_post(owner, draft, payment).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Close) | None => return,
                },
                tx = updates.recv(), if updates_open => match tx {
                    Some(tx) => { self.ingest(&tx, owner).await; }
                    None => updates_open = false,
                },
            }
        }
    }

    /// Replay posts queued while scanning, in submission order.
    async fn replay_queue(&mut self, owner: &OwnerInfo) {
        while let Some(queued) = self.queue.pop_front() {
            let result = self
                .execute_post(owner, queued.draft, queued.payment)
                .await;
            let _ = queued.reply.send(result);
        }
    }

    /// Re-submit own transactions not yet observed as confirmed.
    async fn rebroadcast_pending(&mut self) {
        for tx in self.pending_broadcasts.clone() {
            let txid = tx.txid();
            match self.transport.broadcast(&tx).await {
                Ok(BroadcastOutcome::Acked) => {
                    debug!(%txid, "re-broadcast acknowledged");
                }
                Ok(BroadcastOutcome::Rejected(reason)) => {
                    warn!(%txid, %reason, "re-broadcast rejected");
                }
                Err(e) => warn!(%txid, error = %e, "re-broadcast failed"),
            }
        }
    }

    /// Validate, fund, sign and broadcast one post.
    async fn execute_post(
        &mut self,
        owner: &OwnerInfo,
        draft: PostDraft,
        payment: u64,
    ) -> Result<PostReceipt> {
        if !owner.is_owner && draft.reply_to.is_none() {
            return Err(BoardError::Validation(
                "not the board owner: a reply_to target is required".to_string(),
            ));
        }

        // Resolve a user-entered display-hash prefix to the full hash of
        // a known post; the payload carries the internal byte order.
        let reply_internal = match draft.reply_to.as_deref() {
            Some(prefix) => {
                let store = self.store.read().await;
                let target = store
                    .find_by_prefix(prefix)
                    .map(|p| p.hash.clone())
                    .ok_or_else(|| {
                        BoardError::Validation(format!("transaction {prefix} is unknown"))
                    })?;
                drop(store);
                let txid = TxId::from_display_hex(&target).ok_or_else(|| {
                    BoardError::Validation(format!("transaction {target} is unknown"))
                })?;
                Some(txid.internal_hex())
            }
            None => None,
        };

        let payload = PostPayload {
            content: draft.content,
            reply_to: reply_internal,
        };
        let body = codec::compress(&serde_json::to_vec(&payload)?)?;
        let message = codec::encode(&body, &owner.key);

        let inputs = self.transport.spendable_inputs().await;
        let plan = fee::plan(
            &message,
            payment,
            &owner.key,
            &self.self_key,
            &inputs,
            &self.config.fee_params(),
        )?;

        let signed = self.transport.sign(&plan).await?;
        let txid = signed.txid();
        info!(%txid, chunks = message.chunk_count(), fee = plan.fee, "sending post");

        match self.transport.broadcast(&signed).await? {
            BroadcastOutcome::Acked => {
                // Surface the post locally right away; the live feed or
                // a later scan will confirm it.
                let own_tx = LedgerTx {
                    txid,
                    timestamp: Utc::now(),
                    outputs: plan
                        .outputs
                        .iter()
                        .filter_map(|o| match &o.target {
                            OutputTarget::Message(script) => Some(TxOut {
                                value: o.value,
                                script: script.clone(),
                            }),
                            OutputTarget::PayTo(_) => None,
                        })
                        .collect(),
                    sender: Some(self.transport.address(&self.self_key)),
                    spends_owner_funds: owner.is_owner,
                    confirmed: false,
                };
                self.ingest(&own_tx, owner).await;
                self.pending_broadcasts.push(signed);

                Ok(PostReceipt {
                    accepted: true,
                    txid: txid.display_hex(),
                })
            }
            BroadcastOutcome::Rejected(reason) => {
                warn!(%txid, %reason, "post rejected by transport");
                self.emit(BoardEvent::BroadcastRejected {
                    txid: txid.display_hex(),
                    reason,
                });
                Ok(PostReceipt {
                    accepted: false,
                    txid: txid.display_hex(),
                })
            }
        }
    }

    /// Decode one ledger transaction into the store.
    ///
    /// Malformed messages are skipped; the ledger is allowed to carry
    /// data this board cannot read.
    async fn ingest(&mut self, tx: &LedgerTx, owner: &OwnerInfo) {
        if tx.confirmed {
            self.pending_broadcasts.retain(|s| s.txid() != tx.txid);
        }

        match Post::from_ledger_tx(tx, &owner.key, &owner.address) {
            Ok(Some(post)) => {
                let inserted = self.store.write().await.insert(post.clone());
                if inserted {
                    self.emit(BoardEvent::NewPost(post));
                }
            }
            Ok(None) => {}
            Err(_) => {
                debug!(txid = %tx.txid, "skipping malformed message");
            }
        }
    }

    fn transition(&mut self, next: SyncState) {
        debug_assert!(self.state.can_transition_to(next));
        self.state = next;
    }

    fn emit(&self, event: BoardEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Release transport subscriptions and fail any queued posts.
    async fn shutdown(&mut self, owner: Option<&OwnerInfo>) {
        while let Some(queued) = self.queue.pop_front() {
            let _ = queued.reply.send(Err(BoardError::Closed));
        }
        self.transport.unwatch(&self.self_key).await;
        if let Some(owner) = owner {
            if !owner.is_owner {
                self.transport.unwatch(&owner.key).await;
            }
        }
        info!(host = %self.host, "session closed");
    }
}
