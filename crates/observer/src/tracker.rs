//! The tracker entity: a single-task state machine (Idle/Running) fed by a
//! FIFO inbox, plus its cancellable polling loop. The polling loop talks to
//! the outside world and reports back only via self-sent `Refresh` messages;
//! state never leaves the entity task.

use crate::error::ObserverError;
use async_trait::async_trait;
use finback_core::Fcid;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const INBOX_CAP: usize = 64;

/// Messages a tracker entity accepts.
pub enum TrackerMsg<S> {
    Start,
    Stop,
    Refresh(S),
    Get(oneshot::Sender<Option<S>>),
}

/// One tracker kind: how to fetch a snapshot and where to publish it.
#[async_trait]
pub trait Poller: Send + Sync + 'static {
    type Snap: Clone + Send + 'static;

    fn kind(&self) -> &'static str;
    fn interval(&self) -> Duration;
    async fn poll(&self, fcid: &Fcid) -> Result<Self::Snap, ObserverError>;
    async fn publish(&self, fcid: &Fcid, snap: &Self::Snap) -> Result<(), ObserverError>;
}

/// Spawn a tracker entity for `fcid`. The entity starts Idle; `Start` brings
/// up the polling task, `Stop` cancels it and terminates the entity.
pub fn spawn_tracker<P: Poller>(
    fcid: Fcid,
    poller: Arc<P>,
) -> (mpsc::Sender<TrackerMsg<P::Snap>>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<TrackerMsg<P::Snap>>(INBOX_CAP);
    let self_tx = tx.clone();
    let handle = tokio::spawn(async move {
        let mut state: Option<P::Snap> = None;
        let mut polling: Option<CancellationToken> = None;
        while let Some(msg) = rx.recv().await {
            match msg {
                TrackerMsg::Start => {
                    if polling.is_none() {
                        let token = CancellationToken::new();
                        tokio::spawn(poll_loop(
                            fcid.clone(),
                            Arc::clone(&poller),
                            self_tx.clone(),
                            token.clone(),
                        ));
                        polling = Some(token);
                        debug!(kind = poller.kind(), fcid = %fcid, "tracker running");
                    }
                }
                TrackerMsg::Stop => break,
                TrackerMsg::Refresh(snap) => {
                    // Refresh only matters while running; a leftover refresh
                    // delivered in Idle is dropped.
                    if polling.is_some() {
                        state = Some(snap.clone());
                        if let Err(e) = poller.publish(&fcid, &snap).await {
                            warn!(kind = poller.kind(), fcid = %fcid, error = %e, "publish failed");
                        }
                    }
                }
                TrackerMsg::Get(reply) => {
                    let _ = reply.send(state.clone());
                }
            }
        }
        if let Some(token) = polling {
            token.cancel();
        }
        debug!(kind = poller.kind(), fcid = %fcid, "tracker terminated");
    });
    (tx, handle)
}

/// The polling side: every interval, fetch a snapshot and self-send it.
/// Transport and conversion failures are logged and retried next tick; they
/// never terminate the entity. Cancellation between the fetch and the
/// self-send simply drops the snapshot.
async fn poll_loop<P: Poller>(
    fcid: Fcid,
    poller: Arc<P>,
    self_tx: mpsc::Sender<TrackerMsg<P::Snap>>,
    token: CancellationToken,
) {
    let mut tick = tokio::time::interval(poller.interval());
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tick.tick() => {}
        }
        let result = tokio::select! {
            _ = token.cancelled() => break,
            r = poller.poll(&fcid) => r,
        };
        match result {
            Ok(snap) => {
                if token.is_cancelled() {
                    break;
                }
                if self_tx.send(TrackerMsg::Refresh(snap)).await.is_err() {
                    let e = ObserverError::ActorInterop("tracker inbox closed".to_string());
                    debug!(kind = poller.kind(), fcid = %fcid, error = %e, "refresh undeliverable; polling stops");
                    break;
                }
            }
            Err(e) => {
                warn!(kind = poller.kind(), fcid = %fcid, error = %e, "poll failed; retrying next tick");
            }
        }
    }
    debug!(kind = poller.kind(), fcid = %fcid, "polling loop ended");
}
