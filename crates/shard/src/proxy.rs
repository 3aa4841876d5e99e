//! Shard proxy: routes entity-keyed messages to the owning node, spawning
//! the entity on demand. At most one live entity per key exists cluster-wide;
//! an entity terminates when it handles its designated stop message, and a
//! reaper releases the shard slot once its task completes. No passivation:
//! entities stay live until explicitly stopped.

use crate::ring::{NodeId, ShardRing};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Keys routable by the proxy marshal to a single opaque string and back.
pub trait EntityKey: Sized + Clone + Send + Sync + 'static {
    fn marshall(&self) -> String;
    fn unmarshall(key: &str) -> Option<Self>;
}

impl EntityKey for finback_core::Fcid {
    fn marshall(&self) -> String {
        finback_core::Fcid::marshall(self)
    }

    fn unmarshall(key: &str) -> Option<Self> {
        finback_core::Fcid::unmarshall(key)
    }
}

/// Failure routing into the shard.
#[derive(Debug, Error)]
pub enum ShardError {
    #[error("shard interop failure: {0}")]
    ActorInterop(String),
    #[error("no node owns shard for key {0}")]
    NoOwner(String),
}

/// A message addressed by marshaled entity key, as forwarded between nodes.
pub struct Routed<M> {
    pub key: String,
    pub msg: M,
}

type Factory<K, M> = dyn Fn(K) -> (mpsc::Sender<M>, JoinHandle<()>) + Send + Sync;

struct ProxyInner<K, M> {
    node: NodeId,
    ring: ShardRing,
    factory: Box<Factory<K, M>>,
    registry: Mutex<FxHashMap<String, mpsc::Sender<M>>>,
    peers: Mutex<FxHashMap<NodeId, mpsc::Sender<Routed<M>>>>,
}

/// Per-node proxy for one entity kind.
pub struct ShardProxy<K, M> {
    inner: Arc<ProxyInner<K, M>>,
}

impl<K, M> Clone for ShardProxy<K, M> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K, M> ShardProxy<K, M>
where
    K: EntityKey,
    M: Send + 'static,
{
    pub fn new(
        node: NodeId,
        ring: ShardRing,
        factory: impl Fn(K) -> (mpsc::Sender<M>, JoinHandle<()>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                node,
                ring,
                factory: Box::new(factory),
                registry: Mutex::new(FxHashMap::default()),
                peers: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Inbox for messages forwarded by peer proxies; the returned task drains
    /// it into local delivery.
    pub fn open_inbox(&self, cap: usize) -> mpsc::Sender<Routed<M>> {
        let (tx, mut rx) = mpsc::channel::<Routed<M>>(cap);
        let proxy = self.clone();
        tokio::spawn(async move {
            while let Some(routed) = rx.recv().await {
                match K::unmarshall(&routed.key) {
                    Some(key) => {
                        if let Err(e) = proxy.deliver_local(&key, routed.msg).await {
                            warn!(key = %routed.key, error = %e, "forwarded delivery failed");
                        }
                    }
                    None => warn!(key = %routed.key, "unroutable forwarded key"),
                }
            }
        });
        tx
    }

    /// Wire the inbox of a peer node's proxy.
    pub async fn add_peer(&self, node: NodeId, tx: mpsc::Sender<Routed<M>>) {
        self.inner.peers.lock().await.insert(node, tx);
    }

    /// Route `msg` to the entity for `key`, spawning it on its owner node if
    /// it does not exist yet.
    pub async fn tell(&self, key: &K, msg: M) -> Result<(), ShardError> {
        let marshaled = key.marshall();
        let owner = self
            .inner
            .ring
            .owner(&marshaled)
            .ok_or_else(|| ShardError::NoOwner(marshaled.clone()))?;
        if owner == self.inner.node {
            return self.deliver_local(key, msg).await;
        }
        let peer = {
            let peers = self.inner.peers.lock().await;
            peers.get(&owner).cloned()
        };
        match peer {
            Some(tx) => tx
                .send(Routed { key: marshaled.clone(), msg })
                .await
                .map_err(|_| ShardError::ActorInterop(format!("peer {} unreachable", owner))),
            None => Err(ShardError::ActorInterop(format!("peer {} not wired", owner))),
        }
    }

    async fn deliver_local(&self, key: &K, msg: M) -> Result<(), ShardError> {
        let marshaled = key.marshall();
        // One respawn attempt covers the race with an entity that terminated
        // after lookup.
        let mut msg = Some(msg);
        for _ in 0..2 {
            let sender = self.get_or_spawn(&marshaled, key).await;
            match sender.send(msg.take().expect("message consumed twice")).await {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(m)) => {
                    self.inner.registry.lock().await.remove(&marshaled);
                    msg = Some(m);
                }
            }
        }
        Err(ShardError::ActorInterop(format!("entity {} keeps terminating", marshaled)))
    }

    async fn get_or_spawn(&self, marshaled: &str, key: &K) -> mpsc::Sender<M> {
        let mut registry = self.inner.registry.lock().await;
        if let Some(tx) = registry.get(marshaled) {
            if !tx.is_closed() {
                return tx.clone();
            }
            registry.remove(marshaled);
        }
        let (tx, handle) = (self.inner.factory)(key.clone());
        registry.insert(marshaled.to_string(), tx.clone());
        debug!(node = self.inner.node, key = marshaled, "entity spawned");
        let inner = Arc::clone(&self.inner);
        let slot = marshaled.to_string();
        tokio::spawn(async move {
            let _ = handle.await;
            inner.registry.lock().await.remove(&slot);
            debug!(key = %slot, "entity slot released");
        });
        tx
    }

    /// Number of live entities hosted on this node.
    pub async fn live_entities(&self) -> usize {
        self.inner.registry.lock().await.len()
    }

    /// Wait until the local slot for `key` is released (the entity task
    /// finished and the reaper cleaned up). Keys owned by other nodes return
    /// immediately. Returns `false` when `timeout` passes first.
    pub async fn wait_released(&self, key: &K, timeout: std::time::Duration) -> bool {
        let marshaled = key.marshall();
        if self.inner.ring.owner(&marshaled) != Some(self.inner.node) {
            return true;
        }
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.inner.registry.lock().await.contains_key(&marshaled) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}
