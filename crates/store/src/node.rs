//! Per-node store actor and its client handle. One task owns the replica;
//! commands and gossip drain through the same select loop, so every mutation
//! and read is serialized. Writes fan deltas out to peers and, depending on
//! the requested consistency, wait for their acks before replying.

use crate::lww::{DeltaOp, LwwMap, NodeId};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Read/write consistency carried by each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    #[default]
    Local,
    Majority,
    All,
}

/// Failure of a request into the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store interop failure: {0}")]
    ActorInterop(String),
}

fn interop(msg: &str) -> StoreError {
    StoreError::ActorInterop(msg.to_string())
}

/// Delta batch exchanged between replicas.
pub struct Gossip<K, V> {
    pub from: NodeId,
    pub ops: Vec<DeltaOp<K, V>>,
    pub ack: Option<oneshot::Sender<()>>,
}

type Updater<V> = Box<dyn FnOnce(V) -> V + Send>;
type KeySelector<K> = Box<dyn Fn(&K) -> bool + Send>;

enum Cmd<K, V> {
    Get { key: K, reply: oneshot::Sender<Option<V>> },
    Contains { key: K, reply: oneshot::Sender<bool> },
    ListKeys { reply: oneshot::Sender<HashSet<K>> },
    ListAll { reply: oneshot::Sender<HashMap<K, V>> },
    Size { reply: oneshot::Sender<usize> },
    Put { key: K, value: V, write: Consistency, reply: oneshot::Sender<()> },
    PutAll { entries: Vec<(K, V)>, write: Consistency, reply: oneshot::Sender<()> },
    Remove { key: K, write: Consistency, reply: oneshot::Sender<()> },
    RemoveAll { keys: Vec<K>, write: Consistency, reply: oneshot::Sender<()> },
    RemoveBySelectKey { pred: KeySelector<K>, write: Consistency, reply: oneshot::Sender<usize> },
    Update { key: K, f: Updater<V>, write: Consistency, reply: oneshot::Sender<()> },
    Upsert { key: K, put: V, f: Updater<V>, write: Consistency, reply: oneshot::Sender<()> },
    AddPeer { node: NodeId, tx: mpsc::Sender<Gossip<K, V>> },
}

/// Store node settings.
#[derive(Debug, Clone)]
pub struct StoreCfg {
    pub node: NodeId,
    pub queue_cap: usize,
    pub ask_timeout: Duration,
    pub write: Consistency,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            node: 1,
            queue_cap: 1024,
            ask_timeout: Duration::from_secs(5),
            write: Consistency::Local,
        }
    }
}

/// Client handle to one store node. Cheap to clone.
pub struct StoreHandle<K, V> {
    tx: mpsc::Sender<Cmd<K, V>>,
    gossip_tx: mpsc::Sender<Gossip<K, V>>,
    node: NodeId,
    ask_timeout: Duration,
    write: Consistency,
}

impl<K, V> Clone for StoreHandle<K, V> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            gossip_tx: self.gossip_tx.clone(),
            node: self.node,
            ask_timeout: self.ask_timeout,
            write: self.write,
        }
    }
}

/// Spawn a store node actor; the returned handle is its only client surface.
pub fn spawn_node<K, V>(cfg: StoreCfg) -> StoreHandle<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Cmd<K, V>>(cfg.queue_cap);
    let (gossip_tx, mut gossip_rx) = mpsc::channel::<Gossip<K, V>>(cfg.queue_cap);
    let node = cfg.node;

    tokio::spawn(async move {
        let mut map: LwwMap<K, V> = LwwMap::new(node);
        let mut peers: Vec<(NodeId, mpsc::Sender<Gossip<K, V>>)> = Vec::new();
        loop {
            tokio::select! {
                maybe_cmd = cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(cmd) => handle_cmd(node, &mut map, &mut peers, cmd),
                        None => {
                            debug!(node, "store command channel closed; stopping");
                            break;
                        }
                    }
                }
                maybe_gossip = gossip_rx.recv() => {
                    if let Some(g) = maybe_gossip {
                        for op in g.ops {
                            map.apply(op);
                        }
                        if let Some(ack) = g.ack {
                            let _ = ack.send(());
                        }
                    }
                }
            }
        }
    });

    StoreHandle { tx: cmd_tx, gossip_tx, node, ask_timeout: cfg.ask_timeout, write: cfg.write }
}

fn handle_cmd<K, V>(
    node: NodeId,
    map: &mut LwwMap<K, V>,
    peers: &mut Vec<(NodeId, mpsc::Sender<Gossip<K, V>>)>,
    cmd: Cmd<K, V>,
) where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    match cmd {
        Cmd::Get { key, reply } => {
            let _ = reply.send(map.get(&key).cloned());
        }
        Cmd::Contains { key, reply } => {
            let _ = reply.send(map.contains(&key));
        }
        Cmd::ListKeys { reply } => {
            let _ = reply.send(map.keys().cloned().collect());
        }
        Cmd::ListAll { reply } => {
            let _ = reply.send(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        }
        Cmd::Size { reply } => {
            let _ = reply.send(map.len());
        }
        Cmd::Put { key, value, write, reply } => {
            let op = map.put(key, value);
            replicate(node, peers, vec![op], write, reply, ());
        }
        Cmd::PutAll { entries, write, reply } => {
            let ops = entries.into_iter().map(|(k, v)| map.put(k, v)).collect();
            replicate(node, peers, ops, write, reply, ());
        }
        Cmd::Remove { key, write, reply } => {
            let ops = map.remove(&key).into_iter().collect();
            replicate(node, peers, ops, write, reply, ());
        }
        Cmd::RemoveAll { keys, write, reply } => {
            let ops = keys.iter().filter_map(|k| map.remove(k)).collect();
            replicate(node, peers, ops, write, reply, ());
        }
        Cmd::RemoveBySelectKey { pred, write, reply } => {
            let hits: Vec<K> = map.keys().filter(|k| pred(k)).cloned().collect();
            let removed = hits.len();
            let ops = hits.iter().filter_map(|k| map.remove(k)).collect();
            replicate(node, peers, ops, write, reply, removed);
        }
        Cmd::Update { key, f, write, reply } => {
            let ops = match map.get(&key).cloned() {
                Some(v) => vec![map.put(key, f(v))],
                None => Vec::new(),
            };
            replicate(node, peers, ops, write, reply, ());
        }
        Cmd::Upsert { key, put, f, write, reply } => {
            let next = match map.get(&key).cloned() {
                Some(v) => f(v),
                None => put,
            };
            let op = map.put(key, next);
            replicate(node, peers, vec![op], write, reply, ());
        }
        Cmd::AddPeer { node: peer, tx } => {
            peers.retain(|(id, _)| *id != peer);
            peers.push((peer, tx));
        }
    }
}

/// Fan deltas out to peers and reply once the consistency level is satisfied.
/// Peer ack waiting happens off the actor task so reads never queue behind
/// replication.
fn replicate<K, V, R>(
    node: NodeId,
    peers: &[(NodeId, mpsc::Sender<Gossip<K, V>>)],
    ops: Vec<DeltaOp<K, V>>,
    write: Consistency,
    reply: oneshot::Sender<R>,
    result: R,
) where
    K: Clone + Send + 'static,
    V: Clone + Send + 'static,
    R: Send + 'static,
{
    if ops.is_empty() || peers.is_empty() {
        let _ = reply.send(result);
        return;
    }
    let needed_acks = match write {
        Consistency::Local => 0,
        // Quorum over the full membership, the local replica included.
        Consistency::Majority => (peers.len() + 1) / 2,
        Consistency::All => peers.len(),
    };
    let peers: Vec<_> = peers.to_vec();
    tokio::spawn(async move {
        let mut acks = Vec::with_capacity(peers.len());
        for (peer, tx) in &peers {
            let (ack_tx, ack_rx) = oneshot::channel();
            let gossip = Gossip { from: node, ops: ops.clone(), ack: Some(ack_tx) };
            if tx.send(gossip).await.is_err() {
                warn!(node, peer, "gossip peer unreachable");
                continue;
            }
            acks.push(ack_rx);
        }
        let mut confirmed = 0usize;
        for ack in acks {
            if confirmed >= needed_acks {
                break;
            }
            if ack.await.is_ok() {
                confirmed += 1;
            }
        }
        if confirmed < needed_acks {
            warn!(node, confirmed, needed_acks, "write under-replicated");
        }
        let _ = reply.send(result);
    });
}

impl<K, V> StoreHandle<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Node id of the replica this handle talks to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Derived handle with a different write consistency.
    pub fn with_write_consistency(&self, write: Consistency) -> Self {
        let mut h = self.clone();
        h.write = write;
        h
    }

    /// Wire `peer` as a replication target of this node (one direction).
    pub async fn add_peer(&self, peer: &StoreHandle<K, V>) -> Result<(), StoreError> {
        self.tx
            .send(Cmd::AddPeer { node: peer.node, tx: peer.gossip_tx.clone() })
            .await
            .map_err(|_| interop("store inbox closed"))
    }

    async fn ask<R>(&self, cmd: Cmd<K, V>, rx: oneshot::Receiver<R>) -> Result<R, StoreError> {
        self.tx.send(cmd).await.map_err(|_| interop("store inbox closed"))?;
        match tokio::time::timeout(self.ask_timeout, rx).await {
            Ok(Ok(r)) => Ok(r),
            Ok(Err(_)) => Err(interop("store reply dropped")),
            Err(_) => Err(interop("store ask timed out")),
        }
    }

    pub async fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::Get { key: key.clone(), reply: tx }, rx).await
    }

    /// Read with a caller-supplied fallback, distinguishing "key missing"
    /// from a value the caller would rather synthesize.
    pub async fn get_or_else(
        &self,
        key: &K,
        default: impl FnOnce() -> V,
    ) -> Result<V, StoreError> {
        Ok(self.get(key).await?.unwrap_or_else(default))
    }

    pub async fn contains(&self, key: &K) -> Result<bool, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::Contains { key: key.clone(), reply: tx }, rx).await
    }

    pub async fn list_keys(&self) -> Result<HashSet<K>, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::ListKeys { reply: tx }, rx).await
    }

    pub async fn list_all(&self) -> Result<HashMap<K, V>, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::ListAll { reply: tx }, rx).await
    }

    pub async fn size(&self) -> Result<usize, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::Size { reply: tx }, rx).await
    }

    pub async fn put(&self, key: K, value: V) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::Put { key, value, write: self.write, reply: tx }, rx).await
    }

    pub async fn put_all(&self, entries: Vec<(K, V)>) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::PutAll { entries, write: self.write, reply: tx }, rx).await
    }

    pub async fn remove(&self, key: &K) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::Remove { key: key.clone(), write: self.write, reply: tx }, rx).await
    }

    pub async fn remove_all(&self, keys: Vec<K>) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::RemoveAll { keys, write: self.write, reply: tx }, rx).await
    }

    /// Remove every entry whose key satisfies `pred`; returns how many went.
    pub async fn remove_by_key_selector(
        &self,
        pred: impl Fn(&K) -> bool + Send + 'static,
    ) -> Result<usize, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(
            Cmd::RemoveBySelectKey { pred: Box::new(pred), write: self.write, reply: tx },
            rx,
        )
        .await
    }

    /// Apply `f` to the current value; no-op when the key is absent.
    pub async fn update(
        &self,
        key: K,
        f: impl FnOnce(V) -> V + Send + 'static,
    ) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::Update { key, f: Box::new(f), write: self.write, reply: tx }, rx).await
    }

    /// Insert `put` when absent, otherwise apply `f` to the current value.
    pub async fn upsert(
        &self,
        key: K,
        put: V,
        f: impl FnOnce(V) -> V + Send + 'static,
    ) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.ask(Cmd::Upsert { key, put, f: Box::new(f), write: self.write, reply: tx }, rx).await
    }
}
