#![forbid(unsafe_code)]

use finback_core::Fcid;
use finback_shard::{ShardProxy, ShardRing};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug)]
enum Msg {
    Ping(tokio::sync::oneshot::Sender<String>),
    Stop,
}

/// Toy entity: replies its key to pings, terminates on stop.
fn entity_factory(
    spawn_count: Arc<AtomicUsize>,
) -> impl Fn(Fcid) -> (mpsc::Sender<Msg>, tokio::task::JoinHandle<()>) + Send + Sync + 'static {
    move |fcid: Fcid| {
        spawn_count.fetch_add(1, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::channel::<Msg>(8);
        let handle = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    Msg::Ping(reply) => {
                        let _ = reply.send(fcid.marshall());
                    }
                    Msg::Stop => break,
                }
            }
        });
        (tx, handle)
    }
}

#[tokio::test]
async fn spawns_on_demand_and_reuses_entities() {
    let spawns = Arc::new(AtomicUsize::new(0));
    let proxy = ShardProxy::new(1, ShardRing::solo(1), entity_factory(spawns.clone()));
    let fcid = Fcid::new("c1", "ns1");

    for _ in 0..3 {
        let (tx, rx) = tokio::sync::oneshot::channel();
        proxy.tell(&fcid, Msg::Ping(tx)).await.unwrap();
        assert_eq!(rx.await.unwrap(), "jmMt@c1@ns1");
    }
    assert_eq!(spawns.load(Ordering::SeqCst), 1);
    assert_eq!(proxy.live_entities().await, 1);

    // A different key gets its own entity.
    let other = Fcid::new("c2", "ns1");
    let (tx, rx) = tokio::sync::oneshot::channel();
    proxy.tell(&other, Msg::Ping(tx)).await.unwrap();
    assert_eq!(rx.await.unwrap(), "jmMt@c2@ns1");
    assert_eq!(spawns.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stop_releases_the_slot_and_next_tell_respawns() {
    let spawns = Arc::new(AtomicUsize::new(0));
    let proxy = ShardProxy::new(1, ShardRing::solo(1), entity_factory(spawns.clone()));
    let fcid = Fcid::new("c1", "ns1");

    let (tx, rx) = tokio::sync::oneshot::channel();
    proxy.tell(&fcid, Msg::Ping(tx)).await.unwrap();
    rx.await.unwrap();
    proxy.tell(&fcid, Msg::Stop).await.unwrap();

    // Reaper runs after the entity task finishes.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(proxy.live_entities().await, 0);

    let (tx, rx) = tokio::sync::oneshot::channel();
    proxy.tell(&fcid, Msg::Ping(tx)).await.unwrap();
    rx.await.unwrap();
    assert_eq!(spawns.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn routes_to_owning_peer_node() {
    // Two-node cluster: every key is owned by exactly one of them; a message
    // told on the other node must arrive via forwarding.
    let ring = ShardRing::new(&[
        finback_shard::NodeInfo::operator(1),
        finback_shard::NodeInfo::operator(2),
    ]);
    let s1 = Arc::new(AtomicUsize::new(0));
    let s2 = Arc::new(AtomicUsize::new(0));
    let p1: ShardProxy<Fcid, Msg> = ShardProxy::new(1, ring.clone(), entity_factory(s1.clone()));
    let p2: ShardProxy<Fcid, Msg> = ShardProxy::new(2, ring.clone(), entity_factory(s2.clone()));
    p1.add_peer(2, p2.open_inbox(16)).await;
    p2.add_peer(1, p1.open_inbox(16)).await;

    for i in 0..8 {
        let fcid = Fcid::new(format!("c{}", i), "ns1");
        let owner = ring.owner(&fcid.marshall()).unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        // Always tell through node 1; off-owner keys must forward to node 2.
        p1.tell(&fcid, Msg::Ping(tx)).await.unwrap();
        assert_eq!(rx.await.unwrap(), fcid.marshall());
        tokio::time::sleep(Duration::from_millis(10)).await;
        let hosted_on_1 = p1.live_entities().await;
        let hosted_on_2 = p2.live_entities().await;
        assert_eq!(hosted_on_1 + hosted_on_2, (i + 1) as usize);
        if owner == 2 {
            assert!(hosted_on_2 >= 1);
        }
    }
    // Entities only ever spawned on their owner.
    assert_eq!(
        s1.load(Ordering::SeqCst) + s2.load(Ordering::SeqCst),
        8
    );
}
