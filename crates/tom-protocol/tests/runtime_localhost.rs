//! Integration tests: full runtimes talking over localhost TCP.

use std::time::Duration;

use tom_protocol::{
    DeliveredMessage, NodeId, PeerAddr, PeerTable, ProtocolRuntime, RuntimeChannels,
    RuntimeConfig, TrafficConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();
}

/// Ports nothing listens on yet (bound once, then released).
fn free_ports(n: usize) -> Vec<u16> {
    let listeners: Vec<_> = (0..n)
        .map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();
    listeners
        .iter()
        .map(|l| l.local_addr().unwrap().port())
        .collect()
}

async fn start_group(
    n: usize,
    traffic: Option<TrafficConfig>,
) -> Vec<(ProtocolRuntime, RuntimeChannels)> {
    let table = PeerTable::new(
        free_ports(n)
            .into_iter()
            .map(|port| PeerAddr::new("127.0.0.1", port))
            .collect(),
    )
    .unwrap();

    let mut group = Vec::new();
    for id in table.ids() {
        let config = RuntimeConfig::new(id, table.clone(), vec!["alfa".into(), "bravo".into()])
            .listen_host("127.0.0.1")
            .traffic(traffic.clone());
        let mut runtime = ProtocolRuntime::new(config).unwrap();
        let channels = runtime.start().await.unwrap();
        group.push((runtime, channels));
    }
    group
}

async fn collect(channels: &mut RuntimeChannels, count: usize) -> Vec<DeliveredMessage> {
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let msg = tokio::time::timeout(Duration::from_secs(20), channels.delivered.recv())
            .await
            .expect("delivery timed out")
            .expect("runtime stopped early");
        out.push(msg);
    }
    out
}

fn keys(messages: &[DeliveredMessage]) -> Vec<(u64, NodeId, String)> {
    messages
        .iter()
        .map(|m| (m.lamport_ts, m.origin, m.msg_id.to_string()))
        .collect()
}

/// Three members, five words each: everybody delivers all fifteen in the same order.
#[tokio::test]
async fn three_members_agree_on_order() {
    init_tracing();
    let mut group = start_group(3, None).await;

    for round in 0..5 {
        for (_, channels) in &group {
            let me = channels.handle.local_id();
            channels.handle.originate(format!("{me}-{round}")).await.unwrap();
        }
    }

    let mut sequences = Vec::new();
    for (_, channels) in &mut group {
        sequences.push(collect(channels, 15).await);
    }

    let reference = keys(&sequences[0]);
    let mut sorted = reference.clone();
    sorted.sort();
    assert_eq!(reference, sorted);
    for seq in &sequences[1..] {
        assert_eq!(keys(seq), reference);
    }

    for (runtime, channels) in &mut group {
        let snapshot = channels.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.holdback_len, 0);
        assert_eq!(snapshot.last_seen.len(), 3);
        assert_eq!(channels.handle.stats().delivered.get(), 15);
        assert_eq!(channels.handle.stats().originated.get(), 5);
        runtime.stop().await.unwrap();
    }
}

/// With the Poisson source running, delivered prefixes agree across members.
#[tokio::test]
async fn traffic_source_keeps_delivery_moving() {
    init_tracing();
    let traffic = TrafficConfig {
        rate_per_sec: 20.0,
        startup_delay: Duration::from_millis(200),
    };
    let mut group = start_group(3, Some(traffic)).await;

    let mut prefixes = Vec::new();
    for (_, channels) in &mut group {
        prefixes.push(keys(&collect(channels, 10).await));
    }
    for prefix in &prefixes[1..] {
        assert_eq!(prefix, &prefixes[0]);
    }

    for (runtime, _) in &mut group {
        let sent = runtime.transport_stats().unwrap().frames_sent.get();
        assert!(sent > 0);
        runtime.stop().await.unwrap();
    }
}
