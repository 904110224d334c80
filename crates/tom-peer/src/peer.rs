use crate::common::{elapsed_s, setup_ctrlc};
use crate::events::{emit, now_iso, pid_of, EventDeliver, EventSend, EventStarted, EventSummary, EventWarning};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tom_protocol::{ProtocolEvent, ProtocolRuntime, RuntimeConfig};

pub struct PeerOptions {
    pub config: RuntimeConfig,
    pub duration: Option<Duration>,
}

/// Run one group member until Ctrl+C or the optional duration elapses.
pub async fn run(opts: PeerOptions, start: Instant) -> anyhow::Result<()> {
    let pid = pid_of(opts.config.local_id);
    let group_size = opts.config.peers.len();
    let words = opts.config.words.len();
    let traffic = opts.config.traffic.is_some();

    let mut runtime = ProtocolRuntime::new(opts.config)?;
    let mut channels = runtime.start().await?;
    let listen = runtime
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_default();

    emit(&EventStarted {
        event: "started",
        pid,
        listen: listen.clone(),
        group_size,
        words,
        traffic,
        timestamp: now_iso(),
    });
    eprintln!("Peer {pid} of {group_size} listening on {listen}");
    eprintln!("Press Ctrl+C to stop.\n");

    let running = setup_ctrlc();
    let deadline = opts.duration.map(|d| start + d);

    let mut delivered: u64 = 0;
    while running.load(Ordering::Relaxed) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        // Short timeout so the running flag and deadline are re-checked.
        let tick = tokio::time::sleep(Duration::from_millis(500));
        tokio::select! {
            msg = channels.delivered.recv() => {
                let Some(msg) = msg else { break };
                delivered += 1;
                emit(&EventDeliver::new(delivered, &msg, elapsed_s(start)));
            }
            event = channels.events.recv() => match event {
                Some(ProtocolEvent::DataOriginated { msg_id, lamport_ts, word }) => {
                    emit(&EventSend {
                        event: "send",
                        msg_id: msg_id.to_string(),
                        lamport_ts,
                        word,
                        elapsed_s: elapsed_s(start),
                    });
                }
                Some(ProtocolEvent::MalformedEvent { reason }) => {
                    emit(&EventWarning {
                        event: "warning",
                        kind: "malformed",
                        detail: reason,
                        elapsed_s: elapsed_s(start),
                    });
                }
                Some(ProtocolEvent::Error { description }) => {
                    emit(&EventWarning {
                        event: "warning",
                        kind: "error",
                        detail: description,
                        elapsed_s: elapsed_s(start),
                    });
                }
                None => break,
            },
            _ = tick => {}
        }
    }

    let snapshot = channels.handle.snapshot().await.ok();
    let pending = snapshot.as_ref().map_or(0, |s| s.holdback_len);
    let stats = channels.handle.stats();
    let transport = runtime.transport_stats();
    runtime.stop().await?;

    emit(&EventSummary {
        event: "summary",
        pid,
        elapsed_s: elapsed_s(start),
        snapshot,
        protocol: &stats,
        transport: transport.as_deref(),
        timestamp: now_iso(),
    });
    eprintln!(
        "\nPeer {pid}: originated {}, delivered {delivered}, pending {pending}.",
        stats.originated.get()
    );
    Ok(())
}
