use crate::output;
use serde::Serialize;
use std::io::Write;
use tom_protocol::{DeliveredMessage, NodeId, ProtocolStats, StateSnapshot, TransportStats};

/// Emit a JSONL event to stdout (flushed immediately for piped output).
/// If --output-dir was provided, also writes to the JSONL file.
pub fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{json}");
        let _ = lock.flush();

        output::write_jsonl_line(&json);
    }
}

/// Local wall-clock timestamp for JSONL events.
pub fn now_iso() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Process ids are 1-based outside the protocol.
pub fn pid_of(id: NodeId) -> u32 {
    id.get() + 1
}

// ── Session events ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventStarted {
    pub event: &'static str,
    pub pid: u32,
    pub listen: String,
    pub group_size: usize,
    pub words: usize,
    pub traffic: bool,
    pub timestamp: String,
}

// ── Ordering events ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventSend {
    pub event: &'static str,
    pub msg_id: String,
    pub lamport_ts: u64,
    pub word: String,
    pub elapsed_s: f64,
}

#[derive(Serialize)]
pub struct EventDeliver {
    pub event: &'static str,
    pub seq: u64,
    pub msg_id: String,
    pub origin_pid: u32,
    pub lamport_ts: u64,
    pub word: String,
    pub elapsed_s: f64,
}

impl EventDeliver {
    pub fn new(seq: u64, msg: &DeliveredMessage, elapsed_s: f64) -> Self {
        Self {
            event: "deliver",
            seq,
            msg_id: msg.msg_id.to_string(),
            origin_pid: pid_of(msg.origin),
            lamport_ts: msg.lamport_ts,
            word: msg.word.clone(),
            elapsed_s,
        }
    }
}

#[derive(Serialize)]
pub struct EventWarning {
    pub event: &'static str,
    pub kind: &'static str,
    pub detail: String,
    pub elapsed_s: f64,
}

// ── Summary ─────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventSummary<'a> {
    pub event: &'static str,
    pub pid: u32,
    pub elapsed_s: f64,
    pub snapshot: Option<StateSnapshot>,
    pub protocol: &'a ProtocolStats,
    pub transport: Option<&'a TransportStats>,
    pub timestamp: String,
}
