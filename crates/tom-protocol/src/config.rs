//! Peer table and dictionary loading.
//!
//! Both are read once at startup and are read-only afterwards. Any problem
//! here is a configuration error: the process refuses to start.
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tom_transport::PeerAddr;

use crate::error::TomProtocolError;
use crate::types::NodeId;

/// Group membership: process id → listening address.
///
/// Ids are always exactly `0..len()`, so they index the `lastSeen` vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerTable {
    peers: Vec<PeerAddr>,
}

impl PeerTable {
    /// Build a table from addresses listed in id order.
    pub fn new(peers: Vec<PeerAddr>) -> Result<Self, TomProtocolError> {
        if peers.is_empty() {
            return Err(TomProtocolError::Config("peer table is empty".into()));
        }
        if u32::try_from(peers.len()).is_err() {
            return Err(TomProtocolError::Config("peer table too large".into()));
        }
        Ok(Self { peers })
    }

    /// Read a peer table file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TomProtocolError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TomProtocolError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse `<pid> <host> <port>` lines. Pids are 1-based in the file.
    ///
    /// Blank lines and `#` comments are ignored, lines with fewer than
    /// three fields are skipped.
    pub fn parse(text: &str) -> Result<Self, TomProtocolError> {
        let mut by_pid: BTreeMap<u32, PeerAddr> = BTreeMap::new();

        for (lineno, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l.trim())) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                tracing::debug!(line = lineno, "peer table: skipping short line");
                continue;
            }
            let pid: u32 = fields[0].parse().map_err(|_| {
                TomProtocolError::Config(format!("line {lineno}: bad pid {:?}", fields[0]))
            })?;
            if pid == 0 {
                return Err(TomProtocolError::Config(format!(
                    "line {lineno}: pids start at 1"
                )));
            }
            let port: u16 = fields[2].parse().map_err(|_| {
                TomProtocolError::Config(format!("line {lineno}: bad port {:?}", fields[2]))
            })?;
            if by_pid.insert(pid, PeerAddr::new(fields[1], port)).is_some() {
                return Err(TomProtocolError::Config(format!(
                    "line {lineno}: duplicate pid {pid}"
                )));
            }
        }

        for (expected, &pid) in (1u32..).zip(by_pid.keys()) {
            if pid != expected {
                return Err(TomProtocolError::Config(format!(
                    "pids must be contiguous from 1, missing {expected}"
                )));
            }
        }

        Self::new(by_pid.into_values().collect())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.peers.len()
    }

    pub fn addr_of(&self, id: NodeId) -> Option<&PeerAddr> {
        self.peers.get(id.index())
    }

    /// All member ids in order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.peers.len() as u32).map(NodeId::new)
    }

    pub fn entries(&self) -> impl Iterator<Item = (NodeId, &PeerAddr)> + '_ {
        self.ids().zip(self.peers.iter())
    }

    /// Address map in the shape the transport expects.
    pub fn to_transport_map(&self) -> HashMap<NodeId, PeerAddr> {
        self.entries().map(|(id, addr)| (id, addr.clone())).collect()
    }
}

/// Word list the traffic source picks payloads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    words: Vec<String>,
}

impl Dictionary {
    pub fn new(words: Vec<String>) -> Result<Self, TomProtocolError> {
        if words.is_empty() {
            return Err(TomProtocolError::Config("dictionary has no usable words".into()));
        }
        Ok(Self { words })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TomProtocolError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TomProtocolError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// One word per line. Characters other than letters (ASCII and
    /// Latin-1 `À`..`ÿ`) and `-` are stripped; leftovers under two
    /// characters are skipped.
    pub fn parse(text: &str) -> Result<Self, TomProtocolError> {
        let words = text
            .lines()
            .map(|line| line.trim().chars().filter(|&c| is_word_char(c)).collect::<String>())
            .filter(|word| word.chars().count() >= 2)
            .collect();
        Self::new(words)
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn into_words(self) -> Vec<String> {
        self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '-' || ('\u{C0}'..='\u{FF}').contains(&c)
}
