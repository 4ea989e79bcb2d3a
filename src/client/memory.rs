//! In-memory store double for engine tests
//!
//! Nodes are keyed by address and shared behind one lock, so a test keeps a
//! [`MemoryCluster`] handle to seed keys and inspect recorded calls while the
//! engines drive [`MemoryStore`] handles from their own threads.
//!
//! SCAN cursors resume after the last key returned rather than at an offset,
//! so deleting already-visited keys mid-scan does not skip anything (the same
//! guarantee the real store gives for keys present for the whole scan).

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use super::store::{Connector, KeyStore, KeyType, ScanPage, ScoredMember};
use crate::utils::{ConnectionError, ProtocolError, Result};

#[derive(Debug, Clone)]
pub enum MemoryValue {
    String(String),
    List(Vec<String>),
    Set(Vec<String>),
    SortedSet(Vec<(String, f64)>),
    Hash(Vec<(String, String)>),
    Stream,
    /// A module type the tool does not know about
    Other(&'static str),
}

impl MemoryValue {
    fn key_type(&self) -> KeyType {
        match self {
            MemoryValue::String(_) => KeyType::String,
            MemoryValue::List(_) => KeyType::List,
            MemoryValue::Set(_) => KeyType::Set,
            MemoryValue::SortedSet(_) => KeyType::SortedSet,
            MemoryValue::Hash(_) => KeyType::Hash,
            MemoryValue::Stream => KeyType::Stream,
            MemoryValue::Other(name) => KeyType::from_reply(name),
        }
    }
}

#[derive(Default)]
struct Node {
    keys: BTreeMap<Bytes, MemoryValue>,
    /// Open SCAN cursors: resume after the stored key (None = from the start)
    cursors: HashMap<u64, Option<Bytes>>,
    next_cursor: u64,
    cluster_enabled: bool,
    cluster_nodes: String,
    empty_pages: usize,
    scan_calls: usize,
    fail_scan_at: Option<usize>,
    fail_types: bool,
    fail_delete: bool,
    unreachable: bool,
    delete_calls: Vec<Vec<Bytes>>,
}

impl Node {
    fn open_cursor(&mut self, resume_after: Option<Bytes>) -> u64 {
        self.next_cursor += 1;
        self.cursors.insert(self.next_cursor, resume_after);
        self.next_cursor
    }
}

/// Shared state for a set of in-memory nodes
#[derive(Clone, Default)]
pub struct MemoryCluster {
    nodes: Arc<Mutex<BTreeMap<String, Node>>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A standalone node holding no keys
    pub fn single(address: &str) -> Self {
        let cluster = Self::new();
        cluster.add_node(address);
        cluster
    }

    /// Cluster-enabled primaries splitting the slot space evenly.
    /// Every node answers CLUSTER NODES with the same view.
    pub fn sharded(addresses: &[&str]) -> Self {
        let cluster = Self::new();
        let per_shard = 16384 / addresses.len();
        let mut lines = String::new();
        for (idx, address) in addresses.iter().enumerate() {
            let start = idx * per_shard;
            let end = if idx + 1 == addresses.len() {
                16383
            } else {
                start + per_shard - 1
            };
            lines.push_str(&format!(
                "{:040x} {}@0 master - 0 0 {} connected {}-{}\n",
                idx + 1,
                address,
                idx + 1,
                start,
                end
            ));
        }

        for address in addresses {
            cluster.add_node(address);
            cluster.with_node(address, |node| {
                node.cluster_enabled = true;
                node.cluster_nodes = lines.clone();
            });
        }
        cluster
    }

    pub fn add_node(&self, address: &str) {
        self.nodes.lock().entry(address.to_string()).or_default();
    }

    fn with_node<T>(&self, address: &str, f: impl FnOnce(&mut Node) -> T) -> T {
        let mut nodes = self.nodes.lock();
        let node = nodes.entry(address.to_string()).or_default();
        f(node)
    }

    /// Insert a key; any byte string is a valid name
    pub fn insert(&self, address: &str, key: impl AsRef<[u8]>, value: MemoryValue) {
        let key = Bytes::copy_from_slice(key.as_ref());
        self.with_node(address, |node| {
            node.keys.insert(key, value);
        });
    }

    /// Insert `count` string keys named `<prefix><n>`
    pub fn insert_strings(&self, address: &str, prefix: &str, count: usize) {
        self.with_node(address, |node| {
            for n in 0..count {
                node.keys.insert(
                    Bytes::from(format!("{}{}", prefix, n)),
                    MemoryValue::String(n.to_string()),
                );
            }
        });
    }

    /// Answer the next `pages` SCAN calls with an empty page and a live cursor
    pub fn inject_empty_pages(&self, address: &str, pages: usize) {
        self.with_node(address, |node| node.empty_pages = pages);
    }

    /// Fail the `call`-th SCAN (1-based) on this node
    pub fn fail_scan_at(&self, address: &str, call: usize) {
        self.with_node(address, |node| node.fail_scan_at = Some(call));
    }

    pub fn fail_types(&self, address: &str) {
        self.with_node(address, |node| node.fail_types = true);
    }

    pub fn fail_delete(&self, address: &str) {
        self.with_node(address, |node| node.fail_delete = true);
    }

    pub fn set_unreachable(&self, address: &str) {
        self.with_node(address, |node| node.unreachable = true);
    }

    pub fn delete_calls(&self, address: &str) -> Vec<Vec<Bytes>> {
        self.with_node(address, |node| node.delete_calls.clone())
    }

    pub fn scan_calls(&self, address: &str) -> usize {
        self.with_node(address, |node| node.scan_calls)
    }

    pub fn keys(&self, address: &str) -> Vec<Bytes> {
        self.with_node(address, |node| node.keys.keys().cloned().collect())
    }
}

impl Connector for MemoryCluster {
    fn connect(&self, address: &str) -> Result<Box<dyn KeyStore>> {
        let reachable = self
            .nodes
            .lock()
            .get(address)
            .map_or(false, |node| !node.unreachable);
        if !reachable {
            return Err(ConnectionError::ConnectFailed {
                address: address.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            }
            .into());
        }

        Ok(Box::new(MemoryStore {
            address: address.to_string(),
            cluster: self.clone(),
        }))
    }
}

/// Handle to one in-memory node
pub struct MemoryStore {
    address: String,
    cluster: MemoryCluster,
}

fn server_error(message: &str) -> crate::utils::ToolError {
    ProtocolError::ServerError(message.to_string()).into()
}

fn wrong_type() -> crate::utils::ToolError {
    server_error("WRONGTYPE Operation against a key holding the wrong kind of value")
}

impl KeyStore for MemoryStore {
    fn address(&self) -> &str {
        &self.address
    }

    fn info(&mut self, section: &str) -> Result<String> {
        self.cluster.with_node(&self.address, |node| -> Result<String> {
            if section == "cluster" {
                Ok(format!(
                    "# Cluster\r\ncluster_enabled:{}\r\n",
                    u8::from(node.cluster_enabled)
                ))
            } else {
                Ok("# Server\r\nredis_version:7.2.4\r\n".to_string())
            }
        })
    }

    fn cluster_nodes(&mut self) -> Result<String> {
        self.cluster.with_node(&self.address, |node| {
            if node.cluster_enabled {
                Ok(node.cluster_nodes.clone())
            } else {
                Err(server_error("ERR This instance has cluster support disabled"))
            }
        })
    }

    fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        self.cluster.with_node(&self.address, |node| -> Result<ScanPage> {
            node.scan_calls += 1;
            if node.fail_scan_at == Some(node.scan_calls) {
                return Err(server_error("LOADING injected scan failure"));
            }

            let resume_after = if cursor == 0 {
                None
            } else {
                node.cursors
                    .remove(&cursor)
                    .ok_or_else(|| server_error("ERR invalid cursor"))?
            };

            if node.empty_pages > 0 {
                node.empty_pages -= 1;
                let next = node.open_cursor(resume_after);
                return Ok(ScanPage {
                    cursor: next,
                    items: Vec::new(),
                });
            }

            let lower = match resume_after {
                Some(last) => Bound::Excluded(last),
                None => Bound::Unbounded,
            };
            let mut window: Vec<Bytes> = node
                .keys
                .range::<Bytes, _>((lower, Bound::Unbounded))
                .map(|(key, _)| key.clone())
                .take(count.max(1) + 1)
                .collect();

            let next = if window.len() > count.max(1) {
                window.truncate(count.max(1));
                let last = window.last().cloned();
                node.open_cursor(last)
            } else {
                0
            };

            Ok(ScanPage {
                cursor: next,
                items: window
                    .into_iter()
                    .filter(|key| glob_match(pattern, key))
                    .collect(),
            })
        })
    }

    fn key_types(&mut self, keys: &[Bytes]) -> Result<Vec<KeyType>> {
        self.cluster.with_node(&self.address, |node| -> Result<Vec<KeyType>> {
            if node.fail_types {
                return Err(server_error("ERR injected TYPE failure"));
            }
            Ok(keys
                .iter()
                .map(|key| {
                    node.keys
                        .get(key)
                        .map_or(KeyType::Unknown, MemoryValue::key_type)
                })
                .collect())
        })
    }

    fn mget(&mut self, keys: &[Bytes]) -> Result<Vec<Option<String>>> {
        self.cluster.with_node(&self.address, |node| {
            Ok(keys
                .iter()
                .map(|key| match node.keys.get(key) {
                    Some(MemoryValue::String(value)) => Some(value.clone()),
                    _ => None,
                })
                .collect())
        })
    }

    fn list_range(&mut self, key: &[u8]) -> Result<Vec<String>> {
        self.cluster.with_node(&self.address, |node| match node.keys.get(key) {
            Some(MemoryValue::List(items)) => Ok(items.clone()),
            None => Ok(Vec::new()),
            Some(_) => Err(wrong_type()),
        })
    }

    fn set_scan(&mut self, key: &[u8], cursor: u64, count: usize) -> Result<ScanPage> {
        self.cluster.with_node(&self.address, |node| match node.keys.get(key) {
            Some(MemoryValue::Set(members)) => {
                let start = (cursor as usize).min(members.len());
                let end = (start + count.max(1)).min(members.len());
                Ok(ScanPage {
                    cursor: if end >= members.len() { 0 } else { end as u64 },
                    items: members[start..end]
                        .iter()
                        .map(|member| Bytes::from(member.clone()))
                        .collect(),
                })
            }
            None => Ok(ScanPage::default()),
            Some(_) => Err(wrong_type()),
        })
    }

    fn sorted_set_range(&mut self, key: &[u8]) -> Result<Vec<ScoredMember>> {
        self.cluster.with_node(&self.address, |node| match node.keys.get(key) {
            Some(MemoryValue::SortedSet(members)) => {
                let mut members: Vec<ScoredMember> = members
                    .iter()
                    .map(|(value, score)| ScoredMember {
                        score: *score,
                        value: value.clone(),
                    })
                    .collect();
                members.sort_by(|a, b| {
                    a.score
                        .total_cmp(&b.score)
                        .then_with(|| a.value.cmp(&b.value))
                });
                Ok(members)
            }
            None => Ok(Vec::new()),
            Some(_) => Err(wrong_type()),
        })
    }

    fn hash_get_all(&mut self, key: &[u8]) -> Result<Vec<(String, String)>> {
        self.cluster.with_node(&self.address, |node| match node.keys.get(key) {
            Some(MemoryValue::Hash(pairs)) => Ok(pairs.clone()),
            None => Ok(Vec::new()),
            Some(_) => Err(wrong_type()),
        })
    }

    fn delete(&mut self, keys: &[Bytes]) -> Result<u64> {
        self.cluster.with_node(&self.address, |node| {
            if node.fail_delete {
                return Err(server_error("READONLY You can't write against a read only replica."));
            }
            node.delete_calls.push(keys.to_vec());
            Ok(keys
                .iter()
                .filter(|key| node.keys.remove(*key).is_some())
                .count() as u64)
        })
    }
}

/// SCAN MATCH subset: `*`, `?` and backslash escapes, over raw key bytes
pub fn glob_match(pattern: &str, text: &[u8]) -> bool {
    fn matches(p: &[u8], t: &[u8]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some((b'*', rest)) => (0..=t.len()).any(|skip| matches(rest, &t[skip..])),
            Some((b'?', rest)) => !t.is_empty() && matches(rest, &t[1..]),
            Some((b'\\', rest)) if !rest.is_empty() => {
                t.first() == Some(&rest[0]) && matches(&rest[1..], &t[1..])
            }
            Some((c, rest)) => t.first() == Some(c) && matches(rest, &t[1..]),
        }
    }
    matches(pattern.as_bytes(), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", b"anything"));
        assert!(glob_match("user:*", b"user:42"));
        assert!(!glob_match("user:*", b"session:42"));
        assert!(glob_match("h?llo", b"hello"));
        assert!(glob_match("a\\*b", b"a*b"));
        assert!(!glob_match("a\\*b", b"axb"));
        assert!(glob_match("tmp:?\x01", b"tmp:\xff\x01"));
    }

    #[test]
    fn test_scan_survives_deletion_of_visited_keys() {
        let cluster = MemoryCluster::single("n1:6379");
        cluster.insert_strings("n1:6379", "k", 10);
        let mut store = cluster.connect("n1:6379").unwrap();

        let mut seen = Vec::new();
        let mut cursor = 0;
        loop {
            let page = store.scan(cursor, "*", 3).unwrap();
            store.delete(&page.items).unwrap();
            seen.extend(page.items);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(seen.len(), 10);
        assert!(cluster.keys("n1:6379").is_empty());
    }

    #[test]
    fn test_unknown_node_refused() {
        let cluster = MemoryCluster::single("n1:6379");
        assert!(cluster.connect("n2:6379").is_err());
        cluster.set_unreachable("n1:6379");
        assert!(cluster.connect("n1:6379").is_err());
    }
}
