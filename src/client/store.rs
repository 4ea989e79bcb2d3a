//! Store primitives used by the scan and dump engines
//!
//! [`KeyStore`] is the per-node command surface: cursor scans, type lookup,
//! bulk value retrieval and multi-key delete. [`Connector`] opens one to a
//! node address. Reply parsing is kept in free functions so it can be tested
//! without a server.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use super::control_plane::{ControlPlane, ControlPlaneExt};
use super::raw_connection::{ConnectionFactory, RawConnection};
use crate::utils::{ConnectionError, ProtocolError, RespEncoder, RespValue, Result};

/// Page size used for SSCAN while dumping set members
pub const SET_SCAN_COUNT: usize = 1000;

type ParseResult<T> = std::result::Result<T, ProtocolError>;

/// One step of a cursor-driven scan.
/// Items are kept as raw bytes: key names need not be UTF-8.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    /// Next cursor; 0 means the scan is complete
    pub cursor: u64,
    pub items: Vec<Bytes>,
}

/// Value type as reported by TYPE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    String,
    List,
    Set,
    #[serde(rename = "zset")]
    SortedSet,
    Hash,
    Stream,
    /// Anything else, including `none` for a key that vanished
    Unknown,
}

impl KeyType {
    pub fn from_reply(name: &str) -> Self {
        match name {
            "string" => KeyType::String,
            "list" => KeyType::List,
            "set" => KeyType::Set,
            "zset" => KeyType::SortedSet,
            "hash" => KeyType::Hash,
            "stream" => KeyType::Stream,
            _ => KeyType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::SortedSet => "zset",
            KeyType::Hash => "hash",
            KeyType::Stream => "stream",
            KeyType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sorted set member with its score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMember {
    pub score: f64,
    pub value: String,
}

/// Per-node store primitives
pub trait KeyStore: Send {
    /// `host:port` of the node behind this handle
    fn address(&self) -> &str;

    /// `INFO <section>` text
    fn info(&mut self, section: &str) -> Result<String>;

    /// `CLUSTER NODES` text
    fn cluster_nodes(&mut self) -> Result<String>;

    /// `SCAN cursor MATCH pattern COUNT count`
    fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage>;

    /// `TYPE` of every key, in order
    fn key_types(&mut self, keys: &[Bytes]) -> Result<Vec<KeyType>>;

    /// `MGET`; `None` for keys that no longer hold a string
    fn mget(&mut self, keys: &[Bytes]) -> Result<Vec<Option<String>>>;

    /// `LRANGE key 0 -1`
    fn list_range(&mut self, key: &[u8]) -> Result<Vec<String>>;

    /// `SSCAN key cursor COUNT count`
    fn set_scan(&mut self, key: &[u8], cursor: u64, count: usize) -> Result<ScanPage>;

    /// `ZRANGE key 0 -1 WITHSCORES`
    fn sorted_set_range(&mut self, key: &[u8]) -> Result<Vec<ScoredMember>>;

    /// `HGETALL key` as field/value pairs
    fn hash_get_all(&mut self, key: &[u8]) -> Result<Vec<(String, String)>>;

    /// `DEL keys...`; number of keys actually removed
    fn delete(&mut self, keys: &[Bytes]) -> Result<u64>;
}

/// Opens store handles to node addresses
pub trait Connector: Send + Sync {
    fn connect(&self, address: &str) -> Result<Box<dyn KeyStore>>;
}

impl Connector for ConnectionFactory {
    fn connect(&self, address: &str) -> Result<Box<dyn KeyStore>> {
        Ok(Box::new(self.create(address)?))
    }
}

impl RawConnection {
    fn command(&mut self, name: &str, encoder: &RespEncoder) -> Result<RespValue> {
        let reply = self
            .execute_encoded(encoder)
            .map_err(|source| self.lost(source))?;
        Ok(reply.into_result().map_err(|e| with_command(name, e))?)
    }

    fn lost(&self, source: std::io::Error) -> ConnectionError {
        ConnectionError::Lost {
            address: self.address().to_string(),
            source,
        }
    }
}

fn with_command(name: &str, err: ProtocolError) -> ProtocolError {
    match err {
        ProtocolError::ServerError(msg) => ProtocolError::ServerError(format!("{}: {}", name, msg)),
        other => other,
    }
}

impl KeyStore for RawConnection {
    fn address(&self) -> &str {
        RawConnection::address(self)
    }

    fn info(&mut self, section: &str) -> Result<String> {
        ControlPlaneExt::info(self, section).map_err(|source| self.lost(source).into())
    }

    fn cluster_nodes(&mut self) -> Result<String> {
        let mut encoder = RespEncoder::with_capacity(32);
        encoder.encode_command_str(&["CLUSTER", "NODES"]);
        let reply = self.command("CLUSTER NODES", &encoder)?;
        reply.into_text().ok_or_else(|| {
            ProtocolError::UnexpectedResponse {
                command: "CLUSTER NODES".to_string(),
                actual: "non-text reply".to_string(),
            }
            .into()
        })
    }

    fn scan(&mut self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        let mut encoder = RespEncoder::with_capacity(128);
        encoder.encode_command_str(&[
            "SCAN",
            &cursor.to_string(),
            "MATCH",
            pattern,
            "COUNT",
            &count.to_string(),
        ]);
        Ok(parse_scan_reply("SCAN", self.command("SCAN", &encoder)?)?)
    }

    fn key_types(&mut self, keys: &[Bytes]) -> Result<Vec<KeyType>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut encoder = RespEncoder::with_capacity(32 * keys.len());
        for key in keys {
            encoder.encode_command(&[&b"TYPE"[..], &key[..]]);
        }
        let replies = self
            .execute_pipeline(&encoder, keys.len())
            .map_err(|source| self.lost(source))?;

        replies
            .into_iter()
            .map(|reply| -> Result<KeyType> {
                let reply = reply.into_result().map_err(|e| with_command("TYPE", e))?;
                match reply.as_str() {
                    Some(name) => Ok(KeyType::from_reply(name)),
                    None => Err(unexpected("TYPE", &reply).into()),
                }
            })
            .collect()
    }

    fn mget(&mut self, keys: &[Bytes]) -> Result<Vec<Option<String>>> {
        let mut encoder = RespEncoder::with_capacity(32 * keys.len() + 16);
        encoder.encode_command_with_keys(&["MGET"], keys);
        Ok(parse_optional_strings("MGET", self.command("MGET", &encoder)?)?)
    }

    fn list_range(&mut self, key: &[u8]) -> Result<Vec<String>> {
        let mut encoder = RespEncoder::with_capacity(64);
        encoder.encode_command(&[&b"LRANGE"[..], key, &b"0"[..], &b"-1"[..]]);
        Ok(parse_strings("LRANGE", self.command("LRANGE", &encoder)?)?)
    }

    fn set_scan(&mut self, key: &[u8], cursor: u64, count: usize) -> Result<ScanPage> {
        let mut encoder = RespEncoder::with_capacity(64);
        let cursor = cursor.to_string();
        let count = count.to_string();
        encoder.encode_command(&[
            &b"SSCAN"[..],
            key,
            cursor.as_bytes(),
            &b"COUNT"[..],
            count.as_bytes(),
        ]);
        Ok(parse_scan_reply("SSCAN", self.command("SSCAN", &encoder)?)?)
    }

    fn sorted_set_range(&mut self, key: &[u8]) -> Result<Vec<ScoredMember>> {
        let mut encoder = RespEncoder::with_capacity(64);
        encoder.encode_command(&[
            &b"ZRANGE"[..],
            key,
            &b"0"[..],
            &b"-1"[..],
            &b"WITHSCORES"[..],
        ]);
        Ok(parse_scored_members(self.command("ZRANGE", &encoder)?)?)
    }

    fn hash_get_all(&mut self, key: &[u8]) -> Result<Vec<(String, String)>> {
        let mut encoder = RespEncoder::with_capacity(64);
        encoder.encode_command(&[&b"HGETALL"[..], key]);
        Ok(parse_field_pairs(self.command("HGETALL", &encoder)?)?)
    }

    fn delete(&mut self, keys: &[Bytes]) -> Result<u64> {
        let mut encoder = RespEncoder::with_capacity(32 * keys.len() + 16);
        encoder.encode_command_with_keys(&["DEL"], keys);
        let reply = self.command("DEL", &encoder)?;
        match reply.as_i64() {
            Some(n) if n >= 0 => Ok(n as u64),
            _ => Err(unexpected("DEL", &reply).into()),
        }
    }
}

fn unexpected(command: &str, reply: &RespValue) -> ProtocolError {
    ProtocolError::UnexpectedResponse {
        command: command.to_string(),
        actual: reply.describe(),
    }
}

/// Parse `[cursor, [item, ...]]` as returned by SCAN/SSCAN
pub fn parse_scan_reply(command: &str, reply: RespValue) -> ParseResult<ScanPage> {
    let described = reply.describe();
    let mut parts = match reply.into_array() {
        Some(parts) if parts.len() == 2 => parts,
        _ => {
            return Err(ProtocolError::UnexpectedResponse {
                command: command.to_string(),
                actual: described,
            })
        }
    };

    let items = parts.pop().unwrap_or(RespValue::Null);
    let cursor_value = parts.pop().unwrap_or(RespValue::Null);

    let cursor = match &cursor_value {
        RespValue::Integer(i) if *i >= 0 => *i as u64,
        other => other
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| ProtocolError::Parse(format!("{} cursor: {}", command, other.describe())))?,
    };

    Ok(ScanPage {
        cursor,
        items: parse_keys(command, items)?,
    })
}

/// Elements of an array reply; a null reply is an empty array
fn array_elements(command: &str, reply: RespValue) -> ParseResult<Vec<RespValue>> {
    let described = reply.describe();
    match reply {
        RespValue::Null => Ok(Vec::new()),
        other => other.into_array().ok_or_else(|| ProtocolError::UnexpectedResponse {
            command: command.to_string(),
            actual: described,
        }),
    }
}

/// Parse an array of key names, byte for byte
pub fn parse_keys(command: &str, reply: RespValue) -> ParseResult<Vec<Bytes>> {
    array_elements(command, reply)?
        .into_iter()
        .map(|element| {
            let described = element.describe();
            element
                .into_bytes()
                .ok_or_else(|| ProtocolError::Parse(format!("{} element: {}", command, described)))
        })
        .collect()
}

/// Parse an array of values as text
pub fn parse_strings(command: &str, reply: RespValue) -> ParseResult<Vec<String>> {
    array_elements(command, reply)?
        .into_iter()
        .map(|element| {
            let described = element.describe();
            element
                .into_text()
                .ok_or_else(|| ProtocolError::Parse(format!("{} element: {}", command, described)))
        })
        .collect()
}

/// Parse an array where null elements are allowed (MGET)
pub fn parse_optional_strings(
    command: &str,
    reply: RespValue,
) -> ParseResult<Vec<Option<String>>> {
    let described = reply.describe();
    let elements = reply
        .into_array()
        .ok_or_else(|| ProtocolError::UnexpectedResponse {
            command: command.to_string(),
            actual: described,
        })?;
    Ok(elements.into_iter().map(RespValue::into_text).collect())
}

/// Parse ZRANGE WITHSCORES: flat `[member, score, ...]` (RESP2) or
/// `[[member, score], ...]` (RESP3)
pub fn parse_scored_members(reply: RespValue) -> ParseResult<Vec<ScoredMember>> {
    let elements = array_elements("ZRANGE", reply)?;

    let nested = elements.first().map_or(false, |e| e.as_array().is_some());
    let flat: Vec<RespValue> = if nested {
        elements
            .into_iter()
            .flat_map(|pair| pair.into_array().unwrap_or_default())
            .collect()
    } else {
        elements
    };

    if flat.len() % 2 != 0 {
        return Err(ProtocolError::Parse(format!(
            "ZRANGE WITHSCORES returned odd element count {}",
            flat.len()
        )));
    }

    let mut members = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
        let value = member
            .into_text()
            .ok_or_else(|| ProtocolError::Parse("ZRANGE member is not a string".to_string()))?;
        let score = match score {
            RespValue::Double(d) => d,
            other => other
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| ProtocolError::Parse(format!("ZRANGE score: {}", other.describe())))?,
        };
        members.push(ScoredMember { score, value });
    }
    Ok(members)
}

/// Parse HGETALL: flat `[field, value, ...]`
pub fn parse_field_pairs(reply: RespValue) -> ParseResult<Vec<(String, String)>> {
    let items = parse_strings("HGETALL", reply)?;
    if items.len() % 2 != 0 {
        return Err(ProtocolError::Parse(format!(
            "HGETALL returned odd element count {}",
            items.len()
        )));
    }

    let mut pairs = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        pairs.push((field, value));
    }
    Ok(pairs)
}
