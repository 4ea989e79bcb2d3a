//! Cluster node representation

/// Cluster node information
#[derive(Debug, Clone)]
pub struct ClusterNode {
    /// Node ID from CLUSTER NODES
    pub id: String,
    /// Hostname or IP
    pub host: String,
    /// Port
    pub port: u16,
    /// Is this a primary node?
    pub is_primary: bool,
    /// Is this a replica?
    pub is_replica: bool,
    /// Primary node ID (if replica)
    pub primary_id: Option<String>,
    /// Assigned slot ranges, inclusive (for primaries)
    pub slot_ranges: Vec<(u16, u16)>,
    /// Node flags (myself, fail, handshake, ...)
    pub flags: Vec<String>,
    /// Link state is "connected"
    pub connected: bool,
}

impl ClusterNode {
    /// Check if node is available
    pub fn is_available(&self) -> bool {
        self.connected
            && !self
                .flags
                .iter()
                .any(|f| f == "fail" || f == "handshake" || f == "noaddr")
    }

    /// Get node address as string
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Number of slots owned
    pub fn slot_count(&self) -> usize {
        self.slot_ranges
            .iter()
            .map(|(start, end)| (*end as usize) - (*start as usize) + 1)
            .sum()
    }

    /// Lowest owned slot, used for stable shard ordering
    pub fn first_slot(&self) -> Option<u16> {
        self.slot_ranges.iter().map(|(start, _)| *start).min()
    }
}

/// Parse a line from CLUSTER NODES response
///
/// Format: `<id> <ip:port@cport> <flags> <master> <ping-sent> <pong-recv> <config-epoch> <link-state> <slot> <slot> ... <slot>`
pub fn parse_cluster_node_line(line: &str) -> Option<ClusterNode> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 8 {
        return None;
    }

    let (host, port) = parse_node_address(parts[1])?;

    let flags: Vec<String> = parts[2].split(',').map(String::from).collect();
    let is_primary = flags.iter().any(|f| f == "master");
    let is_replica = flags.iter().any(|f| f == "slave" || f == "replica");

    let primary_id = if is_replica && parts[3] != "-" {
        Some(parts[3].to_string())
    } else {
        None
    };

    let slot_ranges = if is_primary {
        parts[8..].iter().filter_map(|s| parse_slot_range(s)).collect()
    } else {
        Vec::new()
    };

    Some(ClusterNode {
        id: parts[0].to_string(),
        host,
        port,
        is_primary,
        is_replica,
        primary_id,
        slot_ranges,
        flags,
        connected: parts[7] == "connected",
    })
}

/// Parse node address from CLUSTER NODES
/// Formats: "host:port@cport", "host:port", "host:port@cport,hostname"
fn parse_node_address(addr: &str) -> Option<(String, u16)> {
    // ElastiCache format: ip:port@cport,hostname
    let addr = addr.split(',').next().unwrap_or(addr);
    let host_port = addr.split('@').next().unwrap_or(addr);

    let (host, port) = host_port.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    // Nodes that have not been assigned an address yet show up as ":0"
    if host.is_empty() {
        return None;
    }

    Some((host.to_string(), port))
}

/// Parse slot range: "0-5460" or "0"
fn parse_slot_range(s: &str) -> Option<(u16, u16)> {
    // Skip migrating/importing markers like "[123->-node_id]"
    if s.contains('[') {
        return None;
    }

    match s.split_once('-') {
        Some((start, end)) => Some((start.parse().ok()?, end.parse().ok()?)),
        None => {
            let slot: u16 = s.parse().ok()?;
            Some((slot, slot))
        }
    }
}
