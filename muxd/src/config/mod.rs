//! Server configuration.
//!
//! Settings come from a TOML file with environment and command-line
//! overrides; `validate()` collects every problem instead of stopping at
//! the first.

pub mod loader;

pub use loader::load_config;

use crate::demux::MAX_CID_LEN;
use serde::{Deserialize, Serialize};

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub demux: DemuxConfig,
    pub http2: Http2Config,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.network.validate() {
            errors.extend(e);
        }
        if let Err(e) = self.demux.validate() {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Network binding and socket options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    /// Allow several acceptor sockets to share the port.
    pub reuse_port: bool,
    pub socket_recv_buffer_size: Option<usize>,
    pub socket_send_buffer_size: Option<usize>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4433,
            reuse_port: true,
            socket_recv_buffer_size: None,
            socket_send_buffer_size: None,
        }
    }
}

impl NetworkConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if format!("{}:{}", self.host, self.port)
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            errors.push(format!("invalid bind address: {}:{}", self.host, self.port));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Demultiplexer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Connection worker threads.
    pub workers: usize,

    /// Capacity of the connection table.
    pub connection_table_size: usize,

    /// 8-byte server identifier as 16 hex characters. Keys the stateless
    /// reset token derivation; every instance answering for the same
    /// deployment must share it.
    pub server_id: String,

    /// Length in bytes of locally-issued connection IDs. Short-header
    /// packets are parsed assuming a DCID of this length.
    pub local_cid_len: usize,

    /// Path MTU assumed for outbound datagrams.
    pub pmtu: usize,

    /// Capacity of each worker's event queue.
    pub channel_capacity: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            connection_table_size: 65536,
            server_id: "6d75786400000001".to_string(),
            local_cid_len: 20,
            pmtu: 1200,
            channel_capacity: 1024,
        }
    }
}

impl DemuxConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.workers == 0 {
            errors.push("demux.workers must be at least 1".to_string());
        }
        if self.connection_table_size == 0 {
            errors.push("demux.connection_table_size must be positive".to_string());
        }
        if parse_server_id(&self.server_id).is_none() {
            errors.push(format!(
                "demux.server_id must be 16 hex characters, got {:?}",
                self.server_id
            ));
        }
        if self.local_cid_len > MAX_CID_LEN {
            errors.push(format!(
                "demux.local_cid_len must be at most {}, got {}",
                MAX_CID_LEN, self.local_cid_len
            ));
        }
        if self.pmtu < 1200 {
            errors.push(format!(
                "demux.pmtu must be at least 1200 (RFC 9000 Section 14), got {}",
                self.pmtu
            ));
        }
        if self.channel_capacity == 0 {
            errors.push("demux.channel_capacity must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The decoded server id. Falls back to zeroes if the string is
    /// malformed; `validate()` rejects that configuration up front.
    pub fn server_id_bytes(&self) -> [u8; 8] {
        parse_server_id(&self.server_id).unwrap_or([0u8; 8])
    }
}

/// HTTP/2 layer settings consumed by the protocol handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Http2Config {
    /// HPACK dynamic table bound (SETTINGS_HEADER_TABLE_SIZE).
    pub header_table_size: usize,
}

impl Default for Http2Config {
    fn default() -> Self {
        Self {
            header_table_size: 4096,
        }
    }
}

fn parse_server_id(s: &str) -> Option<[u8; 8]> {
    if s.len() != 16 {
        return None;
    }
    let mut bytes = [0u8; 8];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(bytes)
}
