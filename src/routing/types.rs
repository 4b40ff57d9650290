use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type TableName = String;

/// One partition of one table. Used as a map key throughout the executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Shard {
    pub table: TableName,
    pub shard: String,
}

impl Shard {
    pub fn new(table: impl Into<String>, shard: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            shard: shard.into(),
        }
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.shard)
    }
}

/// A cluster node. The canonical identity is the `host:port` string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Server(pub String);

impl Server {
    pub fn new(host: &str, port: u16) -> Self {
        Self(format!("{}:{}", host, port))
    }

    pub fn host(&self) -> &str {
        self.0.rsplit_once(':').map(|(host, _)| host).unwrap_or(&self.0)
    }

    pub fn port(&self) -> Option<u16> {
        self.0
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Server {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(format!("Invalid server address [{}], expected host:port", s)),
        }
    }
}

impl From<std::net::SocketAddr> for Server {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self(addr.to_string())
    }
}
