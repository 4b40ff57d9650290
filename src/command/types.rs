use crate::error::{ClusterError, ClusterResult};
use crate::routing::layout::RoutingMap;
use crate::routing::types::{Shard, TableName};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

/// The two shapes a command can take on the remote side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Runs once per shard; the remote answers with one value per shard.
    IndexRead,
    /// Runs once per server; the remote aggregates its own shards.
    ServerRead,
}

/// Serialized command parameters.
///
/// Built once per logical operation and shared by every per-server call, so
/// cloning only bumps a reference count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Arguments(Arc<serde_json::Value>);

impl Arguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self(Arc::new(value))
    }

    pub fn empty() -> Self {
        Self::new(serde_json::Value::Null)
    }

    pub fn from_serializable<T: Serialize>(value: &T) -> ClusterResult<Self> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Decodes the arguments into a handler-specific parameter type.
    pub fn decode<T: DeserializeOwned>(&self) -> ClusterResult<T> {
        Ok(T::deserialize(self.0.as_ref())?)
    }

    /// Size of the encoded form, used by the validator.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self.0.as_ref())
            .map(|bytes| bytes.len())
            .unwrap_or(usize::MAX)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Token naming a remote execution that is still running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result envelope of a completed remote execution.
///
/// The "still running" case is not a response; it is reported by the client as
/// [`crate::client::CallError::StillRunning`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    ShardValues {
        values: Vec<(Shard, serde_json::Value)>,
    },
    ServerValue {
        value: serde_json::Value,
    },
}

impl Response {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::ShardValues { .. } => CommandKind::IndexRead,
            Self::ServerValue { .. } => CommandKind::ServerRead,
        }
    }

    pub fn shard_values(values: impl IntoIterator<Item = (Shard, serde_json::Value)>) -> Self {
        Self::ShardValues {
            values: values.into_iter().collect(),
        }
    }

    pub fn server_value(value: serde_json::Value) -> Self {
        Self::ServerValue { value }
    }

    pub fn into_shard_values(self, target: &str) -> ClusterResult<HashMap<Shard, serde_json::Value>> {
        match self {
            Self::ShardValues { values } => Ok(values.into_iter().collect()),
            Self::ServerValue { .. } => Err(ClusterError::remote(
                target,
                "expected per-shard values, got a single server value",
            )),
        }
    }

    pub fn into_server_value(self, target: &str) -> ClusterResult<serde_json::Value> {
        match self {
            Self::ServerValue { value } => Ok(value),
            Self::ShardValues { .. } => Err(ClusterError::remote(
                target,
                "expected a single server value, got per-shard values",
            )),
        }
    }
}

/// A named unit of work that can be routed across the cluster.
///
/// Implementations must be plain data: the same command may be described to
/// several servers, and to the same server again on reconnect.
pub trait Command: Send + Sync {
    /// Name the remote side dispatches on.
    fn name(&self) -> &str;

    /// Serialized parameters. Called once per logical operation.
    fn arguments(&self) -> ClusterResult<Arguments>;

    /// Tables this command targets.
    fn route_tables(&self, routing: &dyn RoutingMap) -> HashSet<TableName>;

    /// Shards this command targets. An empty set means every shard of the routed tables.
    fn route_shards(&self, _routing: &dyn RoutingMap, _tables: &HashSet<TableName>) -> HashSet<Shard> {
        HashSet::new()
    }
}

/// A command producing one value per shard.
pub trait IndexRead: Command {
    type Value: DeserializeOwned + Send + 'static;
}

/// A command producing one value per server.
pub trait ServerRead: Command {
    type Value: DeserializeOwned + Send + 'static;
}

/// Routing and parameters shared by the generic command types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandParts {
    pub name: String,
    pub tables: HashSet<TableName>,
    pub shards: HashSet<Shard>,
    pub args: serde_json::Value,
}

impl CommandParts {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: HashSet::new(),
            shards: HashSet::new(),
            args: serde_json::Value::Null,
        }
    }
}

macro_rules! generic_command {
    ($name:ident, $capability:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone)]
        pub struct $name<T> {
            parts: CommandParts,
            _value: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    parts: CommandParts::new(name),
                    _value: PhantomData,
                }
            }

            pub fn table(mut self, table: impl Into<String>) -> Self {
                self.parts.tables.insert(table.into());
                self
            }

            pub fn shard(mut self, shard: Shard) -> Self {
                self.parts.tables.insert(shard.table.clone());
                self.parts.shards.insert(shard);
                self
            }

            pub fn args(mut self, args: serde_json::Value) -> Self {
                self.parts.args = args;
                self
            }

            pub fn parts(&self) -> &CommandParts {
                &self.parts
            }
        }

        impl<T> Command for $name<T> {
            fn name(&self) -> &str {
                &self.parts.name
            }

            fn arguments(&self) -> ClusterResult<Arguments> {
                Ok(Arguments::new(self.parts.args.clone()))
            }

            fn route_tables(&self, _routing: &dyn RoutingMap) -> HashSet<TableName> {
                self.parts.tables.clone()
            }

            fn route_shards(
                &self,
                _routing: &dyn RoutingMap,
                tables: &HashSet<TableName>,
            ) -> HashSet<Shard> {
                self.parts
                    .shards
                    .iter()
                    .filter(|shard| tables.contains(&shard.table))
                    .cloned()
                    .collect()
            }
        }

        impl<T: DeserializeOwned + Send + 'static> $capability for $name<T> {
            type Value = T;
        }
    };
}

generic_command!(
    ShardCommand,
    IndexRead,
    "An index read built from a name, routed tables/shards and JSON arguments."
);
generic_command!(
    ServerCommand,
    ServerRead,
    "A server read built from a name, routed tables/shards and JSON arguments."
);
