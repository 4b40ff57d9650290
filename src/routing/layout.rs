//! Shard Layout
//!
//! The [`RoutingMap`] trait is the seam to whatever keeps track of cluster
//! membership and shard assignment. [`StaticLayout`] is the in-process
//! implementation used by the node binary (fed from configuration) and by tests.

use super::types::{Server, Shard, TableName};

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

/// Read-only mapping from servers to the shards they currently serve.
pub trait RoutingMap: Send + Sync {
    /// Every live server in the cluster.
    fn servers_for_cluster(&self) -> HashSet<Server>;

    /// The shards a server currently serves. Unknown servers serve nothing.
    fn server_layout(&self, server: &Server) -> HashSet<Shard>;

    /// All tables known to the layout.
    fn tables(&self) -> HashSet<TableName> {
        self.servers_for_cluster()
            .iter()
            .flat_map(|server| self.server_layout(server))
            .map(|shard| shard.table)
            .collect()
    }

    /// All shards of one table, across every server.
    fn table_shards(&self, table: &str) -> HashSet<Shard> {
        self.servers_for_cluster()
            .iter()
            .flat_map(|server| self.server_layout(server))
            .filter(|shard| shard.table == table)
            .collect()
    }

    /// True when the server hosts at least one shard selected by `(tables, shards)`.
    fn is_valid_server(
        &self,
        server: &Server,
        tables: &HashSet<TableName>,
        shards: &HashSet<Shard>,
    ) -> bool {
        self.server_layout(server)
            .iter()
            .any(|shard| shard_selected(shard, tables, shards))
    }
}

/// A shard is selected when its table was routed and, if specific shards were
/// routed, it is one of them. An empty shard set selects every shard.
pub fn shard_selected(shard: &Shard, tables: &HashSet<TableName>, shards: &HashSet<Shard>) -> bool {
    if !tables.contains(&shard.table) {
        return false;
    }
    shards.is_empty() || shards.contains(shard)
}

/// Layout held in memory. Assignments can change at runtime; readers always see
/// a consistent per-server shard set.
#[derive(Default)]
pub struct StaticLayout {
    assignments: DashMap<Server, HashSet<Shard>>,
}

impl StaticLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_assignments(assignments: impl IntoIterator<Item = (Server, Vec<Shard>)>) -> Self {
        let layout = Self::new();
        for (server, shards) in assignments {
            layout.assign(server, shards);
        }
        layout
    }

    /// Replaces the shard set served by `server`.
    pub fn assign(&self, server: Server, shards: impl IntoIterator<Item = Shard>) {
        let shards: HashSet<Shard> = shards.into_iter().collect();
        tracing::debug!("Server {} now serves {} shards", server, shards.len());
        self.assignments.insert(server, shards);
    }

    pub fn remove_server(&self, server: &Server) -> bool {
        self.assignments.remove(server).is_some()
    }

    pub fn server_count(&self) -> usize {
        self.assignments.len()
    }
}

impl RoutingMap for StaticLayout {
    fn servers_for_cluster(&self) -> HashSet<Server> {
        self.assignments
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn server_layout(&self, server: &Server) -> HashSet<Shard> {
        self.assignments
            .get(server)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

/// The server -> shard assignment for one operation, captured once.
#[derive(Debug, Clone, Default)]
pub struct RoutingSnapshot {
    assignments: HashMap<Server, HashSet<Shard>>,
}

impl RoutingSnapshot {
    /// Restricts the current layout to the routed tables and shards. Servers that
    /// serve none of them are left out entirely.
    pub fn capture(
        routing: &dyn RoutingMap,
        tables: &HashSet<TableName>,
        shards: &HashSet<Shard>,
    ) -> Self {
        let mut assignments = HashMap::new();
        if tables.is_empty() {
            return Self { assignments };
        }

        for server in routing.servers_for_cluster() {
            if !routing.is_valid_server(&server, tables, shards) {
                continue;
            }
            let selected: HashSet<Shard> = routing
                .server_layout(&server)
                .into_iter()
                .filter(|shard| shard_selected(shard, tables, shards))
                .collect();
            if !selected.is_empty() {
                assignments.insert(server, selected);
            }
        }

        Self { assignments }
    }

    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.assignments.keys()
    }

    pub fn shards_on(&self, server: &Server) -> Option<&HashSet<Shard>> {
        self.assignments.get(server)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Server, &HashSet<Shard>)> {
        self.assignments.iter()
    }

    pub fn server_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn shard_count(&self) -> usize {
        self.assignments.values().map(|shards| shards.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
