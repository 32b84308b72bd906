//! Connection handle shared by both topologies

use redis::aio::{ConnectionLike, ConnectionManager};
use redis::cluster_async::ClusterConnection;
use redis::{Cmd, Pipeline, RedisFuture, Value};

/// A live connection to the configured store, single-node or cluster
///
/// Dependents issue commands against the handle through
/// [`redis::aio::ConnectionLike`] regardless of topology. Cloning shares
/// the same underlying multiplexed connection; the connection closes when
/// the last clone is dropped. Use [`crate::RedisManager::isolate`] when a
/// genuinely separate connection is needed.
#[derive(Clone)]
pub enum RedisHandle {
    /// Multiplexed connection to a single node
    Single(ConnectionManager),
    /// Cluster connection routing commands across discovered nodes
    Cluster(ClusterConnection),
}

impl ConnectionLike for RedisHandle {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            RedisHandle::Single(conn) => conn.req_packed_command(cmd),
            RedisHandle::Cluster(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            RedisHandle::Single(conn) => conn.req_packed_commands(cmd, offset, count),
            RedisHandle::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            RedisHandle::Single(conn) => conn.get_db(),
            RedisHandle::Cluster(conn) => conn.get_db(),
        }
    }
}
