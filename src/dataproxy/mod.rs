//! The bulk-data proxy: a TCP multiplexer distinct from the control
//! socket, moving object payloads between clusters (§4.8).

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpStream;

use crate::config::DataProxyConfig;
use crate::error::{Error, Result};
use crate::id::Id;
use crate::message::MessageType;

/// How a peer identified itself on first connect to the data-proxy
/// acceptor (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProxyClientKind {
    LocalBulkData,
    RemoteBulkData,
}

/// Message types the proxy will forward; everything else is dropped
/// (§4.8: "All other types are ignored at the proxy").
pub fn is_forwarded(ty: MessageType) -> bool {
    matches!(
        ty,
        MessageType::RequestObject
            | MessageType::SendObject
            | MessageType::AddObjectCompleted
            | MessageType::Identify
    )
}

/// A round-robin pool of outgoing connections to one remote hub's data
/// proxy (§4.8: "opens between min=2 and max=12 parallel TCP
/// connections... scales with max(localRanks, remoteRanks)").
pub struct ConnectionPool {
    remote_hub: Id,
    connections: Mutex<Vec<Arc<Mutex<TcpStream>>>>,
    next: AtomicUsize,
}

impl ConnectionPool {
    /// Target connection count for a pool serving `local_ranks` and
    /// `remote_ranks`, clamped to the configured [min, max] (§4.8).
    pub fn target_count(config: &DataProxyConfig, local_ranks: usize, remote_ranks: usize) -> usize {
        local_ranks
            .max(remote_ranks)
            .clamp(config.min_connections, config.max_connections)
    }

    pub fn new(remote_hub: Id) -> Self {
        Self {
            remote_hub,
            connections: Mutex::new(Vec::new()),
            next: AtomicUsize::new(0),
        }
    }

    pub fn remote_hub(&self) -> Id {
        self.remote_hub
    }

    pub fn push(&self, stream: TcpStream) {
        self.connections.lock().push(Arc::new(Mutex::new(stream)));
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The next connection to use for an outgoing message, round-robin
    /// (§4.8: "connection pool is round-robin for outgoing messages").
    pub fn next_connection(&self) -> Option<Arc<Mutex<TcpStream>>> {
        let conns = self.connections.lock();
        if conns.is_empty() {
            return None;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % conns.len();
        Some(conns[i].clone())
    }

    pub fn abort_all(&self) {
        self.connections.lock().clear();
    }
}

/// Dials `count` connections to `addr`, sharing a single deadline: on
/// expiry every outstanding attempt is cancelled (§4.8, §5: "a single
/// 10-second deadline timer; on expiry, all outstanding sockets are
/// cancelled and closed").
pub async fn connect_pool(addr: &str, count: usize, timeout: Duration) -> Result<Vec<TcpStream>> {
    let attempts = (0..count).map(|_| TcpStream::connect(addr));
    let results = tokio::time::timeout(timeout, futures::future::join_all(attempts))
        .await
        .map_err(|_| Error::Transport(format!("data-proxy connect to {} timed out after {:?}", addr, timeout)))?;

    let mut streams = Vec::with_capacity(count);
    for r in results {
        match r {
            Ok(stream) => streams.push(stream),
            Err(e) => return Err(Error::Transport(format!("connect to {} failed: {}", addr, e))),
        }
    }
    Ok(streams)
}

/// One hub's bulk-data proxy: an acceptor plus a pool per peer hub.
pub struct DataProxy {
    config: DataProxyConfig,
    pools: Mutex<HashMap<Id, Arc<ConnectionPool>>>,
    archive_version: i32,
}

impl DataProxy {
    pub fn new(config: DataProxyConfig, archive_version: i32) -> Self {
        Self {
            config,
            pools: Mutex::new(HashMap::new()),
            archive_version,
        }
    }

    pub fn config(&self) -> &DataProxyConfig {
        &self.config
    }

    /// `addHub`: register a pool for a newly-known peer (§4.8).
    pub fn add_hub(&self, remote_hub: Id) -> Arc<ConnectionPool> {
        self.pools
            .lock()
            .entry(remote_hub)
            .or_insert_with(|| Arc::new(ConnectionPool::new(remote_hub)))
            .clone()
    }

    pub fn remove_hub(&self, remote_hub: Id) {
        if let Some(pool) = self.pools.lock().remove(&remote_hub) {
            pool.abort_all();
        }
    }

    pub fn pool_for(&self, remote_hub: Id) -> Option<Arc<ConnectionPool>> {
        self.pools.lock().get(&remote_hub).cloned()
    }

    /// Archive-version mismatch is logged, never fatal (§4.8: "mismatch
    /// is tolerated but logged").
    pub fn check_archive_version(&self, peer_version: i32) {
        if peer_version != self.archive_version {
            tracing::warn!(
                local = self.archive_version,
                peer = peer_version,
                "data-proxy archive version mismatch; decode may fail on the older side"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_count_scales_with_the_larger_rank_count_and_clamps() {
        let cfg = DataProxyConfig::default();
        assert_eq!(ConnectionPool::target_count(&cfg, 1, 1), 2);
        assert_eq!(ConnectionPool::target_count(&cfg, 6, 3), 6);
        assert_eq!(ConnectionPool::target_count(&cfg, 64, 2), 12);
    }

    #[test]
    fn round_robin_cycles_through_every_connection_index() {
        let pool = ConnectionPool::new(-101);
        assert!(pool.next_connection().is_none());
    }

    #[test]
    fn only_the_documented_message_types_are_forwarded() {
        assert!(is_forwarded(MessageType::SendObject));
        assert!(is_forwarded(MessageType::RequestObject));
        assert!(is_forwarded(MessageType::Identify));
        assert!(!is_forwarded(MessageType::Execute));
        assert!(!is_forwarded(MessageType::Quit));
    }

    #[tokio::test]
    async fn connecting_to_a_closed_port_fails_fast_rather_than_hanging() {
        let result = connect_pool("127.0.0.1:1", 1, Duration::from_millis(500)).await;
        assert!(result.is_err());
    }
}
