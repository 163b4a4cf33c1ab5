//! Registry membership state: the single mutable structure the dispatch
//! worker owns and mutates. See [`crate::dispatch`] for the worker that
//! serializes all access to it.

use overlay_shared::NodeId;
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;

/// A registered node: identity, claimed address, and the routing table built
/// for it at `setup` time.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub id: NodeId,
    pub addr: SocketAddr,
    /// The connection id this node registered on. Used to find the write
    /// half to send control messages back to it.
    pub conn_id: u64,
    /// This node's finger table, built at `setup` time: `(peer_id, peer_addr)`
    /// pairs, ordered by peer id ascending. Immutable once setup has been
    /// sent, for the remainder of the round.
    pub routing_table: Vec<(i32, String)>,
}

/// One node's reported end-of-round traffic counters.
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    pub id: i32,
    pub sent: u32,
    pub received: u32,
    pub relayed: u32,
    pub total_sent: i64,
    pub total_received: i64,
}

/// All Registry membership and round state. Owned exclusively by the
/// dispatch worker task — nothing else ever touches this directly, which is
/// what gives the Registry its single-writer discipline.
#[derive(Debug, Default)]
pub struct RegistryState {
    pub nodes: HashMap<i32, NodeRecord>,
    /// Sorted ascending; always exactly the key set of `nodes`.
    pub keys: Vec<i32>,
    /// Ids not yet handed out. Shrinks monotonically: a deregistered id is
    /// never returned here (see design notes).
    id_pool: Vec<i32>,
    pub r: usize,
    pub setup_sent: bool,
    pub setup_complete: bool,
    pub start_complete: bool,
    pub no_setup_nodes: usize,
    pub no_finished: usize,
    pub summaries: Vec<Summary>,
}

impl RegistryState {
    pub fn new() -> Self {
        Self {
            id_pool: (0..NodeId::MAX_NODES).collect(),
            ..Default::default()
        }
    }

    pub fn address_exists(&self, addr: &SocketAddr) -> bool {
        self.nodes.values().any(|n| n.addr == *addr)
    }

    /// Draws an id uniformly from the remaining pool and removes it.
    /// Returns `None` once the pool (and therefore the overlay) is full.
    fn draw_id(&mut self) -> Option<i32> {
        if self.id_pool.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..self.id_pool.len());
        Some(self.id_pool.swap_remove(index))
    }

    /// Registers a new node, returning its assigned id.
    pub fn register(&mut self, addr: SocketAddr, conn_id: u64) -> Option<NodeId> {
        let id = self.draw_id()?;
        self.nodes.insert(
            id,
            NodeRecord {
                id: NodeId(id),
                addr,
                conn_id,
                routing_table: Vec::new(),
            },
        );
        let pos = self.keys.partition_point(|k| *k < id);
        self.keys.insert(pos, id);
        Some(NodeId(id))
    }

    /// Rolls back a registration whose confirming response failed to send.
    /// The id is NOT returned to the pool — only the membership entry is
    /// undone (matches the Go original's `RemoveNode`, which never touches
    /// `IdSpace`).
    pub fn remove_node(&mut self, id: i32) -> bool {
        if self.nodes.remove(&id).is_some() {
            if let Ok(pos) = self.keys.binary_search(&id) {
                self.keys.remove(pos);
            }
            true
        } else {
            false
        }
    }

    /// Re-adds a node that was removed only because its deregistration
    /// response failed to send (rollback of a deregistration).
    pub fn readd_node(&mut self, id: i32, addr: SocketAddr, conn_id: u64) {
        self.nodes.insert(
            id,
            NodeRecord {
                id: NodeId(id),
                addr,
                conn_id,
                routing_table: Vec::new(),
            },
        );
        let pos = self.keys.partition_point(|k| *k < id);
        if self.keys.get(pos) != Some(&id) {
            self.keys.insert(pos, id);
        }
    }

    pub fn find_by_addr(&self, addr: &SocketAddr) -> Option<&NodeRecord> {
        self.nodes.values().find(|n| n.addr == *addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u16) -> SocketAddr {
        format!("127.0.0.1:{}", 2000 + n).parse().unwrap()
    }

    #[test]
    fn registers_up_to_128_nodes_then_rejects() {
        let mut state = RegistryState::new();
        for i in 0..128 {
            assert!(state.register(addr(i), i as u64).is_some());
        }
        assert_eq!(state.nodes.len(), 128);
        assert!(state.register(addr(200), 999).is_none());
    }

    #[test]
    fn deregistered_id_is_not_returned_to_the_pool() {
        let mut state = RegistryState::new();
        let mut assigned = vec![];
        for i in 0..128 {
            assigned.push(state.register(addr(i), i as u64).unwrap());
        }
        let victim: i32 = assigned[0].into();
        assert!(state.remove_node(victim));
        // The pool is empty (128 ids drawn) and stays empty: no 129th
        // registration can ever succeed again within this Registry's
        // lifetime, even though a slot in `nodes` just freed up.
        assert!(state.register(addr(201), 1000).is_none());
    }

    #[test]
    fn keys_stay_sorted_and_match_node_map() {
        let mut state = RegistryState::new();
        for i in 0..10 {
            state.register(addr(i), i as u64).unwrap();
        }
        let mut sorted = state.keys.clone();
        sorted.sort();
        assert_eq!(state.keys, sorted);
        let mut from_nodes: Vec<i32> = state.nodes.keys().copied().collect();
        from_nodes.sort();
        assert_eq!(state.keys, from_nodes);
    }
}
