//! The local view of the overlay a node builds from its `NodeRegistry`
//! message: who else is out there, and which of them are this node's
//! routing table entries.

use overlay_shared::wire::NodeRegistry;

/// This node's routing table and the full node-id list, derived from a
/// `NodeRegistry` message.
pub struct Network {
    pub own_id: i32,
    /// `(peer_id, peer_address)`, sorted by `peer_id` ascending.
    pub routing_table: Vec<(i32, String)>,
    /// Every known node id except `own_id`, used by the packet originator.
    pub known_ids: Vec<i32>,
}

impl Network {
    pub fn from_registry(own_id: i32, registry: &NodeRegistry) -> Self {
        let mut routing_table: Vec<(i32, String)> = registry
            .peers
            .iter()
            .map(|p| (p.id, p.address.clone()))
            .collect();
        routing_table.sort_by_key(|(id, _)| *id);

        let known_ids: Vec<i32> = registry.ids.iter().copied().filter(|id| *id != own_id).collect();

        Self {
            own_id,
            routing_table,
            known_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_shared::wire::Peer;

    fn peer(id: i32, addr: &str) -> Peer {
        Peer {
            id,
            address: addr.into(),
        }
    }

    #[test]
    fn routing_table_is_sorted_by_peer_id_regardless_of_wire_order() {
        let registry = NodeRegistry {
            nr: 2,
            no_ids: 4,
            peers: vec![peer(100, "a:1"), peer(40, "b:2")],
            ids: vec![10, 40, 70, 100],
        };

        let network = Network::from_registry(10, &registry);
        assert_eq!(network.routing_table, vec![(40, "b:2".to_string()), (100, "a:1".to_string())]);
    }

    #[test]
    fn known_ids_excludes_self() {
        let registry = NodeRegistry {
            nr: 2,
            no_ids: 4,
            peers: vec![peer(40, "b:2"), peer(70, "c:3")],
            ids: vec![10, 40, 70, 100],
        };

        let network = Network::from_registry(10, &registry);
        assert_eq!(network.known_ids, vec![40, 70, 100]);
        assert!(!network.known_ids.contains(&10));
    }
}
