//! Finger-table construction for the `setup` command.

use crate::state::RegistryState;
use overlay_shared::overlay;
use std::collections::HashMap;

/// Clamps the operator-requested routing table size to `floor(log2(k))`,
/// the largest size that can't produce duplicate entries via the geometric
/// step. `k` is the current overlay size.
pub fn clamp_r(requested: usize, k: usize) -> usize {
    let max = (k.max(1) as f64).log2().floor() as usize;
    requested.min(max)
}

/// Builds and stores the routing table for every node in `state`, returning
/// for each node id the `(peer_id, peer_address)` pairs just assigned to it
/// — the payload of the `NodeRegistry` message that will be sent to it.
///
/// `r` must already be clamped by [`clamp_r`].
pub fn build(state: &mut RegistryState, r: usize) -> HashMap<i32, Vec<(i32, String)>> {
    let tables = overlay::routing_table(&state.keys, r);
    let mut result = HashMap::with_capacity(state.keys.len());

    for (table, &id) in tables.iter().zip(state.keys.iter()) {
        let entries: Vec<(i32, String)> = table
            .iter()
            .map(|peer_id| {
                let addr = state
                    .nodes
                    .get(peer_id)
                    .map(|n| n.addr.to_string())
                    .unwrap_or_default();
                (*peer_id, addr)
            })
            .collect();

        if let Some(node) = state.nodes.get_mut(&id) {
            node.routing_table = entries.clone();
        }
        result.insert(id, entries);
    }

    state.r = r;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_floor_log2_of_overlay_size() {
        assert_eq!(clamp_r(5, 4), 2);
        assert_eq!(clamp_r(1, 2), 1);
        assert_eq!(clamp_r(10, 128), 7);
    }

    #[test]
    fn build_populates_every_node_routing_table() {
        let mut state = RegistryState::new();
        for i in 0..4u16 {
            let addr = format!("127.0.0.1:{}", 3000 + i).parse().unwrap();
            state.register(addr, i as u64).unwrap();
        }
        let r = clamp_r(2, state.keys.len());
        let result = build(&mut state, r);

        for id in &state.keys {
            assert!(!result[id].is_empty());
            assert_eq!(state.nodes[id].routing_table, result[id]);
        }
    }
}
