//! The two pieces of routing math the whole system hangs off: the
//! Registry's finger-table construction and the Node's destination-selection
//! rule. Both are pure and have no networking or I/O dependency, so they are
//! exercised directly by unit tests instead of through end-to-end setup.

/// Builds the finger table for every node in `sorted_ids` (which must
/// already be sorted ascending and deduplicated).
///
/// For node at index `i`, table entry `j` (for `j` in `0..r`) is the id at
/// `sorted_ids[(i + 2^j) mod K]`, where `K = sorted_ids.len()`. The result is
/// indexed the same way as `sorted_ids`: `result[i]` is node `sorted_ids[i]`'s
/// list of up to `r` distinct peer ids, in `j` order.
///
/// `r` is not clamped here — callers (the Registry) are responsible for
/// clamping to `floor(log2(K))` before calling this, since clamping involves
/// a decision about what to log, not pure math.
pub fn routing_table(sorted_ids: &[i32], r: usize) -> Vec<Vec<i32>> {
    let k = sorted_ids.len();
    if k == 0 {
        return vec![];
    }

    sorted_ids
        .iter()
        .enumerate()
        .map(|(i, _)| {
            (0..r)
                .map(|j| {
                    let step = 1usize << j;
                    let neighbour_index = (i + step) % k;
                    sorted_ids[neighbour_index]
                })
                .collect()
        })
        .collect()
}

/// The destination-selection rule ("FindBestNeighbour"): given a routing
/// table sorted by id ascending, scans from the highest index downward and
/// returns the first peer whose id is `<=` the packet's destination. If none
/// match (the destination is smaller than every peer id), wraps around and
/// returns the peer with the highest id.
///
/// Returns `None` only if `table` is empty.
pub fn find_best_neighbour<T>(table: &[T], destination: i32, id_of: impl Fn(&T) -> i32) -> Option<&T> {
    if table.is_empty() {
        return None;
    }

    table
        .iter()
        .rev()
        .find(|entry| id_of(entry) <= destination)
        .or_else(|| table.last())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_one_four_nodes_r2() {
        let ids = vec![10, 40, 70, 100];
        let tables = routing_table(&ids, 2);
        // node 10 is index 0: step 1 -> index 1 (40), step 2 -> index 2 (70)
        assert_eq!(tables[0], vec![40, 70]);
    }

    #[test]
    fn scenario_one_forwarding() {
        let ids = vec![10, 40, 70, 100];
        let table_for_10: Vec<(i32, ())> = routing_table(&ids, 2)[0]
            .iter()
            .map(|id| (*id, ()))
            .collect();

        let best = find_best_neighbour(&table_for_10, 95, |(id, _)| *id).unwrap();
        assert_eq!(best.0, 70);

        let best_wrap = find_best_neighbour(&table_for_10, 5, |(id, _)| *id).unwrap();
        assert_eq!(best_wrap.0, 70);
    }

    #[test]
    fn scenario_two_k2_r_clamped_to_1() {
        let ids = vec![3, 90];
        let tables = routing_table(&ids, 1);
        assert_eq!(tables[0], vec![90]); // node 3's table
        assert_eq!(tables[1], vec![3]); // node 90's table
    }

    #[test]
    fn routing_table_never_contains_self_when_k_greater_than_r() {
        let ids = vec![0, 5, 12, 44, 90, 100, 127];
        let tables = routing_table(&ids, 2);
        for (i, id) in ids.iter().enumerate() {
            assert!(!tables[i].contains(id));
        }
    }

    #[test]
    fn destination_below_every_peer_wraps_to_highest() {
        let table = vec![20, 50, 80];
        let best = find_best_neighbour(&table, 1, |id| *id).unwrap();
        assert_eq!(*best, 80);
    }

    #[test]
    fn empty_table_returns_none() {
        let table: Vec<i32> = vec![];
        assert_eq!(find_best_neighbour(&table, 5, |id| *id), None);
    }
}
