//! Generates this node's share of a round's traffic: `packets` `NodeData`
//! messages with a uniformly random destination and payload.

use overlay_shared::wire::NodeData;
use rand::Rng;
use tokio::sync::mpsc;

pub async fn run(packets: u32, own_id: i32, known_ids: Vec<i32>, outbound: mpsc::Sender<NodeData>) {
    if known_ids.is_empty() {
        log::warn!("no other nodes known, cannot originate any packets");
        return;
    }

    let mut rng = rand::thread_rng();
    for _ in 0..packets {
        let destination = known_ids[rng.gen_range(0..known_ids.len())];
        let payload: i32 = rng.gen();
        let packet = NodeData {
            destination,
            source: own_id,
            payload,
            hops: 0,
            trace: Vec::new(),
        };
        if outbound.send(packet).await.is_err() {
            break;
        }
    }
}
