//! Drains the outbound packet channel and forwards each packet toward its
//! destination via the routing table's best-neighbour rule.
//!
//! A send failure to a peer connection is treated as fatal: the original
//! tool exits the process rather than attempting a graceful round abort,
//! and that behaviour is preserved here rather than "fixed".

use log::info;
use overlay_shared::codec;
use overlay_shared::overlay::find_best_neighbour;
use overlay_shared::wire::NodeData;
use overlay_shared::wire::mini_chord::Variant;
use overlay_shared::wire::MiniChord;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;

use crate::state::Stats;

/// Pacing delay applied after every forwarded packet, so a burst of local
/// originations doesn't overwhelm a peer all at once.
const SEND_PACING: Duration = Duration::from_millis(1);

pub async fn run(
    mut outbound: mpsc::Receiver<NodeData>,
    own_id: i32,
    mut peers: Vec<(i32, OwnedWriteHalf)>,
    stats: Arc<Stats>,
) {
    peers.sort_by_key(|(id, _)| *id);
    let ids: Vec<i32> = peers.iter().map(|(id, _)| *id).collect();

    while let Some(packet) = outbound.recv().await {
        if packet.source == own_id {
            stats.record_sent(packet.payload);
        }

        let Some(&best_id) = find_best_neighbour(&ids, packet.destination, |id| *id) else {
            log::warn!("no peers to forward packet toward {}", packet.destination);
            continue;
        };

        let index = ids.iter().position(|id| *id == best_id).expect("id came from this table");
        let (_, writer) = &mut peers[index];

        let msg = MiniChord {
            variant: Some(Variant::NodeData(packet)),
        };
        if let Err(err) = codec::write_msg(writer, &msg).await {
            log::error!("failed to forward packet to node {best_id}: {err:#}, exiting");
            std::process::exit(1);
        }

        tokio::time::sleep(SEND_PACING).await;
    }

    info!("outbound channel closed, closing all peer connections");
    // Dropping `peers` closes every outbound connection this node dialed.
}
