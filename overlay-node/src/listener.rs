//! Accepts inbound peer connections and spawns a receive loop for each.
//! Exits when the listening socket itself is closed (shutdown).

use crate::receiver;
use crate::state::Stats;
use log::info;
use overlay_shared::shutdown::Shutdown;
use overlay_shared::wire::NodeData;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub async fn run(
    listener: TcpListener,
    own_id: i32,
    stats: Arc<Stats>,
    outbound: mpsc::Sender<NodeData>,
    mut shutdown: Shutdown,
) {
    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                info!("node listener shutting down");
                return;
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        log::warn!("accept failed: {err}");
                        continue;
                    }
                };
                info!("accepted inbound connection from {peer_addr}");
                let (read, _write) = stream.into_split();
                tokio::spawn(receiver::run(read, own_id, stats.clone(), outbound.clone()));
            }
        }
    }
}
