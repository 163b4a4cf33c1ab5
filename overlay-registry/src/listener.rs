//! Accept loop and per-connection receive loop, grounded on the teacher's
//! `conn::incoming` listener/`stream_loop` pair.

use crate::dispatch::{ConnEvent, Handles, Inbound};
use anyhow::{Context, Result};
use log::{info, warn};
use overlay_shared::codec;
use overlay_shared::shutdown::Shutdown;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Binds `listen_addr` and accepts connections until shutdown, spawning one
/// receive loop per accepted connection.
pub async fn run(listen_addr: String, handles: Handles, mut shutdown: Shutdown) -> Result<()> {
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("binding registry listener on {listen_addr}"))?;
    info!("registry listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            _ = shutdown.wait() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted.context("accepting connection")?;
                let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
                let (read, write) = stream.into_split();

                if handles.conn_events.send(ConnEvent::Opened { conn_id, write }).is_err() {
                    return Ok(());
                }

                let inbound = handles.inbound.clone();
                let conn_events = handles.conn_events.clone();
                tokio::spawn(receive_loop(conn_id, peer_addr, read, inbound, conn_events));
            }
        }
    }
}

async fn receive_loop(
    conn_id: u64,
    peer_addr: std::net::SocketAddr,
    mut read: tokio::net::tcp::OwnedReadHalf,
    inbound: tokio::sync::mpsc::Sender<Inbound>,
    conn_events: tokio::sync::mpsc::UnboundedSender<ConnEvent>,
) {
    loop {
        match codec::read_msg(&mut read).await {
            Ok(msg) => {
                if inbound
                    .send(Inbound {
                        conn_id,
                        peer_addr,
                        msg,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(_) => {
                warn!("connection {conn_id} from {peer_addr} closed");
                break;
            }
        }
    }
    let _ = conn_events.send(ConnEvent::Closed { conn_id });
}
