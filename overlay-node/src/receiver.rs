//! Per-connection receive loop: one spawned per inbound connection,
//! grounded on the registry's own `listener::receive_loop` and, ultimately,
//! the teacher's `conn::incoming::stream_loop`.

use log::warn;
use overlay_shared::codec;
use overlay_shared::error::TypedError;
use overlay_shared::wire::mini_chord::Variant;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;

use crate::state::Stats;

/// Reads `NodeData` packets from `read` until EOF or a protocol error.
///
/// A packet whose `Source` equals `own_id` is malformed — this node can
/// only be the source of packets it generates itself, never of one it
/// receives — and is dropped with a warning; the loop then exits,
/// orphaning the connection until the peer eventually notices it's gone.
/// This mirrors the original tool's behaviour and guards against routing
/// loops feeding a node its own traffic back.
pub async fn run(
    mut read: OwnedReadHalf,
    own_id: i32,
    stats: Arc<Stats>,
    outbound: mpsc::Sender<overlay_shared::wire::NodeData>,
) {
    loop {
        let msg = match codec::read_msg(&mut read).await {
            Ok(msg) => msg,
            Err(err) => {
                if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
                    if io_err.kind() == ErrorKind::UnexpectedEof {
                        return;
                    }
                }
                warn!("inbound connection error: {err:#}");
                return;
            }
        };

        let mut packet = match msg.variant {
            Some(Variant::NodeData(packet)) => packet,
            other => {
                warn!("expected NodeData on a data connection, got {other:?}");
                continue;
            }
        };

        if packet.source == own_id {
            warn!("{}", TypedError::SelfOriginatedPacket(own_id));
            return;
        }

        if packet.destination == own_id {
            stats.record_received(packet.payload);
        } else {
            stats.record_relayed();
            packet.trace.push(own_id);
            let outbound = outbound.clone();
            // Detached so a full outbound channel never blocks this read loop.
            tokio::spawn(async move {
                let _ = outbound.send(packet).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_shared::wire::{MiniChord, NodeData};
    use tokio::net::{TcpListener, TcpStream};

    #[tokio::test]
    async fn self_sourced_node_data_is_dropped_and_the_connection_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            stream.into_split().0
        });

        let own_id = 7;
        let mut client = TcpStream::connect(addr).await.unwrap();
        let packet = MiniChord {
            variant: Some(Variant::NodeData(NodeData {
                destination: 3,
                source: own_id,
                payload: 42,
                hops: 0,
                trace: Vec::new(),
            })),
        };
        codec::write_msg(&mut client, &packet).await.unwrap();

        let read = accept.await.unwrap();
        let stats = Arc::new(Stats::default());
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);

        // A self-sourced packet ends the receive loop immediately; `run`
        // returning at all (rather than hanging on the next read) is itself
        // part of what this test checks.
        run(read, own_id, stats.clone(), outbound_tx).await;

        assert!(outbound_rx.try_recv().is_err(), "nothing should have been forwarded");
        let recv = stats.receive.lock().unwrap();
        assert_eq!(recv.received, 0);
        assert_eq!(recv.relayed, 0);
    }
}
