//! Operator stdin commands for a running node: `exit` (honoured only before
//! setup completes) and `print` (dumps this node's id, routing table and
//! current traffic counters).

use crate::control::{ControlEvent, recv_matching};
use crate::network::Network;
use crate::state::Stats;
use overlay_shared::wire::Deregistration;
use overlay_shared::wire::MiniChord;
use overlay_shared::wire::mini_chord::Variant;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, broadcast};

pub async fn run(
    own_id: i32,
    own_addr: String,
    registry_write: Arc<Mutex<OwnedWriteHalf>>,
    mut control_rx: broadcast::Receiver<ControlEvent>,
    setup_acknowledged: Arc<AtomicBool>,
    network: Arc<Network>,
    stats: Arc<Stats>,
) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(err) => {
                log::error!("error reading stdin: {err}");
                return;
            }
        };

        match line.trim() {
            "exit" => {
                if setup_acknowledged.load(Ordering::SeqCst) {
                    log::error!("setup already complete, cannot deregister");
                    continue;
                }

                let request = MiniChord {
                    variant: Some(Variant::Deregistration(Deregistration {
                        id: own_id,
                        address: own_addr.clone(),
                    })),
                };

                {
                    let mut write = registry_write.lock().await;
                    if let Err(err) = overlay_shared::codec::write_msg(&mut write, &request).await {
                        log::error!("failed to send deregistration: {err:#}");
                        continue;
                    }
                }

                let response = recv_matching(&mut control_rx, |event| match event {
                    ControlEvent::DeregistrationResponse(r) => Ok(r),
                    other => Err(other),
                })
                .await;

                match response {
                    Some(r) if r.result >= 0 => {
                        println!("Deregistered: {}", r.info);
                        std::process::exit(0);
                    }
                    Some(r) => log::error!("deregistration refused: {}", r.info),
                    None => log::error!("control connection closed before a response arrived"),
                }
            }
            "print" => {
                println!("Node {own_id}");
                println!("Routing table:");
                for (peer_id, addr) in &network.routing_table {
                    println!("  {peer_id}\t{addr}");
                }
                let send = stats.send.lock().expect("send stats mutex poisoned");
                let recv = stats.receive.lock().expect("receive stats mutex poisoned");
                println!(
                    "sent={} received={} relayed={} total_sent={} total_received={}",
                    send.sent, recv.received, recv.relayed, send.total_sent, recv.total_received
                );
            }
            _ => {}
        }
    }
}
