//! The Registry's single dispatch worker.
//!
//! Everything that mutates [`RegistryState`] passes through this one task,
//! selected from three sources exactly the way `ConnPoolActor` in the
//! teacher serializes access to its pool: a bounded queue of inbound wire
//! messages, an unbounded queue of connection lifecycle events, and an
//! unbounded queue of operator commands. No lock is needed because nothing
//! outside this task ever touches the state directly.

use crate::operator::OperatorCommand;
use crate::routing;
use crate::state::{RegistryState, Summary};
use anyhow::Result;
use log::{error, info, warn};
use overlay_shared::addr::{parse_host_port, verify_address};
use overlay_shared::codec;
use overlay_shared::error::TypedError;
use overlay_shared::shutdown::Shutdown;
use overlay_shared::wire::mini_chord::Variant;
use overlay_shared::wire::{
    DeregistrationResponse, MiniChord, NodeRegistry, Peer, RegistrationResponse,
    RequestTrafficSummary,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;

/// One inbound wire message, tagged with the connection it arrived on.
pub struct Inbound {
    pub conn_id: u64,
    pub peer_addr: SocketAddr,
    pub msg: MiniChord,
}

/// Connection lifecycle notifications from the listener.
pub enum ConnEvent {
    Opened {
        conn_id: u64,
        write: OwnedWriteHalf,
    },
    Closed {
        conn_id: u64,
    },
}

/// Handles the dispatch worker hands out to the rest of the binary.
pub struct Handles {
    pub inbound: mpsc::Sender<Inbound>,
    pub conn_events: mpsc::UnboundedSender<ConnEvent>,
    pub operator: mpsc::UnboundedSender<OperatorCommand>,
}

/// Inbound message queue capacity. Matches the spec's literal bound on the
/// (conn, message) work queue.
pub const INBOUND_CAPACITY: usize = 128;

/// Spawns the dispatch worker, returning the handles used to feed it.
pub fn spawn(shutdown: Shutdown) -> (Handles, tokio::task::JoinHandle<Result<()>>) {
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();
    let (operator_tx, operator_rx) = mpsc::unbounded_channel();

    let handles = Handles {
        inbound: inbound_tx,
        conn_events: conn_tx,
        operator: operator_tx,
    };

    let join = tokio::spawn(run(inbound_rx, conn_rx, operator_rx, shutdown));
    (handles, join)
}

async fn run(
    mut inbound_rx: mpsc::Receiver<Inbound>,
    mut conn_rx: mpsc::UnboundedReceiver<ConnEvent>,
    mut operator_rx: mpsc::UnboundedReceiver<OperatorCommand>,
    mut shutdown: Shutdown,
) -> Result<()> {
    let mut state = RegistryState::new();
    let mut conns: HashMap<u64, OwnedWriteHalf> = HashMap::new();

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                info!("dispatch worker shutting down");
                return Ok(());
            }
            event = conn_rx.recv() => {
                match event {
                    Some(ConnEvent::Opened { conn_id, write }) => {
                        conns.insert(conn_id, write);
                    }
                    Some(ConnEvent::Closed { conn_id }) => {
                        conns.remove(&conn_id);
                    }
                    None => return Ok(()),
                }
            }
            cmd = operator_rx.recv() => {
                match cmd {
                    Some(cmd) => handle_operator(&mut state, &mut conns, cmd).await,
                    None => return Ok(()),
                }
            }
            item = inbound_rx.recv() => {
                match item {
                    Some(item) => handle_inbound(&mut state, &mut conns, item).await?,
                    None => return Ok(()),
                }
            }
        }
    }
}

async fn send_to(conns: &mut HashMap<u64, OwnedWriteHalf>, conn_id: u64, msg: &MiniChord) -> Result<()> {
    let write = conns
        .get_mut(&conn_id)
        .ok_or_else(|| anyhow::anyhow!("no connection {conn_id}"))?;
    codec::write_msg(write, msg).await
}

async fn handle_inbound(
    state: &mut RegistryState,
    conns: &mut HashMap<u64, OwnedWriteHalf>,
    item: Inbound,
) -> Result<()> {
    let Inbound {
        conn_id,
        peer_addr,
        msg,
    } = item;

    match msg.variant {
        Some(Variant::Registration(reg)) => {
            handle_registration(state, conns, conn_id, peer_addr, reg.address).await
        }
        Some(Variant::Deregistration(dereg)) => {
            handle_deregistration(state, conns, conn_id, peer_addr, dereg.id, dereg.address).await
        }
        Some(Variant::NodeRegistryResponse(resp)) => handle_node_registry_response(state, resp.result)?,
        Some(Variant::TaskFinished(tf)) => {
            handle_task_finished(state, conns, peer_addr, tf.id, tf.address).await?
        }
        Some(Variant::ReportTrafficSummary(report)) => {
            handle_traffic_summary(
                state,
                Summary {
                    id: report.id,
                    sent: report.sent,
                    received: report.received,
                    relayed: report.relayed,
                    total_sent: report.total_sent,
                    total_received: report.total_received,
                },
            );
        }
        other => {
            warn!("registry received an unexpected message variant: {other:?}");
        }
    }
    Ok(())
}

async fn handle_registration(
    state: &mut RegistryState,
    conns: &mut HashMap<u64, OwnedWriteHalf>,
    conn_id: u64,
    peer_addr: SocketAddr,
    claimed_address: String,
) {
    if state.setup_sent {
        error!("can't register after setup has been executed");
        return;
    }

    let mut info = String::new();
    let mut result: i32 = -1;

    let claimed = parse_host_port(&claimed_address);

    let ok = match &claimed {
        Ok(claimed) if verify_address(claimed, &peer_addr) => true,
        _ => {
            let err = TypedError::AddressMismatch {
                claimed: claimed_address.clone(),
                observed: peer_addr.to_string(),
            };
            warn!("registration rejected: {err}");
            info = "Registration request unsuccessful: Address mismatch.".into();
            false
        }
    };

    let ok = ok
        && if state.address_exists(claimed.as_ref().unwrap()) {
            let err = TypedError::value_exists("address", &claimed_address);
            warn!("registration rejected: {err}");
            info = "Registration request unsuccessful: Address already registered.".into();
            false
        } else {
            true
        };

    if ok {
        match state.register(*claimed.as_ref().unwrap(), conn_id) {
            Some(id) => {
                result = id.0;
                info = format!("Registration successful. There are now {} nodes.", state.nodes.len());
            }
            None => {
                info = "Registration request unsuccessful: overlay is full.".into();
            }
        }
    }

    let response = MiniChord {
        variant: Some(Variant::RegistrationResponse(RegistrationResponse {
            result,
            info,
        })),
    };

    if send_to(conns, conn_id, &response).await.is_err() {
        error!("failed to send RegistrationResponse to {peer_addr}, rolling back");
        if result >= 0 {
            state.remove_node(result);
        }
    }
}

async fn handle_deregistration(
    state: &mut RegistryState,
    conns: &mut HashMap<u64, OwnedWriteHalf>,
    conn_id: u64,
    peer_addr: SocketAddr,
    id: i32,
    claimed_address: String,
) {
    let mut info = String::new();
    let mut success = true;

    if state.setup_sent {
        success = false;
        info = "Can't deregister after setup has executed".into();
    }

    let claimed = parse_host_port(&claimed_address);

    if success {
        match &claimed {
            Ok(claimed) if verify_address(claimed, &peer_addr) => {}
            _ => {
                let err = TypedError::AddressMismatch {
                    claimed: claimed_address.clone(),
                    observed: peer_addr.to_string(),
                };
                warn!("deregistration rejected: {err}");
                success = false;
                info = "Deregistration request unsuccessful: Address mismatch.".into();
            }
        }
    }

    let removed = if success {
        state.find_by_addr(claimed.as_ref().unwrap()).map(|n| n.id.0)
    } else {
        None
    };

    if success && removed.is_none() {
        let err = TypedError::value_not_found("address", &claimed_address);
        warn!("deregistration rejected: {err}");
        success = false;
        info = "Deregistration request unsuccessful: address unknown.".into();
    }

    if success {
        if let Some(node_id) = removed {
            state.remove_node(node_id);
        }
    }

    let response = MiniChord {
        variant: Some(Variant::DeregistrationResponse(DeregistrationResponse {
            result: if success { id } else { -1 },
            info,
        })),
    };

    if send_to(conns, conn_id, &response).await.is_err() {
        error!("failed to send DeregistrationResponse to {peer_addr}, re-adding node");
        if success {
            state.readd_node(id, *claimed.as_ref().unwrap(), conn_id);
        }
    }
}

fn handle_node_registry_response(state: &mut RegistryState, result: u32) -> Result<()> {
    if result > 127 {
        return Err(TypedError::FatalRoundFailure(result).into());
    }
    state.no_setup_nodes += 1;
    if state.no_setup_nodes == state.keys.len() {
        info!("the registry is now ready to initiate tasks");
        state.setup_complete = true;
    }
    Ok(())
}

async fn handle_task_finished(
    state: &mut RegistryState,
    conns: &mut HashMap<u64, OwnedWriteHalf>,
    peer_addr: SocketAddr,
    id: i32,
    claimed_address: String,
) -> Result<()> {
    if id > 127 {
        return Err(TypedError::FatalRoundFailure(id as u32).into());
    }

    match parse_host_port(&claimed_address) {
        Ok(claimed) if verify_address(&claimed, &peer_addr) => {}
        _ => {
            error!("node address does not match the connection address");
            return Ok(());
        }
    }

    state.no_finished += 1;

    if state.no_finished == state.keys.len() {
        info!("all packets arrived, sleeping 5 seconds before requesting summaries");
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;

        let request = MiniChord {
            variant: Some(Variant::RequestTrafficSummary(RequestTrafficSummary {})),
        };
        for node in state.nodes.values() {
            if send_to(conns, node.conn_id, &request).await.is_err() {
                error!("failed to send RequestTrafficSummary to node {}", node.id);
            }
        }
    }
    Ok(())
}

fn handle_traffic_summary(state: &mut RegistryState, summary: Summary) {
    state.summaries.push(summary);
    if state.summaries.len() == state.keys.len() {
        crate::summary::print_summaries(&state.summaries);
        state.summaries.clear();
        state.no_finished = 0;
        state.start_complete = false;
    }
}

async fn handle_operator(
    state: &mut RegistryState,
    conns: &mut HashMap<u64, OwnedWriteHalf>,
    cmd: OperatorCommand,
) {
    match cmd {
        OperatorCommand::List(reply) => {
            let rows = state
                .keys
                .iter()
                .map(|id| (*id, state.nodes[id].addr.to_string()))
                .collect();
            let _ = reply.send(rows);
        }
        OperatorCommand::Route(reply) => {
            if !state.setup_sent {
                let _ = reply.send(Err("setup not complete, routing tables have not been calculated".into()));
            } else {
                let rows = state
                    .keys
                    .iter()
                    .map(|id| (*id, state.nodes[id].routing_table.clone()))
                    .collect();
                let _ = reply.send(Ok(rows));
            }
        }
        OperatorCommand::Setup(requested_r) => {
            if state.setup_sent {
                error!("setup already complete");
                return;
            }
            if state.nodes.is_empty() {
                error!("no nodes are registered, nothing to set up");
                return;
            }

            let r = routing::clamp_r(requested_r, state.keys.len());
            if r != requested_r {
                warn!(
                    "routing table size {requested_r} too large for network size {}, using maximum {r}",
                    state.keys.len()
                );
            }

            let per_node = routing::build(state, r);
            state.setup_sent = true;

            for (id, entries) in per_node {
                let conn_id = state.nodes[&id].conn_id;
                let msg = MiniChord {
                    variant: Some(Variant::NodeRegistry(NodeRegistry {
                        nr: entries.len() as u32,
                        no_ids: state.keys.len() as u32,
                        peers: entries
                            .iter()
                            .map(|(peer_id, addr)| Peer {
                                id: *peer_id,
                                address: addr.clone(),
                            })
                            .collect(),
                        ids: state.keys.clone(),
                    })),
                };
                if send_to(conns, conn_id, &msg).await.is_err() {
                    error!("failed to send NodeRegistry to node {id}");
                }
            }
        }
        OperatorCommand::Start(packets) => {
            if !state.setup_complete {
                error!("setup not complete");
                return;
            }
            if state.start_complete {
                error!("start already completed");
                return;
            }
            if packets < 1 {
                error!("number of packets must be positive");
                return;
            }

            let task = MiniChord {
                variant: Some(Variant::InitiateTask(overlay_shared::wire::InitiateTask {
                    packets,
                })),
            };
            for node in state.nodes.values() {
                if send_to(conns, node.conn_id, &task).await.is_err() {
                    error!("failed to send InitiateTask to node {}", node.id);
                } else {
                    info!("successfully sent InitiateTask to node {}", node.id);
                }
            }
            state.start_complete = true;
        }
    }
}
