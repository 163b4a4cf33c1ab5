//! Entry point for `overlay-node`.
//!
//! Startup is sequential and fail-stop, exactly as spec'd: any step failing
//! prints the error and exits 1 rather than retrying or degrading.

mod cli;
mod control;
mod dial;
mod forwarder;
mod listener;
mod network;
mod originator;
mod receiver;
mod state;
mod stdin;

use anyhow::{Context, Result, bail};
use clap::Parser;
use control::ControlEvent;
use network::Network;
use overlay_shared::addr::parse_host_port;
use overlay_shared::codec;
use overlay_shared::wire::mini_chord::Variant;
use overlay_shared::wire::{MiniChord, NodeRegistryResponse, Registration, TaskFinished};
use state::Stats;
use std::backtrace::Backtrace;
use std::panic;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast, mpsc};

fn main() -> Result<(), i32> {
    inner_main().map_err(|err| {
        eprintln!("{err:#}");
        1
    })?;
    Ok(())
}

fn inner_main() -> anyhow::Result<()> {
    let args = cli::CommandLineArgs::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log::LevelFilter::from(args.log_level).as_str()),
    )
    .try_init()
    .context("initializing logger")?;

    panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::capture();
        eprintln!("PANIC occurred: {info}\n\nBACKTRACE:\n{backtrace}");
        std::process::exit(1);
    }));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(16 * 1024 * 1024)
        .build()?;

    rt.block_on(run(args))
}

async fn run(args: cli::CommandLineArgs) -> anyhow::Result<()> {
    // Bind to port 0 rather than probing a random port above 1024: the OS
    // hands back a free ephemeral port race-free, which is the same
    // contract the probe-and-retry approach was after.
    let own_listener = TcpListener::bind("0.0.0.0:0")
        .await
        .context("binding local listener")?;
    let own_addr = own_listener.local_addr()?;
    log::info!("listening on {own_addr}");

    parse_host_port(&args.registry_addr)
        .with_context(|| format!("usage: overlay-node <host>:<port>, got {:?}", args.registry_addr))?;

    let registry_stream = TcpStream::connect(args.registry_addr.clone())
        .await
        .with_context(|| format!("dialing registry at {}", args.registry_addr))?;
    let (registry_read, registry_write) = registry_stream.into_split();
    let registry_write = Arc::new(Mutex::new(registry_write));

    let (control_tx, mut control_rx) = broadcast::channel::<ControlEvent>(32);
    let stdin_control_rx = control_tx.subscribe();
    tokio::spawn(control::run(registry_read, control_tx));

    send_registry(&registry_write, &MiniChord {
        variant: Some(Variant::Registration(Registration {
            address: own_addr.to_string(),
        })),
    })
    .await?;

    let registration = control::recv_matching(&mut control_rx, |event| match event {
        ControlEvent::RegistrationResponse(r) => Ok(r),
        other => Err(other),
    })
    .await
    .context("control connection closed before a registration response arrived")?;

    if registration.result < 0 {
        bail!("registration refused: {}", registration.info);
    }
    let own_id = registration.result;
    log::info!("registered as node {own_id}: {}", registration.info);

    let node_registry = control::recv_matching(&mut control_rx, |event| match event {
        ControlEvent::NodeRegistry(r) => Ok(r),
        other => Err(other),
    })
    .await
    .context("control connection closed before a NodeRegistry message arrived")?;

    let network = Arc::new(Network::from_registry(own_id, &node_registry));

    let stats = Arc::new(Stats::default());
    let (outbound_tx, outbound_rx) = mpsc::channel(8);

    let (shutdown, shutdown_control) = overlay_shared::shutdown::new();
    tokio::spawn(listener::run(
        own_listener,
        own_id,
        stats.clone(),
        outbound_tx.clone(),
        shutdown,
    ));

    // `exit` is only honoured up to SetupAcknowledged (spec.md §4.4's node
    // state machine), so the stdin handler is spawned here — RoutingKnown
    // has just been reached — rather than after the dial loop and
    // NodeRegistryResponse below, which is where SetupAcknowledged begins.
    let setup_acknowledged = Arc::new(AtomicBool::new(false));
    tokio::spawn(stdin::run(
        own_id,
        own_addr.to_string(),
        registry_write.clone(),
        stdin_control_rx,
        setup_acknowledged.clone(),
        network.clone(),
        stats.clone(),
    ));

    // All peers are dialed concurrently rather than one at a time: each
    // carries its own bounded 10-try retry loop, so dialing sequentially
    // would let one slow-to-come-up peer stall every connection after it.
    let dial_tasks: Vec<_> = network
        .routing_table
        .iter()
        .map(|(peer_id, peer_addr)| {
            let peer_id = *peer_id;
            let peer_addr = peer_addr.clone();
            tokio::spawn(async move {
                let result = dial::dial_peer(&peer_addr).await;
                (peer_id, peer_addr, result)
            })
        })
        .collect();

    let mut peer_writes = Vec::with_capacity(dial_tasks.len());
    let mut any_failed = false;
    for task in dial_tasks {
        let (peer_id, peer_addr, result) = task.await.expect("dial task panicked");
        match result {
            Ok(stream) => {
                let (_read, write) = stream.into_split();
                peer_writes.push((peer_id, write));
            }
            Err(err) => {
                log::error!("failed to connect to peer {peer_id} at {peer_addr}: {err:#}");
                any_failed = true;
            }
        }
    }

    let setup_result: u32 = if any_failed { 128 } else { own_id as u32 };
    send_registry(&registry_write, &MiniChord {
        variant: Some(Variant::NodeRegistryResponse(NodeRegistryResponse {
            result: setup_result,
            info: if any_failed {
                "one or more peer connections failed".into()
            } else {
                format!("node {own_id} connected to all {} peers", peer_writes.len())
            },
        })),
    })
    .await?;
    // SetupAcknowledged: the stdin handler's `exit` branch is refused from
    // this point on.
    setup_acknowledged.store(true, Ordering::SeqCst);

    let forwarder_join = tokio::spawn(forwarder::run(outbound_rx, own_id, peer_writes, stats.clone()));

    let initiate = control::recv_matching(&mut control_rx, |event| match event {
        ControlEvent::InitiateTask(r) => Ok(r),
        other => Err(other),
    })
    .await
    .context("control connection closed before an InitiateTask message arrived")?;

    tokio::spawn(originator::run(
        initiate.packets,
        own_id,
        network.known_ids.clone(),
        outbound_tx,
    ));

    while stats.sent_count() < initiate.packets {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    send_registry(&registry_write, &MiniChord {
        variant: Some(Variant::TaskFinished(TaskFinished {
            id: own_id,
            address: own_addr.to_string(),
        })),
    })
    .await?;
    log::info!("sent TaskFinished: {} packets originated", initiate.packets);

    if let Some(()) = control::recv_matching(&mut control_rx, |event| match event {
        ControlEvent::RequestTrafficSummary => Ok(()),
        other => Err(other),
    })
    .await
    {
        let report = {
            let send = stats.send.lock().expect("send stats mutex poisoned");
            let recv = stats.receive.lock().expect("receive stats mutex poisoned");
            overlay_shared::wire::ReportTrafficSummary {
                id: own_id,
                sent: send.sent,
                received: recv.received,
                relayed: recv.relayed,
                total_sent: send.total_sent,
                total_received: recv.total_received,
            }
        };
        send_registry(&registry_write, &MiniChord {
            variant: Some(Variant::ReportTrafficSummary(report)),
        })
        .await?;
        log::info!("reported traffic summary for node {own_id}");
    }

    // Terminal: this node keeps listening, forwarding, and relaying other
    // nodes' traffic for as long as its peer connections stay open. Nothing
    // further is expected from the registry on this connection.
    let _ = tokio::signal::ctrl_c().await;
    log::warn!("received Ctrl-C, shutting down");

    shutdown_control.shutdown().await;
    forwarder_join.abort();
    Ok(())
}

async fn send_registry(write: &Arc<Mutex<tokio::net::tcp::OwnedWriteHalf>>, msg: &MiniChord) -> anyhow::Result<()> {
    let mut write = write.lock().await;
    codec::write_msg(&mut *write, msg).await
}
