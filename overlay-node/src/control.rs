//! Reads the persistent control connection to the Registry and fans every
//! parsed message out to every interested subscriber.
//!
//! A broadcast channel is used rather than a plain mpsc because two
//! independent tasks need to see control traffic: the startup/round state
//! machine in [`crate::main`] waiting for the next expected message, and
//! the stdin handler waiting for a `DeregistrationResponse` if the operator
//! types `exit` before setup completes.

use overlay_shared::codec;
use overlay_shared::wire::mini_chord::Variant;
use overlay_shared::wire::{
    DeregistrationResponse, InitiateTask, NodeRegistry, RegistrationResponse,
};
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum ControlEvent {
    RegistrationResponse(RegistrationResponse),
    DeregistrationResponse(DeregistrationResponse),
    NodeRegistry(NodeRegistry),
    InitiateTask(InitiateTask),
    RequestTrafficSummary,
}

/// Reads from the registry connection until it closes or a framing error
/// occurs, broadcasting every recognised variant.
pub async fn run(mut read: OwnedReadHalf, tx: broadcast::Sender<ControlEvent>) {
    loop {
        let msg = match codec::read_msg(&mut read).await {
            Ok(msg) => msg,
            Err(_) => return,
        };

        let event = match msg.variant {
            Some(Variant::RegistrationResponse(r)) => ControlEvent::RegistrationResponse(r),
            Some(Variant::DeregistrationResponse(r)) => ControlEvent::DeregistrationResponse(r),
            Some(Variant::NodeRegistry(r)) => ControlEvent::NodeRegistry(r),
            Some(Variant::InitiateTask(r)) => ControlEvent::InitiateTask(r),
            Some(Variant::RequestTrafficSummary(_)) => ControlEvent::RequestTrafficSummary,
            other => {
                log::warn!("unexpected message on control connection: {other:?}");
                continue;
            }
        };

        // No receivers is possible for a brief window during shutdown; not
        // an error condition worth logging.
        let _ = tx.send(event);
    }
}

/// Awaits the next control event satisfying `matcher`, discarding anything
/// else (another subscriber may care about it) and returning `None` once
/// the connection closes.
pub async fn recv_matching<T>(
    rx: &mut broadcast::Receiver<ControlEvent>,
    matcher: impl Fn(ControlEvent) -> Result<T, ControlEvent>,
) -> Option<T> {
    loop {
        match rx.recv().await {
            Ok(event) => match matcher(event) {
                Ok(value) => return Some(value),
                Err(_unmatched) => continue,
            },
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
