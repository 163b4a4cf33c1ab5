//! Peer dialing: up to 10 attempts, no backoff. This is the system's only
//! bounded retry policy and is deliberately left tight — see the design
//! notes on why it isn't given a backoff.

use anyhow::{Context, Result};
use tokio::net::TcpStream;

const MAX_ATTEMPTS: u32 = 10;

pub async fn dial_peer(addr: &str) -> Result<TcpStream> {
    let mut last_err = None;
    for _ in 0..MAX_ATTEMPTS {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.expect("loop runs at least once"))
        .with_context(|| format!("dialing peer {addr} after {MAX_ATTEMPTS} attempts"))
}
