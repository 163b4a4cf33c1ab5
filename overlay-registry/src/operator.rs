//! Operator command line: a line-oriented loop over standard input that
//! turns `list` / `setup R` / `start N` / `route` into [`OperatorCommand`]s
//! for the dispatch worker. Unknown commands are ignored, matching the
//! original tool's behaviour.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};

type RouteTable = Vec<(i32, Vec<(i32, String)>)>;

/// Commands the operator can issue to the dispatch worker.
pub enum OperatorCommand {
    List(oneshot::Sender<Vec<(i32, String)>>),
    Route(oneshot::Sender<Result<RouteTable, String>>),
    Setup(usize),
    Start(u32),
}

/// Reads commands from standard input until EOF, forwarding them to the
/// dispatch worker and printing any query results.
pub async fn run(sender: mpsc::UnboundedSender<OperatorCommand>) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                log::error!("error reading operator command: {err}");
                break;
            }
        };

        let mut parts = line.trim().split_whitespace();
        match parts.next() {
            Some("list") => {
                let (tx, rx) = oneshot::channel();
                if sender.send(OperatorCommand::List(tx)).is_err() {
                    break;
                }
                if let Ok(rows) = rx.await {
                    if rows.is_empty() {
                        log::error!("no node is connected to the registry");
                    } else {
                        println!("Node IDs and Addresses:");
                        println!("-----------------------");
                        for (id, addr) in rows {
                            println!("ID: {id}, Address: {addr}");
                        }
                    }
                }
            }
            Some("route") => {
                let (tx, rx) = oneshot::channel();
                if sender.send(OperatorCommand::Route(tx)).is_err() {
                    break;
                }
                match rx.await {
                    Ok(Ok(rows)) => {
                        for (id, table) in rows {
                            println!("Routing Table for Node {id}:");
                            println!("Node ID\tAddress");
                            println!("-------\t-------");
                            for (peer_id, addr) in table {
                                println!("{peer_id}\t{addr}");
                            }
                            println!();
                        }
                    }
                    Ok(Err(msg)) => log::error!("{msg}"),
                    Err(_) => {}
                }
            }
            Some("setup") => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
                Some(r) => {
                    if sender.send(OperatorCommand::Setup(r)).is_err() {
                        break;
                    }
                }
                None => log::error!("usage: setup <routing-table-size>"),
            },
            Some("start") => match parts.next().and_then(|n| n.parse::<u32>().ok()) {
                Some(n) => {
                    if sender.send(OperatorCommand::Start(n)).is_err() {
                        break;
                    }
                }
                None => log::error!("usage: start <num-packets>"),
            },
            _ => {}
        }
    }
}
