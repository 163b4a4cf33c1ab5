//! Entry point for `overlay-registryd`.

mod cli;
mod dispatch;
mod listener;
mod operator;
mod routing;
mod state;
mod summary;

use anyhow::Context;
use clap::Parser;
use overlay_shared::shutdown;
use std::backtrace::Backtrace;
use std::panic;
use tokio::signal::ctrl_c;

fn main() -> Result<(), i32> {
    match inner_main() {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("{err:#}");
            Err(1)
        }
    }
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

    rt.block_on(async move {
        let (shutdown, shutdown_control) = shutdown::new();

        let (handles, mut dispatch_join) = dispatch::spawn(shutdown.clone());
        let operator_join = tokio::spawn(operator::run(handles.operator.clone()));
        let listener_join = tokio::spawn(listener::run(
            args.listen_addr.clone(),
            handles,
            shutdown.clone(),
        ));

        log::info!("waiting for Ctrl-C ...");
        tokio::select! {
            _ = ctrl_c() => {
                log::warn!("received Ctrl-C, shutting down ...");
            }
            result = &mut dispatch_join => {
                // The dispatch worker only ever returns on a fatal round
                // error (NodeRegistryResponse or TaskFinished with id > 127):
                // the round cannot proceed, so the whole process terminates.
                operator_join.abort();
                listener_join.abort();
                return match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(err).context("registry dispatch worker exited with a fatal round error"),
                    Err(err) => Err(err).context("registry dispatch worker task panicked"),
                };
            }
        }

        tokio::select! {
            _ = shutdown_control.shutdown() => {
                log::warn!("shutdown completed");
            }
            _ = ctrl_c() => {
                log::warn!("shutdown forced");
            }
        }

        operator_join.abort();
        listener_join.abort();
        let _ = dispatch_join.await;

        Ok(())
    })
}
