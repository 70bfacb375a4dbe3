//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGTERM, SIGINT, SIGHUP and SIGQUIT
//! - Forward each delivery into a bounded channel
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - All four signals mean "shut down"; SIGHUP does not reload
//! - A full channel drops the signal, one pending shutdown is enough

use std::fmt;
use std::io;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A termination signal delivered to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Interrupt,
    Hangup,
    Quit,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Terminate => "SIGTERM",
            Signal::Interrupt => "SIGINT",
            Signal::Hangup => "SIGHUP",
            Signal::Quit => "SIGQUIT",
        })
    }
}

/// Install the handlers and forward deliveries to `tx` until the receiver
/// is dropped.
///
/// Handlers are registered before this returns, so a signal sent right
/// after is not lost.
#[cfg(unix)]
pub fn forward(tx: mpsc::Sender<Signal>) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = terminate.recv() => Signal::Terminate,
                Some(()) = interrupt.recv() => Signal::Interrupt,
                Some(()) = hangup.recv() => Signal::Hangup,
                Some(()) = quit.recv() => Signal::Quit,
                _ = tx.closed() => break,
                else => break,
            };
            if tx.try_send(received).is_err() {
                tracing::debug!(signal = %received, "Shutdown already pending, signal dropped");
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn forward(tx: mpsc::Sender<Signal>) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        tracing::error!(error = %e, "Failed to listen for ctrl-c");
                        break;
                    }
                    let _ = tx.try_send(Signal::Interrupt);
                }
                _ = tx.closed() => break,
            }
        }
    }))
}
