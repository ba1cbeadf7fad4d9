//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers a worker reload, not shutdown

/// What an OS signal asks the server to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Shutdown,
    Reload,
}

/// Wait for the next signal the server reacts to.
#[cfg(unix)]
pub async fn next_signal() -> std::io::Result<SignalAction> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| SignalAction::Shutdown),
        _ = terminate.recv() => Ok(SignalAction::Shutdown),
        _ = hangup.recv() => Ok(SignalAction::Reload),
    }
}

/// Wait for the next signal the server reacts to.
#[cfg(not(unix))]
pub async fn next_signal() -> std::io::Result<SignalAction> {
    tokio::signal::ctrl_c().await?;
    Ok(SignalAction::Shutdown)
}
