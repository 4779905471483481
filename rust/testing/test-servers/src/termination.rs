//! Waiting for the process to be asked to stop.

use std::fmt;
use std::io;

/// The signal that stopped a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGINT, i.e. Ctrl+C from the keyboard.
    Interrupt,
    /// SIGTERM, i.e. a normal `kill`.
    Terminate,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        })
    }
}

/// Resolves once the process receives SIGINT or, on Unix, SIGTERM.
///
/// Fails if the signal handlers cannot be installed.
pub async fn wait_for_termination() -> io::Result<Termination> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| Termination::Interrupt),
            _ = sigterm.recv() => Ok(Termination::Terminate),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(Termination::Interrupt)
    }
}
