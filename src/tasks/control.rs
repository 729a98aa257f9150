//! Sources of manual rotation commands.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::RotationCommand;

/// Forward recognised lines from stdin. End of input shuts the process down.
pub async fn run_stdin(to_rotation: Sender<RotationCommand>, cancel: CancellationToken) -> Result<()> {
    run_lines(BufReader::new(tokio::io::stdin()), to_rotation, cancel).await
}

pub async fn run_lines<R>(
    reader: R,
    to_rotation: Sender<RotationCommand>,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line? {
                Some(line) => match RotationCommand::parse(&line) {
                    Some(cmd) => {
                        if to_rotation.send(cmd).await.is_err() {
                            debug!("rotation loop gone; stopping stdin reader");
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!(input = %line.trim(), "unknown command; try n, p, t, r or q"),
                },
                None => {
                    info!("stdin closed; initiating shutdown");
                    cancel.cancel();
                    break;
                }
            },
        }
    }
    Ok(())
}

/// `SIGUSR1` → next, `SIGUSR2` → previous.
#[cfg(unix)]
pub async fn run_signals(to_rotation: Sender<RotationCommand>, cancel: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut next = signal(SignalKind::user_defined1())?;
    let mut previous = signal(SignalKind::user_defined2())?;
    loop {
        let cmd = tokio::select! {
            _ = cancel.cancelled() => break,
            received = next.recv() => match received {
                Some(()) => RotationCommand::Next,
                None => break,
            },
            received = previous.recv() => match received {
                Some(()) => RotationCommand::Previous,
                None => break,
            },
        };
        info!(?cmd, "signal received");
        if to_rotation.send(cmd).await.is_err() {
            break;
        }
    }
    Ok(())
}
