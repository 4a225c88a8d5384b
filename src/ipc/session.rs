use super::protocol::{IpcCommand, IpcEvent};
use super::router::Router;
use crate::channel::{ChannelNode, DeliveryQueue};
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::io::{self, BufRead, Write};
use std::thread::{self, JoinHandle};

// ============================================================================
// Stdin Reader Thread
// ============================================================================

fn spawn_reader<R>(input: R, commands: Sender<IpcCommand>, events: Sender<IpcEvent>) -> Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("ipc-reader".to_string())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        tracing::warn!(error = %err, "input read failed");
                        break;
                    }
                };

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match serde_json::from_str::<IpcCommand>(trimmed) {
                    Ok(cmd) => {
                        if commands.send(cmd).is_err() {
                            break; // Session loop has exited
                        }
                    }
                    Err(e) => {
                        let _ = events.send(IpcEvent::ProtocolError {
                            message: format!("Invalid command: {e}"),
                        });
                    }
                }
            }
            tracing::debug!("input reader exiting");
        })
        .context("failed to spawn input reader")
}

// ============================================================================
// Event Writer Thread
// ============================================================================

fn write_event<W: Write>(output: &mut W, event: &IpcEvent) -> io::Result<()> {
    let json = serde_json::to_string(event).map_err(io::Error::other)?;
    writeln!(output, "{json}")?;
    output.flush()
}

/// Writes events until `done` fires, then drains what is left and hands the
/// writer back.
fn spawn_writer<W>(mut output: W, events: Receiver<IpcEvent>, done: Receiver<()>) -> Result<JoinHandle<io::Result<W>>>
where
    W: Write + Send + 'static,
{
    thread::Builder::new()
        .name("ipc-writer".to_string())
        .spawn(move || {
            loop {
                select! {
                    recv(events) -> event => match event {
                        Ok(event) => write_event(&mut output, &event)?,
                        Err(_) => break,
                    },
                    recv(done) -> _ => {
                        for event in events.try_iter() {
                            write_event(&mut output, &event)?;
                        }
                        break;
                    }
                }
            }
            output.flush()?;
            Ok(output)
        })
        .context("failed to spawn event writer")
}

// ============================================================================
// Session Loop
// ============================================================================

/// Serve `root` under `root_path` over a JSON-lines transport until `input`
/// reaches EOF. Returns the writer once every event has been flushed.
///
/// Commands and queued deliveries are handled on the calling thread, so every
/// sink and subscription slot is touched from here only. At EOF, active
/// listens are cancelled, then the tree is disposed exactly once.
pub fn run_session<R, W>(
    mut root: ChannelNode,
    root_path: &str,
    queue: &DeliveryQueue,
    input: R,
    output: W,
) -> Result<W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    let (event_tx, event_rx) = unbounded::<IpcEvent>();
    let (done_tx, done_rx) = bounded::<()>(1);
    let writer = spawn_writer(output, event_rx, done_rx)?;

    let mut router = Router::new(event_tx.clone());
    root.setup(root_path, &mut router)
        .with_context(|| format!("failed to bind channels under '{root_path}'"))?;
    router.emit_channels();

    let (cmd_tx, cmd_rx) = unbounded::<IpcCommand>();
    let reader = spawn_reader(input, cmd_tx, event_tx)?;
    tracing::info!(root = root_path, "session started");

    let tasks = queue.tasks();
    let mut commands_seen: u64 = 0;
    loop {
        select! {
            recv(cmd_rx) -> cmd => match cmd {
                Ok(cmd) => {
                    commands_seen += 1;
                    tracing::debug!(?cmd, "command received");
                    router.handle(cmd);
                }
                Err(_) => {
                    tracing::debug!("input closed");
                    break;
                }
            },
            recv(tasks) -> task => {
                if let Ok(task) = task {
                    task();
                }
            }
        }
    }

    queue.run_pending();
    router.shutdown();
    root.dispose();
    queue.run_pending();
    if queue.dropped() > 0 {
        tracing::warn!(dropped = queue.dropped(), "deliveries dropped on a full queue");
    }
    tracing::info!(commands = commands_seen, "session finished");

    if reader.join().is_err() {
        tracing::warn!("input reader panicked");
    }
    drop(router);
    let _ = done_tx.send(());
    writer
        .join()
        .map_err(|_| anyhow!("event writer panicked"))?
        .context("failed to write events")
}

/// [`run_session`] over the process's stdin and stdout.
pub fn run_stdio_session(root: ChannelNode, root_path: &str, queue: &DeliveryQueue) -> Result<()> {
    let stdin = io::BufReader::new(io::stdin());
    run_session(root, root_path, queue, stdin, io::stdout())?;
    Ok(())
}
