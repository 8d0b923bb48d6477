//! TCP pub/sub fabric
//!
//! A node binds one `PubEndpoint`; peers open a `SubConnection` to it.
//! Messages are newline-terminated JSON envelopes. Delivery is best-effort,
//! at-most-once: a subscriber that falls behind the bounded fan-out buffer
//! misses messages, and a dead connection is simply dropped.

use std::net::SocketAddr;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use vigil_core::{ShutdownToken, VigilError, VigilResult};
use vigil_wire::Envelope;

/// Fan-out buffer per publisher; subscribers lagging past this lose
/// messages rather than back-pressuring the publisher.
const PUBLISH_BUFFER: usize = 64;

/// The publish side of the mesh: accepts subscriber connections and fans
/// published envelopes out to all of them.
pub struct PubEndpoint {
    local_addr: SocketAddr,
    tx: broadcast::Sender<Vec<u8>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl PubEndpoint {
    /// Bind the publish endpoint. This is the one bind in the core that the
    /// caller should treat as fatal: a node that cannot publish cannot
    /// participate in the mesh at all.
    pub async fn bind(port: u16, shutdown: ShutdownToken) -> VigilResult<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|source| VigilError::BindFailed { port, source })?;
        let local_addr = listener.local_addr().map_err(VigilError::transport)?;

        let (tx, _) = broadcast::channel(PUBLISH_BUFFER);
        let accept_tx = tx.clone();
        let accept_task = tokio::spawn(accept_loop(listener, accept_tx, shutdown));

        Ok(PubEndpoint {
            local_addr,
            tx,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Fire-and-forget broadcast to all connected subscribers. Returns
    /// immediately; having zero subscribers is not an error.
    pub fn publish(&self, envelope: &Envelope) -> VigilResult<()> {
        let mut line = envelope.encode()?;
        line.push(b'\n');
        let _ = self.tx.send(line);
        Ok(())
    }

    /// Hand the accept-loop task to whoever joins tasks at shutdown.
    /// Present until taken.
    pub fn take_accept_task(&self) -> Option<JoinHandle<()>> {
        self.accept_task.lock().take()
    }

    /// Stop accepting. Existing writer tasks end via the shutdown token.
    pub fn abort(&self) {
        if let Some(task) = self.take_accept_task() {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: broadcast::Sender<Vec<u8>>,
    mut shutdown: ShutdownToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "subscriber connected");
                    tokio::spawn(writer_loop(stream, tx.subscribe(), shutdown.clone()));
                }
                Err(e) => {
                    tracing::warn!("accept error: {e}");
                }
            },
        }
    }
}

async fn writer_loop(
    mut stream: TcpStream,
    mut rx: broadcast::Receiver<Vec<u8>>,
    mut shutdown: ShutdownToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            line = rx.recv() => match line {
                Ok(line) => {
                    if let Err(e) = stream.write_all(&line).await {
                        tracing::debug!("subscriber dropped: {e}");
                        break;
                    }
                }
                // Lagged subscriber: skip what was lost, keep the connection.
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// A subscription to one peer's publish endpoint.
pub struct SubConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl SubConnection {
    pub async fn open(addr: SocketAddr) -> VigilResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(VigilError::transport)?;
        Ok(SubConnection {
            stream,
            peer_addr: addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Read envelopes until shutdown or a socket error. Decode errors are
    /// logged and the offending line dropped; socket errors and EOF return
    /// `Err` so the owner can run its reconnect policy.
    pub async fn run(
        self,
        tx: mpsc::Sender<Envelope>,
        mut shutdown: ShutdownToken,
    ) -> VigilResult<()> {
        let mut reader = BufReader::new(self.stream);
        let mut line = String::new();

        loop {
            line.clear();
            tokio::select! {
                _ = shutdown.wait() => return Ok(()),
                read = reader.read_line(&mut line) => match read {
                    Ok(0) => {
                        return Err(VigilError::Transport(format!(
                            "connection to {} closed",
                            self.peer_addr
                        )));
                    }
                    Ok(_) => match Envelope::decode(line.trim_end().as_bytes()) {
                        Ok(envelope) => {
                            // Receiver gone means the consumer shut down first.
                            if tx.send(envelope).await.is_err() {
                                return Ok(());
                            }
                        }
                        Err(e) => {
                            tracing::warn!(peer = %self.peer_addr, "dropping undecodable message: {e}");
                        }
                    },
                    Err(e) => return Err(VigilError::transport(e)),
                },
            }
        }
    }
}
