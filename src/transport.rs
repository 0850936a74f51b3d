//! One UDP socket per session, bound to an ephemeral local port (never the
//! protocol port, which belongs to the device's own listener). A background
//! task receives datagrams and posts them to an mpsc channel; a single
//! consumer owns the session state, so no lock discipline spans the
//! socket boundary.

use crate::constants::MAX_DATAGRAM_SIZE;
use crate::error::ShadeError;
use bytes::Bytes;
use parking_lot::Mutex;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Bounded wait for the receive loop to wind down on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Inbound datagram: source address plus raw bytes.
pub type Datagram = (SocketAddr, Bytes);

pub struct Transport {
    socket: Arc<UdpSocket>,
    shutdown: Arc<Notify>,
    recv_task: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Bind an ephemeral port and start the receive loop. Returns the
    /// transport and the channel the loop feeds.
    pub async fn bind() -> Result<(Self, mpsc::Receiver<Datagram>), ShadeError> {
        let socket = Arc::new(UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?);
        let local = socket.local_addr()?;
        debug!(%local, "udp transport bound");

        let (tx, rx) = mpsc::channel(64);
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(recv_loop(socket.clone(), tx, shutdown.clone()));
        Ok((
            Self {
                socket,
                shutdown,
                recv_task: Mutex::new(Some(task)),
            },
            rx,
        ))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ShadeError> {
        Ok(self.socket.local_addr()?)
    }

    /// Fire-and-forget send; failures are logged, never surfaced.
    pub async fn send(&self, bytes: Bytes, target: SocketAddr) {
        match self.socket.send_to(&bytes, target).await {
            Ok(sent) => {
                debug!(%target, bytes = sent, frame = %hex::encode(&bytes), "sent datagram")
            }
            Err(error) => warn!(%target, %error, "failed to send datagram"),
        }
    }

    /// Signal the receive loop to stop and wait (bounded) for it to exit.
    pub async fn shutdown(&self) {
        self.shutdown.notify_one();
        let task = self.recv_task.lock().take();
        if let Some(task) = task {
            if timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("udp receive loop did not stop in time");
            }
        }
    }
}

async fn recv_loop(socket: Arc<UdpSocket>, tx: mpsc::Sender<Datagram>, shutdown: Arc<Notify>) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, source)) => {
                    let bytes = Bytes::copy_from_slice(&buf[..len]);
                    debug!(%source, len, frame = %hex::encode(&bytes), "received datagram");
                    if tx.send((source, bytes)).await.is_err() {
                        // consumer gone, nothing left to deliver to
                        break;
                    }
                }
                Err(error) => warn!(%error, "udp receive failed"),
            }
        }
    }
    debug!("udp receive loop stopped");
}
