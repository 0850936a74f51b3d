//! Broadcast discovery and one-shot device queries. Discovery owns its own
//! short-lived sockets, never a session's: one broadcast-capable socket per
//! enabled IPv4 interface, one probe each, replies collected until the scan
//! window closes.

use crate::constants::{
    BROADCAST_ADDR, DEVICE_PORT, DISCOVERY_TIMEOUT, MAX_DATAGRAM_SIZE, NAME_LOOKUP_TIMEOUT,
    NAME_RETRY_PAUSE,
};
use crate::error::ShadeError;
use crate::message::{Command, Reply, SerialReply};
use crate::packet::Frame;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// One device found during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryResult {
    pub ip: IpAddr,
    pub serial: u64,
    pub model: u8,
}

/// Collects unique devices within one scan window; the first reply per
/// source address wins, later duplicates are dropped.
#[derive(Debug, Default)]
pub struct DiscoveryCollector {
    seen: HashSet<IpAddr>,
    results: Vec<DiscoveryResult>,
}

impl DiscoveryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw datagram; returns the result when it is a new device.
    pub fn ingest(&mut self, source: IpAddr, bytes: Bytes) -> Option<&DiscoveryResult> {
        if self.seen.contains(&source) {
            return None;
        }
        let frame = Frame::try_from(bytes).ok()?;
        let Ok(Reply::Serial(reply)) = Reply::try_from(frame) else {
            return None;
        };
        self.seen.insert(source);
        self.results.push(DiscoveryResult {
            ip: source,
            serial: reply.serial,
            model: reply.model,
        });
        self.results.last()
    }

    pub fn into_results(self) -> Vec<DiscoveryResult> {
        self.results
    }
}

/// Broadcast scan with the default window.
pub async fn discover() -> Vec<DiscoveryResult> {
    discover_for(DISCOVERY_TIMEOUT).await
}

/// Broadcast a serial probe on every usable interface and collect replies
/// until the window closes. Interfaces that fail to bind are skipped;
/// returns whatever the remaining sockets heard, possibly nothing.
pub async fn discover_for(window: Duration) -> Vec<DiscoveryResult> {
    let probe: Bytes = Command::GetSerial.to_frame(1).into();

    let mut sockets = Vec::new();
    for iface in if_addrs::get_if_addrs().unwrap_or_default() {
        if iface.is_loopback() {
            continue;
        }
        let if_addrs::IfAddr::V4(ref v4) = iface.addr else {
            continue;
        };
        match broadcast_socket(v4.ip).await {
            Ok(socket) => {
                debug!(interface = %iface.name, addr = %v4.ip, "bound discovery socket");
                sockets.push(socket);
            }
            Err(error) => {
                warn!(interface = %iface.name, addr = %v4.ip, %error, "skipping interface, bind failed")
            }
        }
    }
    if sockets.is_empty() {
        warn!("no usable interfaces for discovery");
        return Vec::new();
    }

    let target = SocketAddr::from((BROADCAST_ADDR, DEVICE_PORT));
    for socket in &sockets {
        if let Err(error) = socket.send_to(&probe, target).await {
            warn!(%error, "failed to send discovery probe");
        }
    }

    // fan every socket into one channel and drain it until the deadline
    let (tx, mut rx) = mpsc::channel::<(SocketAddr, Bytes)>(32);
    let mut readers = Vec::new();
    for socket in sockets {
        let tx = tx.clone();
        readers.push(tokio::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM_SIZE];
            while let Ok((len, source)) = socket.recv_from(&mut buf).await {
                let bytes = Bytes::copy_from_slice(&buf[..len]);
                if tx.send((source, bytes)).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let mut collector = DiscoveryCollector::new();
    let deadline = sleep(window);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            received = rx.recv() => match received {
                Some((source, bytes)) => {
                    if let Some(found) = collector.ingest(source.ip(), bytes) {
                        info!(ip = %found.ip, serial = found.serial, model = found.model, "discovered shade controller");
                    }
                }
                None => break,
            }
        }
    }
    for reader in &readers {
        reader.abort();
    }

    let results = collector.into_results();
    info!(count = results.len(), "discovery complete");
    results
}

async fn broadcast_socket(addr: Ipv4Addr) -> Result<UdpSocket, ShadeError> {
    let socket = UdpSocket::bind((addr, 0)).await?;
    socket.set_broadcast(true)?;
    Ok(socket)
}

/// Ask a device for its human-readable name with the default per-attempt
/// timeout. Tries the shade-name query first, then the gateway device-name
/// query, each with one retry after a short pause. `None` when both fail.
pub async fn get_device_name(ip: IpAddr) -> Option<String> {
    get_device_name_with_timeout(ip, NAME_LOOKUP_TIMEOUT).await
}

pub async fn get_device_name_with_timeout(ip: IpAddr, reply_timeout: Duration) -> Option<String> {
    for command in [Command::GetShadeName, Command::GetDeviceName] {
        for attempt in 0..2 {
            match query_name(ip, command, reply_timeout).await {
                Ok(Some(name)) => {
                    debug!(%ip, name, "got device name");
                    return Some(name);
                }
                Ok(None) => {}
                Err(error) => {
                    debug!(%ip, ?command, attempt = attempt + 1, %error, "name query failed")
                }
            }
            if attempt == 0 {
                sleep(NAME_RETRY_PAUSE).await;
            }
        }
    }
    debug!(%ip, "no device name obtained");
    None
}

async fn query_name(
    ip: IpAddr,
    command: Command,
    reply_timeout: Duration,
) -> Result<Option<String>, ShadeError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    let probe: Bytes = command.to_frame(1).into();
    socket.send_to(&probe, (ip, DEVICE_PORT)).await?;

    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    let (len, _) = timeout(reply_timeout, socket.recv_from(&mut buf)).await??;
    let frame = Frame::try_from(Bytes::copy_from_slice(&buf[..len]))?;
    Ok(match Reply::try_from(frame)? {
        Reply::ShadeName(name) | Reply::DeviceName(name) if !name.is_empty() => Some(name),
        _ => None,
    })
}

/// Confirm a manually-entered address really is a shade controller, with
/// the default reply timeout.
pub async fn verify_device(ip: IpAddr) -> Option<DiscoveryResult> {
    verify_device_with_timeout(ip, NAME_LOOKUP_TIMEOUT).await
}

/// One serial round trip, accepted only when the device reports the same IP
/// it was queried at.
pub async fn verify_device_with_timeout(
    ip: IpAddr,
    reply_timeout: Duration,
) -> Option<DiscoveryResult> {
    match serial_probe(ip, reply_timeout).await {
        Ok(reply) if IpAddr::from(reply.reported_ip) == ip => Some(DiscoveryResult {
            ip,
            serial: reply.serial,
            model: reply.model,
        }),
        Ok(reply) => {
            debug!(%ip, reported = %reply.reported_ip, "serial reply address mismatch");
            None
        }
        Err(error) => {
            debug!(%ip, %error, "device verification failed");
            None
        }
    }
}

async fn serial_probe(ip: IpAddr, reply_timeout: Duration) -> Result<SerialReply, ShadeError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    let probe: Bytes = Command::GetSerial.to_frame(1).into();
    socket.send_to(&probe, (ip, DEVICE_PORT)).await?;

    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    let (len, _) = timeout(reply_timeout, socket.recv_from(&mut buf)).await??;
    let frame = Frame::try_from(Bytes::copy_from_slice(&buf[..len]))?;
    match Reply::try_from(frame)? {
        Reply::Serial(reply) => Ok(reply),
        other => Err(ShadeError::Protocol(format!(
            "expected serial reply, got {other:?}"
        ))),
    }
}
