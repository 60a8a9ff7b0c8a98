//! Packet sinks the streamers write to.
//!
//! A sink receives one encoded packet per call and preserves order. UDP
//! sinks map each packet to one datagram; file sinks append packets back
//! to back; the memory sink keeps them for inspection.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::UdpSocket;

use crate::error::FireflyError;

// ── PacketSink ───────────────────────────────────────────────────

/// An ordered destination for encoded packets.
#[async_trait]
pub trait PacketSink: Send + Sync {
    /// Write a single packet.
    async fn send_packet(&self, packet: &[u8]) -> Result<(), FireflyError>;
}

// ── UdpSink ──────────────────────────────────────────────────────

/// A connected UDP socket; every packet becomes one datagram.
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    remote_addr: SocketAddr,
    timeout: Option<Duration>,
}

impl UdpSink {
    /// Bind an ephemeral local port and connect it to `remote_addr`.
    pub async fn connect(remote_addr: SocketAddr) -> Result<Self, FireflyError> {
        let local = if remote_addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote_addr).await?;
        Ok(Self::new(socket, remote_addr))
    }

    /// Wrap an already connected socket.
    pub fn new(socket: UdpSocket, remote_addr: SocketAddr) -> Self {
        Self {
            socket,
            remote_addr,
            timeout: None,
        }
    }

    /// Fail writes that take longer than `timeout` instead of stalling
    /// the pipeline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The remote address this sink targets.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

#[async_trait]
impl PacketSink for UdpSink {
    async fn send_packet(&self, packet: &[u8]) -> Result<(), FireflyError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.socket.send(packet))
                .await
                .map_err(|_| FireflyError::Timeout(limit))??,
            None => self.socket.send(packet).await?,
        };
        Ok(())
    }
}

// ── FileSink ─────────────────────────────────────────────────────

/// Appends packets to a file, e.g. for diagnostic captures.
#[derive(Debug)]
pub struct FileSink {
    file: tokio::sync::Mutex<File>,
}

impl FileSink {
    /// Create (or truncate) the file at `path`.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, FireflyError> {
        let file = File::create(path).await?;
        Ok(Self {
            file: tokio::sync::Mutex::new(file),
        })
    }
}

#[async_trait]
impl PacketSink for FileSink {
    async fn send_packet(&self, packet: &[u8]) -> Result<(), FireflyError> {
        let mut file = self.file.lock().await;
        file.write_all(packet).await?;
        file.flush().await?;
        Ok(())
    }
}

// ── MemorySink ───────────────────────────────────────────────────

/// Keeps every packet in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    packets: Mutex<Vec<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of all packets received so far.
    pub fn packets(&self) -> Vec<Vec<u8>> {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl PacketSink for MemorySink {
    async fn send_packet(&self, packet: &[u8]) -> Result<(), FireflyError> {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(packet.to_vec());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
