//! UDP transport for swarm messages

use crate::error::SwarmError;
use crate::types::{ControlSignal, Message};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Devices send short text datagrams
const MAX_MSG_SIZE: usize = 1024;

/// Outcome of one bounded receive
#[derive(Debug)]
pub enum Received {
    Datagram(Vec<u8>, SocketAddr),
    /// Nothing arrived before the timeout
    Idle,
}

/// Broadcast-enabled UDP socket shared by the ingestion and control tasks
#[derive(Clone)]
pub struct Transport {
    socket: Arc<UdpSocket>,
}

impl Transport {
    /// Bind to `0.0.0.0:<port>` with broadcast enabled
    pub async fn bind(port: u16) -> Result<Self, SwarmError> {
        let addr = format!("0.0.0.0:{}", port);
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|source| SwarmError::Bind { port, source })?;
        socket
            .set_broadcast(true)
            .map_err(|source| SwarmError::Bind { port, source })?;

        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Get the local address this transport is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }

    /// Wait up to `timeout` for one datagram
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<Received, std::io::Error> {
        let mut buf = vec![0u8; MAX_MSG_SIZE];
        match tokio::time::timeout(timeout, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, src))) => {
                buf.truncate(len);
                Ok(Received::Datagram(buf, src))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(Received::Idle),
        }
    }

    /// Send a message to a specific address
    pub async fn send(&self, msg: &Message, addr: SocketAddr) -> Result<(), std::io::Error> {
        let bytes = msg.to_bytes();
        debug!("Sending {:?} to {}", msg, addr);
        self.socket.send_to(&bytes, addr).await?;
        Ok(())
    }

    /// Send a control token to the broadcast address
    pub async fn broadcast_control(&self, signal: ControlSignal, addr: SocketAddr) -> Result<(), std::io::Error> {
        self.send(&Message::Control(signal), addr).await
    }
}

/// Control sender task: forwards queued signals to the broadcast address.
/// Send failures are logged and the task keeps going.
pub async fn run_control_sender(
    transport: Transport,
    mut signals: mpsc::Receiver<ControlSignal>,
    broadcast: SocketAddr,
    running: Arc<AtomicBool>,
    poll: Duration,
) {
    while running.load(Ordering::SeqCst) {
        match tokio::time::timeout(poll, signals.recv()).await {
            Ok(Some(signal)) => match transport.broadcast_control(signal, broadcast).await {
                Ok(()) => info!("Transport: {} sent to {}", signal, broadcast),
                Err(e) => warn!("Transport: Failed to send {} to {}: {}", signal, broadcast, e),
            },
            Ok(None) => break,
            Err(_) => {}
        }
    }
    debug!("Transport: Control sender stopped");
}
