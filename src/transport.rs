use crate::config::LinkConfig;
use crate::constants::*;
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Byte-level capability the transaction engine drives.
#[async_trait]
pub trait Link: Send {
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Reads at most `buf.len()` bytes, returning 0 if nothing arrived before `deadline`.
    async fn recv_into(&mut self, buf: &mut [u8], deadline: Instant) -> Result<usize>;

    /// Discards buffered input left over from an earlier exchange.
    async fn clear_input(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Serial { port: String, baud_rate: u32 },
    Tcp { addr: String },
}

impl Endpoint {
    /// `host:port` selects TCP; anything else is a serial port name.
    pub fn parse(endpoint: &str, baud_rate: u32) -> Self {
        if endpoint.contains(':') {
            Endpoint::Tcp {
                addr: endpoint.to_string(),
            }
        } else {
            Endpoint::Serial {
                port: endpoint.to_string(),
                baud_rate,
            }
        }
    }
}

pub enum Transport {
    Serial {
        name: String,
        port: Arc<Mutex<Box<dyn SerialPort>>>,
    },
    Stream {
        addr: String,
        stream: TcpStream,
    },
}

impl Transport {
    /// Opens the link once. Failure is final for this instance.
    pub async fn open(config: &LinkConfig) -> Result<Self> {
        match Endpoint::parse(&config.endpoint, config.baud_rate) {
            Endpoint::Serial { port, baud_rate } => {
                let name = port.clone();
                let opened = tokio::task::spawn_blocking(move || {
                    serialport::new(&port, baud_rate)
                        .timeout(Duration::from_millis(SERIAL_READ_TIMEOUT_MS))
                        .open()
                })
                .await?
                .map_err(|e| {
                    warn!("Failed to open serial port {}: {}", name, e);
                    Error::Config(format!("cannot open serial port {}: {}", name, e))
                })?;
                info!("Connected via serial {} @ {} baud", name, config.baud_rate);
                Ok(Transport::Serial {
                    name,
                    port: Arc::new(Mutex::new(opened)),
                })
            }
            Endpoint::Tcp { addr } => {
                let timeout = Duration::from_millis(config.connect_timeout_ms);
                let connect = TcpStream::connect(addr.as_str());
                let stream = match tokio::time::timeout(timeout, connect).await {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(e)) => {
                        warn!("Failed to connect to {}: {}", addr, e);
                        return Err(Error::Config(format!("cannot connect to {}: {}", addr, e)));
                    }
                    Err(_) => {
                        warn!("Connect to {} timed out after {:?}", addr, timeout);
                        return Err(Error::Config(format!("connect to {} timed out", addr)));
                    }
                };
                stream.set_nodelay(true)?;
                info!("Connected via TCP {}", addr);
                Ok(Transport::Stream { addr, stream })
            }
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            Transport::Serial { name, .. } => name,
            Transport::Stream { addr, .. } => addr,
        }
    }
}

#[async_trait]
impl Link for Transport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            Transport::Serial { port, .. } => {
                let port = Arc::clone(port);
                let data = bytes.to_vec();
                tokio::task::spawn_blocking(move || -> io::Result<()> {
                    let mut port = port.lock();
                    port.write_all(&data)?;
                    port.flush()
                })
                .await??;
                Ok(())
            }
            Transport::Stream { stream, .. } => {
                stream.write_all(bytes).await?;
                stream.flush().await?;
                Ok(())
            }
        }
    }

    async fn recv_into(&mut self, buf: &mut [u8], deadline: Instant) -> Result<usize> {
        if buf.is_empty() || Instant::now() >= deadline {
            return Ok(0);
        }
        match self {
            Transport::Serial { port, .. } => {
                let port = Arc::clone(port);
                let want = buf.len();
                let chunk = tokio::task::spawn_blocking(move || -> io::Result<Vec<u8>> {
                    let mut tmp = vec![0u8; want];
                    match port.lock().read(&mut tmp) {
                        Ok(n) => {
                            tmp.truncate(n);
                            Ok(tmp)
                        }
                        Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
                        Err(e) => Err(e),
                    }
                })
                .await??;
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            Transport::Stream { stream, .. } => {
                match tokio::time::timeout_at(deadline, stream.read(buf)).await {
                    Err(_) => Ok(0),
                    Ok(Ok(0)) => Err(Error::ConnectionClosed),
                    Ok(Ok(n)) => Ok(n),
                    Ok(Err(e)) => Err(e.into()),
                }
            }
        }
    }

    async fn clear_input(&mut self) -> Result<()> {
        if let Transport::Serial { port, .. } = self {
            let port = Arc::clone(port);
            tokio::task::spawn_blocking(move || port.lock().clear(ClearBuffer::Input)).await??;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Transport::Stream { addr, stream } = self {
            debug!("Shutting down TCP link {}", addr);
            stream.shutdown().await?;
        }
        Ok(())
    }
}
