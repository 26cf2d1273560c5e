// Controller TCP client
//
// The controller protocol carries no request identifiers, so every
// command/response exchange is serialized behind a single lock. Each
// exchange dials a fresh connection, writes one frame, performs one read,
// and drops the connection before the lock is released.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::Error;
use crate::frame::{self, Command, MAX_LEVEL, RelayState};

/// TCP port the controller listens on.
pub const CONTROLLER_PORT: u16 = 52001;

/// Deadline applied to every exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

const RESPONSE_BUFFER_LEN: usize = 256;

// ── Connector ────────────────────────────────────────────────────

/// Opens the byte stream for one exchange.
///
/// [`TcpConnector`] is the production implementation; tests substitute
/// in-memory streams.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    fn connect(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;

    /// Human-readable target, used in errors and logs.
    fn addr(&self) -> &str;
}

/// Dials the controller over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// Connect to an explicit `host:port`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Connect to `host` on [`CONTROLLER_PORT`].
    pub fn for_host(host: &str) -> Self {
        Self::new(format!("{host}:{CONTROLLER_PORT}"))
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self) -> impl Future<Output = io::Result<TcpStream>> + Send {
        TcpStream::connect(self.addr.as_str())
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

// ── ControllerClient ─────────────────────────────────────────────

/// Client for the lighting controller.
///
/// Safe to share between the poll loop and command handlers; callers queue
/// on the internal lock until the in-flight exchange finishes. There are no
/// retries -- a failed call is reported and the caller decides what to do.
#[derive(Debug)]
pub struct ControllerClient<C = TcpConnector> {
    connector: C,
    timeout: Duration,
    in_flight: Mutex<()>,
}

impl ControllerClient<TcpConnector> {
    /// Client for the controller at `host` (IP or hostname, no port).
    pub fn new(host: &str) -> Self {
        Self::with_connector(TcpConnector::for_host(host))
    }
}

impl<C: Connector> ControllerClient<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            timeout: DEFAULT_TIMEOUT,
            in_flight: Mutex::new(()),
        }
    }

    /// Override the per-exchange deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The controller address this client talks to.
    pub fn addr(&self) -> &str {
        self.connector.addr()
    }

    // ── Operations ───────────────────────────────────────────────

    /// Fetch the raw level of every relay the controller reports.
    pub async fn get_state(&self) -> Result<Vec<RelayState>, Error> {
        let response = self.send(Command::State).await?;
        let states = frame::decode_state(&response);
        debug!(relays = states.len(), "decoded controller state");
        Ok(states)
    }

    pub async fn turn_on(&self, relay: u8) -> Result<(), Error> {
        self.command(Command::TurnOn(relay)).await
    }

    pub async fn turn_off(&self, relay: u8) -> Result<(), Error> {
        self.command(Command::TurnOff(relay)).await
    }

    /// Set a relay level, `level` in the controller's 0..=63 domain.
    pub async fn set_brightness(&self, relay: u8, level: u8) -> Result<(), Error> {
        self.command(Command::SetBrightness { relay, level }).await
    }

    /// Drive a relay to full brightness.
    pub async fn set_max_brightness(&self, relay: u8) -> Result<(), Error> {
        self.set_brightness(relay, MAX_LEVEL).await
    }

    // ── Exchange mechanics ───────────────────────────────────────

    async fn command(&self, command: Command) -> Result<(), Error> {
        let response = self.send(command).await?;
        frame::decode_ack(&response)
    }

    async fn send(&self, command: Command) -> Result<Vec<u8>, Error> {
        let frame = command.encode()?;

        let _guard = self.in_flight.lock().await;
        debug!(?command, addr = self.addr(), "sending controller command");

        let response = tokio::time::timeout(self.timeout, self.exchange(&frame))
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        if response.first() == Some(&frame::FRAME_START) {
            debug!(len = response.len(), "received state frame");
        } else {
            debug!(response = %response.escape_ascii(), "received reply");
        }
        Ok(response)
    }

    /// One connect/write/read cycle. The stream is dropped on return, before
    /// the caller releases the exchange lock.
    async fn exchange(&self, frame: &[u8]) -> Result<Vec<u8>, Error> {
        let mut stream = self
            .connector
            .connect()
            .await
            .map_err(|source| Error::Connect {
                addr: self.addr().to_owned(),
                source,
            })?;

        trace!(?frame, "write");
        stream.write_all(frame).await?;

        let mut buf = vec![0u8; RESPONSE_BUFFER_LEN];
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(Error::EmptyResponse);
        }
        buf.truncate(n);
        trace!(response = ?buf, "read");

        Ok(buf)
    }
}
