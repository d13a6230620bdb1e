//! Transport abstraction and TCP connection helper.
//!
//! The engine is written against any bidirectional byte stream so tests
//! can run over an in-memory duplex; production connections use TCP to
//! the console's control port.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::Result;

/// TCP control port consoles listen on.
pub const CONTROL_PORT: u16 = 53000;

/// Any bidirectional byte stream the engine can run over.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

/// Open a TCP connection to a console's control port.
///
/// `TCP_NODELAY` is set so small parameter frames are not coalesced;
/// fader moves stream as many tiny writes and Nagle delay is audible.
pub async fn connect(host: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, CONTROL_PORT)).await?;
    stream.set_nodelay(true)?;
    tracing::debug!(host, port = CONTROL_PORT, "connected to console");
    Ok(stream)
}
