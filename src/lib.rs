//! # ucnet-client
//!
//! Client-side engine for the UCNet control protocol spoken by
//! PreSonus-style digital mixing consoles over TCP port 53000.
//!
//! The engine handles the whole session lifecycle: framing (magic-prefixed,
//! length-prefixed binary frames with 2-byte ASCII type tags), the
//! Hello/Subscribe handshake with correlation token adoption, individual
//! float/string parameter traffic, and zlib-compressed bulk state blocks.
//!
//! ## Example
//!
//! ```ignore
//! use ucnet_client::{transport, Engine, EngineConfig, EngineEvent};
//!
//! #[tokio::main]
//! async fn main() -> ucnet_client::Result<()> {
//!     let stream = transport::connect("192.168.1.50").await?;
//!     let (engine, mut events) = Engine::connect(stream, EngineConfig::default()).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             EngineEvent::PhaseChanged(phase) if phase.is_terminal() => break,
//!             EngineEvent::PhaseChanged(_) => {
//!                 engine.set_float("line/ch1/volume", 0.75).await?;
//!             }
//!             EngineEvent::ParameterUpdated(update) => {
//!                 println!("{} = {:?}", update.path, update.value);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

mod engine;
mod writer;

pub use codec::{ClientDescriptor, ParamValue, ParameterUpdate};
pub use engine::{Engine, EngineConfig, EngineEvent};
pub use error::{Result, UcNetError};
pub use session::SessionPhase;
