//! Byte-stream connector abstraction
//!
//! A connector is whatever the transport layer opened, wrapped zero or
//! more times by modifier layers. Layers only ever see the async stream
//! interface.

use tokio::io::{AsyncRead, AsyncWrite};

/// Bidirectional byte stream between two systems
pub trait Connector: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Connector for T where T: AsyncRead + AsyncWrite + Send + Unpin + ?Sized {}

/// Owned, type-erased connector handed between layers
pub type BoxConnector = Box<dyn Connector>;
