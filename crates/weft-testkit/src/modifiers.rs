//! Trivial modifier plug-ins for multi-layer stacks
//!
//! A pass-through compression layer and a XOR stream cipher. Neither is
//! useful in production; both exercise the wrap-on-open machinery and the
//! remote-payload handshake path with observable effects.

use async_trait::async_trait;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use weft_core::{
    Ability, LayerKind, PluginDescription, RequirementCollection, WeftError, WeftResult,
};
use weft_stack::{BoxConnector, ModifierPlugin, SessionState, StackPlugin};

/// Default ability of the pass-through compression plug-in
pub const NULL_COMPRESSION_ABILITY: Ability = Ability(0x0301);

/// Default ability of the XOR encryption plug-in
pub const XOR_ENCRYPTION_ABILITY: Ability = Ability(0x0401);

/// Compression layer that does not compress
///
/// Stages a marker remote payload so handshake tests can check payload
/// transport for a middle layer.
pub struct NullCompressionPlugin {
    ability: Ability,
}

impl NullCompressionPlugin {
    /// Create the plug-in with the default ability
    pub fn new() -> Self {
        Self {
            ability: NULL_COMPRESSION_ABILITY,
        }
    }
}

impl Default for NullCompressionPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StackPlugin for NullCompressionPlugin {
    fn description(&self) -> PluginDescription {
        PluginDescription::new(self.ability, LayerKind::Compression)
            .with_property("algorithm", "null")
    }

    async fn prepare_session(
        &self,
        _requirements: &mut RequirementCollection,
        session: &mut SessionState,
    ) -> WeftResult<bool> {
        session.remote = Some(b"null".to_vec());
        Ok(true)
    }
}

#[async_trait]
impl ModifierPlugin for NullCompressionPlugin {
    async fn open(&self, inner: BoxConnector, _session: &SessionState) -> WeftResult<BoxConnector> {
        Ok(inner)
    }
}

/// Encryption layer XOR-masking every byte with a session key
///
/// The caller's prepare step picks the key and ships it to the peer in
/// the layer's handshake payload; both ends then wrap the connector with
/// the same mask.
pub struct XorEncryptionPlugin {
    ability: Ability,
    key: u8,
}

impl XorEncryptionPlugin {
    /// Create the plug-in with the default ability and key
    pub fn new(key: u8) -> Self {
        Self {
            ability: XOR_ENCRYPTION_ABILITY,
            key,
        }
    }
}

#[async_trait]
impl StackPlugin for XorEncryptionPlugin {
    fn description(&self) -> PluginDescription {
        PluginDescription::new(self.ability, LayerKind::Encryption)
            .with_property("cipher", "xor")
    }

    async fn prepare_session(
        &self,
        _requirements: &mut RequirementCollection,
        session: &mut SessionState,
    ) -> WeftResult<bool> {
        session.remote = Some(vec![self.key]);
        Ok(true)
    }
}

#[async_trait]
impl ModifierPlugin for XorEncryptionPlugin {
    async fn open(&self, inner: BoxConnector, session: &SessionState) -> WeftResult<BoxConnector> {
        let key = match session.remote.as_deref() {
            Some([key]) => *key,
            _ => return Err(WeftError::plugin("xor session carries no key")),
        };
        Ok(Box::new(XorStream { inner, key }))
    }
}

/// Connector wrapper masking both directions with one key byte
struct XorStream {
    inner: BoxConnector,
    key: u8,
}

impl AsyncRead for XorStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                for byte in &mut buf.filled_mut()[before..] {
                    *byte ^= this.key;
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl AsyncWrite for XorStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        // masking is position-independent, so re-masking on retry is safe
        let masked: Vec<u8> = buf.iter().map(|byte| byte ^ this.key).collect();
        Pin::new(&mut this.inner).poll_write(cx, &masked)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use weft_core::SystemId;
    use weft_stack::Direction;

    #[tokio::test]
    async fn xor_wrapping_is_symmetric() {
        let (near, far) = tokio::io::duplex(1024);
        let plugin = XorEncryptionPlugin::new(0x5A);
        let mut session = SessionState::new(
            LayerKind::Encryption,
            XOR_ENCRYPTION_ABILITY,
            SystemId::random(),
            Direction::Outgoing,
        );
        plugin
            .prepare_session(&mut RequirementCollection::new(), &mut session)
            .await
            .unwrap();

        let mut sender = ModifierPlugin::open(&plugin, Box::new(near), &session)
            .await
            .unwrap();
        let mut receiver = ModifierPlugin::open(&plugin, Box::new(far), &session)
            .await
            .unwrap();

        sender.write_all(b"secret").await.unwrap();
        sender.flush().await.unwrap();
        let mut buf = [0u8; 6];
        receiver.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"secret");
    }

    #[tokio::test]
    async fn wire_bytes_are_masked() {
        let (near, mut far) = tokio::io::duplex(1024);
        let plugin = XorEncryptionPlugin::new(0xFF);
        let mut session = SessionState::new(
            LayerKind::Encryption,
            XOR_ENCRYPTION_ABILITY,
            SystemId::random(),
            Direction::Outgoing,
        );
        plugin
            .prepare_session(&mut RequirementCollection::new(), &mut session)
            .await
            .unwrap();

        let mut sender = ModifierPlugin::open(&plugin, Box::new(near), &session)
            .await
            .unwrap();
        sender.write_all(&[0x00, 0x0F]).await.unwrap();
        sender.flush().await.unwrap();

        let mut raw = [0u8; 2];
        far.read_exact(&mut raw).await.unwrap();
        assert_eq!(raw, [0xFF, 0xF0]);
    }
}
