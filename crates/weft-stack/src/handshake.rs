//! Fixed binary handshake exchanged right after a connector opens
//!
//! Wire layout, written before any application data:
//!
//! ```text
//! sourceSystemId[20] | layerCount:u16 | { ability:u16 | remoteLen:i16 | remoteData } * layerCount
//! ```
//!
//! All integers big-endian. `remoteLen` of `-1` marks an absent remote
//! payload. Layers are listed head (semantic) to tail-minus-one; the
//! transport layer opened the connector and never appears in the body.
//! The receiver rebuilds an incoming session chain with matching
//! abilities, payloads, and order.

use crate::session::{Direction, SessionChain, SessionState};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;
use weft_core::{Ability, LayerKind, SystemId, WeftError, WeftResult, SYSTEM_ID_LEN};

/// Sentinel length marking an absent remote payload
const REMOTE_ABSENT: i16 = -1;

/// Write the handshake for an outgoing chain
pub async fn write_handshake<W>(
    writer: &mut W,
    source: SystemId,
    chain: &SessionChain,
) -> WeftResult<()>
where
    W: AsyncWrite + Unpin,
{
    let layers = chain.above_transport();
    let count = u16::try_from(layers.len())
        .map_err(|_| WeftError::handshake("more layers than the count field can carry"))?;

    writer.write_all(source.as_bytes()).await?;
    writer.write_u16(count).await?;
    for session in layers {
        if session.remote.is_some() && !session.kind().carries_remote_payload() {
            return Err(WeftError::handshake(format!(
                "{} layer cannot carry a remote payload",
                session.kind()
            )));
        }
        writer.write_u16(session.ability().code()).await?;
        match &session.remote {
            Some(payload) => {
                let len = i16::try_from(payload.len()).map_err(|_| {
                    WeftError::handshake(format!(
                        "remote payload of {} bytes exceeds the length field",
                        payload.len()
                    ))
                })?;
                writer.write_i16(len).await?;
                writer.write_all(payload).await?;
            }
            None => writer.write_i16(REMOTE_ABSENT).await?,
        }
    }
    writer.flush().await?;
    trace!(source = %source, layers = count, "wrote handshake");
    Ok(())
}

/// Read a handshake and reconstruct the peer's chain as incoming sessions
///
/// Returns the peer's system id and the rebuilt chain, head to tail in the
/// order the peer listed its layers.
pub async fn read_handshake<R>(reader: &mut R) -> WeftResult<(SystemId, SessionChain)>
where
    R: AsyncRead + Unpin,
{
    let mut id_bytes = [0u8; SYSTEM_ID_LEN];
    reader.read_exact(&mut id_bytes).await?;
    let source = SystemId::from_bytes(id_bytes);

    let count = reader.read_u16().await?;
    let mut nodes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let ability = Ability::new(reader.read_u16().await?);
        let kind = ability.layer()?;
        if kind == LayerKind::Transport {
            return Err(WeftError::handshake(
                "transport layer appeared in handshake body",
            ));
        }
        let mut session = SessionState::new(kind, ability, source, Direction::Incoming);
        let len = reader.read_i16().await?;
        if len >= 0 {
            if !kind.carries_remote_payload() {
                return Err(WeftError::handshake(format!(
                    "{kind} layer carried a remote payload"
                )));
            }
            let mut payload = vec![0u8; len as usize];
            reader.read_exact(&mut payload).await?;
            session.remote = Some(payload);
        } else if len != REMOTE_ABSENT {
            return Err(WeftError::handshake(format!(
                "invalid remote payload length {len}"
            )));
        }
        nodes.push(session);
    }

    trace!(source = %source, layers = count, "read handshake");
    let chain = SessionChain::incoming(nodes)?;
    Ok((source, chain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn outgoing_chain(layers: Vec<(u16, Option<Vec<u8>>)>) -> SessionChain {
        let target = SystemId::from_bytes([3u8; 20]);
        let mut nodes = Vec::new();
        for (ability, remote) in layers {
            let ability = Ability::new(ability);
            let mut session = SessionState::new(
                ability.layer().unwrap(),
                ability,
                target,
                Direction::Outgoing,
            );
            session.remote = remote;
            nodes.push(session);
        }
        nodes.push(SessionState::new(
            LayerKind::Transport,
            Ability::new(0x0600),
            target,
            Direction::Outgoing,
        ));
        SessionChain::outgoing(nodes).unwrap()
    }

    #[tokio::test]
    async fn minimal_chain_serializes_to_26_bytes() {
        // one semantic layer above transport, no remote payload:
        // 20 id bytes + count 0x0001 + ability 0x0101 + length 0xFFFF
        let source = SystemId::from_bytes([0xAB; 20]);
        let chain = outgoing_chain(vec![(0x0101, None)]);

        let mut wire = Vec::new();
        write_handshake(&mut wire, source, &chain).await.unwrap();

        assert_eq!(wire.len(), 26);
        assert_eq!(&wire[..20], &[0xAB; 20]);
        assert_eq!(&wire[20..22], &[0x00, 0x01]);
        assert_eq!(&wire[22..24], &[0x01, 0x01]);
        assert_eq!(&wire[24..], &[0xFF, 0xFF]);
    }

    #[tokio::test]
    async fn round_trip_preserves_order_and_payloads() {
        let source = SystemId::random();
        let chain = outgoing_chain(vec![
            (0x0101, Some(vec![1])),
            (0x0302, None),
            (0x0401, Some(vec![9, 9, 9])),
        ]);

        let mut wire = Vec::new();
        write_handshake(&mut wire, source, &chain).await.unwrap();
        let (peer, rebuilt) = read_handshake(&mut wire.as_slice()).await.unwrap();

        assert_eq!(peer, source);
        assert!(rebuilt.is_incoming());
        assert_eq!(rebuilt.len(), 3);
        let abilities: Vec<u16> = rebuilt.nodes().iter().map(|n| n.ability().code()).collect();
        assert_eq!(abilities, vec![0x0101, 0x0302, 0x0401]);
        assert_eq!(rebuilt.nodes()[0].remote.as_deref(), Some(&[1][..]));
        assert_eq!(rebuilt.nodes()[1].remote, None);
        assert_eq!(rebuilt.nodes()[2].remote.as_deref(), Some(&[9, 9, 9][..]));
        assert_eq!(rebuilt.head().target(), source);
    }

    #[tokio::test]
    async fn empty_remote_payload_differs_from_absent() {
        let source = SystemId::random();
        let chain = outgoing_chain(vec![(0x0101, Some(Vec::new()))]);

        let mut wire = Vec::new();
        write_handshake(&mut wire, source, &chain).await.unwrap();
        let (_, rebuilt) = read_handshake(&mut wire.as_slice()).await.unwrap();
        assert_eq!(rebuilt.head().remote.as_deref(), Some(&[][..]));
    }

    #[tokio::test]
    async fn truncated_handshake_fails() {
        let source = SystemId::random();
        let chain = outgoing_chain(vec![(0x0101, Some(vec![1, 2, 3, 4]))]);

        let mut wire = Vec::new();
        write_handshake(&mut wire, source, &chain).await.unwrap();
        wire.truncate(wire.len() - 2);
        let err = read_handshake(&mut wire.as_slice()).await.unwrap_err();
        assert!(matches!(err, WeftError::Io { .. }));
    }

    #[tokio::test]
    async fn payload_on_routing_layer_is_rejected_before_writing() {
        // the reader would reject this frame; the writer must refuse to
        // produce it so the fault is diagnosed on the misbehaving side
        let source = SystemId::random();
        let chain = outgoing_chain(vec![(0x0101, None), (0x0501, Some(vec![7]))]);

        let mut wire = Vec::new();
        let err = write_handshake(&mut wire, source, &chain).await.unwrap_err();
        assert!(matches!(err, WeftError::Handshake { .. }));
    }

    #[tokio::test]
    async fn transport_ability_in_body_is_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&[0u8; 20]);
        wire.extend_from_slice(&1u16.to_be_bytes());
        wire.extend_from_slice(&0x0600u16.to_be_bytes());
        wire.extend_from_slice(&(-1i16).to_be_bytes());
        let err = read_handshake(&mut wire.as_slice()).await.unwrap_err();
        assert!(matches!(err, WeftError::Handshake { .. }));
    }

    proptest! {
        #[test]
        fn round_trip_any_payload_mix(
            id in proptest::array::uniform20(any::<u8>()),
            layers in proptest::collection::vec(
                (1u8..=4u8, 0u8..=255u8, proptest::option::of(proptest::collection::vec(any::<u8>(), 0..64))),
                1..=5,
            ),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let source = SystemId::from_bytes(id);
                let layer_spec: Vec<(u16, Option<Vec<u8>>)> = layers
                    .into_iter()
                    .map(|(high, low, payload)| ((u16::from(high) << 8) | u16::from(low), payload))
                    .collect();
                let chain = outgoing_chain(layer_spec.clone());

                let mut wire = Vec::new();
                write_handshake(&mut wire, source, &chain).await.unwrap();
                let (peer, rebuilt) = read_handshake(&mut wire.as_slice()).await.unwrap();

                prop_assert_eq!(peer, source);
                prop_assert_eq!(rebuilt.len(), layer_spec.len());
                for (node, (ability, payload)) in rebuilt.nodes().iter().zip(layer_spec) {
                    prop_assert_eq!(node.ability().code(), ability);
                    prop_assert_eq!(node.remote.clone(), payload);
                }
                Ok(())
            })?;
        }
    }
}
