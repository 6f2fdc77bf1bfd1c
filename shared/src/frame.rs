//! Length-prefixed framing over a byte stream.
//!
//! Every message in either direction is `[u32 big-endian length][payload]`,
//! where the payload is a bincode-encoded protocol type. The declared
//! length must be in `1..=MAX_FRAME_LEN`.

use crate::error::FrameError;
use crate::MAX_FRAME_LEN;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const HEADER_LEN: usize = 4;

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_FRAME_LEN as u64)
}

/// Serializes a payload without the length prefix.
pub fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>, FrameError> {
    Ok(codec().serialize(payload)?)
}

/// Decodes a payload, rejecting trailing bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FrameError> {
    Ok(codec().deserialize(bytes)?)
}

fn check_len(len: usize) -> Result<(), FrameError> {
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(FrameError::protocol(format!(
            "implausible frame length {} (max {})",
            len, MAX_FRAME_LEN
        )));
    }
    Ok(())
}

/// Writes one frame. Header and body go out in a single write so frames
/// from one writer never interleave.
pub async fn send_frame<W, T>(writer: &mut W, payload: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = encode(payload)?;
    check_len(body.len())?;

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame, waiting through partial reads until the declared
/// length has arrived.
pub async fn recv_frame<R, T>(reader: &mut R) -> Result<T, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;

    let len = u32::from_be_bytes(header) as usize;
    check_len(len)?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    decode(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientMessage, EntityKind, Player, ServerMessage, PROTOCOL_VERSION};
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_frame_roundtrip_through_stream() {
        let (mut a, mut b) = duplex(4096);
        let message = ClientMessage::Init {
            version: PROTOCOL_VERSION,
            nickname: "neo".to_string(),
            appearance: "CYAN".to_string(),
        };

        send_frame(&mut a, &message).await.unwrap();
        let received: ClientMessage = recv_frame(&mut b).await.unwrap();
        assert_eq!(received, message);
    }

    #[tokio::test]
    async fn test_partial_reads_are_reassembled() {
        // An 8-byte pipe forces the reader to collect the frame in pieces.
        let (mut a, mut b) = duplex(8);
        let mut player = Player::new(3, EntityKind::Human, 10.0, 20.0);
        for i in 0..20 {
            player.shoot_at(i as f32 * 10.0, 500.0);
        }
        let message = ServerMessage::Welcome(player.clone());

        let (sent, received) = tokio::join!(
            send_frame(&mut a, &message),
            recv_frame::<_, ServerMessage>(&mut b)
        );
        sent.unwrap();
        assert_eq!(received.unwrap(), ServerMessage::Welcome(player));
    }

    #[tokio::test]
    async fn test_header_split_across_reads() {
        let body = encode(&ClientMessage::Disconnect).unwrap();
        let header = (body.len() as u32).to_be_bytes();
        let mut transport = tokio_test::io::Builder::new()
            .read(&header[..1])
            .read(&header[1..])
            .read(&body)
            .build();

        let received: ClientMessage = recv_frame(&mut transport).await.unwrap();
        assert_eq!(received, ClientMessage::Disconnect);
    }

    #[tokio::test]
    async fn test_frame_is_written_in_one_piece() {
        let body = encode(&ClientMessage::Disconnect).unwrap();
        let mut expected = (body.len() as u32).to_be_bytes().to_vec();
        expected.extend_from_slice(&body);
        let mut transport = tokio_test::io::Builder::new().write(&expected).build();

        send_frame(&mut transport, &ClientMessage::Disconnect)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_header_is_big_endian_length() {
        let (mut a, mut b) = duplex(4096);
        send_frame(&mut a, &ClientMessage::Disconnect).await.unwrap();
        drop(a);

        let mut raw = Vec::new();
        b.read_to_end(&mut raw).await.unwrap();
        let declared = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        assert_eq!(declared, raw.len() - 4);
    }

    #[tokio::test]
    async fn test_peer_close_mid_frame_is_connection_error() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&100u32.to_be_bytes()).await.unwrap();
        a.write_all(&[1, 2, 3]).await.unwrap();
        drop(a);

        let result = recv_frame::<_, ClientMessage>(&mut b).await;
        assert!(matches!(result, Err(FrameError::Connection(_))));
    }

    #[tokio::test]
    async fn test_clean_close_is_disconnect() {
        let (a, mut b) = duplex(64);
        drop(a);

        let err = recv_frame::<_, ClientMessage>(&mut b).await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_oversized_length_is_protocol_error() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&u32::MAX.to_be_bytes()).await.unwrap();

        let result = recv_frame::<_, ClientMessage>(&mut b).await;
        assert!(matches!(result, Err(FrameError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_zero_length_is_protocol_error() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&0u32.to_be_bytes()).await.unwrap();

        let result = recv_frame::<_, ClientMessage>(&mut b).await;
        assert!(matches!(result, Err(FrameError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_garbage_payload_is_serialization_error() {
        let (mut a, mut b) = duplex(64);
        let garbage = [0xFFu8; 6];
        a.write_all(&(garbage.len() as u32).to_be_bytes()).await.unwrap();
        a.write_all(&garbage).await.unwrap();

        let result = recv_frame::<_, ClientMessage>(&mut b).await;
        assert!(matches!(result, Err(FrameError::Serialization(_))));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = encode(&ClientMessage::Disconnect).unwrap();
        bytes.push(0);
        assert!(decode::<ClientMessage>(&bytes).is_err());
    }
}
