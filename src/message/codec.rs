//! TCP framing for the control wire format (§6): `[size: u32][envelope][payload]`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::types::Envelope;
use crate::error::Error;

/// One message as it travels the control wire: a logical [`Envelope`]
/// plus its optional payload bytes.
#[derive(Debug, Clone)]
pub struct WireMessage {
    pub envelope: Envelope,
    pub payload: Vec<u8>,
}

impl WireMessage {
    pub fn new(envelope: Envelope, payload: Vec<u8>) -> Self {
        let envelope = envelope.with_payload_size(payload.len() as u32);
        Self { envelope, payload }
    }
}

/// Frames [`WireMessage`]s as `[total_len: u32 LE][bincode envelope][payload]`.
#[derive(Debug, Default)]
pub struct MessageCodec {
    header_len: Option<u32>,
}

impl Encoder<WireMessage> for MessageCodec {
    type Error = Error;

    fn encode(&mut self, msg: WireMessage, dst: &mut BytesMut) -> Result<(), Error> {
        let envelope_bytes = bincode::serialize(&msg.envelope)?;
        let total = envelope_bytes.len() as u32 + msg.payload.len() as u32;

        dst.reserve(4 + total as usize);
        dst.put_u32_le(total);
        dst.put_slice(&envelope_bytes);
        dst.put_slice(&msg.payload);
        Ok(())
    }
}

impl Decoder for MessageCodec {
    type Item = WireMessage;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<WireMessage>, Error> {
        let total = match self.header_len {
            Some(len) => len,
            None => {
                if src.len() < 4 {
                    return Ok(None);
                }
                let len = (&src[..4]).get_u32_le();
                src.advance(4);
                self.header_len = Some(len);
                len
            }
        };

        if (src.len() as u32) < total {
            return Ok(None);
        }

        let frame = src.split_to(total as usize);
        self.header_len = None;

        let mut cursor = std::io::Cursor::new(&frame[..]);
        let envelope: Envelope = bincode::deserialize_from(&mut cursor)?;
        let consumed = cursor.position() as usize;
        let payload = frame[consumed..].to_vec();

        Ok(Some(WireMessage::new(envelope, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id;
    use crate::message::types::MessageType;

    #[test]
    fn round_trips_a_message_with_no_payload() {
        let mut codec = MessageCodec::default();
        let mut buf = BytesMut::new();
        let env = Envelope::new(MessageType::Ping, id::MASTER_HUB_ID, 0);
        codec.encode(WireMessage::new(env, vec![]), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.envelope.message_type, MessageType::Ping);
        assert!(decoded.payload.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn round_trips_a_message_with_a_payload() {
        let mut codec = MessageCodec::default();
        let mut buf = BytesMut::new();
        let env = Envelope::new(MessageType::SendObject, id::MASTER_HUB_ID, 0);
        let payload = vec![1u8, 2, 3, 4, 5];
        codec
            .encode(WireMessage::new(env, payload.clone()), &mut buf)
            .unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn waits_for_a_full_frame_before_decoding() {
        let mut codec = MessageCodec::default();
        let mut buf = BytesMut::new();
        let env = Envelope::new(MessageType::Ping, id::MASTER_HUB_ID, 0);
        let mut full = BytesMut::new();
        codec.encode(WireMessage::new(env, vec![]), &mut full).unwrap();

        buf.extend_from_slice(&full[..full.len() - 1]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full[full.len() - 1..]);
        assert!(codec.decode(&mut buf).unwrap().is_some());
    }
}
