//! Packet framing.
//!
//! Every packet starts with a 4-byte header: the payload length as a 3-byte
//! little-endian integer followed by a 1-byte sequence id.
//!
//! <https://dev.mysql.com/doc/internals/en/mysql-packet.html>

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::protocol::error::{ProtocolError, ProtocolResult};

/// The 4-byte header preceding every packet payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Payload length, excluding the header itself.
    pub length: u32,
    /// Per-packet counter used to detect out-of-order frames.
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Size of the header on the wire.
    pub const SIZE: usize = 4;

    /// Largest payload a single frame can carry.
    pub const MAX_PAYLOAD_LEN: usize = 0xFF_FF_FF;

    /// Decode the header from the first 4 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> ProtocolResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(ProtocolError::TruncatedHeader(buf.len()));
        }

        // zero-extend the 3-byte length to a u32 before decoding
        let length = u32::from_le_bytes([buf[0], buf[1], buf[2], 0x00]);

        Ok(Self {
            length,
            sequence_id: buf[3],
        })
    }

    /// Header for a payload of `len` bytes.
    pub fn for_payload(len: usize, sequence_id: u8) -> ProtocolResult<Self> {
        if len > Self::MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PacketTooLarge(len));
        }

        Ok(Self {
            length: len as u32,
            sequence_id,
        })
    }

    pub fn encode(&self) -> [u8; 4] {
        let mut buf = self.length.to_le_bytes();
        buf[3] = self.sequence_id;
        buf
    }

    /// Write the header to `buf`.
    pub fn put(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.encode());
    }

    /// Length of the whole frame, header included.
    pub fn frame_len(&self) -> usize {
        Self::SIZE + self.length as usize
    }
}

/// Read exactly one packet (header and payload) from `reader`.
///
/// A packet may arrive split over any number of reads; this keeps reading
/// until all `4 + length` bytes are buffered. The returned bytes include the
/// header.
pub async fn read_packet<R>(reader: &mut R) -> std::io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; PacketHeader::SIZE];
    reader.read_exact(&mut header).await?;

    // the header slice is exactly SIZE bytes, so this cannot fail
    let parsed = PacketHeader::decode(&header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut buf = BytesMut::with_capacity(parsed.frame_len());
    buf.put_slice(&header);
    buf.resize(parsed.frame_len(), 0);
    reader.read_exact(&mut buf[PacketHeader::SIZE..]).await?;

    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn decode_header() {
        let header = PacketHeader::decode(&[0x4a, 0x00, 0x00, 0x00, 0x0a]).unwrap();
        assert_eq!(header.length, 74);
        assert_eq!(header.sequence_id, 0);
    }

    #[test]
    fn decode_header_zero_extends_length() {
        let header = PacketHeader::decode(&[0xff, 0xff, 0xff, 0x07]).unwrap();
        assert_eq!(header.length, 0x00FF_FFFF);
        assert_eq!(header.sequence_id, 7);
    }

    #[test]
    fn decode_header_truncated() {
        assert_eq!(
            PacketHeader::decode(&[0x01, 0x00, 0x00]),
            Err(ProtocolError::TruncatedHeader(3))
        );
        assert_eq!(PacketHeader::decode(&[]), Err(ProtocolError::TruncatedHeader(0)));
    }

    #[test]
    fn encode_header() {
        let header = PacketHeader {
            length: 0x0001_0203,
            sequence_id: 9,
        };
        assert_eq!(header.encode(), [0x03, 0x02, 0x01, 0x09]);
        assert_eq!(PacketHeader::decode(&header.encode()).unwrap(), header);
    }

    #[test]
    fn payload_too_large() {
        assert_eq!(
            PacketHeader::for_payload(0x0100_0000, 0),
            Err(ProtocolError::PacketTooLarge(0x0100_0000))
        );
        assert!(PacketHeader::for_payload(0xFF_FFFF, 0).is_ok());
    }

    #[tokio::test]
    async fn read_packet_across_fragments() {
        let (mut writer, mut reader) = tokio::io::duplex(64);

        tokio::spawn(async move {
            for chunk in [&[0x05u8, 0x00][..], &[0x00, 0x03, b'h'][..], &b"ell"[..], &b"o trailing"[..]] {
                writer.write_all(chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let packet = read_packet(&mut reader).await.unwrap();
        assert_eq!(&packet[..], &[0x05, 0x00, 0x00, 0x03, b'h', b'e', b'l', b'l', b'o']);

        // bytes after the frame stay in the stream
        let mut rest = [0u8; 9];
        reader.read_exact(&mut rest).await.unwrap();
        assert_eq!(&rest, b" trailing");
    }

    #[tokio::test]
    async fn read_packet_eof_mid_payload() {
        let mut input: &[u8] = &[0x0a, 0x00, 0x00, 0x00, 0x0a, 0x35];
        let err = read_packet(&mut input).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
