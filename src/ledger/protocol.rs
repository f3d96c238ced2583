//! Binary request/reply protocol for remote store access
//!
//! One exchange per operation. A request is `[1-byte opcode][payload]`;
//! the reply payload depends on the opcode. All multi-byte integers are
//! little-endian and points are 33-byte compressed. Frames on the wire
//! carry a 4-byte little-endian length prefix.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::data_structures::types::{CompressedPoint, OutputIndex, COMPRESSED_POINT_SIZE};
use crate::errors::LedgerError;

/// Upper bound on a frame payload; store frames are tiny
const MAX_FRAME_LEN: u32 = 4096;

/// Store operation opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StoreOpcode {
    Put = 0,
    Get = 1,
    Remove = 2,
    Exists = 3,
    Count = 4,
}

impl StoreOpcode {
    pub fn from_byte(byte: u8) -> Result<Self, LedgerError> {
        match byte {
            0 => Ok(StoreOpcode::Put),
            1 => Ok(StoreOpcode::Get),
            2 => Ok(StoreOpcode::Remove),
            3 => Ok(StoreOpcode::Exists),
            4 => Ok(StoreOpcode::Count),
            other => Err(LedgerError::MalformedFrame(format!(
                "unknown opcode {other}"
            ))),
        }
    }
}

/// A decoded store request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    Put(CompressedPoint),
    Get(OutputIndex),
    Remove(OutputIndex),
    Exists(OutputIndex),
    Count,
}

impl StoreRequest {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            StoreRequest::Put(point) => {
                let mut out = vec![StoreOpcode::Put as u8];
                out.extend_from_slice(point.as_bytes());
                out
            }
            StoreRequest::Get(index) => encode_index_request(StoreOpcode::Get, *index),
            StoreRequest::Remove(index) => encode_index_request(StoreOpcode::Remove, *index),
            StoreRequest::Exists(index) => encode_index_request(StoreOpcode::Exists, *index),
            StoreRequest::Count => vec![StoreOpcode::Count as u8],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        let (&opcode_byte, payload) = bytes.split_first().ok_or_else(|| {
            LedgerError::MalformedFrame("empty request frame".to_string())
        })?;
        let opcode = StoreOpcode::from_byte(opcode_byte)?;
        match opcode {
            StoreOpcode::Put => {
                let point = CompressedPoint::from_slice(payload).map_err(|e| {
                    LedgerError::MalformedFrame(format!("put payload: {e}"))
                })?;
                Ok(StoreRequest::Put(point))
            }
            StoreOpcode::Get => Ok(StoreRequest::Get(decode_index(payload)?)),
            StoreOpcode::Remove => Ok(StoreRequest::Remove(decode_index(payload)?)),
            StoreOpcode::Exists => Ok(StoreRequest::Exists(decode_index(payload)?)),
            StoreOpcode::Count => {
                if !payload.is_empty() {
                    return Err(LedgerError::MalformedFrame(
                        "count takes no payload".to_string(),
                    ));
                }
                Ok(StoreRequest::Count)
            }
        }
    }
}

fn encode_index_request(opcode: StoreOpcode, index: OutputIndex) -> Vec<u8> {
    let mut out = vec![opcode as u8];
    out.extend_from_slice(&index.to_le_bytes());
    out
}

fn decode_index(payload: &[u8]) -> Result<OutputIndex, LedgerError> {
    let bytes: [u8; 4] = payload.try_into().map_err(|_| {
        LedgerError::MalformedFrame(format!("expected 4-byte index, got {}", payload.len()))
    })?;
    Ok(OutputIndex::from_le_bytes(bytes))
}

/// Decode a `get` reply: point plus creation timestamp
pub fn decode_get_reply(payload: &[u8]) -> Result<(CompressedPoint, u32), LedgerError> {
    if payload.len() != COMPRESSED_POINT_SIZE + 4 {
        return Err(LedgerError::MalformedFrame(format!(
            "get reply should be {} bytes, got {}",
            COMPRESSED_POINT_SIZE + 4,
            payload.len()
        )));
    }
    let point = CompressedPoint::from_slice(&payload[..COMPRESSED_POINT_SIZE])
        .map_err(|e| LedgerError::MalformedFrame(e.to_string()))?;
    let mut time = [0u8; 4];
    time.copy_from_slice(&payload[COMPRESSED_POINT_SIZE..]);
    Ok((point, u32::from_le_bytes(time)))
}

/// Decode a 4-byte little-endian integer reply (`put`, `exists`, `count`)
pub fn decode_u32_reply(payload: &[u8]) -> Result<u32, LedgerError> {
    let bytes: [u8; 4] = payload.try_into().map_err(|_| {
        LedgerError::MalformedFrame(format!("expected 4-byte reply, got {}", payload.len()))
    })?;
    Ok(u32::from_le_bytes(bytes))
}

/// Write one length-prefixed frame
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> std::io::Result<()> {
    writer.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Read one length-prefixed frame
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds the protocol maximum"),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commitment::random_scalar;
    use k256::ProjectivePoint;

    fn random_point() -> CompressedPoint {
        CompressedPoint::compress(&(ProjectivePoint::GENERATOR * random_scalar())).unwrap()
    }

    #[test]
    fn request_encode_decode_round_trip() {
        let requests = vec![
            StoreRequest::Put(random_point()),
            StoreRequest::Get(7),
            StoreRequest::Remove(0),
            StoreRequest::Exists(u32::MAX),
            StoreRequest::Count,
        ];
        for request in requests {
            let bytes = request.encode();
            assert_eq!(StoreRequest::decode(&bytes).unwrap(), request);
        }
    }

    #[test]
    fn put_encoding_is_opcode_plus_point() {
        let point = random_point();
        let bytes = StoreRequest::Put(point).encode();
        assert_eq!(bytes.len(), 1 + COMPRESSED_POINT_SIZE);
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..], point.as_bytes());
    }

    #[test]
    fn index_payloads_are_little_endian() {
        let bytes = StoreRequest::Get(0x0102_0304).encode();
        assert_eq!(bytes, vec![1, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn rejects_unknown_opcode_and_bad_sizes() {
        assert!(StoreRequest::decode(&[]).is_err());
        assert!(StoreRequest::decode(&[9]).is_err());
        assert!(StoreRequest::decode(&[1, 0, 0]).is_err());
        assert!(StoreRequest::decode(&[4, 1]).is_err());
    }

    #[tokio::test]
    async fn frame_round_trip() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"hello").await.unwrap();
        let mut cursor = std::io::Cursor::new(buffer);
        assert_eq!(read_frame(&mut cursor).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&(MAX_FRAME_LEN + 1).to_le_bytes());
        let mut cursor = std::io::Cursor::new(buffer);
        assert!(read_frame(&mut cursor).await.is_err());
    }
}
