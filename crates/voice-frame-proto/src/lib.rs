//! Framing for compressed voice audio written to files or byte streams.
//!
//! Frame format:
//! - magic: 4 bytes "VFRM" (once, at stream start)
//! - version: u16 LE (once, at stream start)
//! - then repeated frames:
//!   - kind: u8
//!   - len: u32 LE
//!   - payload: [u8; len]
//!
//! One `Audio` frame carries exactly one compressed 20 ms packet, so a reader can
//! replay the stream at real-time cadence by counting frames.

use std::io::{self, Read, Write};

pub const MAGIC: [u8; 4] = *b"VFRM";
pub const VERSION: u16 = 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// One compressed audio packet.
    Audio = 0x01,
    /// Speaking indicator, 1 byte payload (0/1).
    Speaking = 0x02,
    /// Writer is done; no payload.
    End = 0x03,
}

impl FrameKind {
    pub fn from_u8(b: u8) -> io::Result<Self> {
        let k = match b {
            0x01 => FrameKind::Audio,
            0x02 => FrameKind::Speaking,
            0x03 => FrameKind::End,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown frame kind {b:#x}"),
                ))
            }
        };
        Ok(k)
    }
}

/// Stream prelude: magic + version.
pub fn write_prelude(mut w: impl Write) -> io::Result<()> {
    w.write_all(&encode_prelude())
}

/// Prelude bytes, for writers that are not `std::io::Write`.
pub fn encode_prelude() -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out
}

/// Read and validate the stream prelude.
pub fn read_prelude(mut r: impl Read) -> io::Result<()> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
    }

    let mut ver = [0u8; 2];
    r.read_exact(&mut ver)?;
    let version = u16::from_le_bytes(ver);
    if version != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported version {version}"),
        ));
    }

    Ok(())
}

/// Write a frame header + payload.
pub fn write_frame(mut w: impl Write, kind: FrameKind, payload: &[u8]) -> io::Result<()> {
    let frame = encode_frame(kind, payload)?;
    w.write_all(&frame)?;
    Ok(())
}

/// Encode a frame into a single buffer (header + payload).
pub fn encode_frame(kind: FrameKind, payload: &[u8]) -> io::Result<Vec<u8>> {
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large"))?;

    let mut out = Vec::with_capacity(1 + 4 + payload.len());
    out.push(kind as u8);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Read a frame header and return `(kind, len)`.
///
/// The caller should then read exactly `len` bytes of payload.
pub fn read_frame_header(mut r: impl Read) -> io::Result<(FrameKind, u32)> {
    let mut kindb = [0u8; 1];
    r.read_exact(&mut kindb)?;
    let kind = FrameKind::from_u8(kindb[0])?;

    let mut lenb = [0u8; 4];
    r.read_exact(&mut lenb)?;
    let len = u32::from_le_bytes(lenb);
    Ok((kind, len))
}

/// Read one whole frame.
pub fn read_frame(mut r: impl Read) -> io::Result<(FrameKind, Vec<u8>)> {
    let (kind, len) = read_frame_header(&mut r)?;
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    Ok((kind, payload))
}

/// Encode a `Speaking` payload.
pub fn encode_speaking(speaking: bool) -> Vec<u8> {
    vec![u8::from(speaking)]
}

/// Decode a `Speaking` payload.
pub fn decode_speaking(payload: &[u8]) -> io::Result<bool> {
    match payload {
        [b] => Ok(*b != 0),
        _ => Err(io::Error::new(io::ErrorKind::InvalidData, "bad SPEAKING length")),
    }
}
