//! Wire packet layout, opcodes and error codes
// (c) 2025 Ross Younger
//!
//! # On-wire layout
//!
//! One packet occupies one link frame of [`FRAME_LEN`] bytes, little-endian:
//!
//! ```text
//! seq:u16 | session:u8 | opcode:u8 | size:u8 | req_opcode:u8 | pad:u8[2] | offset:u32 | data:u8[DATA_MAXSZ]
//! ```
//!
//! `size` counts the valid bytes of `data`; the remainder of the frame is
//! padding. The header is parsed with explicit bounds checks rather than by
//! reinterpreting the raw buffer, so a truncated or lying frame surfaces as a
//! [`CodecError`] instead of reading garbage.

use bytes::{Buf, BufMut};
use static_assertions::const_assert_eq;

/// Size of one link frame, as imposed by the underlying message channel
pub const FRAME_LEN: usize = 251;
/// Fixed header bytes preceding the data region
pub const HEADER_LEN: usize = 12;
/// Capacity of a packet's data region
pub const DATA_MAXSZ: usize = FRAME_LEN - HEADER_LEN;

const_assert_eq!(DATA_MAXSZ, 239);

/// One encoded frame, ready to hand to the link
pub type Frame = [u8; FRAME_LEN];

/// Command and response opcodes
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display, strum::FromRepr)]
#[repr(u8)]
pub enum Opcode {
    /// Ignored by the remote, always acked
    None = 0,
    /// Terminates an open session
    TerminateSession = 1,
    /// Terminates all open sessions
    ResetSessions = 2,
    /// Lists files in `path` starting from entry `offset`
    ListDirectory = 3,
    /// Opens file at `path` for reading, returns a session
    OpenFileRO = 4,
    /// Reads a chunk from `offset` in a session
    ReadFile = 5,
    /// Creates file at `path` for writing, returns a session
    CreateFile = 6,
    /// Writes a chunk at `offset` in a session
    WriteFile = 7,
    /// Removes file at `path`
    RemoveFile = 8,
    /// Creates directory at `path`
    CreateDirectory = 9,
    /// Removes directory at `path` (must be empty)
    RemoveDirectory = 10,
    /// Opens file at `path` for writing, returns a session
    OpenFileWO = 11,
    /// Truncates file at `path` to `offset` bytes
    TruncateFile = 12,
    /// Renames `path1` to `path2` (both packed into `data`, NUL separated)
    Rename = 13,
    /// Calculates a CRC32 over the file at `path`
    CalcFileCRC32 = 14,
    /// Burst download within a session. Defined by the protocol; this client
    /// does not currently issue it.
    BurstReadFile = 15,

    /// Positive acknowledgement (response only)
    Ack = 128,
    /// Negative acknowledgement (response only); `data[0]` holds an [`ErrorCode`]
    Nak = 129,
}

/// Error codes carried in the first data byte of a Nak response
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display, strum::FromRepr)]
#[repr(u8)]
pub enum ErrorCode {
    /// No error
    None = 0,
    /// Unknown failure
    Fail = 1,
    /// Command failed; the remote's errno follows in `data[1]`
    FailErrno = 2,
    /// Declared payload size was invalid
    InvalidDataSize = 3,
    /// Session is not currently open
    InvalidSession = 4,
    /// All available sessions are in use
    NoSessionsAvailable = 5,
    /// Offset past end of file for list and read commands
    Eof = 6,
    /// Unknown command opcode
    UnknownCommand = 7,
    /// File already exists
    FailFileExists = 8,
    /// File is write protected
    FailFileProtected = 9,
}

/// Faults detected while encoding or decoding a frame
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// Frame too small to hold the fixed header
    #[error("frame of {0} bytes is shorter than the packet header")]
    Short(usize),
    /// Declared or supplied data length exceeds the data region
    #[error("data length {0} exceeds channel capacity")]
    Oversize(usize),
    /// Declared data length exceeds the bytes actually present
    #[error("declared size {declared} exceeds the {available} data bytes present")]
    Truncated {
        /// Length claimed by the header
        declared: usize,
        /// Data bytes actually in the frame
        available: usize,
    },
    /// Opcode byte is not a known [`Opcode`]
    #[error("unknown opcode {0:#04x}")]
    BadOpcode(u8),
}

/// One protocol packet, decoded form
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    /// Sequence number; responses echo the request's
    pub seq: u16,
    /// Session id for read and write commands
    pub session: u8,
    /// Command or response opcode
    pub opcode: Opcode,
    /// On Ack/Nak, the opcode of the command being answered
    pub req_opcode: Opcode,
    /// Offset, for list/read/write/truncate commands
    pub offset: u32,
    /// Command data; at most [`DATA_MAXSZ`] bytes
    pub data: Vec<u8>,
}

impl Packet {
    /// Builds a command packet with empty data, ready for the caller to fill in
    #[must_use]
    pub fn command(opcode: Opcode, session: u8) -> Self {
        Self {
            seq: 0,
            session,
            opcode,
            req_opcode: Opcode::None,
            offset: 0,
            data: Vec::new(),
        }
    }

    /// Number of valid data bytes, as it will appear in the `size` header field
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Serializes into a link frame.
    ///
    /// Fails with [`CodecError::Oversize`] if `data` exceeds [`DATA_MAXSZ`].
    pub fn encode(&self) -> Result<Frame, CodecError> {
        if self.data.len() > DATA_MAXSZ {
            return Err(CodecError::Oversize(self.data.len()));
        }
        let mut frame: Frame = [0u8; FRAME_LEN];
        let mut buf = &mut frame[..];
        buf.put_u16_le(self.seq);
        buf.put_u8(self.session);
        buf.put_u8(self.opcode as u8);
        #[allow(clippy::cast_possible_truncation)] // already checked
        buf.put_u8(self.data.len() as u8);
        buf.put_u8(self.req_opcode as u8);
        buf.put_bytes(0, 2);
        buf.put_u32_le(self.offset);
        buf.put_slice(&self.data);
        Ok(frame)
    }

    /// Parses a received frame.
    ///
    /// Accepts any buffer at least [`HEADER_LEN`] long whose declared size
    /// fits both the channel capacity and the bytes present; anything else is
    /// a [`CodecError`].
    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() < HEADER_LEN {
            return Err(CodecError::Short(frame.len()));
        }
        let mut buf = frame;
        let seq = buf.get_u16_le();
        let session = buf.get_u8();
        let opcode_raw = buf.get_u8();
        let size = usize::from(buf.get_u8());
        let req_opcode_raw = buf.get_u8();
        buf.advance(2); // padding
        let offset = buf.get_u32_le();

        if size > DATA_MAXSZ {
            return Err(CodecError::Oversize(size));
        }
        if size > buf.remaining() {
            return Err(CodecError::Truncated {
                declared: size,
                available: buf.remaining(),
            });
        }
        let opcode = Opcode::from_repr(opcode_raw).ok_or(CodecError::BadOpcode(opcode_raw))?;
        let req_opcode =
            Opcode::from_repr(req_opcode_raw).ok_or(CodecError::BadOpcode(req_opcode_raw))?;
        Ok(Self {
            seq,
            session,
            opcode,
            req_opcode,
            offset,
            data: buf[..size].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CodecError, DATA_MAXSZ, FRAME_LEN, HEADER_LEN, Opcode, Packet};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn wire_layout_is_bit_exact() {
        let pkt = Packet {
            seq: 0x0102,
            session: 3,
            opcode: Opcode::WriteFile,
            req_opcode: Opcode::None,
            offset: 0x1122_3344,
            data: vec![0xAA, 0xBB],
        };
        let frame = pkt.encode().unwrap();
        assert_eq!(
            frame[..HEADER_LEN],
            [0x02, 0x01, 3, 7, 2, 0, 0, 0, 0x44, 0x33, 0x22, 0x11]
        );
        assert_eq!(frame[HEADER_LEN..HEADER_LEN + 2], [0xAA, 0xBB]);
        assert!(frame[HEADER_LEN + 2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn roundtrip() {
        let pkt = Packet {
            seq: u16::MAX,
            session: 1,
            opcode: Opcode::Ack,
            req_opcode: Opcode::ListDirectory,
            offset: 42,
            data: b"Ffoo\t123\0".to_vec(),
        };
        let decoded = Packet::decode(&pkt.encode().unwrap()).unwrap();
        assert_eq!(pkt, decoded);
    }

    #[test]
    fn encode_rejects_oversize_data() {
        let mut pkt = Packet::command(Opcode::WriteFile, 1);
        pkt.data = vec![0u8; DATA_MAXSZ + 1];
        assert_eq!(pkt.encode(), Err(CodecError::Oversize(DATA_MAXSZ + 1)));
    }

    #[test]
    fn decode_accepts_header_only_frame() {
        let frame = Packet::command(Opcode::ResetSessions, 0).encode().unwrap();
        // a link may deliver a frame trimmed to its useful length
        let decoded = Packet::decode(&frame[..HEADER_LEN]).unwrap();
        assert_eq!(decoded.opcode, Opcode::ResetSessions);
        assert_eq!(decoded.size(), 0);
    }

    #[test]
    fn decode_rejects_short_frame() {
        let frame = [0u8; HEADER_LEN - 1];
        assert_eq!(
            Packet::decode(&frame),
            Err(CodecError::Short(HEADER_LEN - 1))
        );
    }

    #[rstest]
    #[case(255, CodecError::Oversize(255))]
    #[case(240, CodecError::Oversize(240))]
    fn decode_rejects_size_over_capacity(#[case] size: u8, #[case] expected: CodecError) {
        let mut frame = [0u8; FRAME_LEN];
        frame[3] = Opcode::Ack as u8;
        frame[4] = size;
        assert_eq!(Packet::decode(&frame), Err(expected));
    }

    #[test]
    fn decode_rejects_size_beyond_frame_contents() {
        let mut frame = [0u8; HEADER_LEN + 10];
        frame[3] = Opcode::Ack as u8;
        frame[4] = 11;
        assert_eq!(
            Packet::decode(&frame),
            Err(CodecError::Truncated {
                declared: 11,
                available: 10
            })
        );
    }

    #[rstest]
    #[case(16)] // first gap after the command range
    #[case(127)]
    #[case(200)]
    fn decode_rejects_unknown_opcode(#[case] raw: u8) {
        let mut frame = [0u8; FRAME_LEN];
        frame[3] = raw;
        assert_eq!(Packet::decode(&frame), Err(CodecError::BadOpcode(raw)));
    }

    #[test]
    fn rename_payload_may_embed_nul() {
        // two paths packed into one data region; the codec must not split them
        let mut pkt = Packet::command(Opcode::Rename, 0);
        pkt.data = b"/old\0/new".to_vec();
        let decoded = Packet::decode(&pkt.encode().unwrap()).unwrap();
        assert_eq!(decoded.data, b"/old\0/new");
    }
}
