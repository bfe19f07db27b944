//! File-transfer protocol definitions
// (c) 2025 Ross Younger
//!
//! The protocol tunnels remote filesystem operations through the telemetry
//! link's generic message channel. Each exchange is a single [`Packet`]
//! carried in one fixed-size link frame: the client sends a command, the
//! remote answers with an [`Ack`](packet::Opcode::Ack) or
//! [`Nak`](packet::Opcode::Nak) echoing the command's sequence number.
//! There is never more than one packet in flight.
//!
//! * Client ➡️ Remote: command packet (opcode, session, offset, data)
//! * Remote ➡️ Client: `Ack` with result data, or `Nak` with an
//!   [`ErrorCode`](packet::ErrorCode) in the first data byte
//!
//! Larger transfers are built from repeated exchanges: reads and writes move
//! [`DATA_MAXSZ`](packet::DATA_MAXSZ)-sized chunks, directory listings page
//! through entries by offset. The transfer state machine that drives this
//! lives in [`crate::client`].
//!
//! [`Packet`]: packet::Packet

pub mod dirent;
pub mod packet;
