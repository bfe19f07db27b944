// (c) 2025 Ross Younger

#![allow(clippy::doc_markdown)]
//! Remote file operations (`linkftp`) over a narrow telemetry message
//! channel, for talking to embedded flight-controller-class devices that
//! expose their filesystem through a single lossy, half-duplex message slot.
//!
//! ## Overview
//!
//! - 📁 List, read, write, create, remove, rename, truncate and checksum
//!   files on a remote device
//! - 📻 Runs over any transport that can move one fixed-size opaque frame at
//!   a time, with no delivery guarantee
//! - 🔂 Strict single-outstanding-request discipline: sequence-number
//!   checking, per-operation deadlines, and session bookkeeping reconstruct
//!   an ordered file protocol on top of a channel that promises nothing
//!
//! ## What this crate is not
//!
//! * A transport. You bring the link; see [`transport::FrameLink`].
//! * A bulk copy tool. Chunks are a couple of hundred bytes; this is for
//!   parameter files, logs and firmware-adjacent housekeeping, not gigabytes.
//! * Concurrent. The protocol serializes every transfer; so does the client.
//!
//! ## Getting started
//!
//! Implement [`FrameLink`](transport::FrameLink) over your link layer, feed
//! inbound frames to [`FtpClient::handle_frame`](client::FtpClient::handle_frame),
//! and call the async operation methods:
//!
//! ```no_run
//! use linkftp::protocol::packet::Frame;
//! use linkftp::{FrameLink, FtpClient, LinkAddress, OpenMode, Timeouts};
//!
//! struct Radio; // your link layer goes here
//!
//! impl FrameLink for Radio {
//!     fn send_frame(&self, frame: &Frame, dest: LinkAddress) {
//!         // hand the frame to the telemetry stack
//!     }
//!     fn target(&self) -> LinkAddress {
//!         LinkAddress { system: 1, component: 240 }
//!     }
//! }
//!
//! # async fn demo() -> Result<(), linkftp::Error> {
//! let client = FtpClient::new(Radio, Timeouts::default());
//! // also arrange: on frame receipt -> client.handle_frame(bytes, source)
//! //          and: on link loss     -> client.handle_link_down()
//! let entries = client.list("/fs/microsd").await?;
//! let opened = client.open("/fs/microsd/log.bin", OpenMode::Read).await?;
//! let header = client.read("/fs/microsd/log.bin", 0, 512).await?;
//! client.close("/fs/microsd/log.bin").await?;
//! # Ok(())
//! # }
//! ```
//!
//! Every call either completes, fails with a typed [`client::Error`], or
//! times out on a deadline scaled to the operation (see [`config::Timeouts`]).
//! Nothing is retried behind your back: on a timeout or a lost-sync error the
//! remote's state is unknown, and the caller decides whether to retry or to
//! [`reset`](client::FtpClient::reset).
//!
//! ## Protocol
//!
//! The wire format and dialogue rules are documented in [`protocol`].

pub mod client;
pub use client::{Error, FtpClient, OpenMode, OpenedFile};

pub mod config;
pub use config::Timeouts;

pub mod protocol;
pub use protocol::dirent::{DirEntry, EntryKind};

pub mod transport;
pub use transport::{FrameLink, LinkAddress};

pub mod util;
