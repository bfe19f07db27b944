//! Link transport boundary
// (c) 2025 Ross Younger
//!
//! The client does not speak to the network itself; it hands fixed-size
//! frames to whatever carries the telemetry link. Implement [`FrameLink`]
//! over your link layer, and arrange for inbound frames addressed to this
//! component to be fed to [`FtpClient::handle_frame`](crate::client::FtpClient::handle_frame)
//! (and link-loss events to
//! [`FtpClient::handle_link_down`](crate::client::FtpClient::handle_link_down)).
//!
//! Delivery is best effort only: frames may be silently dropped in either
//! direction. The protocol's sequence numbering and per-operation timeouts
//! recover from that; the link does not need to.

use std::sync::Arc;

use crate::protocol::packet::Frame;

/// Address of an endpoint on the telemetry link
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, derive_more::Display)]
#[display("{system}/{component}")]
pub struct LinkAddress {
    /// System id of the endpoint
    pub system: u8,
    /// Component id within the system
    pub component: u8,
}

/// The outbound half of the message channel.
///
/// Sending is fire-and-forget; there is no delivery notification and no
/// error path. A frame that matters and does not arrive shows up as an
/// operation timeout at a higher level.
pub trait FrameLink: Send + Sync {
    /// Transmits a single frame towards `dest`
    fn send_frame(&self, frame: &Frame, dest: LinkAddress);

    /// The remote endpoint currently targeted by this link.
    ///
    /// Inbound frames from any other system id are not part of the dialogue
    /// and are ignored.
    fn target(&self) -> LinkAddress;
}

impl<T: FrameLink + ?Sized> FrameLink for Arc<T> {
    fn send_frame(&self, frame: &Frame, dest: LinkAddress) {
        (**self).send_frame(frame, dest);
    }

    fn target(&self) -> LinkAddress {
        (**self).target()
    }
}

#[cfg(test)]
mod tests {
    use super::LinkAddress;
    use pretty_assertions::assert_eq;

    #[test]
    fn address_display() {
        let addr = LinkAddress {
            system: 1,
            component: 240,
        };
        assert_eq!(format!("{addr}"), "1/240");
    }
}
