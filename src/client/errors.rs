//! Client error taxonomy
// (c) 2025 Ross Younger

use crate::protocol::dirent::EntryError;
use crate::protocol::packet::{CodecError, ErrorCode, Opcode};

/// Anything that can go wrong with a transfer operation.
///
/// Variants fall into three groups: faults detected locally (bad caller
/// input, busy engine), faults of the dialogue itself (lost sync, malformed
/// or inconsistent responses), and faults the remote reported in a Nak.
/// Dialogue faults leave the remote's true state unknown; callers should
/// [`reset`](super::FtpClient::reset) before relying on open sessions again.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Another operation is already in flight; this one was not started
    #[error("transfer engine is busy")]
    Busy,
    /// The operation did not reach a terminal state in time
    #[error("operation timed out")]
    TimedOut,
    /// The operation was superseded by a reset
    #[error("operation superseded by reset")]
    Aborted,
    /// The transport reported loss of the link
    #[error("link went down")]
    LinkDown,
    /// Combined path payload does not fit in one frame
    #[error("file name too long for message channel")]
    NameTooLong,
    /// Operation needs an open session for this path and there is none
    #[error("{0:?} is not open")]
    NotOpen(String),
    /// Only one session per path is allowed
    #[error("{0:?} is already open")]
    AlreadyOpen(String),

    /// Response sequence number did not match the request's
    #[error("lost sequence sync (expected {expected}, got {got})")]
    LostSync {
        /// The sequence number we stamped on the request
        expected: u16,
        /// What the response carried
        got: u16,
    },
    /// Response frame failed to decode
    #[error(transparent)]
    Malformed(#[from] CodecError),
    /// Directory listing data failed to parse
    #[error(transparent)]
    BadListing(#[from] EntryError),
    /// Response carried a command opcode rather than Ack or Nak
    #[error("unexpected response opcode {0}")]
    UnexpectedResponse(Opcode),
    /// Ack's offset disagrees with the request's
    #[error("response offset {got} differs from requested {expected}")]
    BadOffset {
        /// Offset this client asked for
        expected: u32,
        /// Offset the response claims to answer
        got: u32,
    },
    /// Ack's session id is not the one this operation holds
    #[error("response for a different session")]
    WrongSession,
    /// Ack or Nak payload had the wrong length for its kind
    #[error("acknowledge payload had unexpected length {0}")]
    BadAckPayload(usize),
    /// Remote claims it accepted none of the offered write chunk
    #[error("remote accepted no bytes of write chunk")]
    WriteStalled,
    /// Remote claims it accepted more than was offered
    #[error("remote claims {reported} bytes written but only {outstanding} were outstanding")]
    WriteOverrun {
        /// Byte count the Ack reported
        reported: usize,
        /// Bytes this client still had unacknowledged
        outstanding: usize,
    },
    /// State machine reached a place it cannot be in
    #[error("internal state error: {0}")]
    Internal(&'static str),

    /// Remote: unknown failure
    #[error("remote failure")]
    RemoteFailure,
    /// Remote: command failed with this errno on the remote system
    #[error("remote errno {0}")]
    RemoteErrno(u8),
    /// Remote: request payload size was invalid for the channel
    #[error("remote rejected data size")]
    TooLarge,
    /// Remote: session is not open over there
    #[error("remote session no longer valid")]
    StaleSession,
    /// Remote: all its sessions are in use
    #[error("remote has no sessions available")]
    NoSessions,
    /// Remote: end of file, in a context where it does not mean success
    #[error("remote reported end of file")]
    RemoteEof,
    /// Remote: command opcode not implemented over there
    #[error("remote does not implement this command")]
    NotImplemented,
    /// Remote: file already exists
    #[error("remote file already exists")]
    FileExists,
    /// Remote: file is write protected
    #[error("remote file is protected")]
    FileProtected,
    /// Remote sent a Nak code this client does not know
    #[error("remote sent unrecognized error code {0}")]
    UnrecognizedNak(u8),
}

impl Error {
    /// True if the fault was reported by the remote endpoint rather than
    /// detected on this side
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::RemoteFailure
                | Error::RemoteErrno(_)
                | Error::TooLarge
                | Error::StaleSession
                | Error::NoSessions
                | Error::RemoteEof
                | Error::NotImplemented
                | Error::FileExists
                | Error::FileProtected
                | Error::UnrecognizedNak(_)
        )
    }

    /// Maps a Nak's error code byte (and optional errno byte) to an [`Error`].
    ///
    /// Context-dependent handling of [`ErrorCode::Eof`] is the caller's
    /// business; here it maps to [`Error::RemoteEof`].
    pub(crate) fn from_nak(code: u8, errno: Option<u8>) -> Self {
        match ErrorCode::from_repr(code) {
            None => Error::UnrecognizedNak(code),
            Some(ErrorCode::None | ErrorCode::Fail) => Error::RemoteFailure,
            Some(ErrorCode::FailErrno) => Error::RemoteErrno(errno.unwrap_or_default()),
            Some(ErrorCode::InvalidDataSize) => Error::TooLarge,
            Some(ErrorCode::InvalidSession) => Error::StaleSession,
            Some(ErrorCode::NoSessionsAvailable) => Error::NoSessions,
            Some(ErrorCode::Eof) => Error::RemoteEof,
            Some(ErrorCode::UnknownCommand) => Error::NotImplemented,
            Some(ErrorCode::FailFileExists) => Error::FileExists,
            Some(ErrorCode::FailFileProtected) => Error::FileProtected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::protocol::packet::ErrorCode;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorCode::Fail as u8, None, Error::RemoteFailure)]
    #[case(ErrorCode::FailErrno as u8, Some(13), Error::RemoteErrno(13))]
    #[case(ErrorCode::InvalidDataSize as u8, None, Error::TooLarge)]
    #[case(ErrorCode::InvalidSession as u8, None, Error::StaleSession)]
    #[case(ErrorCode::NoSessionsAvailable as u8, None, Error::NoSessions)]
    #[case(ErrorCode::Eof as u8, None, Error::RemoteEof)]
    #[case(ErrorCode::UnknownCommand as u8, None, Error::NotImplemented)]
    #[case(ErrorCode::FailFileExists as u8, None, Error::FileExists)]
    #[case(ErrorCode::FailFileProtected as u8, None, Error::FileProtected)]
    #[case(200, None, Error::UnrecognizedNak(200))]
    fn nak_mapping(#[case] code: u8, #[case] errno: Option<u8>, #[case] expected: Error) {
        assert_eq!(Error::from_nak(code, errno), expected);
    }

    #[test]
    fn remoteness() {
        assert!(Error::RemoteErrno(1).is_remote());
        assert!(Error::FileExists.is_remote());
        assert!(!Error::Busy.is_remote());
        assert!(!Error::TimedOut.is_remote());
        assert!(
            !Error::LostSync {
                expected: 1,
                got: 2
            }
            .is_remote()
        );
    }
}
