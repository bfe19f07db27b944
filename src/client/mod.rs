//! File-transfer client state machine
// (c) 2025 Ross Younger
//!
//! [`FtpClient`] drives the protocol over a [`FrameLink`]: one operation at a
//! time, one packet in flight at a time. Each public method sends the first
//! command frame immediately and then waits (with a per-kind deadline) for
//! the dialogue to reach a terminal state; the transport feeds response
//! frames to [`FtpClient::handle_frame`] from whatever task it delivers on.
//!
//! Starting a call while another is in flight fails fast with
//! [`Error::Busy`]; nothing is queued. [`FtpClient::reset`] is the one
//! exception: it may be issued at any time, abandons whatever was in flight
//! and tells the remote to drop all of its sessions.
//!
//! Sequence discipline: every outbound packet carries the previous sequence
//! number plus one (wrapping), and the remote echoes it back. A response
//! bearing any other number means frames were lost; the operation aborts
//! with [`Error::LostSync`] and the caller decides whether to retry from the
//! top.

use std::collections::HashMap;
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::Timeouts;
use crate::protocol::dirent::{parse_list_page, DirEntry};
use crate::protocol::packet::{ErrorCode, Opcode, Packet, DATA_MAXSZ};
use crate::transport::{FrameLink, LinkAddress};

mod errors;
pub use errors::Error;


/// How [`FtpClient::open`] should open the remote file
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
pub enum OpenMode {
    /// Open an existing file for reading
    Read,
    /// Open an existing file for writing
    Write,
    /// Create (or replace) the file, for writing
    Create,
}

/// Result of a successful [`FtpClient::open`]
#[derive(Clone, Copy, Debug, Eq, PartialEq, derive_more::Constructor)]
pub struct OpenedFile {
    /// Remote session handle now associated with the path
    pub session: u32,
    /// Current size of the remote file, in bytes
    pub size: u32,
}

/// What a finished operation hands back through the completion channel
#[derive(Debug)]
enum Completion {
    Done,
    Entries(Vec<DirEntry>),
    Opened(OpenedFile),
    Data(Vec<u8>),
    Crc32(u32),
}

type OpResult = Result<Completion, Error>;

/// The single in-flight operation
#[derive(Debug)]
enum Operation {
    /// Nothing in flight
    Idle,
    /// A one-shot command awaiting its Ack
    AwaitingAck,
    /// Paging through a directory listing
    Listing {
        path: String,
        offset: u32,
        entries: Vec<DirEntry>,
    },
    /// Waiting for the session an open returns
    Opening { path: String },
    /// Accumulating read chunks
    Reading {
        session: u8,
        offset: u32,
        wanted: usize,
        buffer: Vec<u8>,
    },
    /// Draining a write buffer chunk by chunk
    Writing {
        session: u8,
        offset: u32,
        data: Vec<u8>,
        cursor: usize,
    },
    /// Waiting for a remote CRC32
    Checksum { path: String },
}

/// All mutable client state, under the one lock
#[derive(Debug)]
struct State {
    op: Operation,
    /// Sequence number of the most recently sent packet; responses must echo it
    last_seq: u16,
    /// Open sessions, by path. One session per path.
    sessions: HashMap<String, u32>,
    /// Completion channel for the operation in flight
    waiter: Option<oneshot::Sender<OpResult>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            op: Operation::Idle,
            last_seq: 0,
            sessions: HashMap::new(),
            waiter: None,
        }
    }
}

impl State {
    /// Looks up the session for a path, in the u8 form the wire carries
    fn session_u8(&self, path: &str) -> Result<u8, Error> {
        let id = self
            .sessions
            .get(path)
            .ok_or_else(|| Error::NotOpen(path.to_string()))?;
        u8::try_from(*id).map_err(|_| Error::Internal("session id out of wire range"))
    }
}

/// File-transfer protocol client.
///
/// All methods take `&self`; the client is designed to be shared (e.g. in an
/// `Arc`) between the task making calls and the transport's delivery path.
pub struct FtpClient<L: FrameLink> {
    link: L,
    timeouts: Timeouts,
    state: Mutex<State>,
}

impl<L: FrameLink> std::fmt::Debug for FtpClient<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpClient")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl<L: FrameLink> FtpClient<L> {
    /// Creates a client over the given link
    #[must_use]
    pub fn new(link: L, timeouts: Timeouts) -> Self {
        Self {
            link,
            timeouts,
            state: Mutex::new(State::default()),
        }
    }

    /// The link this client sends on
    #[must_use]
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Lists the remote directory at `path`, in the order the remote reports
    /// its entries.
    pub async fn list(&self, path: &str) -> Result<Vec<DirEntry>, Error> {
        let done = self
            .run_operation(self.timeouts.list(), |st| {
                let pkt = Self::path_packet(Opcode::ListDirectory, 0, path, 0)?;
                st.op = Operation::Listing {
                    path: path.to_string(),
                    offset: 0,
                    entries: Vec::new(),
                };
                self.transmit(st, pkt)
            })
            .await?;
        let Completion::Entries(entries) = done else {
            return Err(Error::Internal("listing completed without entries"));
        };
        Ok(entries)
    }

    /// Opens the remote file at `path`, establishing a session for subsequent
    /// [`read`](Self::read) / [`write`](Self::write) calls. One session per
    /// path; opening a path twice fails with [`Error::AlreadyOpen`].
    pub async fn open(&self, path: &str, mode: OpenMode) -> Result<OpenedFile, Error> {
        let done = self
            .run_operation(self.timeouts.ack(), |st| {
                if st.sessions.contains_key(path) {
                    warn!("open {path}: already open");
                    return Err(Error::AlreadyOpen(path.to_string()));
                }
                let opcode = match mode {
                    OpenMode::Read => Opcode::OpenFileRO,
                    OpenMode::Write => Opcode::OpenFileWO,
                    OpenMode::Create => Opcode::CreateFile,
                };
                let pkt = Self::path_packet(opcode, 0, path, 0)?;
                st.op = Operation::Opening {
                    path: path.to_string(),
                };
                self.transmit(st, pkt)
            })
            .await?;
        let Completion::Opened(file) = done else {
            return Err(Error::Internal("open completed without a session"));
        };
        Ok(file)
    }

    /// Closes the session held for `path`.
    ///
    /// The session-table entry is dropped as soon as the terminate command is
    /// sent; whatever the remote answers, this side no longer considers the
    /// file open.
    pub async fn close(&self, path: &str) -> Result<(), Error> {
        let done = self
            .run_operation(self.timeouts.ack(), |st| {
                let session = st.session_u8(path)?;
                let _ = st.sessions.remove(path);
                let pkt = Packet::command(Opcode::TerminateSession, session);
                st.op = Operation::AwaitingAck;
                self.transmit(st, pkt)
            })
            .await?;
        Self::expect_done(&done)
    }

    /// Reads up to `len` bytes from `offset` of the open file at `path`.
    ///
    /// The result is shorter than `len` only if the remote ran out of file.
    pub async fn read(&self, path: &str, offset: u32, len: usize) -> Result<Vec<u8>, Error> {
        let done = self
            .run_operation(self.timeouts.transfer(len), |st| {
                let session = st.session_u8(path)?;
                st.op = Operation::Reading {
                    session,
                    offset,
                    wanted: len,
                    buffer: Vec::with_capacity(len),
                };
                self.send_read_chunk(st)
            })
            .await?;
        let Completion::Data(data) = done else {
            return Err(Error::Internal("read completed without data"));
        };
        Ok(data)
    }

    /// Writes `bytes` at `offset` of the open file at `path`.
    ///
    /// Chunks are resent from wherever the remote says it got to, so a remote
    /// that accepts partial chunks slows the transfer down but does not
    /// corrupt it.
    pub async fn write(&self, path: &str, offset: u32, bytes: Vec<u8>) -> Result<(), Error> {
        if bytes.is_empty() {
            debug!("write of zero bytes: nothing to do");
            return Ok(());
        }
        let len = bytes.len();
        let done = self
            .run_operation(self.timeouts.transfer(len), |st| {
                let session = st.session_u8(path)?;
                st.op = Operation::Writing {
                    session,
                    offset,
                    data: bytes,
                    cursor: 0,
                };
                self.send_write_chunk(st)
            })
            .await?;
        Self::expect_done(&done)
    }

    /// Removes the remote file at `path`
    pub async fn remove(&self, path: &str) -> Result<(), Error> {
        self.simple_path_command(Opcode::RemoveFile, path).await
    }

    /// Creates a remote directory at `path`
    pub async fn mkdir(&self, path: &str) -> Result<(), Error> {
        self.simple_path_command(Opcode::CreateDirectory, path).await
    }

    /// Removes the remote directory at `path`; it must be empty
    pub async fn rmdir(&self, path: &str) -> Result<(), Error> {
        self.simple_path_command(Opcode::RemoveDirectory, path).await
    }

    /// Truncates the remote file at `path` to `length` bytes.
    ///
    /// Remotes without native truncate may rewrite the file to do this, so
    /// the deadline is a generous multiple of the usual command timeout.
    pub async fn truncate(&self, path: &str, length: u32) -> Result<(), Error> {
        let done = self
            .run_operation(self.timeouts.truncate(), |st| {
                let pkt = Self::path_packet(Opcode::TruncateFile, 0, path, length)?;
                st.op = Operation::AwaitingAck;
                self.transmit(st, pkt)
            })
            .await?;
        Self::expect_done(&done)
    }

    /// Renames `old` to `new` on the remote.
    ///
    /// Both paths travel in one frame, NUL separated; if they do not fit this
    /// fails locally with [`Error::NameTooLong`] and nothing is sent.
    pub async fn rename(&self, old: &str, new: &str) -> Result<(), Error> {
        let mut data = Vec::with_capacity(old.len() + new.len() + 1);
        data.extend_from_slice(old.as_bytes());
        data.push(0);
        data.extend_from_slice(new.as_bytes());
        if data.len() >= DATA_MAXSZ {
            warn!("rename: combined paths too long ({} bytes)", data.len());
            return Err(Error::NameTooLong);
        }
        let done = self
            .run_operation(self.timeouts.ack(), |st| {
                let mut pkt = Packet::command(Opcode::Rename, 0);
                pkt.data = data;
                st.op = Operation::AwaitingAck;
                self.transmit(st, pkt)
            })
            .await?;
        Self::expect_done(&done)
    }

    /// Asks the remote for a CRC32 over the whole file at `path`
    pub async fn checksum(&self, path: &str) -> Result<u32, Error> {
        let done = self
            .run_operation(self.timeouts.checksum(), |st| {
                let pkt = Self::path_packet(Opcode::CalcFileCRC32, 0, path, 0)?;
                st.op = Operation::Checksum {
                    path: path.to_string(),
                };
                self.transmit(st, pkt)
            })
            .await?;
        let Completion::Crc32(crc) = done else {
            return Err(Error::Internal("checksum completed without a value"));
        };
        Ok(crc)
    }

    /// Abandons whatever is in flight and tells the remote to drop all of its
    /// sessions. The abandoned caller, if any, sees [`Error::Aborted`].
    ///
    /// This breaks other calls; use it to recover, not casually.
    pub fn reset(&self) {
        let mut guard = self.lock();
        let st = &mut *guard;
        if let Some(tx) = st.waiter.take() {
            debug!("reset supersedes operation in flight");
            let _ = tx.send(Err(Error::Aborted));
        }
        self.send_reset(st);
    }

    /// Feed one inbound frame from the transport.
    ///
    /// Call this from wherever the link delivers messages addressed to this
    /// component; any thread or task will do.
    pub fn handle_frame(&self, frame: &[u8], source: LinkAddress) {
        if source.system != self.link.target().system {
            debug!("ignoring frame from {source}: not our remote");
            return;
        }
        let mut guard = self.lock();
        let st = &mut *guard;
        let pkt = match Packet::decode(frame) {
            Ok(pkt) => pkt,
            Err(e) => {
                warn!("malformed frame from {source}: {e}");
                Self::finish(st, Err(Error::Malformed(e)));
                return;
            }
        };
        debug!(
            "rx: seq({}) sess({}) opcode({}) rqop({}) sz({}) off({})",
            pkt.seq,
            pkt.session,
            pkt.opcode,
            pkt.req_opcode,
            pkt.size(),
            pkt.offset
        );
        if pkt.seq != st.last_seq {
            warn!("lost sync: response seq {} expected {}", pkt.seq, st.last_seq);
            Self::finish(
                st,
                Err(Error::LostSync {
                    expected: st.last_seq,
                    got: pkt.seq,
                }),
            );
            return;
        }
        match pkt.opcode {
            Opcode::Ack => self.handle_ack(st, &pkt),
            Opcode::Nak => Self::handle_nak(st, &pkt),
            other => {
                error!("unexpected response opcode {other}");
                Self::finish(st, Err(Error::UnexpectedResponse(other)));
            }
        }
    }

    /// Tell the client the underlying link is gone.
    ///
    /// Remote-held sessions cannot survive a connection loss, so the session
    /// table is cleared wholesale; an operation in flight fails with
    /// [`Error::LinkDown`].
    pub fn handle_link_down(&self) {
        let mut guard = self.lock();
        let st = &mut *guard;
        if !st.sessions.is_empty() {
            info!("link down: dropping {} sessions", st.sessions.len());
            st.sessions.clear();
        }
        Self::finish(st, Err(Error::LinkDown));
    }

    /* -*- dialogue plumbing -*- */

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the engine, runs `begin` (which must send the first frame and
    /// set the new operation), then waits out the dialogue.
    async fn run_operation<F>(&self, deadline: Duration, begin: F) -> OpResult
    where
        F: FnOnce(&mut State) -> Result<(), Error>,
    {
        let rx = {
            let mut guard = self.lock();
            let st = &mut *guard;
            if !matches!(st.op, Operation::Idle) {
                debug!("busy: operation already in flight");
                return Err(Error::Busy);
            }
            if let Err(e) = begin(st) {
                st.op = Operation::Idle;
                st.waiter = None;
                return Err(e);
            }
            let (tx, rx) = oneshot::channel();
            st.waiter = Some(tx);
            rx
        };
        match timeout(deadline, rx).await {
            Ok(Ok(outcome)) => outcome,
            // sender dropped without an outcome; treat as superseded
            Ok(Err(_)) => Err(Error::Aborted),
            Err(_elapsed) => {
                let mut st = self.lock();
                st.op = Operation::Idle;
                st.waiter = None;
                warn!("operation timed out");
                Err(Error::TimedOut)
            }
        }
    }

    /// Stamps the next sequence number and hands the frame to the link
    fn transmit(&self, st: &mut State, mut pkt: Packet) -> Result<(), Error> {
        pkt.seq = st.last_seq.wrapping_add(1);
        let frame = pkt.encode()?;
        st.last_seq = pkt.seq;
        debug!(
            "tx: seq({}) sess({}) opcode({}) sz({}) off({})",
            pkt.seq,
            pkt.session,
            pkt.opcode,
            pkt.size(),
            pkt.offset
        );
        self.link.send_frame(&frame, self.link.target());
        Ok(())
    }

    /// Builds a command whose data region is a single path
    fn path_packet(opcode: Opcode, session: u8, path: &str, offset: u32) -> Result<Packet, Error> {
        let bytes = path.as_bytes();
        // leave room for the NUL the remote's parser expects after the path
        if bytes.len() >= DATA_MAXSZ {
            warn!("path too long ({} bytes): {path:?}", bytes.len());
            return Err(Error::NameTooLong);
        }
        let mut pkt = Packet::command(opcode, session);
        pkt.offset = offset;
        pkt.data = bytes.to_vec();
        Ok(pkt)
    }

    async fn simple_path_command(&self, opcode: Opcode, path: &str) -> Result<(), Error> {
        let done = self
            .run_operation(self.timeouts.ack(), |st| {
                let pkt = Self::path_packet(opcode, 0, path, 0)?;
                st.op = Operation::AwaitingAck;
                self.transmit(st, pkt)
            })
            .await?;
        Self::expect_done(&done)
    }

    fn expect_done(done: &Completion) -> Result<(), Error> {
        if matches!(done, Completion::Done) {
            Ok(())
        } else {
            Err(Error::Internal("mismatched completion kind"))
        }
    }

    /// Terminates the current operation and wakes its caller
    fn finish(st: &mut State, outcome: OpResult) {
        st.op = Operation::Idle;
        if let Some(tx) = st.waiter.take() {
            if tx.send(outcome).is_err() {
                debug!("completion arrived after the caller gave up");
            }
        }
    }

    /// Clears the session table and commands the remote to do the same
    fn send_reset(&self, st: &mut State) {
        if !st.sessions.is_empty() {
            warn!("reset closes {} sessions", st.sessions.len());
            st.sessions.clear();
        }
        st.op = Operation::AwaitingAck;
        let pkt = Packet::command(Opcode::ResetSessions, 0);
        if let Err(e) = self.transmit(st, pkt) {
            error!("could not send reset: {e}");
            st.op = Operation::Idle;
        }
    }

    fn send_read_chunk(&self, st: &mut State) -> Result<(), Error> {
        let Operation::Reading {
            session, offset, ..
        } = &st.op
        else {
            return Err(Error::Internal("read chunk outside a read"));
        };
        let mut pkt = Packet::command(Opcode::ReadFile, *session);
        pkt.offset = *offset;
        // data stays empty: the remote always returns up to a full chunk
        self.transmit(st, pkt)
    }

    fn send_write_chunk(&self, st: &mut State) -> Result<(), Error> {
        let Operation::Writing {
            session,
            offset,
            data,
            cursor,
        } = &st.op
        else {
            return Err(Error::Internal("write chunk outside a write"));
        };
        let take = usize::min(data.len() - cursor, DATA_MAXSZ);
        let mut pkt = Packet::command(Opcode::WriteFile, *session);
        pkt.offset = *offset;
        pkt.data = data[*cursor..cursor + take].to_vec();
        self.transmit(st, pkt)
    }

    /* -*- response handlers -*- */

    fn handle_ack(&self, st: &mut State, pkt: &Packet) {
        match mem::replace(&mut st.op, Operation::Idle) {
            Operation::Idle => {
                // leftover ack from an abandoned dialogue; re-sync both ends
                debug!("ack while idle; resetting remote sessions");
                self.send_reset(st);
            }
            Operation::AwaitingAck => Self::finish(st, Ok(Completion::Done)),
            Operation::Listing {
                path,
                offset,
                entries,
            } => self.ack_listing(st, pkt, path, offset, entries),
            Operation::Opening { path } => Self::ack_open(st, pkt, path),
            Operation::Reading {
                session,
                offset,
                wanted,
                buffer,
            } => self.ack_read(st, pkt, session, offset, wanted, buffer),
            Operation::Writing {
                session,
                offset,
                data,
                cursor,
            } => self.ack_write(st, pkt, session, offset, data, cursor),
            Operation::Checksum { path } => Self::ack_checksum(st, pkt, &path),
        }
    }

    fn handle_nak(st: &mut State, pkt: &Packet) {
        let prev = mem::replace(&mut st.op, Operation::Idle);
        let Some(&code) = pkt.data.first() else {
            error!("nak with empty payload");
            Self::finish(st, Err(Error::BadAckPayload(0)));
            return;
        };
        let is_errno = ErrorCode::from_repr(code) == Some(ErrorCode::FailErrno);
        if !(pkt.size() == 1 || (is_errno && pkt.size() == 2)) {
            error!("nak with inconsistent payload length {}", pkt.size());
            Self::finish(st, Err(Error::BadAckPayload(pkt.size())));
            return;
        }

        // EOF is how the remote says "no more" - which for listing and
        // reading is a normal way to finish
        let is_eof = ErrorCode::from_repr(code) == Some(ErrorCode::Eof);
        match (prev, is_eof) {
            (Operation::Listing { entries, .. }, true) => {
                debug!("list done: {} entries", entries.len());
                Self::finish(st, Ok(Completion::Entries(entries)));
            }
            (Operation::Reading { buffer, .. }, true) => {
                debug!("read done: {} bytes", buffer.len());
                Self::finish(st, Ok(Completion::Data(buffer)));
            }
            _ => {
                let err = Error::from_nak(code, pkt.data.get(1).copied());
                error!("nak answering {}: {err}", pkt.req_opcode);
                Self::finish(st, Err(err));
            }
        }
    }

    fn ack_listing(
        &self,
        st: &mut State,
        pkt: &Packet,
        path: String,
        offset: u32,
        mut entries: Vec<DirEntry>,
    ) {
        debug!("ack list sz({}) off({})", pkt.size(), pkt.offset);
        if pkt.offset != offset {
            error!("list offset mismatch: requested {offset}, got {}", pkt.offset);
            Self::finish(
                st,
                Err(Error::BadOffset {
                    expected: offset,
                    got: pkt.offset,
                }),
            );
            return;
        }
        if pkt.data.is_empty() {
            // directory exhausted
            debug!("list done: {} entries", entries.len());
            Self::finish(st, Ok(Completion::Entries(entries)));
            return;
        }
        match parse_list_page(&pkt.data) {
            Err(e) => {
                error!("list parse failed: {e}");
                Self::finish(st, Err(e.into()));
            }
            Ok(page) => {
                entries.extend(page.entries);
                let offset = offset.wrapping_add(page.parsed);
                match Self::path_packet(Opcode::ListDirectory, 0, &path, offset) {
                    Ok(next) => {
                        st.op = Operation::Listing {
                            path,
                            offset,
                            entries,
                        };
                        if let Err(e) = self.transmit(st, next) {
                            Self::finish(st, Err(e));
                        }
                    }
                    Err(e) => Self::finish(st, Err(e)),
                }
            }
        }
    }

    fn ack_open(st: &mut State, pkt: &Packet, path: String) {
        let Some(size) = data_u32(pkt) else {
            error!("open ack carried {} bytes, wanted 4", pkt.size());
            Self::finish(st, Err(Error::BadAckPayload(pkt.size())));
            return;
        };
        info!("open {path}: session {}, size {size}", pkt.session);
        let session = u32::from(pkt.session);
        let _ = st.sessions.insert(path, session);
        Self::finish(st, Ok(Completion::Opened(OpenedFile::new(session, size))));
    }

    fn ack_read(
        &self,
        st: &mut State,
        pkt: &Packet,
        session: u8,
        offset: u32,
        wanted: usize,
        mut buffer: Vec<u8>,
    ) {
        debug!("ack read sz({})", pkt.size());
        if pkt.session != session {
            error!("read ack for unexpected session {}", pkt.session);
            Self::finish(st, Err(Error::WrongSession));
            return;
        }
        if pkt.offset != offset {
            error!("read offset mismatch: requested {offset}, got {}", pkt.offset);
            Self::finish(
                st,
                Err(Error::BadOffset {
                    expected: offset,
                    got: pkt.offset,
                }),
            );
            return;
        }
        // chunks arrive DATA_MAXSZ long until the final, shorter one; and
        // however much the remote sends, never take more than was asked for
        let left = wanted - buffer.len();
        let take = left.min(pkt.data.len());
        buffer.extend_from_slice(&pkt.data[..take]);

        if take == DATA_MAXSZ {
            #[allow(clippy::cast_possible_truncation)] // take <= DATA_MAXSZ
            let offset = offset.wrapping_add(take as u32);
            st.op = Operation::Reading {
                session,
                offset,
                wanted,
                buffer,
            };
            if let Err(e) = self.send_read_chunk(st) {
                Self::finish(st, Err(e));
            }
        } else {
            debug!("read done: {} bytes", buffer.len());
            Self::finish(st, Ok(Completion::Data(buffer)));
        }
    }

    fn ack_write(
        &self,
        st: &mut State,
        pkt: &Packet,
        session: u8,
        offset: u32,
        data: Vec<u8>,
        cursor: usize,
    ) {
        debug!("ack write sz({})", pkt.size());
        if pkt.session != session {
            error!("write ack for unexpected session {}", pkt.session);
            Self::finish(st, Err(Error::WrongSession));
            return;
        }
        if pkt.offset != offset {
            error!("write offset mismatch: requested {offset}, got {}", pkt.offset);
            Self::finish(
                st,
                Err(Error::BadOffset {
                    expected: offset,
                    got: pkt.offset,
                }),
            );
            return;
        }
        let Some(reported) = data_u32(pkt) else {
            error!("write ack carried {} bytes, wanted 4", pkt.size());
            Self::finish(st, Err(Error::BadAckPayload(pkt.size())));
            return;
        };
        let reported_len = usize::try_from(reported).unwrap_or(usize::MAX);
        let outstanding = data.len() - cursor;
        if reported_len == 0 {
            error!("write ack accepted no bytes");
            Self::finish(st, Err(Error::WriteStalled));
            return;
        }
        if reported_len > outstanding {
            error!("write ack claims {reported_len} bytes, only {outstanding} outstanding");
            Self::finish(
                st,
                Err(Error::WriteOverrun {
                    reported: reported_len,
                    outstanding,
                }),
            );
            return;
        }

        let cursor = cursor + reported_len;
        if cursor < data.len() {
            let offset = offset.wrapping_add(reported);
            st.op = Operation::Writing {
                session,
                offset,
                data,
                cursor,
            };
            if let Err(e) = self.send_write_chunk(st) {
                Self::finish(st, Err(e));
            }
        } else {
            debug!("write done: {} bytes", data.len());
            Self::finish(st, Ok(Completion::Done));
        }
    }

    fn ack_checksum(st: &mut State, pkt: &Packet, path: &str) {
        let Some(crc) = data_u32(pkt) else {
            error!("checksum ack carried {} bytes, wanted 4", pkt.size());
            Self::finish(st, Err(Error::BadAckPayload(pkt.size())));
            return;
        };
        debug!("checksum {path}: {crc:#010x}");
        Self::finish(st, Ok(Completion::Crc32(crc)));
    }
}

/// Reads an exactly-four-byte little-endian payload
fn data_u32(pkt: &Packet) -> Option<u32> {
    let bytes: [u8; 4] = pkt.data.as_slice().try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
