//! Directory listing entries and their wire text encoding
// (c) 2025 Ross Younger
//!
//! A `ListDirectory` Ack carries a run of NUL-terminated entries, each
//! starting with a one-character tag:
//!
//! ```text
//! <tag><name>[\t<decimal-size>]\0      tag ∈ { 'F', 'D', 'S' }
//! ```
//!
//! `F` is a file (with an optional tab-separated decimal size), `D` a
//! directory, `S` a skip marker standing in for an entry the remote chose not
//! to describe. Skip markers still occupy a slot in the logical listing, so
//! they count towards the offset used to request the next page.

use tracing::{debug, warn};

/// Entry tag for a file
pub const TAG_FILE: u8 = b'F';
/// Entry tag for a directory
pub const TAG_DIR: u8 = b'D';
/// Entry tag for a skipped slot
pub const TAG_SKIP: u8 = b'S';

/// What kind of object a listing entry names
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
pub enum EntryKind {
    /// A regular file
    File,
    /// A directory
    Directory,
}

/// One parsed directory-listing entry
#[derive(Clone, Debug, Eq, PartialEq, derive_more::Constructor)]
pub struct DirEntry {
    /// Name of the entry, without any directory components
    pub name: String,
    /// File or directory
    pub kind: EntryKind,
    /// Size in bytes; zero for directories and files of unreported size
    pub size: u64,
}

/// Faults detected while parsing a listing page
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum EntryError {
    /// An entry's tag and length did not agree
    #[error("incorrect list entry {0:?}")]
    BadEntry(String),
    /// An entry ran off the end of the data region without a NUL
    #[error("missing NUL termination in list entry")]
    MissingTerminator,
    /// A file entry's size field was not a decimal number
    #[error("unparseable file size {0:?}")]
    BadSize(String),
}

/// One decoded page of a directory listing
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ListPage {
    /// Entries worth reporting (files and directories)
    pub(crate) entries: Vec<DirEntry>,
    /// Every slot consumed, including skip markers and unknown tags.
    /// This is the amount the next page request's offset advances by.
    pub(crate) parsed: u32,
}

/// Parses the data region of a `ListDirectory` Ack.
///
/// Parsing is pure: the same bytes always yield the same entries, in order.
pub(crate) fn parse_list_page(data: &[u8]) -> Result<ListPage, EntryError> {
    let mut entries = Vec::new();
    let mut parsed = 0u32;
    let mut off = 0usize;

    while off < data.len() {
        let rest = &data[off..];
        let Some(len) = rest.iter().position(|b| *b == 0) else {
            return Err(EntryError::MissingTerminator);
        };
        let entry = &rest[..len];
        match entry.first() {
            Some(&TAG_SKIP) if len == 1 => (),
            Some(&(TAG_FILE | TAG_DIR)) if len >= 2 => entries.push(parse_entry(entry)?),
            Some(&tag) if tag != TAG_SKIP && len >= 2 => {
                warn!("unknown list entry tag {:?}", char::from(tag));
            }
            _ => return Err(EntryError::BadEntry(lossy(entry))),
        }
        off += len + 1;
        parsed += 1;
    }

    Ok(ListPage { entries, parsed })
}

/// Parses a single tagged entry (tag byte plus at least one name byte)
fn parse_entry(entry: &[u8]) -> Result<DirEntry, EntryError> {
    let body = &entry[1..];
    if entry[0] == TAG_DIR {
        let ent = DirEntry::new(lossy(body), EntryKind::Directory, 0);
        debug!("list dir: {}", ent.name);
        return Ok(ent);
    }

    // file: name, then an optional tab and decimal size
    let (name, size) = match body.iter().position(|b| *b == b'\t') {
        Some(sep) => {
            let digits = &body[sep + 1..];
            let size = if digits.is_empty() {
                0
            } else {
                lossy(digits)
                    .parse()
                    .map_err(|_| EntryError::BadSize(lossy(digits)))?
            };
            (lossy(&body[..sep]), size)
        }
        None => (lossy(body), 0),
    };
    debug!("list file: {name} sz: {size}");
    Ok(DirEntry::new(name, EntryKind::File, size))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::{DirEntry, EntryError, EntryKind, parse_list_page};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn mixed_page() {
        let page = parse_list_page(b"Ffoo.txt\t123\0Dlogs\0S\0Fbare\0").unwrap();
        assert_eq!(
            page.entries,
            vec![
                DirEntry::new("foo.txt".into(), EntryKind::File, 123),
                DirEntry::new("logs".into(), EntryKind::Directory, 0),
                DirEntry::new("bare".into(), EntryKind::File, 0),
            ]
        );
        // the skip marker still counts towards the page offset
        assert_eq!(page.parsed, 4);
    }

    #[test]
    fn parse_is_idempotent() {
        let data = b"Fone\t1\0Dtwo\0S\0";
        assert_eq!(parse_list_page(data), parse_list_page(data));
    }

    #[test]
    fn empty_page() {
        let page = parse_list_page(b"").unwrap();
        assert!(page.entries.is_empty());
        assert_eq!(page.parsed, 0);
    }

    #[test]
    fn file_with_trailing_tab_has_zero_size() {
        let page = parse_list_page(b"Ffoo\t\0").unwrap();
        assert_eq!(page.entries[0].size, 0);
    }

    #[test]
    fn unknown_tag_is_skipped_but_counted() {
        let page = parse_list_page(b"Xmystery\0Ffoo\0").unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.parsed, 2);
    }

    #[rstest]
    #[case(b"F\0".as_slice())] // tagged entry with no name
    #[case(b"D\0".as_slice())]
    #[case(b"Sx\0".as_slice())] // skip marker with trailing bytes
    #[case(b"\0".as_slice())] // empty entry
    #[case(b"X\0".as_slice())] // unknown tag too short to tolerate
    fn bad_entries(#[case] data: &[u8]) {
        assert!(matches!(
            parse_list_page(data),
            Err(EntryError::BadEntry(_))
        ));
    }

    #[test]
    fn unterminated_entry() {
        assert_eq!(
            parse_list_page(b"Ffoo.txt"),
            Err(EntryError::MissingTerminator)
        );
    }

    #[test]
    fn garbage_size_is_an_error() {
        assert_eq!(
            parse_list_page(b"Ffoo\tbogus\0"),
            Err(EntryError::BadSize("bogus".into()))
        );
    }

    #[test]
    fn non_utf8_names_are_replaced_not_fatal() {
        let page = parse_list_page(b"F\xFF\xFE\0").unwrap();
        assert_eq!(page.entries[0].name, "\u{FFFD}\u{FFFD}");
    }
}
