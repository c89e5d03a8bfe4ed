// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! String interning and the string resource block.
//!
//! Every piece of text in a pack (names, hashes, category paths, string
//! fields) is stored once in a string block and referenced elsewhere by a
//! [`StringId`]. Ids are dense indices assigned in insertion order; id `0` is
//! always the empty string.
//!
//! Two flavours exist:
//! - [`StringInterner`]: single-owner, used by one table encoder.
//! - [`SharedStringTable`]: mutex-guarded, shared by the file writer. Local
//!   interners are merged into it in table order, which keeps global ids
//!   independent of worker scheduling.

use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

/// Identifier of an interned string.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StringId(pub u32);

impl StringId {
    /// Id of the empty string, present in every interner.
    pub const EMPTY: Self = Self(0);

    /// Returns the id as an index into the string arena.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for StringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Collapses `\r\n` and lone `\r` into `\n`.
pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Arena-backed string interner with sequential ids.
#[derive(Debug, Clone)]
pub struct StringInterner {
    arena: Vec<Arc<str>>,
    ids: FxHashMap<Arc<str>, StringId>,
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl StringInterner {
    /// Creates an interner holding only the empty string.
    pub fn new() -> Self {
        let empty: Arc<str> = Arc::from("");
        let mut ids = FxHashMap::default();
        ids.insert(Arc::clone(&empty), StringId::EMPTY);
        Self {
            arena: vec![empty],
            ids,
        }
    }

    /// Interns `text` after newline normalization and returns its id.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` distinct strings are interned.
    #[allow(clippy::panic)] // a pack cannot address more strings than u32 ids
    pub fn intern(&mut self, text: &str) -> StringId {
        let text = normalize_newlines(text);
        if let Some(id) = self.ids.get(&*text) {
            return *id;
        }
        let Ok(next) = u32::try_from(self.arena.len()) else {
            panic!("string id space exhausted");
        };
        let id = StringId(next);
        let stored: Arc<str> = Arc::from(&*text);
        self.arena.push(Arc::clone(&stored));
        self.ids.insert(stored, id);
        id
    }

    /// Returns the text for `id`, if interned.
    pub fn get(&self, id: StringId) -> Option<&str> {
        self.arena.get(id.index()).map(|text| &**text)
    }

    /// Number of distinct strings, including the empty string.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Always false: the empty string is pre-interned.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Iterates strings in id order.
    #[allow(clippy::cast_possible_truncation)] // `intern` caps the arena at u32 ids
    pub fn iter(&self) -> impl Iterator<Item = (StringId, &str)> + '_ {
        self.arena
            .iter()
            .enumerate()
            .map(|(ix, text)| (StringId(ix as u32), &**text))
    }
}

/// Thread-safe string table shared across a serialization run.
#[derive(Debug, Default)]
pub struct SharedStringTable {
    inner: Mutex<StringInterner>,
}

impl SharedStringTable {
    /// Creates a table holding only the empty string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `text` and returns its global id.
    pub fn intern(&self, text: &str) -> StringId {
        self.lock().intern(text)
    }

    /// Interns every string of `local` in id order and returns the
    /// local-to-global id map, indexed by local id.
    pub fn merge(&self, local: &StringInterner) -> Vec<StringId> {
        let mut inner = self.lock();
        local.iter().map(|(_, text)| inner.intern(text)).collect()
    }

    /// Number of distinct strings.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Always false: the empty string is pre-interned.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Consumes the table and returns the underlying interner.
    pub fn into_interner(self) -> StringInterner {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StringInterner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One entry of a decoded string block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEntry<'a> {
    /// Id the entry is registered under.
    pub id: StringId,
    /// UTF-8 text.
    pub text: &'a str,
}

/// Reasons a string block cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StringBlockError {
    /// The block ends before the declared entries do.
    #[error("string block truncated at byte {at}")]
    Truncated {
        /// Offset within the block where more bytes were needed.
        at: usize,
    },
    /// An entry is not valid UTF-8.
    #[error("string {id} is not valid UTF-8")]
    InvalidUtf8 {
        /// Offending entry id.
        id: StringId,
    },
}

/// Writes `count` followed by `(id, byte_len, bytes)` for each string.
pub fn write_string_block<'a, W, I>(sink: &mut W, count: u32, entries: I) -> io::Result<usize>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = (StringId, &'a str)>,
{
    sink.write_all(&count.to_le_bytes())?;
    let mut written = 4;
    for (id, text) in entries {
        let len = u32::try_from(text.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string exceeds u32 length"))?;
        sink.write_all(&id.0.to_le_bytes())?;
        sink.write_all(&len.to_le_bytes())?;
        sink.write_all(text.as_bytes())?;
        written += 8 + text.len();
    }
    Ok(written)
}

/// Decodes a string block starting at the beginning of `data`.
///
/// Returns the entries and the number of bytes consumed.
pub fn read_string_block(data: &[u8]) -> Result<(Vec<StringEntry<'_>>, usize), StringBlockError> {
    let mut at = 0usize;
    let count = read_u32(data, &mut at)?;
    let mut entries = Vec::with_capacity((count as usize).min(data.len() / 8));
    for _ in 0..count {
        let id = StringId(read_u32(data, &mut at)?);
        let len = read_u32(data, &mut at)? as usize;
        let end = at
            .checked_add(len)
            .filter(|end| *end <= data.len())
            .ok_or(StringBlockError::Truncated { at })?;
        let text =
            std::str::from_utf8(&data[at..end]).map_err(|_| StringBlockError::InvalidUtf8 { id })?;
        entries.push(StringEntry { id, text });
        at = end;
    }
    Ok((entries, at))
}

fn read_u32(data: &[u8], at: &mut usize) -> Result<u32, StringBlockError> {
    let end = *at + 4;
    let bytes: [u8; 4] = data
        .get(*at..end)
        .and_then(|s| s.try_into().ok())
        .ok_or(StringBlockError::Truncated { at: *at })?;
    *at = end;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_id_zero() {
        let mut interner = StringInterner::new();
        assert_eq!(interner.intern(""), StringId::EMPTY);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn interning_is_idempotent_and_sequential() {
        let mut interner = StringInterner::new();
        let a = interner.intern("alpha");
        let b = interner.intern("beta");
        assert_eq!(a, StringId(1));
        assert_eq!(b, StringId(2));
        assert_eq!(interner.intern("alpha"), a);
        assert_eq!(interner.len(), 3);
        assert_eq!(interner.get(b), Some("beta"));
    }

    #[test]
    fn line_endings_collapse_to_one_entry() {
        let mut interner = StringInterner::new();
        let unix = interner.intern("a\nb");
        assert_eq!(interner.intern("a\r\nb"), unix);
        assert_eq!(interner.intern("a\rb"), unix);
        assert_eq!(interner.get(unix), Some("a\nb"));
        assert_eq!(normalize_newlines("x\r\n\r\ny"), "x\n\ny");
    }

    #[test]
    fn merge_returns_local_to_global_map() {
        let shared = SharedStringTable::new();
        shared.intern("header");

        let mut local = StringInterner::new();
        local.intern("row");
        local.intern("header");

        let map = shared.merge(&local);
        assert_eq!(map, vec![StringId(0), StringId(2), StringId(1)]);
        assert_eq!(shared.len(), 3);
    }

    #[test]
    fn shared_table_is_consistent_across_threads() {
        let shared = SharedStringTable::new();
        let ids: Vec<Vec<StringId>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        (0..50)
                            .map(|i| shared.intern(&format!("s{i}")))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for other in &ids[1..] {
            assert_eq!(other, &ids[0]);
        }
        assert_eq!(shared.len(), 51);
    }

    #[test]
    fn block_round_trips() {
        let mut interner = StringInterner::new();
        interner.intern("Users");
        interner.intern("héllo");
        let mut buf = Vec::new();
        let written = write_string_block(&mut buf, interner.len() as u32, interner.iter()).unwrap();
        assert_eq!(written, buf.len());

        let (entries, used) = read_string_block(&buf).unwrap();
        assert_eq!(used, buf.len());
        let texts: Vec<_> = entries.iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["", "Users", "héllo"]);
        assert_eq!(entries[2].id, StringId(2));
    }

    #[test]
    fn truncated_block_is_rejected() {
        let mut buf = Vec::new();
        write_string_block(&mut buf, 1, [(StringId(0), "abc")]).unwrap();
        buf.pop();
        assert!(matches!(
            read_string_block(&buf),
            Err(StringBlockError::Truncated { .. })
        ));
    }
}
