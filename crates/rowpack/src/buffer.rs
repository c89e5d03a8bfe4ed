// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Growable byte buffer with reserve-then-patch and string reference tracking.
//!
//! Tables and rows are built here instead of on the destination stream, so
//! every offset is known before any byte leaves the process. Each position
//! holding a [`StringId`] is recorded; ids are local to the buffer's
//! interner until [`PatchBuffer::remap_strings`] rewrites them.

use bytemuck::Pod;

use crate::strings::StringId;

/// A position in a [`PatchBuffer`] reserved for a later value of type `T`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reserved<T> {
    pos: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Reserved<T> {
    pub(crate) fn pos(self) -> usize {
        self.pos
    }
}

#[derive(Debug, Default)]
pub(crate) struct PatchBuffer {
    bytes: Vec<u8>,
    string_refs: Vec<usize>,
}

impl PatchBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn put_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub(crate) fn put_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_slice(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub(crate) fn put_pod<T: Pod>(&mut self, value: &T) {
        self.bytes.extend_from_slice(bytemuck::bytes_of(value));
    }

    /// Appends a string id and records its position for remapping.
    pub(crate) fn put_string_id(&mut self, id: StringId) {
        self.string_refs.push(self.bytes.len());
        self.put_u32(id.0);
    }

    /// Records that the u32 at `pos` holds a string id.
    pub(crate) fn mark_string_ref(&mut self, pos: usize) {
        self.string_refs.push(pos);
    }

    /// Appends zeroed space for a `T` and returns its position.
    pub(crate) fn reserve<T: Pod>(&mut self) -> Reserved<T> {
        let pos = self.bytes.len();
        self.bytes.resize(pos + std::mem::size_of::<T>(), 0);
        Reserved {
            pos,
            _marker: std::marker::PhantomData,
        }
    }

    /// Appends `count` zeroed u32 slots and returns the first slot position.
    pub(crate) fn reserve_u32s(&mut self, count: usize) -> usize {
        let pos = self.bytes.len();
        self.bytes.resize(pos + count * 4, 0);
        pos
    }

    /// Overwrites a reserved `T`.
    pub(crate) fn patch<T: Pod>(&mut self, slot: Reserved<T>, value: &T) {
        let src = bytemuck::bytes_of(value);
        self.bytes[slot.pos..slot.pos + src.len()].copy_from_slice(src);
    }

    /// Overwrites the u32 at `pos`.
    pub(crate) fn patch_u32(&mut self, pos: usize, value: u32) {
        self.bytes[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Rewrites every recorded string id through `map` (indexed by old id).
    ///
    /// # Panics
    ///
    /// Panics if a recorded id is outside `map`; every recorded id comes
    /// from the interner the map was built from.
    #[allow(clippy::panic)]
    pub(crate) fn remap_strings(&mut self, map: &[StringId]) {
        for &pos in &self.string_refs {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&self.bytes[pos..pos + 4]);
            let local = u32::from_le_bytes(raw) as usize;
            let Some(global) = map.get(local) else {
                panic!("string id {local} at byte {pos} missing from remap table");
            };
            self.bytes[pos..pos + 4].copy_from_slice(&global.0.to_le_bytes());
        }
    }

    pub(crate) fn string_ref_count(&self) -> usize {
        self.string_refs.len()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable tail used by block writers that take `impl Write`.
    pub(crate) fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::layout::TableInfo;

    #[test]
    fn reserve_then_patch_leaves_cursor_at_end() {
        let mut buf = PatchBuffer::new();
        buf.put_u8(7);
        let slot = buf.reserve::<TableInfo>();
        buf.put_u32(0xAABB_CCDD);
        let info = TableInfo {
            name_le: 1u32.to_le(),
            category_le: 2u32.to_le(),
            column_count_le: 3u32.to_le(),
            row_count_le: 4u32.to_le(),
        };
        buf.patch(slot, &info);

        assert_eq!(buf.len(), 1 + TableInfo::SIZE + 4);
        let back: TableInfo = bytemuck::pod_read_unaligned(&buf.as_bytes()[1..1 + TableInfo::SIZE]);
        assert_eq!(back, info);
        assert_eq!(&buf.as_bytes()[17..], &0xAABB_CCDDu32.to_le_bytes());
    }

    #[test]
    fn remap_rewrites_only_recorded_positions() {
        let mut buf = PatchBuffer::new();
        buf.put_string_id(StringId(1));
        buf.put_u32(1);
        buf.put_string_id(StringId(2));

        buf.remap_strings(&[StringId(0), StringId(10), StringId(20)]);
        let words: Vec<u32> = buf
            .as_bytes()
            .chunks(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(words, vec![10, 1, 20]);
        assert_eq!(buf.string_ref_count(), 2);
    }
}
