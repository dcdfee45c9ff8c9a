use std::fmt::{Debug, Error, Formatter};
use std::iter::FromIterator;

/// Elements with a width (eg. when used in an `OffsetVec`)
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector of elements of different logical "widths", where offsets into the vector are given in
/// terms of the sum of the widths of the previous elements (as opposed to the number of preceding
/// elements).
///
/// Class files need this in two places:
///
///   - the constant pool (most entries have width 1, but `long`/`double` have width 2)
///   - locals in a frame (`long`/`double` locals occupy two slots)
///
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,
}

/// Offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub usize);

impl<T: Sized + Width> OffsetVec<T> {
    /// New empty offset vector
    pub fn new() -> OffsetVec<T> {
        OffsetVec::new_starting_at(Offset(0))
    }

    /// New empty offset vector, with a custom starting offset
    pub fn new_starting_at(initial_offset: Offset) -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: initial_offset,
        }
    }

    /// Number of entries (not the sum of their widths)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offset of the next element to be added
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Add an entry to the back, returning the offset at which it was placed
    pub fn push(&mut self, elem: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += elem.width();
        self.entries.push((offset, elem));
        offset
    }

    /// Remove an entry from the back
    pub fn pop(&mut self) -> Option<(Offset, T)> {
        let (offset, elem) = self.entries.pop()?;
        self.offset_len = offset;
        Some((offset, elem))
    }

    /// Drop entries from the back until at most `len` entries remain
    pub fn truncate(&mut self, len: usize) {
        while self.entries.len() > len {
            self.pop();
        }
    }

    /// Get an entry by the offset at which it starts
    ///
    /// Offsets that land in the middle of a wide entry, or past the end, return `None`.
    pub fn get_offset(&self, offset: Offset) -> Option<&T> {
        self.entries
            .binary_search_by_key(&offset, |(off, _)| *off)
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Offset, &T)> + '_ {
        self.entries.iter().map(|(offset, t)| (*offset, t))
    }

    /// Iterate over the entries only
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.entries.iter().map(|(_, t)| t)
    }
}

impl<A: PartialEq> PartialEq for OffsetVec<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<A: Eq> Eq for OffsetVec<A> {}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        offset_vec.extend(elems);
        offset_vec
    }
}

impl<T: Width> Extend<T> for OffsetVec<T> {
    fn extend<U: IntoIterator<Item = T>>(&mut self, iter: U) {
        for elem in iter {
            self.push(elem);
        }
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Slot {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::Narrow(_) => 1,
                Slot::Wide(_) => 2,
            }
        }
    }

    #[test]
    fn offsets_account_for_wide_entries() {
        let slots: OffsetVec<Slot> = vec![Slot::Narrow(1), Slot::Wide(2), Slot::Narrow(3)]
            .into_iter()
            .collect();
        assert_eq!(
            slots.iter().collect::<Vec<_>>(),
            vec![
                (Offset(0), &Slot::Narrow(1)),
                (Offset(1), &Slot::Wide(2)),
                (Offset(3), &Slot::Narrow(3)),
            ]
        );
        assert_eq!(slots.offset_len(), Offset(4));
    }

    #[test]
    fn lookup_inside_wide_entry_fails() {
        let mut pool: OffsetVec<Slot> = OffsetVec::new_starting_at(Offset(1));
        pool.push(Slot::Wide(7));
        pool.push(Slot::Narrow(8));
        assert_eq!(pool.get_offset(Offset(1)), Some(&Slot::Wide(7)));
        assert_eq!(pool.get_offset(Offset(2)), None);
        assert_eq!(pool.get_offset(Offset(3)), Some(&Slot::Narrow(8)));
        assert_eq!(pool.get_offset(Offset(4)), None);
    }

    #[test]
    fn truncate_restores_offset() {
        let mut locals: OffsetVec<Slot> = vec![Slot::Narrow(0), Slot::Wide(1), Slot::Wide(2)]
            .into_iter()
            .collect();
        locals.truncate(1);
        assert_eq!(locals.len(), 1);
        assert_eq!(locals.offset_len(), Offset(1));
    }
}
