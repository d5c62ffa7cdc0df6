use std::os::raw;

//
// Callback Types
//

/// Filter callback for single rays: `(user_ptr, ray)`.
pub type FilterFunc = unsafe extern "C" fn(user_ptr: *mut raw::c_void, ray: *mut raw::c_void);

/// Filter callback for ray packets: `(valid, user_ptr, ray)`. `valid` points to one
/// mask entry per lane of the packet.
pub type FilterFuncN = unsafe extern "C" fn(
    valid: *const raw::c_void,
    user_ptr: *mut raw::c_void,
    ray: *mut raw::c_void,
);

//
// Widths and Directions
//

/// The packet widths that carry their own filter slot and scene counter.
/// Single rays (width 1) are handled separately and are never counted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SimdWidth {
    W4,
    W8,
    W16,
}

impl SimdWidth {
    pub const ALL: [SimdWidth; 3] = [SimdWidth::W4, SimdWidth::W8, SimdWidth::W16];

    /// Number of rays in a packet of this width.
    pub fn lanes(self) -> usize {
        match self {
            SimdWidth::W4 => 4,
            SimdWidth::W8 => 8,
            SimdWidth::W16 => 16,
        }
    }

    /// Index into per-width arrays.
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Intersection,
    Occlusion,
}

/// Layout of the ray packet handed to a packet filter. `Ispc` callbacks receive the
/// portable ISPC representation, `Native` ones receive the packet in native vector form.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallConv {
    Native,
    Ispc,
}

impl Default for CallConv {
    fn default() -> Self {
        CallConv::Native
    }
}

impl CallConv {
    pub fn is_ispc(self) -> bool {
        self == CallConv::Ispc
    }
}

//
// Filter Slot
//

/// A registered callback (or nothing) together with its calling convention.
#[derive(Copy, Clone, Debug)]
pub struct FilterEntry<F> {
    pub func: Option<F>,
    pub conv: CallConv,
}

impl<F> FilterEntry<F> {
    pub fn empty() -> Self {
        FilterEntry {
            func: None,
            conv: CallConv::Native,
        }
    }

    pub fn new(func: Option<F>, conv: CallConv) -> Self {
        FilterEntry { func, conv }
    }

    pub fn is_set(&self) -> bool {
        self.func.is_some()
    }
}

/// The intersection and occlusion filters of one width.
#[derive(Copy, Clone, Debug)]
pub struct FilterSlot<F> {
    intersection: FilterEntry<F>,
    occlusion: FilterEntry<F>,
}

impl<F: Copy> FilterSlot<F> {
    pub fn new() -> Self {
        FilterSlot {
            intersection: FilterEntry::empty(),
            occlusion: FilterEntry::empty(),
        }
    }

    pub fn get(&self, kind: FilterKind) -> FilterEntry<F> {
        match kind {
            FilterKind::Intersection => self.intersection,
            FilterKind::Occlusion => self.occlusion,
        }
    }

    /// Replaces the entry for `kind`, returning the old one.
    pub(crate) fn replace(&mut self, kind: FilterKind, entry: FilterEntry<F>) -> FilterEntry<F> {
        let slot = match kind {
            FilterKind::Intersection => &mut self.intersection,
            FilterKind::Occlusion => &mut self.occlusion,
        };
        std::mem::replace(slot, entry)
    }

    /// Number of non-empty filters in this slot (0, 1 or 2).
    pub fn count(&self) -> usize {
        self.intersection.is_set() as usize + self.occlusion.is_set() as usize
    }
}

impl<F: Copy> Default for FilterSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "C" fn reject(_: *const raw::c_void, _: *mut raw::c_void, _: *mut raw::c_void) {}

    #[test]
    fn count_tracks_both_directions() {
        let mut slot: FilterSlot<FilterFuncN> = FilterSlot::new();
        assert_eq!(slot.count(), 0);

        slot.replace(
            FilterKind::Intersection,
            FilterEntry::new(Some(reject as FilterFuncN), CallConv::Ispc),
        );
        assert_eq!(slot.count(), 1);
        assert!(slot.get(FilterKind::Intersection).conv.is_ispc());
        assert!(!slot.get(FilterKind::Occlusion).is_set());

        slot.replace(
            FilterKind::Occlusion,
            FilterEntry::new(Some(reject as FilterFuncN), CallConv::Native),
        );
        assert_eq!(slot.count(), 2);

        let old = slot.replace(FilterKind::Intersection, FilterEntry::empty());
        assert!(old.is_set());
        assert_eq!(slot.count(), 1);
    }

    #[test]
    fn widths_index_per_width_arrays() {
        let lanes: Vec<usize> = SimdWidth::ALL.iter().map(|w| w.lanes()).collect();
        assert_eq!(lanes, vec![4, 8, 16]);
        for (i, width) in SimdWidth::ALL.iter().enumerate() {
            assert_eq!(width.index(), i);
        }
    }
}
