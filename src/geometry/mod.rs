pub mod filter;
pub mod state;

pub use filter::{CallConv, FilterEntry, FilterFunc, FilterFuncN, FilterKind, FilterSlot, SimdWidth};
pub use state::LifecycleState;

use crate::error::{RtcError, RtcResult};
use bitflags::bitflags;
use log::{debug, trace};
use std::convert::TryFrom;
use std::io::{self, Write};
use std::os::raw;

/// Index of a geometry inside its scene.
pub type GeomId = u32;

bitflags! {
    /// How a geometry is allowed to change after creation.
    pub struct GeometryFlags : u32 {
        const STATIC = 0;
        const DEFORMABLE = 1 << 0;
        const DYNAMIC = 1 << 1;
    }
}

/// The kind of primitives a geometry holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GeometryType {
    TriangleMesh,
    BezierCurves,
    SubdivMesh,
    UserGeometry,
    Instance,
}

impl GeometryType {
    pub const COUNT: usize = 5;

    pub const ALL: [GeometryType; GeometryType::COUNT] = [
        GeometryType::TriangleMesh,
        GeometryType::BezierCurves,
        GeometryType::SubdivMesh,
        GeometryType::UserGeometry,
        GeometryType::Instance,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The tag written in front of a serialized geometry.
    pub fn type_tag(self) -> i32 {
        match self {
            GeometryType::TriangleMesh => 1,
            GeometryType::UserGeometry => 2,
            GeometryType::BezierCurves => 4,
            GeometryType::SubdivMesh => 8,
            GeometryType::Instance => 16,
        }
    }

    /// Only triangles and hair run the per-primitive filter callbacks.
    pub fn supports_filters(self) -> bool {
        match self {
            GeometryType::TriangleMesh | GeometryType::BezierCurves => true,
            _ => false,
        }
    }
}

//
// Pointer Types
//

/// Representation of null as a usize (probably just 0).
const NULL_USIZE: usize = 0;

/// Opaque host pointer carried by a geometry. It is never dereferenced or owned here.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UserPtr {
    data: usize,
}

impl UserPtr {
    pub fn new_null() -> Self {
        UserPtr { data: NULL_USIZE }
    }

    pub fn is_null(self) -> bool {
        self.data == NULL_USIZE
    }

    pub fn from_raw(ptr: *mut raw::c_void) -> Self {
        UserPtr { data: ptr as usize }
    }

    pub fn get_raw(self) -> *mut raw::c_void {
        self.data as *mut raw::c_void
    }
}

impl Default for UserPtr {
    fn default() -> Self {
        Self::new_null()
    }
}

//
// Scene Interface
//

/// What a geometry needs from the scene that owns it.
///
/// Every mutation of a geometry first asks the scene whether it may happen at all,
/// and then pushes its effect on the scene wide aggregates through here.
pub trait SceneParent {
    /// Static scenes reject lifecycle changes of their geometries.
    fn is_static(&self) -> bool;
    /// Whether the acceleration structure has been built at least once.
    fn is_build(&self) -> bool;
    /// Latches the rebuild flag. Only ever set from here.
    fn set_modified(&self);
    /// Atomically adds `delta` to the filter counter of `width`.
    fn adjust_filter_counter(&self, width: SimdWidth, delta: isize);
    /// Atomically adds `delta` to the enabled primitive count of `kind`.
    fn adjust_primitive_counter(&self, kind: GeometryType, motion_blur: bool, delta: isize);
}

//
// Geometry
//

/// A set of primitives of one kind, owned by a scene.
#[derive(Debug)]
pub struct Geometry {
    kind: GeometryType,
    num_primitives: usize,
    num_time_steps: u32,
    id: GeomId,
    flags: GeometryFlags,

    state: LifecycleState,
    modified: bool,
    mask: u32,

    /// Single ray filters.
    filter1: FilterSlot<FilterFunc>,
    /// Packet filters, indexed by `SimdWidth::index`.
    filters: [FilterSlot<FilterFuncN>; 3],

    user_ptr: UserPtr,
}

impl Geometry {
    /// Creates an enabled geometry. The id must already be reserved by the scene.
    pub fn new(
        parent: &dyn SceneParent,
        id: GeomId,
        kind: GeometryType,
        flags: GeometryFlags,
        num_primitives: usize,
        num_time_steps: u32,
    ) -> Self {
        let geom = Geometry {
            kind,
            num_primitives,
            num_time_steps,
            id,
            flags,
            state: LifecycleState::Enabled,
            modified: true,
            mask: u32::MAX,
            filter1: FilterSlot::new(),
            filters: [FilterSlot::new(); 3],
            user_ptr: UserPtr::new_null(),
        };
        parent.set_modified();
        geom.enabling(parent);
        debug!("created {:?} geometry {} ({} primitives)", kind, id, num_primitives);
        geom
    }

    pub fn id(&self) -> GeomId {
        self.id
    }

    pub fn kind(&self) -> GeometryType {
        self.kind
    }

    pub fn flags(&self) -> GeometryFlags {
        self.flags
    }

    pub fn num_primitives(&self) -> usize {
        self.num_primitives
    }

    pub fn num_time_steps(&self) -> u32 {
        self.num_time_steps
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    pub fn is_disabled(&self) -> bool {
        self.state.is_disabled()
    }

    pub fn is_erasing(&self) -> bool {
        self.state.is_erasing()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn user_data(&self) -> UserPtr {
        self.user_ptr
    }

    //
    // Lifecycle
    //

    pub fn enable(&mut self, parent: &dyn SceneParent) -> RtcResult<()> {
        if parent.is_static() {
            return Err(RtcError::invalid_operation(
                "enable cannot get called in static scenes",
            ));
        }
        if let Some(next) = self.state.on_enable() {
            self.transition(parent, next);
        }
        Ok(())
    }

    pub fn disable(&mut self, parent: &dyn SceneParent) -> RtcResult<()> {
        if parent.is_static() {
            return Err(RtcError::invalid_operation(
                "disable cannot get called in static scenes",
            ));
        }
        if let Some(next) = self.state.on_disable() {
            self.transition(parent, next);
        }
        Ok(())
    }

    pub fn update(&mut self, parent: &dyn SceneParent) -> RtcResult<()> {
        if parent.is_static() {
            return Err(RtcError::invalid_operation(
                "update cannot get called in static scenes",
            ));
        }
        if self.modified || self.is_erasing() {
            return Ok(());
        }
        parent.set_modified();
        self.modified = true;
        debug!("geometry {} marked modified", self.id);
        Ok(())
    }

    pub fn erase(&mut self, parent: &dyn SceneParent) -> RtcResult<()> {
        if parent.is_static() {
            return Err(RtcError::invalid_operation(
                "erase cannot get called in static scenes",
            ));
        }
        if let Some(next) = self.state.on_erase() {
            self.transition(parent, next);
        }
        Ok(())
    }

    /// The only place the lifecycle state changes. The filter counters are adjusted
    /// by the difference between what this geometry contributed before and after.
    fn transition(&mut self, parent: &dyn SceneParent, next: LifecycleState) {
        let prev = self.state;
        let before = self.filter_contributions();
        self.state = next;
        let after = self.filter_contributions();

        for width in SimdWidth::ALL.iter().copied() {
            let delta = after[width.index()] - before[width.index()];
            if delta != 0 {
                parent.adjust_filter_counter(width, delta);
            }
        }
        parent.set_modified();

        match (prev.is_enabled(), next.is_enabled()) {
            (false, true) => self.enabling(parent),
            (true, false) => self.disabling(parent),
            _ => {}
        }
        debug!("geometry {}: {:?} -> {:?}", self.id, prev, next);
    }

    /// How many filters of `width` this geometry currently adds to the scene counter.
    fn filter_contribution(&self, width: SimdWidth) -> isize {
        if self.state.is_enabled() {
            self.filters[width.index()].count() as isize
        } else {
            0
        }
    }

    fn filter_contributions(&self) -> [isize; 3] {
        [
            self.filter_contribution(SimdWidth::W4),
            self.filter_contribution(SimdWidth::W8),
            self.filter_contribution(SimdWidth::W16),
        ]
    }

    fn enabling(&self, parent: &dyn SceneParent) {
        parent.adjust_primitive_counter(
            self.kind,
            self.num_time_steps > 1,
            self.primitive_contribution(),
        );
    }

    fn disabling(&self, parent: &dyn SceneParent) {
        parent.adjust_primitive_counter(
            self.kind,
            self.num_time_steps > 1,
            -self.primitive_contribution(),
        );
    }

    // Saturates, the scene refuses counts that do not fit before they get here.
    fn primitive_contribution(&self) -> isize {
        isize::try_from(self.num_primitives).unwrap_or(isize::MAX)
    }

    /// Called by the scene once it has rebuilt with this geometry.
    pub(crate) fn clear_modified(&mut self) {
        self.modified = false;
    }

    //
    // Data
    //

    pub fn set_user_data(&mut self, parent: &dyn SceneParent, ptr: UserPtr) -> RtcResult<()> {
        check_not_frozen(parent)?;
        self.user_ptr = ptr;
        Ok(())
    }

    pub fn set_mask(&mut self, parent: &dyn SceneParent, mask: u32) -> RtcResult<()> {
        check_not_frozen(parent)?;
        self.mask = mask;
        Ok(())
    }

    //
    // Filters
    //

    /// Registers (or clears, with `None`) a packet filter of the given width.
    ///
    /// All six packet entry points end up here. Registration does not mark the
    /// scene as modified.
    pub fn set_filter(
        &mut self,
        parent: &dyn SceneParent,
        width: SimdWidth,
        kind: FilterKind,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        self.check_filter_allowed(parent)?;

        let slot = &mut self.filters[width.index()];
        let old = slot.get(kind);
        if self.state.is_enabled() {
            let delta = func.is_some() as isize - old.is_set() as isize;
            if delta != 0 {
                parent.adjust_filter_counter(width, delta);
            }
        }
        slot.replace(kind, FilterEntry::new(func, conv));

        trace!(
            "geometry {}: {:?} filter{} {}",
            self.id,
            kind,
            width.lanes(),
            if func.is_some() { "set" } else { "cleared" }
        );
        Ok(())
    }

    /// Registers (or clears) a single ray filter. These are never counted.
    pub fn set_filter1(
        &mut self,
        parent: &dyn SceneParent,
        kind: FilterKind,
        func: Option<FilterFunc>,
    ) -> RtcResult<()> {
        self.check_filter_allowed(parent)?;
        self.filter1.replace(kind, FilterEntry::new(func, CallConv::Native));
        trace!(
            "geometry {}: {:?} filter1 {}",
            self.id,
            kind,
            if func.is_some() { "set" } else { "cleared" }
        );
        Ok(())
    }

    pub fn set_intersection_filter1(
        &mut self,
        parent: &dyn SceneParent,
        func: Option<FilterFunc>,
    ) -> RtcResult<()> {
        self.set_filter1(parent, FilterKind::Intersection, func)
    }

    pub fn set_occlusion_filter1(
        &mut self,
        parent: &dyn SceneParent,
        func: Option<FilterFunc>,
    ) -> RtcResult<()> {
        self.set_filter1(parent, FilterKind::Occlusion, func)
    }

    pub fn set_intersection_filter4(
        &mut self,
        parent: &dyn SceneParent,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        self.set_filter(parent, SimdWidth::W4, FilterKind::Intersection, func, conv)
    }

    pub fn set_intersection_filter8(
        &mut self,
        parent: &dyn SceneParent,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        self.set_filter(parent, SimdWidth::W8, FilterKind::Intersection, func, conv)
    }

    pub fn set_intersection_filter16(
        &mut self,
        parent: &dyn SceneParent,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        self.set_filter(parent, SimdWidth::W16, FilterKind::Intersection, func, conv)
    }

    pub fn set_occlusion_filter4(
        &mut self,
        parent: &dyn SceneParent,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        self.set_filter(parent, SimdWidth::W4, FilterKind::Occlusion, func, conv)
    }

    pub fn set_occlusion_filter8(
        &mut self,
        parent: &dyn SceneParent,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        self.set_filter(parent, SimdWidth::W8, FilterKind::Occlusion, func, conv)
    }

    pub fn set_occlusion_filter16(
        &mut self,
        parent: &dyn SceneParent,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        self.set_filter(parent, SimdWidth::W16, FilterKind::Occlusion, func, conv)
    }

    /// The packet filter registered for `width` and `kind`.
    pub fn filter(&self, width: SimdWidth, kind: FilterKind) -> FilterEntry<FilterFuncN> {
        self.filters[width.index()].get(kind)
    }

    /// The single ray filter registered for `kind`.
    pub fn filter1(&self, kind: FilterKind) -> Option<FilterFunc> {
        self.filter1.get(kind).func
    }

    fn check_filter_allowed(&self, parent: &dyn SceneParent) -> RtcResult<()> {
        check_not_frozen(parent)?;
        if !self.kind.supports_filters() {
            return Err(RtcError::invalid_operation(
                "filter functions only supported for triangle meshes and hair geometries",
            ));
        }
        Ok(())
    }

    /// Writes the type tag of this geometry. The primitive data itself is not written.
    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.kind.type_tag().to_le_bytes())
    }
}

/// Data and filters can still change in a static scene, up until its first build.
fn check_not_frozen(parent: &dyn SceneParent) -> RtcResult<()> {
    if parent.is_static() && parent.is_build() {
        return Err(RtcError::invalid_operation("static scenes cannot get modified"));
    }
    Ok(())
}
