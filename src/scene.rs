use crate::device::{report, DEVICE};
use crate::error::{RtcError, RtcResult};
use crate::geometry::{
    CallConv, FilterFunc, FilterFuncN, FilterKind, GeomId, Geometry, GeometryFlags,
    GeometryType, SceneParent, SimdWidth, UserPtr,
};
use bitflags::bitflags;
use log::{debug, info};
use std::io::{self, Write};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

bitflags! {
    /// Scene creation flags, with the same bit values as `RTCSceneFlags`.
    pub struct SceneFlags : u32 {
        /// The absence of `DYNAMIC`: the scene is built once and then frozen.
        const STATIC = 0;
        const DYNAMIC = 1 << 0;
        const COMPACT = 1 << 8;
        const COHERENT = 1 << 9;
        const INCOHERENT = 1 << 10;
        const HIGH_QUALITY = 1 << 11;
        const ROBUST = 1 << 16;
    }
}

//
// Shared Scene State
//

/// The part of the scene that geometries talk to while they are being mutated.
/// Everything in here can be touched concurrently from different geometries.
struct SceneState {
    flags: SceneFlags,
    built: AtomicBool,
    modified: AtomicBool,
    /// Number of registered packet filters of enabled geometries, per width.
    num_filters: [AtomicIsize; 3],
    /// Number of primitives of enabled geometries, per kind and
    /// (static, motion blurred).
    num_primitives: [[AtomicIsize; 2]; GeometryType::COUNT],
}

impl SceneParent for SceneState {
    fn is_static(&self) -> bool {
        !self.flags.contains(SceneFlags::DYNAMIC)
    }

    fn is_build(&self) -> bool {
        self.built.load(Ordering::Acquire)
    }

    fn set_modified(&self) {
        self.modified.store(true, Ordering::Release);
    }

    fn adjust_filter_counter(&self, width: SimdWidth, delta: isize) {
        self.num_filters[width.index()].fetch_add(delta, Ordering::AcqRel);
    }

    fn adjust_primitive_counter(&self, kind: GeometryType, motion_blur: bool, delta: isize) {
        self.num_primitives[kind.index()][motion_blur as usize].fetch_add(delta, Ordering::AcqRel);
    }
}

//
// Scene
//

/// Owns a set of geometries and the scene wide aggregates derived from them.
///
/// Geometries are stored in an arena indexed by their id. Each lives behind its own
/// lock, so different geometries can be mutated from different threads through a
/// shared `&Scene`. Adding geometries and committing need exclusive access.
pub struct Scene {
    state: SceneState,
    geometries: Vec<Option<Mutex<Geometry>>>,
    /// Ids of reclaimed geometries, ready for reuse.
    free_ids: Vec<GeomId>,
}

impl Scene {
    pub fn new(flags: SceneFlags) -> Self {
        debug!("new scene with flags {:?}", flags);
        Scene {
            state: SceneState {
                flags,
                built: AtomicBool::new(false),
                modified: AtomicBool::new(false),
                num_filters: Default::default(),
                num_primitives: Default::default(),
            },
            geometries: Vec::new(),
            free_ids: Vec::new(),
        }
    }

    pub fn flags(&self) -> SceneFlags {
        self.state.flags
    }

    pub fn is_static(&self) -> bool {
        self.state.is_static()
    }

    pub fn is_build(&self) -> bool {
        self.state.is_build()
    }

    pub fn is_modified(&self) -> bool {
        self.state.modified.load(Ordering::Acquire)
    }

    /// Number of packet filters of `width` registered on enabled geometries.
    pub fn num_filters(&self, width: SimdWidth) -> usize {
        let n = self.state.num_filters[width.index()].load(Ordering::Acquire);
        debug_assert!(n >= 0, "filter counter of {:?} went negative: {}", width, n);
        n as usize
    }

    /// Whether the traversal kernels of `width` have to call any filter at all.
    pub fn has_filters(&self, width: SimdWidth) -> bool {
        self.num_filters(width) > 0
    }

    /// Number of primitives of `kind` in enabled geometries.
    pub fn num_primitives(&self, kind: GeometryType, motion_blur: bool) -> usize {
        let n = self.state.num_primitives[kind.index()][motion_blur as usize]
            .load(Ordering::Acquire);
        debug_assert!(n >= 0, "primitive counter of {:?} went negative: {}", kind, n);
        n as usize
    }

    /// Number of geometries that have not been reclaimed yet.
    pub fn num_geometries(&self) -> usize {
        self.geometries.iter().filter(|slot| slot.is_some()).count()
    }

    //
    // Registration
    //

    /// Adds a new geometry and returns its id.
    pub fn new_geometry(
        &mut self,
        kind: GeometryType,
        flags: GeometryFlags,
        num_primitives: usize,
        num_time_steps: u32,
    ) -> RtcResult<GeomId> {
        report(self.add(kind, flags, num_primitives, num_time_steps))
    }

    pub fn new_triangle_mesh(
        &mut self,
        flags: GeometryFlags,
        num_triangles: usize,
        num_time_steps: u32,
    ) -> RtcResult<GeomId> {
        self.new_geometry(GeometryType::TriangleMesh, flags, num_triangles, num_time_steps)
    }

    pub fn new_bezier_curves(
        &mut self,
        flags: GeometryFlags,
        num_curves: usize,
        num_time_steps: u32,
    ) -> RtcResult<GeomId> {
        self.new_geometry(GeometryType::BezierCurves, flags, num_curves, num_time_steps)
    }

    pub fn new_subdiv_mesh(
        &mut self,
        flags: GeometryFlags,
        num_faces: usize,
        num_time_steps: u32,
    ) -> RtcResult<GeomId> {
        self.new_geometry(GeometryType::SubdivMesh, flags, num_faces, num_time_steps)
    }

    pub fn new_user_geometry(&mut self, num_items: usize) -> RtcResult<GeomId> {
        self.new_geometry(GeometryType::UserGeometry, GeometryFlags::STATIC, num_items, 1)
    }

    pub fn new_instance(&mut self, num_time_steps: u32) -> RtcResult<GeomId> {
        self.new_geometry(GeometryType::Instance, GeometryFlags::STATIC, 1, num_time_steps)
    }

    fn add(
        &mut self,
        kind: GeometryType,
        flags: GeometryFlags,
        num_primitives: usize,
        num_time_steps: u32,
    ) -> RtcResult<GeomId> {
        if self.is_static() && self.is_build() {
            return Err(RtcError::invalid_operation("static scenes cannot get modified"));
        }
        if self.is_static() && flags != GeometryFlags::STATIC {
            return Err(RtcError::invalid_operation(
                "static scenes can only contain static geometries",
            ));
        }
        if num_time_steps != 1 && num_time_steps != 2 {
            return Err(RtcError::invalid_argument("only 1 or 2 time steps supported"));
        }
        // The scene counters are signed.
        if num_primitives > isize::MAX as usize {
            return Err(RtcError::invalid_argument("too many primitives"));
        }

        let id = match self.free_ids.pop() {
            Some(id) => id,
            None => {
                self.geometries.push(None);
                (self.geometries.len() - 1) as GeomId
            }
        };
        let geom = Geometry::new(&self.state, id, kind, flags, num_primitives, num_time_steps);
        self.geometries[id as usize] = Some(Mutex::new(geom));
        Ok(id)
    }

    //
    // Access
    //

    /// Locks the geometry with the given id for mutation.
    pub fn geometry(&self, id: GeomId) -> RtcResult<GeometryRef<'_>> {
        match self.geometries.get(id as usize).and_then(Option::as_ref) {
            Some(geom) => Ok(GeometryRef {
                parent: &self.state,
                geom: geom.lock().unwrap_or_else(PoisonError::into_inner),
            }),
            None => report(Err(RtcError::invalid_argument("invalid geometry ID"))),
        }
    }

    //
    // Build
    //

    /// Finishes a round of modifications.
    ///
    /// The acceleration structure itself is built elsewhere; here the scene reclaims
    /// erased geometries, clears all modified flags and remembers that it was built.
    pub fn commit(&mut self) -> RtcResult<()> {
        if self.is_static() && self.is_build() {
            return report(Err(RtcError::invalid_operation(
                "static scenes can get committed only once",
            )));
        }

        let mut num_reclaimed = 0;
        for (id, slot) in self.geometries.iter_mut().enumerate() {
            let erasing = match slot {
                Some(geom) => {
                    let geom = geom.get_mut().unwrap_or_else(PoisonError::into_inner);
                    geom.clear_modified();
                    geom.is_erasing()
                }
                None => false,
            };
            if erasing {
                *slot = None;
                self.free_ids.push(id as GeomId);
                num_reclaimed += 1;
            }
        }

        self.state.modified.store(false, Ordering::Release);
        self.state.built.store(true, Ordering::Release);

        debug!(
            "committed scene: {} geometries, {} reclaimed",
            self.num_geometries(),
            num_reclaimed
        );
        if DEVICE.verbose() >= 1 {
            info!(
                "filters: {} x4, {} x8, {} x16; triangles: {}",
                self.num_filters(SimdWidth::W4),
                self.num_filters(SimdWidth::W8),
                self.num_filters(SimdWidth::W16),
                self.num_primitives(GeometryType::TriangleMesh, false)
                    + self.num_primitives(GeometryType::TriangleMesh, true)
            );
        }
        Ok(())
    }

    /// Writes the number of live geometries followed by the type tag of each one.
    ///
    /// Needs exclusive access, so no `GeometryRef` can be alive while writing:
    ///
    /// ```compile_fail
    /// use rtcore::{GeometryFlags, Scene, SceneFlags};
    ///
    /// let mut scene = Scene::new(SceneFlags::DYNAMIC);
    /// let id = scene.new_triangle_mesh(GeometryFlags::STATIC, 1, 1).unwrap();
    /// let geom = scene.geometry(id).unwrap();
    /// let mut out = Vec::new();
    /// scene.write(&mut out).unwrap();
    /// drop(geom);
    /// ```
    pub fn write<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        out.write_all(&(self.num_geometries() as u32).to_le_bytes())?;
        for geom in self.geometries.iter_mut().flatten() {
            geom.get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .write(out)?;
        }
        Ok(())
    }
}

//
// Geometry Handle
//

/// Exclusive access to one geometry of a scene.
///
/// The handle borrows the scene, so the geometry can never outlive it, and the scene
/// never has to hand out an owning reference to itself. Requesting a second handle to
/// the same geometry on the thread that holds the first one deadlocks.
pub struct GeometryRef<'a> {
    parent: &'a SceneState,
    geom: MutexGuard<'a, Geometry>,
}

impl<'a> Deref for GeometryRef<'a> {
    type Target = Geometry;

    fn deref(&self) -> &Geometry {
        &self.geom
    }
}

impl<'a> GeometryRef<'a> {
    pub fn enable(&mut self) -> RtcResult<()> {
        report(self.geom.enable(self.parent))
    }

    pub fn disable(&mut self) -> RtcResult<()> {
        report(self.geom.disable(self.parent))
    }

    pub fn update(&mut self) -> RtcResult<()> {
        report(self.geom.update(self.parent))
    }

    pub fn erase(&mut self) -> RtcResult<()> {
        report(self.geom.erase(self.parent))
    }

    pub fn set_user_data(&mut self, ptr: UserPtr) -> RtcResult<()> {
        report(self.geom.set_user_data(self.parent, ptr))
    }

    pub fn set_mask(&mut self, mask: u32) -> RtcResult<()> {
        report(self.geom.set_mask(self.parent, mask))
    }

    pub fn set_filter(
        &mut self,
        width: SimdWidth,
        kind: FilterKind,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        report(self.geom.set_filter(self.parent, width, kind, func, conv))
    }

    pub fn set_intersection_filter1(&mut self, func: Option<FilterFunc>) -> RtcResult<()> {
        report(self.geom.set_intersection_filter1(self.parent, func))
    }

    pub fn set_occlusion_filter1(&mut self, func: Option<FilterFunc>) -> RtcResult<()> {
        report(self.geom.set_occlusion_filter1(self.parent, func))
    }

    pub fn set_intersection_filter4(
        &mut self,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        report(self.geom.set_intersection_filter4(self.parent, func, conv))
    }

    pub fn set_intersection_filter8(
        &mut self,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        report(self.geom.set_intersection_filter8(self.parent, func, conv))
    }

    pub fn set_intersection_filter16(
        &mut self,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        report(self.geom.set_intersection_filter16(self.parent, func, conv))
    }

    pub fn set_occlusion_filter4(
        &mut self,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        report(self.geom.set_occlusion_filter4(self.parent, func, conv))
    }

    pub fn set_occlusion_filter8(
        &mut self,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        report(self.geom.set_occlusion_filter8(self.parent, func, conv))
    }

    pub fn set_occlusion_filter16(
        &mut self,
        func: Option<FilterFuncN>,
        conv: CallConv,
    ) -> RtcResult<()> {
        report(self.geom.set_occlusion_filter16(self.parent, func, conv))
    }
}
