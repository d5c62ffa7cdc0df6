//! Geometry bookkeeping for a ray tracing scene.
//!
//! A `Scene` owns its geometries. Host code adds geometries through the scene, gets
//! a `GeometryRef` back by id and then enables, disables, updates, erases and
//! attaches filter callbacks to it. The scene keeps per packet width counters of
//! registered filters so traversal can skip filtering entirely when none exist.

pub mod config;
pub mod device;
pub mod error;
pub mod geometry;
pub mod scene;

pub use config::DeviceConfig;
pub use device::{Device, ErrorFunc, DEVICE};
pub use error::{ErrorKind, RtcError, RtcResult};
pub use geometry::{
    CallConv, FilterEntry, FilterFunc, FilterFuncN, FilterKind, GeomId, Geometry,
    GeometryFlags, GeometryType, LifecycleState, SimdWidth, UserPtr,
};
pub use scene::{GeometryRef, Scene, SceneFlags};
