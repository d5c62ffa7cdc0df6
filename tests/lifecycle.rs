use crossbeam::thread;
use rtcore::{
    CallConv, ErrorKind, FilterKind, GeomId, GeometryFlags, GeometryType, LifecycleState, Scene,
    SceneFlags, SimdWidth, UserPtr, DEVICE,
};
use std::os::raw;

unsafe extern "C" fn filter_n(_: *const raw::c_void, _: *mut raw::c_void, _: *mut raw::c_void) {}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn enable_disable_erase_scenario() {
    init_logging();
    let mut scene = Scene::new(SceneFlags::DYNAMIC | SceneFlags::ROBUST);
    let id = scene
        .new_triangle_mesh(GeometryFlags::DYNAMIC, 100, 1)
        .unwrap();

    let mut geom = scene.geometry(id).unwrap();
    assert_eq!(geom.state(), LifecycleState::Enabled);
    assert_eq!(scene.num_filters(SimdWidth::W4), 0);

    geom.set_intersection_filter4(Some(filter_n), CallConv::Native)
        .unwrap();
    assert_eq!(scene.num_filters(SimdWidth::W4), 1);
    assert!(scene.has_filters(SimdWidth::W4));
    assert!(!scene.has_filters(SimdWidth::W8));

    geom.disable().unwrap();
    assert_eq!(scene.num_filters(SimdWidth::W4), 0);
    assert_eq!(geom.state(), LifecycleState::Disabled);

    geom.enable().unwrap();
    assert_eq!(scene.num_filters(SimdWidth::W4), 1);
    assert_eq!(geom.state(), LifecycleState::Enabled);

    geom.erase().unwrap();
    assert_eq!(scene.num_filters(SimdWidth::W4), 0);
    assert_eq!(geom.state(), LifecycleState::Erasing);

    geom.enable().unwrap();
    geom.disable().unwrap();
    geom.update().unwrap();
    assert_eq!(geom.state(), LifecycleState::Erasing);
    assert_eq!(scene.num_filters(SimdWidth::W4), 0);
    assert_eq!(scene.num_primitives(GeometryType::TriangleMesh, false), 0);
}

#[test]
fn filter_registration_leaves_modified_flag_alone() {
    init_logging();
    let mut scene = Scene::new(SceneFlags::DYNAMIC);
    let id = scene.new_bezier_curves(GeometryFlags::STATIC, 8, 1).unwrap();
    scene.commit().unwrap();
    assert!(!scene.is_modified());

    let mut geom = scene.geometry(id).unwrap();
    geom.set_occlusion_filter16(Some(filter_n), CallConv::Ispc)
        .unwrap();
    assert!(!scene.is_modified());
    assert_eq!(scene.num_filters(SimdWidth::W16), 1);

    geom.disable().unwrap();
    assert!(scene.is_modified());
}

#[test]
fn static_scene_rejections_are_reported() {
    init_logging();
    let mut scene = Scene::new(SceneFlags::STATIC);
    let id = scene.new_triangle_mesh(GeometryFlags::STATIC, 6, 2).unwrap();
    scene.commit().unwrap();
    DEVICE.take_error();

    let mut geom = scene.geometry(id).unwrap();
    let mut value = 1u8;
    let ptr = UserPtr::from_raw(&mut value as *mut u8 as *mut raw::c_void);
    let results = vec![
        geom.enable(),
        geom.disable(),
        geom.update(),
        geom.erase(),
        geom.set_user_data(ptr),
        geom.set_mask(1),
        geom.set_intersection_filter1(None),
        geom.set_occlusion_filter8(Some(filter_n), CallConv::Native),
    ];
    for result in results {
        assert_eq!(result.unwrap_err().kind, ErrorKind::InvalidOperation);
    }
    assert_eq!(DEVICE.take_error(), Some(ErrorKind::InvalidOperation));

    assert_eq!(geom.state(), LifecycleState::Enabled);
    assert!(geom.user_data().is_null());
    assert_eq!(geom.mask(), u32::MAX);
    assert!(!geom.filter(SimdWidth::W8, FilterKind::Occlusion).is_set());
    assert_eq!(scene.num_filters(SimdWidth::W8), 0);
    assert_eq!(scene.num_primitives(GeometryType::TriangleMesh, true), 6);
}

#[test]
fn user_geometry_rejects_filters() {
    init_logging();
    let mut scene = Scene::new(SceneFlags::DYNAMIC);
    let id = scene.new_user_geometry(2).unwrap();
    let mut geom = scene.geometry(id).unwrap();
    for width in SimdWidth::ALL.iter().copied() {
        let err = geom
            .set_filter(width, FilterKind::Intersection, Some(filter_n), CallConv::Native)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOperation);
        assert_eq!(scene.num_filters(width), 0);
    }
}

/// Each thread owns a disjoint set of geometries and toggles them in a fixed
/// pattern; afterwards the counters must match what the geometries hold.
#[test]
fn concurrent_mutation_keeps_counters_consistent() {
    init_logging();
    const NUM_THREADS: usize = 8;
    const PER_THREAD: usize = 32;

    let mut scene = Scene::new(SceneFlags::DYNAMIC);
    let ids: Vec<GeomId> = (0..NUM_THREADS * PER_THREAD)
        .map(|_| {
            scene
                .new_triangle_mesh(GeometryFlags::DYNAMIC, 2, 1)
                .unwrap()
        })
        .collect();
    let scene_ref = &scene;

    thread::scope(|s| {
        for chunk in ids.chunks(PER_THREAD) {
            s.spawn(move |_| {
                for (i, &id) in chunk.iter().enumerate() {
                    let mut geom = scene_ref.geometry(id).unwrap();
                    for round in 0..4 {
                        let width = SimdWidth::ALL[(i + round) % 3];
                        let func = if (i + round) % 2 == 0 {
                            Some(filter_n as rtcore::FilterFuncN)
                        } else {
                            None
                        };
                        geom.set_filter(width, FilterKind::Intersection, func, CallConv::Native)
                            .unwrap();
                        geom.set_filter(width, FilterKind::Occlusion, func, CallConv::Ispc)
                            .unwrap();
                        if (i + round) % 3 == 0 {
                            geom.disable().unwrap();
                        } else {
                            geom.enable().unwrap();
                        }
                    }
                    if i % 5 == 0 {
                        geom.erase().unwrap();
                    }
                }
            });
        }
    })
    .unwrap();

    for width in SimdWidth::ALL.iter().copied() {
        let mut expected = 0;
        for &id in &ids {
            let geom = scene.geometry(id).unwrap();
            if geom.is_enabled() {
                expected += geom.filter(width, FilterKind::Intersection).is_set() as usize;
                expected += geom.filter(width, FilterKind::Occlusion).is_set() as usize;
            }
        }
        assert_eq!(scene.num_filters(width), expected);
    }

    let enabled = ids
        .iter()
        .filter(|&&id| scene.geometry(id).unwrap().is_enabled())
        .count();
    assert_eq!(
        scene.num_primitives(GeometryType::TriangleMesh, false),
        2 * enabled
    );

    let erased = ids
        .iter()
        .filter(|&&id| scene.geometry(id).unwrap().is_erasing())
        .count();
    scene.commit().unwrap();
    assert_eq!(scene.num_geometries(), ids.len() - erased);
}
