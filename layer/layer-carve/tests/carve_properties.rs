//! Distance guarantees of proximity masking and skin stripping.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use layer_carve::{strip_skin, Falloff, LayerCarver, ProximityCarver, ProximityParams};
use layer_spatial::{FaceIndex, SpatialIndex};
use layer_types::{uv_sphere, Transform, Vector3};
use proptest::prelude::*;

fn translated(x: f64, z: f64) -> Transform {
    Transform::new(Vector3::new(x, 0.0, z), Vector3::zeros(), 1.0)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn proximity_survivors_clear_half_band(
        radius in 0.8f64..1.2,
        dx in -0.3f64..0.3,
        band in 0.01f64..0.4,
        smooth in any::<bool>(),
    ) {
        let reference = uv_sphere(1.0, 24, 12);
        let body = uv_sphere(radius, 20, 10).with_transform(translated(dx, 0.0));
        let falloff = if smooth { Falloff::Smoothstep } else { Falloff::Linear };
        let params = ProximityParams::new(0.0, band).with_falloff(falloff);

        let carved = ProximityCarver::new(params).carve(&body, &reference).unwrap().mesh;
        prop_assert!(carved.validate().is_ok());
        prop_assert!(carved.vertex_count() <= body.vertex_count());

        let index = FaceIndex::new(&reference);
        for p in carved.world_positions() {
            let d = index.distance(&p).unwrap();
            prop_assert!(d >= band / 2.0 - 1e-12, "survivor at {} inside half band {}", d, band / 2.0);
        }
    }

    #[test]
    fn skin_survivors_clear_threshold(
        radius in 0.9f64..1.1,
        dz in -0.2f64..0.2,
        threshold in 0.001f64..0.3,
    ) {
        let clothing = uv_sphere(radius, 20, 10).with_transform(translated(0.0, dz));
        let body = uv_sphere(1.0, 16, 8);

        let stripped = strip_skin(&clothing, &body, threshold).unwrap();
        prop_assert!(stripped.vertex_count() <= clothing.vertex_count());

        let index = SpatialIndex::build_from_mesh_world(&body);
        for p in stripped.world_positions() {
            let d = index.query_nearest(&p).unwrap().distance;
            prop_assert!(d >= threshold, "survivor at {} below threshold {}", d, threshold);
        }
    }
}
