//! Builder for [`Surfel`] values with randomised defaults.

use std::f32::consts::PI;

use field_geom::rotation_from_y_to;
use nalgebra::{Point3, Vector2, Vector3};
use rand::Rng;

use crate::error::SurfelResult;
use crate::frame::{FrameData, PixelInFrame};
use crate::surfel::Surfel;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";
const RANDOM_ID_LEN: usize = 16;

/// Builds [`Surfel`] values, filling any field left unset with a random
/// default drawn from the caller's RNG:
///
/// - a random unit tangent perpendicular to `+Y`
/// - a random lattice offset uniform in `[-0.5, 0.5)` per axis
/// - a synthetic default frame (identity transform, `+Y` normal, origin)
/// - a random hex id
pub struct SurfelBuilder<'a, R: Rng> {
    rng: &'a mut R,
    id: Option<String>,
    frames: Vec<FrameData>,
    tangent: Option<Vector3<f32>>,
    reference_lattice_offset: Option<Vector2<f32>>,
}

impl<'a, R: Rng> SurfelBuilder<'a, R> {
    /// Start a builder drawing defaults from `rng`.
    pub fn new(rng: &'a mut R) -> Self {
        Self {
            rng,
            id: None,
            frames: Vec::new(),
            tangent: None,
            reference_lattice_offset: None,
        }
    }

    /// Set the surfel id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the canonical tangent. Callers are responsible for passing a unit
    /// vector perpendicular to `+Y`.
    #[must_use]
    pub fn with_tangent(mut self, tangent: Vector3<f32>) -> Self {
        self.tangent = Some(tangent);
        self
    }

    /// Set the reference lattice offset.
    #[must_use]
    pub fn with_reference_lattice_offset(mut self, offset: Vector2<f32>) -> Self {
        self.reference_lattice_offset = Some(offset);
        self
    }

    /// Add a fully specified frame observation.
    #[must_use]
    pub fn with_frame(mut self, frame_data: FrameData) -> Self {
        self.frames.push(frame_data);
        self
    }

    /// Add a frame observation, deriving the `+Y`-to-normal transform from
    /// the normal itself.
    ///
    /// # Errors
    ///
    /// [`field_geom::GeomError`] if `normal` is zero length or not unit.
    pub fn with_frame_normal(
        mut self,
        pixel_in_frame: PixelInFrame,
        depth: f32,
        normal: Vector3<f32>,
        position: Point3<f32>,
    ) -> SurfelResult<Self> {
        let transform = rotation_from_y_to(normal)?;
        self.frames
            .push(FrameData::new(pixel_in_frame, depth, transform, normal, position));
        Ok(self)
    }

    /// Build the surfel, randomising anything left unset.
    #[must_use]
    pub fn build(self) -> Surfel {
        let Self {
            rng,
            id,
            mut frames,
            tangent,
            reference_lattice_offset,
        } = self;

        let id = id.unwrap_or_else(|| random_id(rng));
        let tangent = tangent.unwrap_or_else(|| {
            let theta = rng.gen_range(-PI..PI);
            Vector3::new(theta.cos(), 0.0, theta.sin())
        });
        let offset = reference_lattice_offset.unwrap_or_else(|| {
            Vector2::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5))
        });
        if frames.is_empty() {
            frames.push(FrameData::new(
                PixelInFrame::new(0, 0, 0),
                0.0,
                nalgebra::Matrix3::identity(),
                Vector3::y(),
                Point3::origin(),
            ));
        }
        Surfel::new(id, frames, tangent, offset)
    }
}

fn random_id(rng: &mut impl Rng) -> String {
    (0..RANDOM_ID_LEN)
        .map(|_| HEX_DIGITS[rng.gen_range(0..HEX_DIGITS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_defaults_are_valid() {
        let mut rng = StdRng::seed_from_u64(42);
        let s = SurfelBuilder::new(&mut rng).build();

        assert_eq!(s.id().len(), RANDOM_ID_LEN);
        assert_relative_eq!(s.tangent().norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(s.tangent().y, 0.0, epsilon = 1e-6);
        let off = s.reference_lattice_offset();
        assert!((-0.5..0.5).contains(&off.x));
        assert!((-0.5..0.5).contains(&off.y));
        assert_eq!(s.num_frames(), 1);
    }

    #[test]
    fn test_explicit_fields_respected() {
        let mut rng = StdRng::seed_from_u64(42);
        let s = SurfelBuilder::new(&mut rng)
            .with_id("s1")
            .with_tangent(Vector3::z())
            .with_reference_lattice_offset(Vector2::new(0.1, -0.1))
            .build();

        assert_eq!(s.id(), "s1");
        assert_eq!(s.tangent(), Vector3::z());
        assert_eq!(s.reference_lattice_offset(), Vector2::new(0.1, -0.1));
    }

    #[test]
    fn test_frame_normal_derives_transform() {
        let mut rng = StdRng::seed_from_u64(42);
        let normal = Vector3::z();
        let s = SurfelBuilder::new(&mut rng)
            .with_id("s1")
            .with_frame_normal(PixelInFrame::new(1, 2, 0), 0.5, normal, Point3::origin())
            .unwrap()
            .build();

        let transform = s.frame_data()[0].transform;
        let mapped = transform * Vector3::y();
        assert_relative_eq!((mapped - normal).norm(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        let a = SurfelBuilder::new(&mut rng_a).build();
        let b = SurfelBuilder::new(&mut rng_b).build();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.tangent(), b.tangent());
    }
}
