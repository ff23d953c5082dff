//! The surfel node type: a multi-frame oriented surface sample.

use field_geom::project_to_plane;
use nalgebra::{Point3, Vector2, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SurfelError, SurfelResult};
use crate::frame::FrameData;

/// Untuned surfels start with the smoothness of a 45 degree misalignment,
/// the worst case under 4-fold rotational symmetry.
const INITIAL_ROSY_SMOOTHNESS: f32 = 45.0 * 45.0;

/// Everything known about a surfel in one frame, derived on demand.
#[derive(Debug, Clone, Copy)]
pub struct FrameGeometry {
    /// 3D position of the surfel in the frame.
    pub vertex: Point3<f32>,
    /// Canonical tangent carried into the frame and re-projected.
    pub tangent: Vector3<f32>,
    /// `normal x tangent`, completing the local lattice basis.
    pub orth_tangent: Vector3<f32>,
    /// Surface normal in the frame.
    pub normal: Vector3<f32>,
    /// The surfel's closest lattice point: vertex plus the 2D reference
    /// offset expressed in the (tangent, orth_tangent) basis.
    pub closest_lattice_point: Point3<f32>,
}

/// A surface sample observed in one or more frames, carrying the current
/// orientation (tangent) and position (lattice offset) field state.
///
/// The tangent is canonical: unit length, perpendicular to `+Y`, and rotated
/// into each frame via that frame's transform. The lattice offset is shared
/// across frames and expressed in the frame-local (tangent, orth_tangent)
/// basis.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Surfel {
    id: String,
    frame_data: Vec<FrameData>,
    frames: Vec<usize>,
    tangent: Vector3<f32>,
    reference_lattice_offset: Vector2<f32>,
    rosy_smoothness: f32,
    posy_smoothness: f32,
    last_rosy_correction: f32,
    last_posy_correction: Vector2<f32>,
}

impl Surfel {
    /// Assemble a surfel. Use [`SurfelBuilder`](crate::SurfelBuilder) rather
    /// than calling this directly.
    #[must_use]
    pub(crate) fn new(
        id: String,
        frame_data: Vec<FrameData>,
        tangent: Vector3<f32>,
        reference_lattice_offset: Vector2<f32>,
    ) -> Self {
        let mut frames: Vec<usize> = frame_data.iter().map(|fd| fd.pixel_in_frame.frame).collect();
        frames.sort_unstable();
        Self {
            id,
            frame_data,
            frames,
            tangent,
            reference_lattice_offset,
            rosy_smoothness: INITIAL_ROSY_SMOOTHNESS,
            posy_smoothness: 0.0,
            last_rosy_correction: 0.0,
            last_posy_correction: Vector2::zeros(),
        }
    }

    /// The unique id of this surfel.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The canonical tangent.
    #[must_use]
    pub fn tangent(&self) -> Vector3<f32> {
        self.tangent
    }

    /// Replace the canonical tangent.
    pub fn set_tangent(&mut self, tangent: Vector3<f32>) {
        self.tangent = tangent;
    }

    /// The 2D reference lattice offset.
    #[must_use]
    pub fn reference_lattice_offset(&self) -> Vector2<f32> {
        self.reference_lattice_offset
    }

    /// Replace the lattice offset, recording the correction applied.
    pub fn set_reference_lattice_offset(&mut self, offset: Vector2<f32>) {
        self.last_posy_correction = offset - self.reference_lattice_offset;
        self.reference_lattice_offset = offset;
    }

    /// Mean squared tangent misalignment against neighbours, per pass.
    #[must_use]
    pub fn rosy_smoothness(&self) -> f32 {
        self.rosy_smoothness
    }

    /// Record this pass's orientation smoothness.
    pub fn set_rosy_smoothness(&mut self, smoothness: f32) {
        self.rosy_smoothness = smoothness;
    }

    /// Mean squared lattice-point distance against neighbours, per pass.
    #[must_use]
    pub fn posy_smoothness(&self) -> f32 {
        self.posy_smoothness
    }

    /// Record this pass's position smoothness.
    pub fn set_posy_smoothness(&mut self, smoothness: f32) {
        self.posy_smoothness = smoothness;
    }

    /// The angular correction applied by the most recent orientation pass.
    #[must_use]
    pub fn rosy_correction(&self) -> f32 {
        self.last_rosy_correction
    }

    /// Record the angular correction applied this pass.
    pub fn set_rosy_correction(&mut self, correction: f32) {
        self.last_rosy_correction = correction;
    }

    /// The offset correction applied by the most recent position pass.
    #[must_use]
    pub fn posy_correction(&self) -> Vector2<f32> {
        self.last_posy_correction
    }

    /// Sorted indices of the frames this surfel appears in.
    #[must_use]
    pub fn frames(&self) -> &[usize] {
        &self.frames
    }

    /// How many frames this surfel appears in.
    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Whether this surfel was observed in `frame`.
    #[must_use]
    pub fn is_in_frame(&self, frame: usize) -> bool {
        self.frames.binary_search(&frame).is_ok()
    }

    /// All per-frame observations.
    #[must_use]
    pub fn frame_data(&self) -> &[FrameData] {
        &self.frame_data
    }

    /// Mutable access to the per-frame observations.
    pub fn frame_data_mut(&mut self) -> &mut [FrameData] {
        &mut self.frame_data
    }

    /// The observation of this surfel in `frame`.
    ///
    /// # Errors
    ///
    /// [`SurfelError::NotInFrame`] if the surfel was not observed there.
    pub fn frame_data_for_frame(&self, frame: usize) -> SurfelResult<&FrameData> {
        self.frame_data
            .iter()
            .find(|fd| fd.pixel_in_frame.frame == frame)
            .ok_or_else(|| SurfelError::NotInFrame {
                id: self.id.clone(),
                frame,
            })
    }

    /// The surfel's position, in-frame tangent, and normal for `frame`.
    ///
    /// The canonical tangent is rotated by the frame transform then forced
    /// back into the tangent plane and renormalised.
    ///
    /// # Errors
    ///
    /// [`SurfelError::NotInFrame`] if the surfel was not observed there.
    pub fn vertex_tangent_normal_for_frame(
        &self,
        frame: usize,
    ) -> SurfelResult<(Point3<f32>, Vector3<f32>, Vector3<f32>)> {
        let fd = self.frame_data_for_frame(frame)?;
        let tangent = project_to_plane(fd.transform * self.tangent, fd.normal, true);
        Ok((fd.position, tangent, fd.normal))
    }

    /// The full in-frame geometry for `frame`, including the orthogonal
    /// tangent and the surfel's current closest lattice point.
    ///
    /// # Errors
    ///
    /// [`SurfelError::NotInFrame`] if the surfel was not observed there.
    pub fn geometry_in_frame(&self, frame: usize) -> SurfelResult<FrameGeometry> {
        let (vertex, tangent, normal) = self.vertex_tangent_normal_for_frame(frame)?;
        let orth_tangent = normal.cross(&tangent);
        let closest_lattice_point = vertex
            + self.reference_lattice_offset[0] * tangent
            + self.reference_lattice_offset[1] * orth_tangent;
        Ok(FrameGeometry {
            vertex,
            tangent,
            orth_tangent,
            normal,
            closest_lattice_point,
        })
    }

    /// Express `other`'s normal and canonical tangent in this surfel's local
    /// space via their shared `frame`.
    ///
    /// # Errors
    ///
    /// [`SurfelError::NotInFrame`] if either surfel misses the frame.
    pub fn transform_neighbour_into_frame(
        &self,
        other: &Surfel,
        frame: usize,
    ) -> SurfelResult<(Vector3<f32>, Vector3<f32>)> {
        let frame_to_this = self.frame_data_for_frame(frame)?.transform.transpose();
        let other_fd = other.frame_data_for_frame(frame)?;
        let other_to_this = frame_to_this * other_fd.transform;

        let neighbour_normal = frame_to_this * other_fd.normal;
        let neighbour_tangent = other_to_this * other.tangent;
        Ok((neighbour_normal, neighbour_tangent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelInFrame;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    fn flat_surfel(id: &str, frame: usize, position: Point3<f32>) -> Surfel {
        Surfel::new(
            id.to_string(),
            vec![FrameData::new(
                PixelInFrame::new(0, 0, frame),
                1.0,
                Matrix3::identity(),
                Vector3::y(),
                position,
            )],
            Vector3::x(),
            Vector2::zeros(),
        )
    }

    #[test]
    fn test_is_in_frame() {
        let s = flat_surfel("s1", 3, Point3::origin());
        assert!(s.is_in_frame(3));
        assert!(!s.is_in_frame(0));
    }

    #[test]
    fn test_tangent_reprojected_into_frame() {
        let s = flat_surfel("s1", 0, Point3::origin());
        let (vertex, tangent, normal) = s.vertex_tangent_normal_for_frame(0).unwrap();
        assert_eq!(vertex, Point3::origin());
        assert_relative_eq!(tangent.dot(&normal), 0.0, epsilon = 1e-6);
        assert_relative_eq!(tangent.norm(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_geometry_closest_lattice_point_uses_offset() {
        let mut s = flat_surfel("s1", 0, Point3::new(1.0, 0.0, 0.0));
        s.set_reference_lattice_offset(Vector2::new(0.25, -0.5));
        let geom = s.geometry_in_frame(0).unwrap();
        // tangent = +X, orth = normal x tangent = +Z for a flat surfel
        assert_relative_eq!(geom.closest_lattice_point.x, 1.25, epsilon = 1e-6);
        assert_relative_eq!(geom.closest_lattice_point.z, -0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_offset_update_records_correction() {
        let mut s = flat_surfel("s1", 0, Point3::origin());
        s.set_reference_lattice_offset(Vector2::new(0.1, 0.2));
        let c = s.posy_correction();
        assert_relative_eq!(c.x, 0.1, epsilon = 1e-6);
        assert_relative_eq!(c.y, 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_frame_is_error() {
        let s = flat_surfel("s1", 0, Point3::origin());
        assert!(matches!(
            s.frame_data_for_frame(7),
            Err(SurfelError::NotInFrame { frame: 7, .. })
        ));
    }
}
