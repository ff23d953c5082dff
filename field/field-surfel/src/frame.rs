//! Per-frame observation data for a surfel.

use nalgebra::{Matrix3, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A pixel coordinate within a specific frame of the capture sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelInFrame {
    /// Pixel column.
    pub x: usize,
    /// Pixel row.
    pub y: usize,
    /// Frame index within the sequence.
    pub frame: usize,
}

impl PixelInFrame {
    /// Create a pixel reference.
    #[must_use]
    pub fn new(x: usize, y: usize, frame: usize) -> Self {
        Self { x, y, frame }
    }
}

/// One observation of a surfel in one frame.
///
/// The transform maps the canonical `+Y` axis onto the surface normal seen in
/// this frame, so the surfel's canonical tangent can be carried into any
/// frame it appears in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameData {
    /// Where in the source image this sample was observed.
    pub pixel_in_frame: PixelInFrame,
    /// Depth of the sample in this frame.
    pub depth: f32,
    /// Rotation taking canonical `+Y` to `normal`.
    pub transform: Matrix3<f32>,
    /// Surface normal in this frame.
    pub normal: Vector3<f32>,
    /// 3D position in this frame.
    pub position: Point3<f32>,
}

impl FrameData {
    /// Create frame data from its parts.
    #[must_use]
    pub fn new(
        pixel_in_frame: PixelInFrame,
        depth: f32,
        transform: Matrix3<f32>,
        normal: Vector3<f32>,
        position: Point3<f32>,
    ) -> Self {
        Self {
            pixel_in_frame,
            depth,
            transform,
            normal,
            position,
        }
    }
}

impl Default for FrameData {
    fn default() -> Self {
        Self {
            pixel_in_frame: PixelInFrame::new(0, 0, 0),
            depth: 0.0,
            transform: Matrix3::identity(),
            normal: Vector3::zeros(),
            position: Point3::origin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_frame_data() {
        let fd = FrameData::default();
        assert_eq!(fd.pixel_in_frame, PixelInFrame::new(0, 0, 0));
        assert_eq!(fd.transform, Matrix3::identity());
        assert_eq!(fd.normal, Vector3::zeros());
    }
}
