//! Orthographic projection from framebuffer pixels to normalized device space.
//!
//! Pixel space has its origin at the top-left corner of the viewport with y
//! growing downwards. The matrix keeps z untouched (near = 1, far = -1) and
//! never performs a perspective divide.

const Z_NEAR: f32 = 1.0;
const Z_FAR: f32 = -1.0;

/// Rectangle of the render target the quad is drawn into, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Viewport covering a whole framebuffer; zero extents are bumped to one pixel.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width.max(1) as f32, height.max(1) as f32)
    }
}

/// 4x4 orthographic matrix stored row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    rows: [f32; 16],
}

impl Projection {
    /// Builds the projection that maps `viewport` onto the [-1, 1] square.
    pub fn ortho(viewport: Viewport) -> Self {
        let left = viewport.x;
        let right = viewport.x + viewport.width;
        let top = viewport.y;
        let bottom = viewport.y + viewport.height;

        let mut rows = [0.0; 16];
        rows[0] = 2.0 / (right - left);
        rows[3] = -(right + left) / (right - left);

        rows[5] = 2.0 / (top - bottom);
        rows[7] = -(top + bottom) / (top - bottom);

        rows[10] = -2.0 / (Z_FAR - Z_NEAR);
        rows[11] = (Z_NEAR + Z_FAR) / (Z_NEAR - Z_FAR);

        rows[15] = 1.0;
        Self { rows }
    }

    pub fn rows(&self) -> &[f32; 16] {
        &self.rows
    }

    /// Transposed copy, i.e. the column-major layout a GLSL `mat4` expects.
    pub fn to_column_major(&self) -> [f32; 16] {
        let mut columns = [0.0; 16];
        for row in 0..4 {
            for column in 0..4 {
                columns[column * 4 + row] = self.rows[row * 4 + column];
            }
        }
        columns
    }

    /// Maps a pixel-space point to normalized device coordinates.
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.rows;
        let w = m[12] * x + m[13] * y + m[15];
        (
            (m[0] * x + m[1] * y + m[3]) / w,
            (m[4] * x + m[5] * y + m[7]) / w,
        )
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::ortho(Viewport::from_size(1, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f32, f32), expected: (f32, f32)) {
        assert!(
            (actual.0 - expected.0).abs() < 1e-5 && (actual.1 - expected.1).abs() < 1e-5,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn corners_map_to_opposite_ndc_corners() {
        let projection = Projection::ortho(Viewport::from_size(800, 600));
        assert_close(projection.transform_point(0.0, 0.0), (-1.0, 1.0));
        assert_close(projection.transform_point(800.0, 600.0), (1.0, -1.0));
        assert_close(projection.transform_point(400.0, 300.0), (0.0, 0.0));
    }

    #[test]
    fn offset_viewport_maps_its_own_corners() {
        let projection = Projection::ortho(Viewport::new(100.0, 50.0, 200.0, 100.0));
        assert_close(projection.transform_point(100.0, 50.0), (-1.0, 1.0));
        assert_close(projection.transform_point(300.0, 150.0), (1.0, -1.0));
    }

    #[test]
    fn depth_row_is_identity() {
        let projection = Projection::ortho(Viewport::from_size(64, 64));
        let rows = projection.rows();
        assert_eq!(rows[10], 1.0);
        assert_eq!(rows[11], 0.0);
        assert_eq!(rows[15], 1.0);
    }

    #[test]
    fn column_major_is_the_transpose() {
        let projection = Projection::ortho(Viewport::from_size(320, 200));
        let columns = projection.to_column_major();
        let rows = projection.rows();
        assert_eq!(columns[12], rows[3]);
        assert_eq!(columns[13], rows[7]);
        assert_eq!(columns[0], rows[0]);
        assert_eq!(columns[5], rows[5]);
    }

    #[test]
    fn zero_sized_framebuffer_stays_finite() {
        let projection = Projection::ortho(Viewport::from_size(0, 0));
        assert!(projection.rows().iter().all(|value| value.is_finite()));
    }
}
