//! Display pipeline.
//!
//! Each tick the frame buffer is copied as-is into the 160x144 logical
//! surface, then composited onto the presentation surface through a scale
//! transform that is computed once at setup.

use pixels::Pixels;
use thiserror::Error;

use crate::engine::FrameBuffer;
use crate::{FRAME_BYTES, HEIGHT, WIDTH};

/// Horizontal presentation scale.
pub const SCALE_X: f32 = 1.40625;
/// Vertical presentation scale.
pub const SCALE_Y: f32 = 1.421;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("presentation surface is {actual} bytes, expected {expected}")]
    ContractViolation { expected: usize, actual: usize },
    #[error("failed to render frame: {0}")]
    Render(#[from] pixels::Error),
}

/// A surface the pipeline composites into and then shows.
pub trait Presenter {
    /// RGBA pixel store of the presentation surface.
    fn surface_mut(&mut self) -> &mut [u8];

    fn show(&mut self) -> Result<(), DisplayError>;
}

impl Presenter for Pixels {
    fn surface_mut(&mut self) -> &mut [u8] {
        self.frame_mut()
    }

    fn show(&mut self) -> Result<(), DisplayError> {
        self.render()?;
        Ok(())
    }
}

/// Off-screen image at native resolution.
pub struct LogicalSurface {
    pixels: Vec<u8>,
}

impl LogicalSurface {
    pub fn new() -> Self {
        Self { pixels: vec![0; FRAME_BYTES] }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn load(&mut self, frame: &FrameBuffer) {
        self.pixels.copy_from_slice(frame.as_bytes());
    }
}

impl Default for LogicalSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest-neighbour mapping from presentation pixels to logical pixels.
#[derive(Debug, Clone)]
pub struct ScaleTransform {
    width: usize,
    height: usize,
    // byte offset of the source pixel within a logical row
    columns: Vec<usize>,
    // source row index
    rows: Vec<usize>,
}

impl ScaleTransform {
    pub fn new(scale_x: f32, scale_y: f32) -> Self {
        let width = scaled(WIDTH, scale_x);
        let height = scaled(HEIGHT, scale_y);
        let columns = (0..width).map(|x| source_index(x, scale_x, WIDTH) * 4).collect();
        let rows = (0..height).map(|y| source_index(y, scale_y, HEIGHT)).collect();
        Self { width, height, columns, rows }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Size of the presentation surface in bytes.
    pub fn surface_len(&self) -> usize {
        self.width * self.height * 4
    }

    fn apply(&self, src: &[u8], dst: &mut [u8]) {
        let src_stride = WIDTH * 4;
        for (dst_row, &y) in dst.chunks_exact_mut(self.width * 4).zip(&self.rows) {
            let src_row = &src[y * src_stride..(y + 1) * src_stride];
            for (px, &offset) in dst_row.chunks_exact_mut(4).zip(&self.columns) {
                px.copy_from_slice(&src_row[offset..offset + 4]);
            }
        }
    }
}

fn scaled(len: usize, scale: f32) -> usize {
    ((len as f32 * scale).round() as usize).max(1)
}

fn source_index(dst: usize, scale: f32, len: usize) -> usize {
    ((dst as f32 / scale) as usize).min(len - 1)
}

/// Integer window zoom applied on top of the presentation scale.
///
/// Expanding doubles the factor and collapsing halves it, within `1..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zoom(u32);

impl Zoom {
    pub const MAX: u32 = 8;

    pub fn new(factor: u32) -> Self {
        Self(factor.clamp(1, Self::MAX))
    }

    pub fn factor(self) -> u32 {
        self.0
    }

    /// Returns `false` when already at the largest zoom.
    pub fn expand(&mut self) -> bool {
        if self.0 * 2 > Self::MAX {
            return false;
        }
        self.0 *= 2;
        true
    }

    /// Returns `false` when already at 1x.
    pub fn collapse(&mut self) -> bool {
        if self.0 < 2 {
            return false;
        }
        self.0 /= 2;
        true
    }

    /// Window size for a presentation surface of `size` pixels.
    pub fn window_size(self, (width, height): (u32, u32)) -> (u32, u32) {
        (width * self.0, height * self.0)
    }
}

pub struct DisplayPipeline {
    logical: LogicalSurface,
    transform: ScaleTransform,
}

impl DisplayPipeline {
    pub fn new(scale_x: f32, scale_y: f32) -> Self {
        Self {
            logical: LogicalSurface::new(),
            transform: ScaleTransform::new(scale_x, scale_y),
        }
    }

    /// Presentation surface size in pixels.
    pub fn presentation_size(&self) -> (u32, u32) {
        (self.transform.width as u32, self.transform.height as u32)
    }

    pub fn transform(&self) -> &ScaleTransform {
        &self.transform
    }

    pub fn logical(&self) -> &LogicalSurface {
        &self.logical
    }

    /// Validate the presentation surface once, before the first tick.
    pub fn check(&self, presenter: &mut dyn Presenter) -> Result<(), DisplayError> {
        let expected = self.transform.surface_len();
        let actual = presenter.surface_mut().len();
        if actual != expected {
            return Err(DisplayError::ContractViolation { expected, actual });
        }
        Ok(())
    }

    pub fn present(&mut self, frame: &FrameBuffer, presenter: &mut dyn Presenter) -> Result<(), DisplayError> {
        self.logical.load(frame);
        self.repaint(presenter)
    }

    /// Composite the current logical surface again and show it.
    pub fn repaint(&self, presenter: &mut dyn Presenter) -> Result<(), DisplayError> {
        let surface = presenter.surface_mut();
        debug_assert_eq!(surface.len(), self.transform.surface_len());
        self.transform.apply(&self.logical.pixels, surface);
        presenter.show()
    }
}

impl Default for DisplayPipeline {
    fn default() -> Self {
        Self::new(SCALE_X, SCALE_Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canvas {
        pixels: Vec<u8>,
        shown: usize,
    }

    impl Presenter for Canvas {
        fn surface_mut(&mut self) -> &mut [u8] {
            &mut self.pixels
        }

        fn show(&mut self) -> Result<(), DisplayError> {
            self.shown += 1;
            Ok(())
        }
    }

    fn gradient() -> FrameBuffer {
        let mut frame = FrameBuffer::new();
        for (i, px) in frame.as_mut_array().chunks_exact_mut(4).enumerate() {
            let (x, y) = (i % WIDTH, i / WIDTH);
            px.copy_from_slice(&[x as u8, y as u8, 0x80, 0xFF]);
        }
        frame
    }

    #[test]
    fn default_presentation_size() {
        let display = DisplayPipeline::default();
        assert_eq!(display.presentation_size(), (225, 205));
    }

    #[test]
    fn check_rejects_wrong_surface() {
        let display = DisplayPipeline::default();
        let mut canvas = Canvas { pixels: vec![0; FRAME_BYTES], shown: 0 };
        assert!(matches!(
            display.check(&mut canvas),
            Err(DisplayError::ContractViolation { expected, actual }) if expected == 225 * 205 * 4 && actual == FRAME_BYTES
        ));
    }

    #[test]
    fn present_copies_then_scales() {
        let mut display = DisplayPipeline::default();
        let len = display.transform().surface_len();
        let mut canvas = Canvas { pixels: vec![0; len], shown: 0 };
        display.check(&mut canvas).unwrap();

        let frame = gradient();
        display.present(&frame, &mut canvas).unwrap();

        assert_eq!(display.logical().pixels(), frame.as_bytes());
        assert_eq!(canvas.shown, 1);
        // corners map to the logical corners
        assert_eq!(&canvas.pixels[..4], &[0, 0, 0x80, 0xFF]);
        assert_eq!(&canvas.pixels[len - 4..], &[159, 143, 0x80, 0xFF]);
    }

    #[test]
    fn unit_scale_is_identity() {
        let mut display = DisplayPipeline::new(1.0, 1.0);
        let mut canvas = Canvas { pixels: vec![0; FRAME_BYTES], shown: 0 };
        let frame = gradient();
        display.present(&frame, &mut canvas).unwrap();
        assert_eq!(canvas.pixels, frame.as_bytes());
    }

    #[test]
    fn transform_maps_monotonically() {
        let t = ScaleTransform::new(SCALE_X, SCALE_Y);
        assert!(t.columns.windows(2).all(|w| w[0] <= w[1]));
        assert!(t.rows.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*t.rows.last().unwrap(), HEIGHT - 1);
        assert_eq!(*t.columns.last().unwrap(), (WIDTH - 1) * 4);
    }

    #[test]
    fn repaint_shows_last_frame_again() {
        let mut display = DisplayPipeline::new(1.0, 1.0);
        let mut canvas = Canvas { pixels: vec![0; FRAME_BYTES], shown: 0 };
        let frame = gradient();
        display.present(&frame, &mut canvas).unwrap();

        canvas.pixels.fill(0);
        display.repaint(&mut canvas).unwrap();
        assert_eq!(canvas.pixels, frame.as_bytes());
        assert_eq!(canvas.shown, 2);
    }

    #[test]
    fn zoom_doubles_and_halves_within_bounds() {
        let mut zoom = Zoom::new(3);
        assert!(zoom.expand());
        assert_eq!(zoom.factor(), 6);
        assert!(!zoom.expand());
        assert!(zoom.collapse());
        assert!(zoom.collapse());
        assert_eq!(zoom.factor(), 1);
        assert!(!zoom.collapse());

        let mut zoom = Zoom::new(0);
        assert_eq!(zoom.factor(), 1);
        while zoom.expand() {}
        assert_eq!(zoom.factor(), Zoom::MAX);
        assert_eq!(Zoom::new(100), Zoom::new(Zoom::MAX));
        assert_eq!(Zoom::new(2).window_size((225, 205)), (450, 410));
    }
}
