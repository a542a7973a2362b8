// Render pipeline - composites privacy blur and tracking overlays onto frames

use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

use crate::models::frame::Frame;
use crate::models::tracking::Prediction;

// ==============================================================================
// Tuning constants
// ==============================================================================

/// Box expansion fraction for a real detection
const REAL_EXPANSION: f32 = 0.15;
/// Box expansion fraction for a predicted box (wider, to cover drift)
const PREDICTED_EXPANSION: f32 = 0.25;
/// Rounded-corner radius for a real detection
const REAL_CORNER_RADIUS: f32 = 10.0;
/// Rounded-corner radius for a predicted box
const PREDICTED_CORNER_RADIUS: f32 = 15.0;
/// Glass overlay alpha for a real detection
const REAL_FILL_ALPHA: f32 = 0.10;
/// Glass overlay alpha for a predicted box
const PREDICTED_FILL_ALPHA: f32 = 0.08;
/// Full-frame blur runs at this multiple of the base intensity
const FULL_FRAME_INTENSITY_FACTOR: f32 = 1.5;
/// Translational speed (px/ms) above which extra blur compensates motion
const MOTION_BLUR_TRIGGER: f32 = 0.5;
/// Cap on the extra motion-blur intensity
const MOTION_BLUR_MAX_BONUS: f32 = 5.0;
/// Hard ceiling on effective blur intensity
const MAX_BLUR_INTENSITY: f32 = 30.0;

const REAL_STROKE: Rgba<u8> = Rgba([64, 255, 128, 255]);
const PREDICTED_STROKE: Rgba<u8> = Rgba([255, 200, 64, 255]);

// ==============================================================================
// Errors
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Frame buffer does not match declared dimensions {width}x{height}")]
    MalformedFrame { width: u32, height: u32 },

    #[error("Render target rejected frame: {0}")]
    TargetRejected(String),
}

pub type RenderResult<T> = Result<T, RenderError>;

// ==============================================================================
// Blur strategy
// ==============================================================================

/// Pluggable blur operator, chosen when the pipeline is constructed.
pub trait BlurFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Blur the given region of `image` in place. `intensity` is the
    /// engine-level blur strength (1-30); how it maps onto the operator's
    /// own parameter space is up to the implementation.
    fn blur_region(&self, image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, intensity: f32);
}

/// Gaussian blur backed by `image::imageops`
pub struct GaussianBlur;

impl BlurFilter for GaussianBlur {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn blur_region(&self, image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, intensity: f32) {
        if width == 0 || height == 0 {
            return;
        }
        let sigma = (intensity * 0.5).max(0.5);
        let region = imageops::crop_imm(image, x, y, width, height).to_image();
        let blurred = imageops::blur(&region, sigma);
        imageops::replace(image, &blurred, x as i64, y as i64);
    }
}

/// Mosaic blur: averages square blocks. Cheaper than gaussian and harder to
/// invert, at the cost of a visibly coarser result.
pub struct PixelateBlur;

impl BlurFilter for PixelateBlur {
    fn name(&self) -> &'static str {
        "pixelate"
    }

    fn blur_region(&self, image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, intensity: f32) {
        if width == 0 || height == 0 {
            return;
        }
        let block = (intensity.round() as u32).clamp(2, 32);

        let mut by = y;
        while by < y + height {
            let bh = block.min(y + height - by);
            let mut bx = x;
            while bx < x + width {
                let bw = block.min(x + width - bx);

                let mut sums = [0u32; 3];
                for py in by..by + bh {
                    for px in bx..bx + bw {
                        let p = image.get_pixel(px, py);
                        sums[0] += p[0] as u32;
                        sums[1] += p[1] as u32;
                        sums[2] += p[2] as u32;
                    }
                }
                let count = (bw * bh).max(1);
                let avg = Rgba([
                    (sums[0] / count) as u8,
                    (sums[1] / count) as u8,
                    (sums[2] / count) as u8,
                    255,
                ]);
                for py in by..by + bh {
                    for px in bx..bx + bw {
                        image.put_pixel(px, py, avg);
                    }
                }
                bx += bw;
            }
            by += bh;
        }
    }
}

// ==============================================================================
// Render options
// ==============================================================================

/// Per-tick snapshot of the configuration bits the pipeline needs
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub blur_enabled: bool,
    pub glassmorphism_enabled: bool,
    /// Base blur strength (1-30)
    pub blur_intensity: u8,
    /// Blur the entire frame instead of the face region
    pub full_frame_blur: bool,
    /// Current smoothed translational speed, px/ms
    pub velocity_magnitude: f32,
}

// ==============================================================================
// Render pipeline
// ==============================================================================

/// Composites the effective face box, quality-derived blur, and status
/// overlays onto a frame. The blur operator is injected at construction and
/// never swapped afterwards.
pub struct RenderPipeline {
    filter: Box<dyn BlurFilter>,
}

impl RenderPipeline {
    pub fn new(filter: Box<dyn BlurFilter>) -> Self {
        Self { filter }
    }

    /// Pipeline with the default gaussian operator
    pub fn gaussian() -> Self {
        Self::new(Box::new(GaussianBlur))
    }

    pub fn filter_name(&self) -> &'static str {
        self.filter.name()
    }

    /// Composite one tick's output onto `frame` in place.
    ///
    /// The raw frame is the base layer. Depending on the options this draws
    /// a debug stroke, a blurred face region with an optional glass overlay,
    /// or a full-frame privacy blur. Degenerate geometry skips the blur for
    /// this tick without failing.
    pub fn compose(
        &self,
        frame: &mut Frame,
        prediction: Option<&Prediction>,
        opts: &RenderOptions,
    ) -> RenderResult<()> {
        frame.ensure_rgba();
        if !frame.is_well_formed() {
            return Err(RenderError::MalformedFrame {
                width: frame.width,
                height: frame.height,
            });
        }

        let (w, h) = (frame.width, frame.height);
        let data = std::mem::take(&mut frame.data);
        // Cannot fail: buffer length was just validated
        let mut image = match RgbaImage::from_raw(w, h, data) {
            Some(img) => img,
            None => {
                return Err(RenderError::MalformedFrame {
                    width: w,
                    height: h,
                })
            }
        };

        if !opts.blur_enabled {
            if let Some(p) = prediction {
                self.draw_debug(&mut image, p);
            }
        } else if opts.full_frame_blur {
            self.draw_full_frame(&mut image, opts);
        } else if let Some(p) = prediction {
            self.draw_face_blur(&mut image, p, opts);
        }

        frame.data = image.into_raw();
        Ok(())
    }

    /// Debug stroke around the effective box when blur is off
    fn draw_debug(&self, image: &mut RgbaImage, prediction: &Prediction) {
        let clipped = prediction.face_box.clip(image.width(), image.height());
        if clipped.is_degenerate() {
            return;
        }
        let (x, y, bw, bh) = to_pixel_rect(&clipped);

        if prediction.is_predicted {
            blend_rect(image, x, y, bw, bh, [255, 200, 64], 0.08);
            draw_dashed_rect(image, x, y, bw, bh, PREDICTED_STROKE);
            draw_label(image, x as i32 + 4, y as i32 + 4, "TRACKING", PREDICTED_STROKE);
        } else {
            draw_hollow_rect_mut(
                image,
                Rect::at(x as i32, y as i32).of_size(bw.max(1), bh.max(1)),
                REAL_STROKE,
            );
        }
    }

    /// Blur the (expanded, clipped, rounded) face region
    fn draw_face_blur(&self, image: &mut RgbaImage, prediction: &Prediction, opts: &RenderOptions) {
        let (expansion, radius, fill_alpha) = if prediction.is_predicted {
            (PREDICTED_EXPANSION, PREDICTED_CORNER_RADIUS, PREDICTED_FILL_ALPHA)
        } else {
            (REAL_EXPANSION, REAL_CORNER_RADIUS, REAL_FILL_ALPHA)
        };

        let clipped = prediction
            .face_box
            .expand(expansion)
            .clip(image.width(), image.height());
        if clipped.is_degenerate() {
            debug!("degenerate face region after clipping; skipping blur this tick");
            return;
        }

        let (x, y, bw, bh) = to_pixel_rect(&clipped);
        if bw == 0 || bh == 0 {
            debug!("face region collapsed to zero pixels; skipping blur this tick");
            return;
        }

        // Snapshot for restoring the corners outside the rounded mask
        let original = imageops::crop_imm(image, x, y, bw, bh).to_image();

        let intensity = effective_intensity(opts.blur_intensity, opts.velocity_magnitude);
        self.filter.blur_region(image, x, y, bw, bh, intensity);
        restore_outside_rounded_mask(image, &original, x, y, bw, bh, radius);

        if opts.glassmorphism_enabled {
            blend_rounded_rect(image, x, y, bw, bh, radius, [255, 255, 255], fill_alpha);
            blend_border(image, x, y, bw, bh, [255, 255, 255], 0.55);
        }
    }

    /// Privacy fallback: blur everything and announce the tracking loss
    fn draw_full_frame(&self, image: &mut RgbaImage, opts: &RenderOptions) {
        let (w, h) = (image.width(), image.height());
        let intensity =
            (opts.blur_intensity as f32 * FULL_FRAME_INTENSITY_FACTOR).min(MAX_BLUR_INTENSITY);
        self.filter.blur_region(image, 0, 0, w, h, intensity);

        // Centered panel with the status label
        let label = "NO FACE DETECTED";
        let label_w = label_width(label, LABEL_SCALE);
        let panel_w = (label_w + 24).min(w);
        let panel_h = (5 * LABEL_SCALE as u32 + 20).min(h);
        let px = (w.saturating_sub(panel_w)) / 2;
        let py = (h.saturating_sub(panel_h)) / 2;
        blend_rect(image, px, py, panel_w, panel_h, [0, 0, 0], 0.35);
        draw_label(
            image,
            (px + 12) as i32,
            (py + 10) as i32,
            label,
            Rgba([255, 255, 255, 255]),
        );
    }
}

/// Base intensity plus a motion compensation bonus, capped at the engine
/// maximum. The bonus ramps from 0 to 5 as speed rises past the trigger.
fn effective_intensity(base: u8, velocity_magnitude: f32) -> f32 {
    let mut intensity = base as f32;
    if velocity_magnitude.is_finite() && velocity_magnitude > MOTION_BLUR_TRIGGER {
        let bonus = ((velocity_magnitude - MOTION_BLUR_TRIGGER) * 10.0).min(MOTION_BLUR_MAX_BONUS);
        intensity += bonus;
    }
    intensity.min(MAX_BLUR_INTENSITY)
}

/// Convert a clipped face box to integer pixel coordinates within the image
fn to_pixel_rect(face_box: &crate::models::tracking::FaceBox) -> (u32, u32, u32, u32) {
    let x = face_box.x.floor().max(0.0) as u32;
    let y = face_box.y.floor().max(0.0) as u32;
    let w = face_box.width.round() as u32;
    let h = face_box.height.round() as u32;
    (x, y, w, h)
}

// ==============================================================================
// Pixel helpers
// ==============================================================================

fn blend_pixel(image: &mut RgbaImage, x: u32, y: u32, color: [u8; 3], alpha: f32) {
    if x >= image.width() || y >= image.height() {
        return;
    }
    let p = image.get_pixel_mut(x, y);
    for c in 0..3 {
        p[c] = (color[c] as f32 * alpha + p[c] as f32 * (1.0 - alpha)) as u8;
    }
    p[3] = 255;
}

fn blend_rect(image: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: [u8; 3], alpha: f32) {
    for py in y..(y + h).min(image.height()) {
        for px in x..(x + w).min(image.width()) {
            blend_pixel(image, px, py, color, alpha);
        }
    }
}

/// Whether a pixel (relative to the region origin) lies inside the
/// rounded-rectangle mask of the region.
fn inside_rounded_mask(rx: u32, ry: u32, w: u32, h: u32, radius: f32) -> bool {
    let r = radius.min(w as f32 / 2.0).min(h as f32 / 2.0);
    if r <= 0.0 {
        return true;
    }
    let fx = rx as f32 + 0.5;
    let fy = ry as f32 + 0.5;

    let cx = if fx < r {
        r
    } else if fx > w as f32 - r {
        w as f32 - r
    } else {
        return true;
    };
    let cy = if fy < r {
        r
    } else if fy > h as f32 - r {
        h as f32 - r
    } else {
        return true;
    };

    let dx = fx - cx;
    let dy = fy - cy;
    dx * dx + dy * dy <= r * r
}

/// Restore original pixels in the corner areas outside the rounded mask
fn restore_outside_rounded_mask(
    image: &mut RgbaImage,
    original: &RgbaImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    radius: f32,
) {
    let corner = radius.ceil() as u32;
    for ry in 0..h {
        // Only corner bands can fall outside the mask
        if ry > corner && ry + corner < h {
            continue;
        }
        for rx in 0..w {
            if rx > corner && rx + corner < w {
                continue;
            }
            if !inside_rounded_mask(rx, ry, w, h, radius) {
                let px = x + rx;
                let py = y + ry;
                if px < image.width() && py < image.height() {
                    image.put_pixel(px, py, *original.get_pixel(rx, ry));
                }
            }
        }
    }
}

fn blend_rounded_rect(
    image: &mut RgbaImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    radius: f32,
    color: [u8; 3],
    alpha: f32,
) {
    for ry in 0..h {
        for rx in 0..w {
            if inside_rounded_mask(rx, ry, w, h, radius) {
                blend_pixel(image, x + rx, y + ry, color, alpha);
            }
        }
    }
}

/// One-pixel border around the region edge
fn blend_border(image: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: [u8; 3], alpha: f32) {
    if w == 0 || h == 0 {
        return;
    }
    for px in x..x + w {
        blend_pixel(image, px, y, color, alpha);
        blend_pixel(image, px, y + h - 1, color, alpha);
    }
    for py in y..y + h {
        blend_pixel(image, x, py, color, alpha);
        blend_pixel(image, x + w - 1, py, color, alpha);
    }
}

/// Dashed rectangle stroke (6 px on, 4 px off)
fn draw_dashed_rect(image: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    if w == 0 || h == 0 {
        return;
    }
    let on = |offset: u32| (offset % 10) < 6;
    for dx in 0..w {
        if on(dx) {
            put_pixel_checked(image, x + dx, y, color);
            put_pixel_checked(image, x + dx, y + h - 1, color);
        }
    }
    for dy in 0..h {
        if on(dy) {
            put_pixel_checked(image, x, y + dy, color);
            put_pixel_checked(image, x + w - 1, y + dy, color);
        }
    }
}

fn put_pixel_checked(image: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}

// ==============================================================================
// Status labels (3x5 bitmap glyphs, uppercase only)
// ==============================================================================

const LABEL_SCALE: i32 = 2;

fn glyph(ch: char) -> [u8; 5] {
    match ch {
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'K' => [0b101, 0b110, 0b100, 0b110, 0b101],
        'N' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        _ => [0b000, 0b000, 0b000, 0b000, 0b000],
    }
}

fn draw_glyph(image: &mut RgbaImage, x: i32, y: i32, ch: char, scale: i32, color: Rgba<u8>) {
    let bitmap = glyph(ch);
    for (row, bits) in bitmap.iter().enumerate() {
        for col in 0..3 {
            if (bits >> (2 - col)) & 1 == 1 {
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = x + col * scale + dx;
                        let py = y + row as i32 * scale + dy;
                        if px >= 0
                            && py >= 0
                            && (px as u32) < image.width()
                            && (py as u32) < image.height()
                        {
                            image.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}

fn draw_label(image: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>) {
    let mut cursor_x = x;
    for ch in text.chars() {
        draw_glyph(image, cursor_x, y, ch, LABEL_SCALE, color);
        cursor_x += 4 * LABEL_SCALE;
    }
}

fn label_width(text: &str, scale: i32) -> u32 {
    (text.chars().count() as i32 * 4 * scale).max(0) as u32
}
