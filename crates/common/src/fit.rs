//! Fit geometry: mapping a source frame onto a requested output rectangle
//!
//! [`plan_fit`] does the math in floating point and returns a [`FitPlan`]:
//! which region of the source is sampled, where it lands on the output
//! canvas, and what fills the rest. [`FitPlan::to_pixels`] snaps that plan
//! to whole pixels for backends such as an ffmpeg filter graph.
//!
//! Margin policy, shared by every backend:
//! - `clip` leaves margins transparent. Neither output encoding carries
//!   alpha, so they flatten to black in the encoded image.
//! - `fill` paints margins opaque black.

use std::fmt;
use thiserror::Error;

use crate::thumbnail::FitMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle in floating-point pixel units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    fn full(size: FrameSize) -> Self {
        Self::new(0.0, 0.0, size.width as f64, size.height as f64)
    }
}

/// What fills the part of the canvas not covered by the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    /// The frame covers the whole canvas
    None,
    Transparent,
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPlan {
    pub mode: FitMode,
    /// Region of the source frame that is sampled
    pub source: Rect,
    /// Where the sampled region is drawn on the canvas
    pub dest: Rect,
    pub canvas: FrameSize,
    pub background: Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FitError {
    #[error("source frame has zero area ({0})")]
    EmptySource(FrameSize),
    #[error("target size has zero area ({0})")]
    EmptyTarget(FrameSize),
}

/// Compute how `source` is mapped onto a `target` canvas under `mode`
pub fn plan_fit(mode: FitMode, source: FrameSize, target: FrameSize) -> Result<FitPlan, FitError> {
    if source.width == 0 || source.height == 0 {
        return Err(FitError::EmptySource(source));
    }
    if target.width == 0 || target.height == 0 {
        return Err(FitError::EmptyTarget(target));
    }

    let plan = match mode {
        FitMode::Crop => FitPlan {
            mode,
            source: crop_window(source, target),
            dest: Rect::full(target),
            canvas: target,
            background: Background::None,
        },
        FitMode::Scale => FitPlan {
            mode,
            source: Rect::full(source),
            dest: Rect::full(target),
            canvas: target,
            background: Background::None,
        },
        FitMode::Clip | FitMode::Fill => FitPlan {
            mode,
            source: Rect::full(source),
            dest: contain(source, target),
            canvas: target,
            background: if mode == FitMode::Fill {
                Background::Black
            } else {
                Background::Transparent
            },
        },
    };

    Ok(plan)
}

/// Largest centered window of `source` with the target's aspect ratio
fn crop_window(source: FrameSize, target: FrameSize) -> Rect {
    let sw = source.width as f64;
    let sh = source.height as f64;
    let target_aspect = target.aspect();

    if target_aspect > source.aspect() {
        let height = sw / target_aspect;
        Rect::new(0.0, (sh - height) / 2.0, sw, height)
    } else {
        let width = sh * target_aspect;
        Rect::new((sw - width) / 2.0, 0.0, width, sh)
    }
}

/// Largest centered rectangle inside `target` with the source's aspect ratio
fn contain(source: FrameSize, target: FrameSize) -> Rect {
    let dw = target.width as f64;
    let dh = target.height as f64;
    let source_aspect = source.aspect();

    if target.aspect() > source_aspect {
        let width = dh * source_aspect;
        Rect::new((dw - width) / 2.0, 0.0, width, dh)
    } else {
        let height = dw / source_aspect;
        Rect::new(0.0, (dh - height) / 2.0, dw, height)
    }
}

/// Integer-pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A [`FitPlan`] snapped to whole pixels, in filter order:
/// crop the source, scale the result, pad it onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelPlan {
    pub crop: Option<PixelRect>,
    pub scaled: FrameSize,
    pub pad: Option<PixelPad>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelPad {
    pub canvas: FrameSize,
    pub x: u32,
    pub y: u32,
    pub background: Background,
}

impl FitPlan {
    pub fn to_pixels(&self, source: FrameSize) -> PixelPlan {
        let width = snap(self.source.width, source.width);
        let height = snap(self.source.height, source.height);
        let window = PixelRect {
            x: (source.width - width) / 2,
            y: (source.height - height) / 2,
            width,
            height,
        };
        let crop = (width != source.width || height != source.height).then_some(window);

        let scaled = FrameSize::new(
            snap(self.dest.width, self.canvas.width),
            snap(self.dest.height, self.canvas.height),
        );

        let pad = (scaled != self.canvas).then(|| PixelPad {
            canvas: self.canvas,
            x: (self.canvas.width - scaled.width) / 2,
            y: (self.canvas.height - scaled.height) / 2,
            background: self.background,
        });

        PixelPlan { crop, scaled, pad }
    }
}

/// Round to the nearest pixel, keeping at least one and at most `max`
fn snap(value: f64, max: u32) -> u32 {
    (value.round() as u32).clamp(1, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_rect(actual: Rect, x: f64, y: f64, width: f64, height: f64) {
        assert!(
            (actual.x - x).abs() < EPS
                && (actual.y - y).abs() < EPS
                && (actual.width - width).abs() < EPS
                && (actual.height - height).abs() < EPS,
            "expected ({x}, {y}, {width}, {height}), got {actual:?}"
        );
    }

    fn hd() -> FrameSize {
        FrameSize::new(1920, 1080)
    }

    fn four_by_three() -> FrameSize {
        FrameSize::new(400, 300)
    }

    #[test]
    fn test_crop_narrower_target_trims_the_sides() {
        let plan = plan_fit(FitMode::Crop, hd(), four_by_three()).unwrap();
        // 1080 * (400 / 300) = 1440, centered horizontally
        assert_rect(plan.source, 240.0, 0.0, 1440.0, 1080.0);
        assert_rect(plan.dest, 0.0, 0.0, 400.0, 300.0);
        assert_eq!(plan.background, Background::None);

        let pixels = plan.to_pixels(hd());
        assert_eq!(
            pixels.crop,
            Some(PixelRect { x: 240, y: 0, width: 1440, height: 1080 })
        );
        assert_eq!(pixels.scaled, four_by_three());
        assert_eq!(pixels.pad, None);
    }

    #[test]
    fn test_crop_wider_target_trims_top_and_bottom() {
        let source = FrameSize::new(1080, 1080);
        let plan = plan_fit(FitMode::Crop, source, FrameSize::new(2000, 1000)).unwrap();
        // 1080 / 2 = 540, centered vertically
        assert_rect(plan.source, 0.0, 270.0, 1080.0, 540.0);

        let pixels = plan.to_pixels(source);
        assert_eq!(
            pixels.crop,
            Some(PixelRect { x: 0, y: 270, width: 1080, height: 540 })
        );
        assert_eq!(pixels.scaled, FrameSize::new(2000, 1000));
    }

    #[test]
    fn test_crop_with_matching_aspect_takes_the_whole_frame() {
        let plan = plan_fit(FitMode::Crop, hd(), FrameSize::new(1280, 720)).unwrap();
        assert_rect(plan.source, 0.0, 0.0, 1920.0, 1080.0);
        let pixels = plan.to_pixels(hd());
        assert_eq!(pixels.crop, None);
        assert_eq!(pixels.scaled, FrameSize::new(1280, 720));
    }

    #[test]
    fn test_scale_stretches_without_cropping() {
        let plan = plan_fit(FitMode::Scale, hd(), four_by_three()).unwrap();
        assert_rect(plan.source, 0.0, 0.0, 1920.0, 1080.0);
        assert_rect(plan.dest, 0.0, 0.0, 400.0, 300.0);

        let pixels = plan.to_pixels(hd());
        assert_eq!(pixels.crop, None);
        assert_eq!(pixels.scaled, four_by_three());
        assert_eq!(pixels.pad, None);
    }

    #[test]
    fn test_clip_letterboxes_with_transparent_margins() {
        let plan = plan_fit(FitMode::Clip, hd(), four_by_three()).unwrap();
        assert_rect(plan.source, 0.0, 0.0, 1920.0, 1080.0);
        assert_rect(plan.dest, 0.0, 37.5, 400.0, 225.0);
        assert_eq!(plan.background, Background::Transparent);

        let pixels = plan.to_pixels(hd());
        assert_eq!(pixels.crop, None);
        assert_eq!(pixels.scaled, FrameSize::new(400, 225));
        assert_eq!(
            pixels.pad,
            Some(PixelPad {
                canvas: four_by_three(),
                x: 0,
                y: 37,
                background: Background::Transparent,
            })
        );
    }

    #[test]
    fn test_fill_matches_clip_geometry_with_black_margins() {
        let clip = plan_fit(FitMode::Clip, hd(), four_by_three()).unwrap();
        let fill = plan_fit(FitMode::Fill, hd(), four_by_three()).unwrap();
        assert_eq!(clip.source, fill.source);
        assert_eq!(clip.dest, fill.dest);
        assert_eq!(fill.background, Background::Black);
        assert_eq!(
            fill.to_pixels(hd()).pad.map(|p| p.background),
            Some(Background::Black)
        );
    }

    #[test]
    fn test_contain_pillarboxes_portrait_sources() {
        let source = FrameSize::new(1080, 1920);
        let plan = plan_fit(FitMode::Fill, source, FrameSize::new(1280, 720)).unwrap();
        // 720 * (1080 / 1920) = 405, centered horizontally
        assert_rect(plan.dest, 437.5, 0.0, 405.0, 720.0);

        let pad = plan.to_pixels(source).pad.unwrap();
        assert_eq!((pad.x, pad.y), (437, 0));
    }

    #[test]
    fn test_snapping_never_produces_zero_pixels() {
        let source = FrameSize::new(4000, 10);
        let plan = plan_fit(FitMode::Clip, source, FrameSize::new(100, 100)).unwrap();
        let pixels = plan.to_pixels(source);
        assert_eq!(pixels.scaled, FrameSize::new(100, 1));
        assert_eq!(pixels.pad.map(|p| p.y), Some(49));
    }

    #[test]
    fn test_rejects_zero_area() {
        assert_eq!(
            plan_fit(FitMode::Crop, FrameSize::new(0, 1080), four_by_three()),
            Err(FitError::EmptySource(FrameSize::new(0, 1080)))
        );
        assert_eq!(
            plan_fit(FitMode::Crop, hd(), FrameSize::new(400, 0)),
            Err(FitError::EmptyTarget(FrameSize::new(400, 0)))
        );
    }
}
