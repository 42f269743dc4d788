//! Stroke rasterization for turtle pixel-match grading
//!
//! Segments are drawn as capsules via a signed distance test per pixel
//! center, so learner and reference ink land on identical grids.

use glam::Vec2;

use super::state::Segment;
use crate::to_vec2;

/// Signed distance from `p` to a capsule around segment `a`-`b`
#[inline]
pub fn sd_segment(p: Vec2, a: Vec2, b: Vec2, half_width: f32) -> f32 {
    let pa = p - a;
    let ba = b - a;
    let len_sq = ba.length_squared();
    // Degenerate segment is a dot
    let t = if len_sq < f32::EPSILON {
        0.0
    } else {
        (pa.dot(ba) / len_sq).clamp(0.0, 1.0)
    };
    (pa - ba * t).length() - half_width
}

/// Monochrome ink mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    ink: Vec<bool>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ink: vec![false; width as usize * height as usize],
        }
    }

    /// Draw every segment at `stroke_width` onto a fresh bitmap
    pub fn rasterize(segments: &[Segment], width: u32, height: u32, stroke_width: f32) -> Self {
        let mut bitmap = Self::new(width, height);
        for segment in segments {
            bitmap.stroke(segment, stroke_width);
        }
        bitmap
    }

    pub fn stroke(&mut self, segment: &Segment, stroke_width: f32) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let a = to_vec2(segment.x1, segment.y1);
        let b = to_vec2(segment.x2, segment.y2);
        let half = stroke_width * 0.5;

        // Only visit the clipped bounding box of the capsule
        let min = a.min(b) - Vec2::splat(half + 1.0);
        let max = a.max(b) + Vec2::splat(half + 1.0);
        let x0 = min.x.floor().max(0.0) as u32;
        let y0 = min.y.floor().max(0.0) as u32;
        let x1 = (max.x.ceil().max(0.0) as u32).min(self.width - 1);
        let y1 = (max.y.ceil().max(0.0) as u32).min(self.height - 1);
        if x0 > x1 || y0 > y1 {
            return;
        }

        for py in y0..=y1 {
            for px in x0..=x1 {
                let center = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                if sd_segment(center, a, b, half) <= 0.0 {
                    self.set(px, py);
                }
            }
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn set(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.ink[i] = true;
        }
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.ink[self.index(x, y)]
    }

    pub fn ink_count(&self) -> usize {
        self.ink.iter().filter(|&&on| on).count()
    }
}

/// Fraction of reference ink also covered by learner ink:
/// `1 - uncovered / total`. An ink-free reference counts as fully covered.
pub fn coverage(reference: &Bitmap, learner: &Bitmap) -> f64 {
    let total = reference.ink_count();
    if total == 0 {
        return 1.0;
    }
    let mut uncovered = 0usize;
    for y in 0..reference.height {
        for x in 0..reference.width {
            if reference.get(x, y) && !learner.get(x, y) {
                uncovered += 1;
            }
        }
    }
    1.0 - uncovered as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment {
            x1,
            y1,
            x2,
            y2,
            color: "#000000".into(),
        }
    }

    #[test]
    fn test_sd_segment() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, 0.0);
        assert!((sd_segment(Vec2::new(5.0, 3.0), a, b, 1.0) - 2.0).abs() < 1e-5);
        // Past the end cap: distance to endpoint
        assert!((sd_segment(Vec2::new(13.0, 4.0), a, b, 0.0) - 5.0).abs() < 1e-5);
        // Dot
        assert!((sd_segment(Vec2::new(3.0, 4.0), a, a, 0.0) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_horizontal_stroke_thickness() {
        let bitmap = Bitmap::rasterize(&[seg(10.0, 20.0, 30.0, 20.0)], 50, 50, 4.0);
        // Rows 18..=21 have centers within 2px of y=20
        assert!(bitmap.get(20, 18));
        assert!(bitmap.get(20, 21));
        assert!(!bitmap.get(20, 17));
        assert!(!bitmap.get(20, 22));
        assert!(bitmap.ink_count() > 20 * 4);
    }

    #[test]
    fn test_offscreen_segment_is_clipped() {
        let bitmap = Bitmap::rasterize(&[seg(-50.0, -50.0, -10.0, -10.0)], 20, 20, 4.0);
        assert_eq!(bitmap.ink_count(), 0);
    }

    #[test]
    fn test_coverage() {
        let reference = Bitmap::rasterize(&[seg(0.0, 10.0, 40.0, 10.0)], 50, 20, 4.0);
        let same = reference.clone();
        let half = Bitmap::rasterize(&[seg(0.0, 10.0, 20.0, 10.0)], 50, 20, 4.0);
        let empty = Bitmap::new(50, 20);

        assert_eq!(coverage(&reference, &same), 1.0);
        assert_eq!(coverage(&reference, &empty), 0.0);
        let partial = coverage(&reference, &half);
        assert!(partial > 0.4 && partial < 0.7);
        assert_eq!(coverage(&empty, &empty), 1.0);
    }
}
