//! Soft-edged polygon masks.
//!
//! A polygon is scan-converted (nonzero winding, sampled at pixel centres)
//! into a coverage buffer cropped to its bounding box plus the blur's bleed
//! margin, then softened with a Gaussian blur. Pixels outside the crop are
//! never touched by the region.

use image::{GrayImage, Luma};

/// Margin, in pixels, beyond which a Gaussian of `sigma` contributes nothing visible.
pub fn bleed_radius(sigma: f32) -> u32 {
    if sigma > 0.0 {
        ((sigma * 3.0).ceil() as u32).saturating_add(1)
    } else {
        0
    }
}

/// Coverage mask for one region, positioned in image space.
#[derive(Debug, Clone)]
pub struct RegionMask {
    left: u32,
    top: u32,
    coverage: GrayImage,
}

impl RegionMask {
    /// Rasterize `polygon` (pixel coordinates) for a `width` × `height` image.
    ///
    /// Returns `None` when the polygon is degenerate or lies entirely
    /// outside the image.
    pub fn rasterize(polygon: &[(f32, f32)], width: u32, height: u32, sigma: f32) -> Option<Self> {
        if polygon.len() < 3 || width == 0 || height == 0 {
            return None;
        }
        if polygon.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return None;
        }

        let bleed = bleed_radius(sigma) as f32;
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for &(x, y) in polygon {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let left = (min_x - bleed).floor().max(0.0);
        let top = (min_y - bleed).floor().max(0.0);
        let right = (max_x + bleed).ceil().min(width as f32);
        let bottom = (max_y + bleed).ceil().min(height as f32);
        if right <= left || bottom <= top {
            return None;
        }

        let (left, top) = (left as u32, top as u32);
        let mut coverage = GrayImage::new(right as u32 - left, bottom as u32 - top);
        fill_polygon(&mut coverage, polygon, left as f32, top as f32);

        if sigma > 0.0 {
            coverage = image::imageops::blur(&coverage, sigma);
        }

        Some(Self { left, top, coverage })
    }

    /// Bounding box of the mask as `(left, top, width, height)`.
    pub fn bounds(&self) -> (u32, u32, u32, u32) {
        (self.left, self.top, self.coverage.width(), self.coverage.height())
    }

    /// Coverage in [0, 1] at image position `(x, y)`; zero outside the mask.
    pub fn coverage_at(&self, x: u32, y: u32) -> f32 {
        let (Some(cx), Some(cy)) = (x.checked_sub(self.left), y.checked_sub(self.top)) else {
            return 0.0;
        };
        match self.coverage.get_pixel_checked(cx, cy) {
            Some(Luma([v])) => *v as f32 / 255.0,
            None => 0.0,
        }
    }

    /// Non-zero coverage samples as `(x, y, coverage)` in image space.
    pub fn samples(&self) -> impl Iterator<Item = (u32, u32, f32)> + '_ {
        self.coverage
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 0)
            .map(move |(x, y, p)| (self.left + x, self.top + y, p.0[0] as f32 / 255.0))
    }
}

/// Nonzero-winding scanline fill of `polygon`, offset by `(left, top)`.
fn fill_polygon(mask: &mut GrayImage, polygon: &[(f32, f32)], left: f32, top: f32) {
    let (w, h) = mask.dimensions();
    let n = polygon.len();
    let mut crossings: Vec<(f32, i32)> = Vec::with_capacity(n);

    for row in 0..h {
        let sy = top + row as f32 + 0.5;
        crossings.clear();

        for i in 0..n {
            let (x0, y0) = polygon[i];
            let (x1, y1) = polygon[(i + 1) % n];
            let dir = if y0 <= sy && y1 > sy {
                1
            } else if y1 <= sy && y0 > sy {
                -1
            } else {
                continue;
            };
            let t = (sy - y0) / (y1 - y0);
            crossings.push((x0 + t * (x1 - x0), dir));
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        for pair in crossings.windows(2) {
            winding += pair[0].1;
            if winding == 0 {
                continue;
            }
            // Pixel centres in [xa, xb).
            let start = (pair[0].0 - left - 0.5).ceil().max(0.0);
            let end = (pair[1].0 - left - 0.5).ceil().min(w as f32);
            if end <= start {
                continue;
            }
            for col in start as u32..end as u32 {
                mask.put_pixel(col, row, Luma([255]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<(f32, f32)> {
        vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
    }

    #[test]
    fn test_hard_square_coverage() {
        let mask = RegionMask::rasterize(&square(10.0, 10.0, 20.0, 20.0), 30, 30, 0.0).unwrap();
        assert_eq!(mask.bounds(), (10, 10, 10, 10));
        assert_eq!(mask.samples().count(), 100);
        assert_eq!(mask.coverage_at(10, 10), 1.0);
        assert_eq!(mask.coverage_at(19, 19), 1.0);
        assert_eq!(mask.coverage_at(20, 20), 0.0);
        assert_eq!(mask.coverage_at(9, 15), 0.0);
    }

    #[test]
    fn test_winding_direction_irrelevant() {
        let mut ccw = square(10.0, 10.0, 20.0, 20.0);
        ccw.reverse();
        let mask = RegionMask::rasterize(&ccw, 30, 30, 0.0).unwrap();
        assert_eq!(mask.samples().count(), 100);
    }

    #[test]
    fn test_concave_polygon() {
        // U shape: the notch between x=14..16 above y=15 stays empty.
        let poly = vec![
            (10.0, 10.0),
            (14.0, 10.0),
            (14.0, 15.0),
            (16.0, 15.0),
            (16.0, 10.0),
            (20.0, 10.0),
            (20.0, 20.0),
            (10.0, 20.0),
        ];
        let mask = RegionMask::rasterize(&poly, 30, 30, 0.0).unwrap();
        assert_eq!(mask.coverage_at(15, 12), 0.0);
        assert_eq!(mask.coverage_at(12, 12), 1.0);
        assert_eq!(mask.coverage_at(15, 17), 1.0);
    }

    #[test]
    fn test_blur_softens_and_bleeds() {
        let sigma = 2.0;
        let mask = RegionMask::rasterize(&square(20.0, 20.0, 40.0, 40.0), 60, 60, sigma).unwrap();
        let bleed = bleed_radius(sigma);
        assert_eq!(bleed, 7);
        assert_eq!(mask.bounds(), (13, 13, 34, 34));

        let centre = mask.coverage_at(30, 30);
        let edge = mask.coverage_at(20, 30);
        let outside = mask.coverage_at(17, 30);
        assert!(centre > 0.95, "centre = {centre}");
        assert!(edge > 0.2 && edge < 0.8, "edge = {edge}");
        assert!(outside < edge, "outside = {outside}");
        // Beyond the bleed margin nothing is covered.
        assert_eq!(mask.coverage_at(12, 30), 0.0);
    }

    #[test]
    fn test_bleed_radius_saturates() {
        assert_eq!(bleed_radius(0.0), 0);
        assert_eq!(bleed_radius(2.0e9), u32::MAX);
        assert_eq!(bleed_radius(f32::INFINITY), u32::MAX);
    }

    #[test]
    fn test_clipped_to_image() {
        let mask = RegionMask::rasterize(&square(-5.0, -5.0, 5.0, 5.0), 10, 10, 0.0).unwrap();
        assert_eq!(mask.bounds(), (0, 0, 5, 5));
        assert_eq!(mask.samples().count(), 25);
    }

    #[test]
    fn test_offscreen_polygon() {
        assert!(RegionMask::rasterize(&square(50.0, 50.0, 60.0, 60.0), 10, 10, 0.0).is_none());
    }

    #[test]
    fn test_degenerate_polygon() {
        assert!(RegionMask::rasterize(&[(1.0, 1.0), (2.0, 2.0)], 10, 10, 0.0).is_none());
        assert!(RegionMask::rasterize(&[(f32::NAN, 1.0), (2.0, 2.0), (3.0, 1.0)], 10, 10, 0.0).is_none());
    }
}
