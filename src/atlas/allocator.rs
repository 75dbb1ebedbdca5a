// Free-rectangle allocator for a single atlas page.
//
// Tracks the free and used rectangles of one fixed-size page and picks a
// position for each new request with a selectable scoring heuristic. Space is
// only ever carved out; the allocator never merges freed space back in, so the
// only way to reclaim it is `reset` followed by a full reinsertion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
use log::{debug, trace, warn};

use crate::atlas::rect::{Rect, Size};

/// Rule used to choose between candidate placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Heuristic {
    /// Smallest leftover on the short side, then on the long side.
    BestShortSideFit,
    /// Smallest leftover on the long side, then on the short side.
    BestLongSideFit,
    /// Smallest leftover area, then smallest short-side leftover.
    #[default]
    BestAreaFit,
    /// Lowest bottom edge, then leftmost ("tetris" placement).
    BottomLeft,
    /// Longest shared boundary with the page edges and already placed rects.
    ContactPoint,
}

impl Heuristic {
    pub const ALL: [Heuristic; 5] = [
        Heuristic::BestShortSideFit,
        Heuristic::BestLongSideFit,
        Heuristic::BestAreaFit,
        Heuristic::BottomLeft,
        Heuristic::ContactPoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Heuristic::BestShortSideFit => "best-short-side-fit",
            Heuristic::BestLongSideFit => "best-long-side-fit",
            Heuristic::BestAreaFit => "best-area-fit",
            Heuristic::BottomLeft => "bottom-left",
            Heuristic::ContactPoint => "contact-point",
        }
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Heuristic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "best-short-side-fit" | "bssf" => Ok(Heuristic::BestShortSideFit),
            "best-long-side-fit" | "blsf" => Ok(Heuristic::BestLongSideFit),
            "best-area-fit" | "baf" => Ok(Heuristic::BestAreaFit),
            "bottom-left" | "bl" => Ok(Heuristic::BottomLeft),
            "contact-point" | "cp" => Ok(Heuristic::ContactPoint),
            other => Err(format!("unknown packing heuristic '{other}'")),
        }
    }
}

/// Lower is better for every heuristic. Contact point negates its score.
type Score = (i64, i64);

#[derive(Debug, Clone)]
pub struct RectAllocator {
    size: Size,
    used: Vec<Rect>,
    free: Vec<Rect>,
}

impl RectAllocator {
    pub fn new(width: i32, height: i32) -> Self {
        let mut allocator = Self {
            size: Size::new(width, height),
            used: Vec::new(),
            free: Vec::new(),
        };
        allocator.reset(width, height);
        allocator
    }

    /// Forget every placement. The free list becomes the page interior, which
    /// keeps a one pixel guard border on all sides.
    pub fn reset(&mut self, width: i32, height: i32) {
        self.size = Size::new(width, height);
        self.used.clear();
        self.free.clear();

        if width > 2 && height > 2 {
            self.free.push(Rect::new(1, 1, width - 2, height - 2));
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn free_rects(&self) -> &[Rect] {
        &self.free
    }

    pub fn used_rects(&self) -> &[Rect] {
        &self.used
    }

    /// Find a place for `size` and claim it. The returned rect may have width
    /// and height swapped when the rotated orientation scores better.
    pub fn insert(&mut self, size: Size, heuristic: Heuristic) -> Option<Rect> {
        if size.w < 0 || size.h < 0 {
            warn!("Rejecting negative allocation request {}x{}", size.w, size.h);
            return None;
        }

        let rect = self.find_position(size, heuristic)?;
        trace!("{heuristic} placed {}x{} at {:?}", size.w, size.h, rect);
        self.place(rect);
        Some(rect)
    }

    /// Claim a rect whose position is already known, e.g. when restoring a
    /// page from disk.
    pub fn mark_used(&mut self, rect: Rect) {
        self.place(rect);
    }

    /// Fraction of the page covered by used rects. Diagnostic only.
    pub fn occupancy(&self) -> f32 {
        let total = self.size.area();
        if total <= 0 {
            return 0.0;
        }
        let used: i64 = self.used.iter().map(Rect::area).sum();
        used as f32 / total as f32
    }

    /// Check the allocator invariants, describing the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        let interior = Rect::new(1, 1, self.size.w - 2, self.size.h - 2);

        for (i, a) in self.used.iter().enumerate() {
            if !interior.contains_rect(a) {
                return Err(format!("used rect {a:?} leaves the page interior"));
            }
            if let Some(b) = self.used[i + 1..].iter().find(|b| a.intersects(b)) {
                return Err(format!("used rects {a:?} and {b:?} overlap"));
            }
        }

        for (i, a) in self.free.iter().enumerate() {
            for (j, b) in self.free.iter().enumerate() {
                if i != j && b.contains_rect(a) {
                    return Err(format!("free rect {a:?} is contained in {b:?}"));
                }
            }
        }

        Ok(())
    }

    fn find_position(&self, size: Size, heuristic: Heuristic) -> Option<Rect> {
        let mut best: Option<(Score, Rect)> = None;

        for free in &self.free {
            for candidate in [size, size.flipped()] {
                if !free.fits(candidate) {
                    continue;
                }

                let rect = Rect::new(free.x, free.y, candidate.w, candidate.h);
                let score = self.score(free, &rect, heuristic);

                if best.map_or(true, |(best_score, _)| score < best_score) {
                    best = Some((score, rect));
                }
            }
        }

        best.map(|(_, rect)| rect)
    }

    fn score(&self, free: &Rect, candidate: &Rect, heuristic: Heuristic) -> Score {
        let leftover_horiz = (free.w - candidate.w) as i64;
        let leftover_vert = (free.h - candidate.h) as i64;
        let short_side = leftover_horiz.min(leftover_vert);
        let long_side = leftover_horiz.max(leftover_vert);

        match heuristic {
            Heuristic::BestShortSideFit => (short_side, long_side),
            Heuristic::BestLongSideFit => (long_side, short_side),
            Heuristic::BestAreaFit => (free.area() - candidate.area(), short_side),
            Heuristic::BottomLeft => (candidate.bottom() as i64, candidate.x as i64),
            Heuristic::ContactPoint => (-self.contact_score(candidate), 0),
        }
    }

    /// Total boundary length `candidate` would share with the interior border
    /// and with already used rects.
    fn contact_score(&self, candidate: &Rect) -> i64 {
        let mut score = 0i64;

        if candidate.x == 1 || candidate.right() == self.size.w - 1 {
            score += candidate.h as i64;
        }
        if candidate.y == 1 || candidate.bottom() == self.size.h - 1 {
            score += candidate.w as i64;
        }

        for used in &self.used {
            if used.x == candidate.right() || used.right() == candidate.x {
                score += common_interval_length(used.y, used.bottom(), candidate.y, candidate.bottom());
            }
            if used.y == candidate.bottom() || used.bottom() == candidate.y {
                score += common_interval_length(used.x, used.right(), candidate.x, candidate.right());
            }
        }

        score
    }

    fn place(&mut self, rect: Rect) {
        let mut residuals = Vec::new();
        self.free.retain(|free| {
            if free.intersects(&rect) {
                split_free_rect(free, &rect, &mut residuals);
                false
            } else {
                true
            }
        });
        self.free.extend(residuals);
        self.prune_free_list();

        // A zero-area request consumes nothing and would only distort contact scoring.
        if rect.area() > 0 {
            self.used.push(rect);
        }
    }

    /// Drop every free rect that lies entirely inside another one. Partial
    /// overlaps between free rects are left alone.
    fn prune_free_list(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let mut removed = false;
            let mut j = i + 1;

            while j < self.free.len() {
                if self.free[j].contains_rect(&self.free[i]) {
                    self.free.remove(i);
                    removed = true;
                    break;
                }
                if self.free[i].contains_rect(&self.free[j]) {
                    self.free.remove(j);
                } else {
                    j += 1;
                }
            }

            if !removed {
                i += 1;
            }
        }
    }
}

/// Length of the overlap of two intervals, 0 when they are disjoint.
fn common_interval_length(start1: i32, end1: i32, start2: i32, end2: i32) -> i64 {
    if end1 < start2 || end2 < start1 {
        return 0;
    }
    (end1.min(end2) - start1.max(start2)) as i64
}

/// Push the up to four slices of `free` that remain outside `used`.
fn split_free_rect(free: &Rect, used: &Rect, out: &mut Vec<Rect>) {
    if used.x < free.right() && used.right() > free.x {
        // Above the used rect
        if used.y > free.y && used.y < free.bottom() {
            out.push(Rect::new(free.x, free.y, free.w, used.y - free.y));
        }
        // Below the used rect
        if used.bottom() < free.bottom() {
            out.push(Rect::new(free.x, used.bottom(), free.w, free.bottom() - used.bottom()));
        }
    }

    if used.y < free.bottom() && used.bottom() > free.y {
        // Left of the used rect
        if used.x > free.x && used.x < free.right() {
            out.push(Rect::new(free.x, free.y, used.x - free.x, free.h));
        }
        // Right of the used rect
        if used.right() < free.right() {
            out.push(Rect::new(used.right(), free.y, free.right() - used.right(), free.h));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(allocator: &mut RectAllocator, sizes: &[(i32, i32)], heuristic: Heuristic) -> Vec<Rect> {
        sizes
            .iter()
            .filter_map(|&(w, h)| allocator.insert(Size::new(w, h), heuristic))
            .collect()
    }

    // Deterministic mix of small and oblong requests.
    fn request_mix() -> Vec<(i32, i32)> {
        let mut seed = 0x2545_f491u32;
        (0..80)
            .map(|_| {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                (1 + (seed % 37) as i32, 1 + ((seed >> 8) % 23) as i32)
            })
            .collect()
    }

    #[test]
    fn test_reset_leaves_guard_border() {
        let allocator = RectAllocator::new(64, 32);
        assert_eq!(allocator.free_rects(), &[Rect::new(1, 1, 62, 30)]);
        assert!(allocator.is_empty());
    }

    #[test]
    fn test_used_rects_never_overlap() {
        for heuristic in Heuristic::ALL {
            let mut allocator = RectAllocator::new(128, 128);
            let placed = fill(&mut allocator, &request_mix(), heuristic);
            assert!(!placed.is_empty(), "{heuristic} placed nothing");

            for (i, a) in placed.iter().enumerate() {
                for b in &placed[i + 1..] {
                    assert!(!a.intersects(b), "{heuristic}: {a:?} overlaps {b:?}");
                }
            }
            assert_eq!(allocator.validate(), Ok(()), "{heuristic}");
        }
    }

    #[test]
    fn test_free_list_has_no_contained_rects() {
        for heuristic in Heuristic::ALL {
            let mut allocator = RectAllocator::new(96, 96);
            for (w, h) in request_mix() {
                allocator.insert(Size::new(w, h), heuristic);
                let free = allocator.free_rects();
                for (i, a) in free.iter().enumerate() {
                    for (j, b) in free.iter().enumerate() {
                        assert!(i == j || !b.contains_rect(a), "{heuristic}: {a:?} inside {b:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_oversized_request_fails_for_every_heuristic() {
        for heuristic in Heuristic::ALL {
            let mut allocator = RectAllocator::new(64, 64);
            assert_eq!(allocator.insert(Size::new(65, 70), heuristic), None);
            // The interior is 62x62, so even an exact page-sized request fails.
            assert_eq!(allocator.insert(Size::new(64, 64), heuristic), None);
            assert!(allocator.is_empty());
        }
    }

    #[test]
    fn test_rotates_when_only_the_flipped_orientation_fits() {
        let mut allocator = RectAllocator::new(12, 42);
        let rect = allocator.insert(Size::new(40, 10), Heuristic::BestAreaFit).unwrap();
        assert_eq!(rect, Rect::new(1, 1, 10, 40));
    }

    #[test]
    fn test_best_area_fit_prefers_tightest_hole() {
        let mut allocator = RectAllocator::new(66, 66);
        // Leaves a 64x32 strip below and a 32x64 strip to the right.
        allocator.insert(Size::new(32, 32), Heuristic::BestAreaFit).unwrap();
        let second = allocator.insert(Size::new(32, 32), Heuristic::BestAreaFit).unwrap();
        assert_eq!(second, Rect::new(1, 33, 32, 32));
        assert_eq!(allocator.validate(), Ok(()));
    }

    /// Allocator on a 100x100 page whose free list is exactly `free`.
    fn with_free(free: &[Rect]) -> RectAllocator {
        let mut allocator = RectAllocator::new(100, 100);
        allocator.free = free.to_vec();
        allocator
    }

    #[test]
    fn test_best_short_side_fit_prefers_snug_side() {
        // 20x20 leaves the least area, 12x40 the shortest side.
        let holes = [Rect::new(20, 1, 20, 20), Rect::new(50, 1, 12, 40)];
        let square = Size::new(10, 10);

        let bssf = with_free(&holes).insert(square, Heuristic::BestShortSideFit);
        assert_eq!(bssf, Some(Rect::new(50, 1, 10, 10)));
        let baf = with_free(&holes).insert(square, Heuristic::BestAreaFit);
        assert_eq!(baf, Some(Rect::new(20, 1, 10, 10)));
    }

    #[test]
    fn test_best_short_side_fit_breaks_ties_on_long_side() {
        let holes = [Rect::new(1, 1, 12, 40), Rect::new(20, 1, 12, 15)];
        let rect = with_free(&holes).insert(Size::new(10, 10), Heuristic::BestShortSideFit);
        assert_eq!(rect, Some(Rect::new(20, 1, 10, 10)));
    }

    #[test]
    fn test_best_long_side_fit_prefers_even_leftover() {
        // 12x40 leaves the least area, 25x25 the shortest long side.
        let holes = [Rect::new(1, 1, 12, 40), Rect::new(20, 1, 25, 25)];
        let square = Size::new(10, 10);

        let blsf = with_free(&holes).insert(square, Heuristic::BestLongSideFit);
        assert_eq!(blsf, Some(Rect::new(20, 1, 10, 10)));
        let baf = with_free(&holes).insert(square, Heuristic::BestAreaFit);
        assert_eq!(baf, Some(Rect::new(1, 1, 10, 10)));
        let bssf = with_free(&holes).insert(square, Heuristic::BestShortSideFit);
        assert_eq!(bssf, Some(Rect::new(1, 1, 10, 10)));
    }

    #[test]
    fn test_best_long_side_fit_breaks_ties_on_short_side() {
        let holes = [Rect::new(1, 50, 40, 30), Rect::new(50, 50, 12, 40)];
        let rect = with_free(&holes).insert(Size::new(10, 10), Heuristic::BestLongSideFit);
        assert_eq!(rect, Some(Rect::new(50, 50, 10, 10)));
    }

    #[test]
    fn test_bottom_left_fills_rows_first() {
        let mut allocator = RectAllocator::new(42, 42);
        let a = allocator.insert(Size::new(10, 10), Heuristic::BottomLeft).unwrap();
        let b = allocator.insert(Size::new(10, 10), Heuristic::BottomLeft).unwrap();
        assert_eq!(a, Rect::new(1, 1, 10, 10));
        assert_eq!(b, Rect::new(11, 1, 10, 10));
    }

    #[test]
    fn test_contact_point_hugs_existing_rects() {
        let mut allocator = RectAllocator::new(102, 102);
        allocator.insert(Size::new(80, 20), Heuristic::ContactPoint).unwrap();
        let next = allocator.insert(Size::new(20, 20), Heuristic::ContactPoint).unwrap();
        // The top-right corner touches two borders and the first rect.
        assert_eq!(next, Rect::new(81, 1, 20, 20));
    }

    #[test]
    fn test_zero_area_request_consumes_nothing() {
        let mut allocator = RectAllocator::new(16, 16);
        let rect = allocator.insert(Size::new(0, 5), Heuristic::BestAreaFit);
        assert_eq!(rect, Some(Rect::new(1, 1, 0, 5)));
        assert!(allocator.is_empty());
        assert_eq!(allocator.free_rects(), &[Rect::new(1, 1, 14, 14)]);
    }

    #[test]
    fn test_mark_used_restores_state() {
        let mut original = RectAllocator::new(64, 64);
        let placed = fill(&mut original, &[(20, 10), (7, 30), (12, 12)], Heuristic::BestShortSideFit);

        let mut restored = RectAllocator::new(64, 64);
        for rect in &placed {
            restored.mark_used(*rect);
        }
        assert_eq!(restored.used_rects(), original.used_rects());
        assert_eq!(restored.free_rects(), original.free_rects());
    }

    #[test]
    fn test_occupancy() {
        let mut allocator = RectAllocator::new(10, 10);
        allocator.insert(Size::new(5, 4), Heuristic::BestAreaFit).unwrap();
        assert!((allocator.occupancy() - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_heuristic_parsing() {
        assert_eq!("baf".parse::<Heuristic>(), Ok(Heuristic::BestAreaFit));
        assert_eq!("Bottom_Left".parse::<Heuristic>(), Ok(Heuristic::BottomLeft));
        for heuristic in Heuristic::ALL {
            assert_eq!(heuristic.to_string().parse::<Heuristic>(), Ok(heuristic));
        }
        assert!("skyline".parse::<Heuristic>().is_err());
    }
}
