// One content placement inside a page.

use serde::{Deserialize, Serialize};

use crate::atlas::rect::{Bounds, PixelBounds, Rect, Size};

/// A page-local placement record. Frames of multi-frame content are tiled
/// left to right, so `rect.w` is the frame width times `frame_count` (or
/// `rect.h` when the allocator rotated the strip).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasRect {
    pub rect: Rect,
    pub content: String,
    /// False once the placement is abandoned. The space stays claimed until the
    /// page is rebuilt.
    pub valid: bool,
    pub frame_count: u32,
    pub rotated: bool,
    pub bounds: Bounds,
    pub pixel_bounds: PixelBounds,
}

impl AtlasRect {
    pub fn new(content: &str, rect: Rect, frame_count: u32, rotated: bool, bounds: Bounds) -> Self {
        let mut entry = Self {
            rect,
            content: content.to_string(),
            valid: true,
            frame_count: frame_count.max(1),
            rotated,
            bounds,
            pixel_bounds: PixelBounds::default(),
        };
        entry.pixel_bounds = entry.full_frame_bounds();
        entry
    }

    /// Footprint in the content's own orientation, undoing any rotation.
    pub fn footprint(&self) -> Size {
        if self.rotated {
            self.rect.size().flipped()
        } else {
            self.rect.size()
        }
    }

    pub fn frame_width(&self) -> i32 {
        self.footprint().w / self.frame_count as i32
    }

    pub fn frame_height(&self) -> i32 {
        self.footprint().h
    }

    /// Whether content needing `required` pixels with `frame_count` frames can
    /// be re-rendered into this rect without reallocating.
    pub fn can_hold(&self, required: Size, frame_count: u32) -> bool {
        let footprint = self.footprint();
        required.w <= footprint.w && required.h <= footprint.h && frame_count == self.frame_count
    }

    /// Map a strip-local pixel (x along the frames, y down the strip) to page
    /// coordinates. Rotated strips are stored transposed.
    pub fn to_page(&self, x: i32, y: i32) -> (i32, i32) {
        if self.rotated {
            (self.rect.x + y, self.rect.y + x)
        } else {
            (self.rect.x + x, self.rect.y + y)
        }
    }

    pub fn full_frame_bounds(&self) -> PixelBounds {
        PixelBounds::new(0, 0, self.frame_width() - 1, self.frame_height() - 1)
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
        self.content.clear();
        self.frame_count = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotated_footprint() {
        let entry = AtlasRect::new("walk", Rect::new(1, 1, 12, 40), 4, true, Bounds::ZERO);
        assert_eq!(entry.footprint(), Size::new(40, 12));
        assert_eq!(entry.frame_width(), 10);
        assert!(entry.can_hold(Size::new(40, 12), 4));
        assert!(!entry.can_hold(Size::new(40, 12), 2));
        assert!(!entry.can_hold(Size::new(12, 40), 4));
    }
}
