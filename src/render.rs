// Rendering seam between the atlas and whatever rasterizes content.
//
// The atlas only decides where content goes. A `Renderer` draws it into the
// page pixels, frame by frame, inside the rect it was given.

use image::{Rgba, RgbaImage};

use crate::atlas::entry::AtlasRect;
use crate::content::Content;

/// Where a renderer is allowed to draw.
pub struct RenderTarget<'a> {
    pub pixels: &'a mut RgbaImage,
    pub entry: &'a AtlasRect,
    /// Pixels per logical unit
    pub dpi: u32,
    /// Transparent margin kept on every side of each frame
    pub padding: i32,
}

impl RenderTarget<'_> {
    /// Write one pixel given in frame-local coordinates. Writes outside the
    /// frame or the page are dropped.
    pub fn put(&mut self, frame: u32, x: i32, y: i32, color: Rgba<u8>) {
        if x < 0 || y < 0 || x >= self.entry.frame_width() || y >= self.entry.frame_height() {
            return;
        }
        let (px, py) = self.entry.to_page(frame as i32 * self.entry.frame_width() + x, y);
        if px >= 0 && py >= 0 && (px as u32) < self.pixels.width() && (py as u32) < self.pixels.height() {
            self.pixels.put_pixel(px as u32, py as u32, color);
        }
    }

    pub fn get(&self, frame: u32, x: i32, y: i32) -> Rgba<u8> {
        let (px, py) = self.entry.to_page(frame as i32 * self.entry.frame_width() + x, y);
        if px >= 0 && py >= 0 && (px as u32) < self.pixels.width() && (py as u32) < self.pixels.height() {
            *self.pixels.get_pixel(px as u32, py as u32)
        } else {
            Rgba([0, 0, 0, 0])
        }
    }
}

pub trait Renderer {
    /// Draw every frame of `content` into `target`. The rect has already been
    /// cleared by the caller when that matters.
    fn render_into_rect(&mut self, content: &dyn Content, target: RenderTarget<'_>);
}

/// Fills each frame with a flat colour derived from the content name and frame
/// index. Used by the command-line tool and for previews.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolidRenderer;

impl Renderer for SolidRenderer {
    fn render_into_rect(&mut self, content: &dyn Content, mut target: RenderTarget<'_>) {
        let frame_width = target.entry.frame_width();
        let frame_height = target.entry.frame_height();
        let padding = target.padding;

        for frame in 0..target.entry.frame_count {
            let color = swatch(content.name(), frame);
            for y in padding..frame_height - padding {
                for x in padding..frame_width - padding {
                    target.put(frame, x, y, color);
                }
            }
            dilate_frame(&mut target, frame);
        }
    }
}

/// Copy the outermost content pixels of a frame outwards through its padding,
/// so filtered sampling at the content edge never picks up transparent black
/// or a neighbour's pixels.
pub fn dilate_frame(target: &mut RenderTarget<'_>, frame: u32) {
    let frame_width = target.entry.frame_width();
    let frame_height = target.entry.frame_height();
    let padding = target.padding;

    let (inner_w, inner_h) = (frame_width - 2 * padding, frame_height - 2 * padding);
    if padding <= 0 || inner_w <= 0 || inner_h <= 0 {
        return;
    }

    for y in 0..frame_height {
        for x in 0..frame_width {
            let inside = x >= padding && x < frame_width - padding && y >= padding && y < frame_height - padding;
            if inside {
                continue;
            }
            let src_x = x.clamp(padding, frame_width - padding - 1);
            let src_y = y.clamp(padding, frame_height - padding - 1);
            let color = target.get(frame, src_x, src_y);
            target.put(frame, x, y, color);
        }
    }
}

/// Stable, fully opaque colour for a name/frame pair.
fn swatch(name: &str, frame: u32) -> Rgba<u8> {
    // FNV-1a
    let mut hash: u32 = 0x811c_9dc5;
    for byte in name.bytes().chain(frame.to_le_bytes()) {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    let [r, g, b, _] = hash.to_le_bytes();
    Rgba([r | 0x20, g | 0x20, b | 0x20, 255])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::rect::{Bounds, Rect};
    use crate::content::ContentItem;

    #[test]
    fn test_solid_render_fills_interior_and_dilates_padding() {
        let mut pixels = RgbaImage::new(32, 16);
        let entry = AtlasRect::new("gem", Rect::new(1, 1, 20, 8), 2, false, Bounds::from_size(6.0, 4.0));
        let content = ContentItem::new("gem", 6.0, 4.0).with_frames(2);

        SolidRenderer.render_into_rect(
            &content,
            RenderTarget { pixels: &mut pixels, entry: &entry, dpi: 1, padding: 2 },
        );

        let first = *pixels.get_pixel(4, 4);
        let second = *pixels.get_pixel(14, 4);
        assert_eq!(first[3], 255);
        assert_ne!(first, second);
        // Padding corner of the first frame carries the nearest content pixel.
        assert_eq!(*pixels.get_pixel(1, 1), first);
        // Outside the rect stays untouched.
        assert_eq!(*pixels.get_pixel(21, 1), Rgba([0, 0, 0, 0]));
        assert_eq!(*pixels.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
    }
}
