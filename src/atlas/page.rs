// A single atlas page: allocator, pixel buffer and content map.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
use log::{debug, error, info, warn};

use crate::atlas::allocator::{Heuristic, RectAllocator};
use crate::atlas::entry::AtlasRect;
use crate::atlas::rect::{Bounds, PixelBounds, Rect, Size};
use crate::content::Content;
use crate::render::{RenderTarget, Renderer};

pub const MAX_RECTS_PER_PAGE: usize = 256;

const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Persisted page parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHeader {
    pub width: i32,
    pub height: i32,
    /// Pixels per logical unit
    pub dpi: u32,
    /// Transparent margin added on every side of each frame
    pub padding: i32,
}

impl PageHeader {
    /// Pixel footprint of `content`: each frame is its logical size times the
    /// dpi plus padding on both sides, frames side by side. `None` when the
    /// content has no frames. Footprints beyond `i32::MAX` are clamped to it,
    /// which no page can hold.
    pub fn required_size(&self, content: &dyn Content) -> Option<Size> {
        let frames = content.frame_count();
        if frames == 0 {
            return None;
        }

        let bounds = content.bounds();
        let scale = self.dpi as f32;
        let padding = i64::from(self.padding).saturating_mul(2);
        let frame_width = scaled_extent(bounds.width(), scale).saturating_add(padding);
        let frame_height = scaled_extent(bounds.height(), scale).saturating_add(padding);
        let strip_width = frame_width.saturating_mul(i64::from(frames));

        Some(Size::new(clamp_extent(strip_width), clamp_extent(frame_height)))
    }
}

/// Logical extent times `scale`, truncated to whole pixels. Float-to-int `as`
/// saturates, and NaN becomes 0.
fn scaled_extent(extent: f32, scale: f32) -> i64 {
    (extent * scale).max(0.0) as i64
}

fn clamp_extent(extent: i64) -> i32 {
    extent.clamp(0, i64::from(i32::MAX)) as i32
}

/// Quad geometry and texture coordinates for exporting one placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportQuad {
    pub bounds: Bounds,
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

#[derive(Debug)]
pub struct AtlasPage {
    name: String,
    header: PageHeader,
    allocator: RectAllocator,
    rects: Vec<AtlasRect>,
    pixels: RgbaImage,
    dirty: bool,
}

impl AtlasPage {
    pub fn new(name: &str, header: PageHeader) -> Self {
        Self {
            name: name.to_string(),
            header,
            allocator: RectAllocator::new(header.width, header.height),
            rects: Vec::new(),
            pixels: blank_pixels(&header),
            dirty: true,
        }
    }

    /// Rebuild a page from stored state. Each valid entry is marked used in the
    /// allocator in order; a pixel buffer of the wrong size is discarded.
    pub fn restore(name: &str, header: PageHeader, rects: Vec<AtlasRect>, pixels: Option<RgbaImage>) -> Self {
        let mut page = Self::new(name, header);

        if let Some(pixels) = pixels {
            if pixels.width() == page.pixels.width() && pixels.height() == page.pixels.height() {
                page.pixels = pixels;
            } else {
                warn!(
                    "Pixels for page '{}' are {}x{}, expected {}x{}; starting blank",
                    name,
                    pixels.width(),
                    pixels.height(),
                    header.width,
                    header.height
                );
            }
        }

        for entry in rects.into_iter().filter(|entry| entry.valid) {
            if page.rects.len() >= MAX_RECTS_PER_PAGE {
                warn!("Page '{}' holds more than {} rects; dropping '{}'", name, MAX_RECTS_PER_PAGE, entry.content);
                continue;
            }
            page.allocator.mark_used(entry.rect);
            page.rects.push(entry);
        }

        page.dirty = false;
        page
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    pub fn width(&self) -> i32 {
        self.header.width
    }

    pub fn height(&self) -> i32 {
        self.header.height
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn allocator(&self) -> &RectAllocator {
        &self.allocator
    }

    /// Every entry, dead slots included.
    pub fn rects(&self) -> &[AtlasRect] {
        &self.rects
    }

    pub fn valid_rects(&self) -> impl Iterator<Item = &AtlasRect> {
        self.rects.iter().filter(|entry| entry.valid)
    }

    pub fn live_count(&self) -> usize {
        self.valid_rects().count()
    }

    pub fn has_valid_rects(&self) -> bool {
        self.rects.iter().any(|entry| entry.valid)
    }

    /// Claimed pixels that no live placement uses any more.
    pub fn dead_area(&self) -> i64 {
        let claimed: i64 = self.allocator.used_rects().iter().map(Rect::area).sum();
        let live: i64 = self.valid_rects().map(|entry| entry.rect.area()).sum();
        claimed - live
    }

    pub fn occupancy(&self) -> f32 {
        self.allocator.occupancy()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Change the pixel scale. Existing placements keep their rects until the
    /// page is rebuilt.
    pub fn set_scale(&mut self, dpi: u32, padding: i32) {
        self.header.dpi = dpi;
        self.header.padding = padding;
        self.dirty = true;
    }

    pub fn find_rect(&self, content: &str) -> Option<&AtlasRect> {
        self.rects.iter().find(|entry| entry.valid && entry.content == content)
    }

    /// Pixel footprint of `content` on this page. See `PageHeader::required_size`.
    pub fn required_size(&self, content: &dyn Content) -> Option<Size> {
        self.header.required_size(content)
    }

    /// Claim space for `content` and record the placement. Returns `None` when
    /// it does not fit, which callers treat as "try another page".
    pub fn allocate_rect(&mut self, content: &dyn Content, heuristic: Heuristic) -> Option<Rect> {
        let required = self.required_size(content)?;

        let (width, height) = (self.header.width, self.header.height);
        let fits_upright = required.w <= width && required.h <= height;
        let fits_rotated = required.h <= width && required.w <= height;
        if !fits_upright && !fits_rotated {
            debug!("'{}' ({}x{}) is larger than page '{}'", content.name(), required.w, required.h, self.name);
            return None;
        }

        let Some(slot) = self.free_slot() else {
            debug!("Page '{}' has no free rect slots", self.name);
            return None;
        };

        let rect = self.allocator.insert(required, heuristic)?;
        let rotated = rect.w != required.w;
        let entry = AtlasRect::new(content.name(), rect, content.frame_count(), rotated, content.bounds());

        if slot == self.rects.len() {
            self.rects.push(entry);
        } else {
            self.rects[slot] = entry;
        }

        debug!("Allocated {:?} for '{}' in page '{}' (rotated: {})", rect, content.name(), self.name, rotated);
        self.dirty = true;
        Some(rect)
    }

    /// Zero the pixels of `rect`, clipped to the page.
    pub fn clear_rect_pixels(&mut self, rect: Rect) {
        let x0 = rect.x.max(0) as u32;
        let y0 = rect.y.max(0) as u32;
        let x1 = (rect.right().max(0) as u32).min(self.pixels.width());
        let y1 = (rect.bottom().max(0) as u32).min(self.pixels.height());

        for y in y0..y1 {
            for x in x0..x1 {
                self.pixels.put_pixel(x, y, CLEAR);
            }
        }
        self.dirty = true;
    }

    /// Forget every placement and zero the whole page. Only used when the
    /// page is about to be refilled from scratch.
    pub fn clear_all_rects(&mut self) {
        self.allocator.reset(self.header.width, self.header.height);
        self.rects.clear();
        self.pixels = blank_pixels(&self.header);
        self.dirty = true;
    }

    /// Abandon the placement of `content`. Its pixels are zeroed but the space
    /// stays claimed until the page is rebuilt.
    pub fn invalidate(&mut self, content: &str) -> Option<Rect> {
        let index = self.rects.iter().position(|entry| entry.valid && entry.content == content)?;
        let rect = self.rects[index].rect;
        self.clear_rect_pixels(rect);
        self.rects[index].invalidate();
        self.dirty = true;
        Some(rect)
    }

    /// Draw `content` into its placement and refresh the recorded bounds.
    /// Returns false when the content is not placed on this page.
    pub fn render_content<R: Renderer + ?Sized>(&mut self, content: &dyn Content, renderer: &mut R) -> bool {
        let Some(index) = self.rects.iter().position(|entry| entry.valid && entry.content == content.name()) else {
            return false;
        };

        self.rects[index].bounds = content.bounds();
        renderer.render_into_rect(
            content,
            RenderTarget {
                pixels: &mut self.pixels,
                entry: &self.rects[index],
                dpi: self.header.dpi,
                padding: self.header.padding,
            },
        );

        let pixel_bounds = self.scan_pixel_bounds(&self.rects[index]);
        self.rects[index].pixel_bounds = pixel_bounds;
        self.dirty = true;
        true
    }

    /// Tight bounds of non-transparent pixels in the first frame of `entry`.
    /// An empty frame reports the whole frame.
    pub fn scan_pixel_bounds(&self, entry: &AtlasRect) -> PixelBounds {
        let frame_width = entry.frame_width();
        let frame_height = entry.frame_height();
        let mut found: Option<PixelBounds> = None;

        for y in 0..frame_height {
            for x in 0..frame_width {
                let (px, py) = entry.to_page(x, y);
                if px < 0 || py < 0 || px as u32 >= self.pixels.width() || py as u32 >= self.pixels.height() {
                    continue;
                }
                if self.pixels.get_pixel(px as u32, py as u32)[3] == 0 {
                    continue;
                }
                let bounds = found.get_or_insert(PixelBounds::new(x, y, x, y));
                bounds.min_x = bounds.min_x.min(x);
                bounds.min_y = bounds.min_y.min(y);
                bounds.max_x = bounds.max_x.max(x);
                bounds.max_y = bounds.max_y.max(y);
            }
        }

        found.unwrap_or_else(|| entry.full_frame_bounds())
    }

    /// Texture coordinate for a logical `position` inside the bounds of
    /// `entry`, sampling texel centres within the scanned pixel bounds.
    pub fn uv_at(&self, entry: &AtlasRect, position: [f32; 2]) -> [f32; 2] {
        let bounds = entry.bounds;
        if bounds.is_degenerate() {
            error!(
                "uv_at: '{}' has zero-size bounds ({:.3},{:.3} - {:.3},{:.3})",
                entry.content, bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
            );
            return [0.0, 0.0];
        }

        let tx = (position[0] - bounds.min_x) / bounds.width();
        let ty = (position[1] - bounds.min_y) / bounds.height();
        let pb = entry.pixel_bounds;

        let local_x = pb.min_x as f32 + 0.5 + tx * (pb.max_x - pb.min_x) as f32;
        let local_y = pb.min_y as f32 + 0.5 + ty * (pb.max_y - pb.min_y) as f32;

        self.local_to_uv(entry, local_x, local_y)
    }

    /// Quad covering the content bounds and the texel-centred UV range that
    /// maps onto the padded first frame.
    pub fn export_quad(&self, entry: &AtlasRect) -> ExportQuad {
        let scale = self.header.dpi as f32;
        let padding = self.header.padding as f32;
        let expected_w = entry.bounds.width() * scale;
        let expected_h = entry.bounds.height() * scale;

        let uv_min = self.local_to_uv(entry, padding + 0.5, padding + 0.5);
        let uv_max = self.local_to_uv(entry, padding + expected_w - 0.5, padding + expected_h - 0.5);

        ExportQuad { bounds: entry.bounds, uv_min, uv_max }
    }

    fn local_to_uv(&self, entry: &AtlasRect, x: f32, y: f32) -> [f32; 2] {
        let (px, py) = if entry.rotated {
            (entry.rect.x as f32 + y, entry.rect.y as f32 + x)
        } else {
            (entry.rect.x as f32 + x, entry.rect.y as f32 + y)
        };
        [px / self.header.width as f32, py / self.header.height as f32]
    }

    fn free_slot(&self) -> Option<usize> {
        if let Some(index) = self.rects.iter().position(|entry| !entry.valid) {
            return Some(index);
        }
        (self.rects.len() < MAX_RECTS_PER_PAGE).then_some(self.rects.len())
    }
}

fn blank_pixels(header: &PageHeader) -> RgbaImage {
    RgbaImage::new(header.width.max(0) as u32, header.height.max(0) as u32)
}
