// Packable content as seen by the atlas: a name, a frame count and the
// logical bounds shared by all frames. Where content comes from is up to the
// authoring tool.

use serde::{Deserialize, Serialize};

use crate::atlas::rect::Bounds;

pub trait Content {
    /// Stable, unique name. Also drives rebuild ordering.
    fn name(&self) -> &str;

    /// Number of frames tiled horizontally in the placed strip. Zero means
    /// there is nothing to place.
    fn frame_count(&self) -> u32;

    /// Union of the bounds of every frame, in logical units.
    fn bounds(&self) -> Bounds;
}

/// Enumerates every content item the authoring tool knows about.
pub trait ContentRegistry {
    fn items(&self) -> Vec<&dyn Content>;

    fn find(&self, name: &str) -> Option<&dyn Content> {
        self.items().into_iter().find(|item| item.name() == name)
    }
}

impl<C: Content> ContentRegistry for [C] {
    fn items(&self) -> Vec<&dyn Content> {
        self.iter().map(|item| item as &dyn Content).collect()
    }
}

impl<C: Content> ContentRegistry for Vec<C> {
    fn items(&self) -> Vec<&dyn Content> {
        self.as_slice().items()
    }
}

/// Plain content description, as read from a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub name: String,
    #[serde(default = "default_frames")]
    pub frames: u32,
    pub bounds: Bounds,
}

fn default_frames() -> u32 {
    1
}

impl ContentItem {
    /// Single-frame item of the given logical size.
    pub fn new(name: &str, width: f32, height: f32) -> Self {
        Self {
            name: name.to_string(),
            frames: 1,
            bounds: Bounds::from_size(width, height),
        }
    }

    pub fn with_frames(mut self, frames: u32) -> Self {
        self.frames = frames;
        self
    }

    pub fn resized(&self, width: f32, height: f32) -> Self {
        Self {
            name: self.name.clone(),
            frames: self.frames,
            bounds: Bounds::from_size(width, height),
        }
    }
}

impl Content for ContentItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn frame_count(&self) -> u32 {
        self.frames
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }
}

/// Sort key used by full rebuilds: everything before the last `_` (or the
/// whole name when there is none or it is the first character).
pub fn name_prefix(name: &str) -> &str {
    match name.rfind('_') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_prefix() {
        assert_eq!(name_prefix("hero_walk_03"), "hero_walk");
        assert_eq!(name_prefix("tree"), "tree");
        assert_eq!(name_prefix("_hidden"), "_hidden");
    }

    #[test]
    fn test_manifest_defaults_to_one_frame() {
        let yaml = "name: rock\nbounds: { min_x: 0.0, min_y: 0.0, max_x: 1.5, max_y: 2.0 }\n";
        let item: ContentItem = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(item.frames, 1);
        assert_eq!(item.bounds.width(), 1.5);
    }

    #[test]
    fn test_registry_lookup() {
        let items = vec![ContentItem::new("a", 1.0, 1.0), ContentItem::new("b", 2.0, 2.0)];
        assert_eq!(items.items().len(), 2);
        assert_eq!(items.find("b").map(|c| c.bounds().width()), Some(2.0));
        assert!(items.find("c").is_none());
    }
}
