use sprite_atlas::atlas::{Bounds, Rect};
use sprite_atlas::{
    AtlasConfig, AtlasManager, Content, ContentRegistry, Heuristic, MemoryStore, RectAllocator, RenderTarget,
    Renderer, Size,
};

/// A skeletal mesh whose bounds grow as frames are added.
struct Mesh {
    name: String,
    frames: Vec<Bounds>,
}

impl Mesh {
    fn new(name: &str, frames: &[(f32, f32)]) -> Self {
        Self {
            name: name.to_string(),
            frames: frames.iter().map(|&(w, h)| Bounds::from_size(w, h)).collect(),
        }
    }
}

impl Content for Mesh {
    fn name(&self) -> &str {
        &self.name
    }

    fn frame_count(&self) -> u32 {
        self.frames.len() as u32
    }

    fn bounds(&self) -> Bounds {
        self.frames.iter().fold(Bounds::ZERO, |acc, frame| acc.union(frame))
    }
}

struct Scene {
    meshes: Vec<Mesh>,
}

impl ContentRegistry for Scene {
    fn items(&self) -> Vec<&dyn Content> {
        self.meshes.iter().map(|mesh| mesh as &dyn Content).collect()
    }
}

/// Records which content was drawn, in order.
#[derive(Default)]
struct Recorder {
    drawn: Vec<String>,
}

impl Renderer for Recorder {
    fn render_into_rect(&mut self, content: &dyn Content, _target: RenderTarget<'_>) {
        self.drawn.push(content.name().to_string());
    }
}

fn config() -> AtlasConfig {
    AtlasConfig {
        page_width: 256,
        page_height: 256,
        dpi: 10,
        padding: 1,
        prefix: "mesh_atlas".to_string(),
        ..AtlasConfig::default()
    }
}

#[test]
fn custom_content_goes_through_the_whole_lifecycle() {
    let mut scene = Scene {
        meshes: vec![
            Mesh::new("orc_attack", &[(3.0, 3.0), (3.5, 3.0)]),
            Mesh::new("orc_idle", &[(3.0, 3.0)]),
            Mesh::new("banner", &[(2.0, 6.0)]),
        ],
    };
    let mut atlas = AtlasManager::new(config(), MemoryStore::new(), Recorder::default());

    for mesh in scene.items() {
        atlas.auto_assign(mesh, Heuristic::BestAreaFit).unwrap();
    }
    assert_eq!(atlas.page_count(), 1);
    assert_eq!(atlas.page(0).unwrap().name(), "mesh_atlas00");
    // Two frames of the union bounds: (35 + 2) * 2 wide, 32 high
    assert_eq!(atlas.placement("orc_attack").unwrap().rect.size(), Size::new(74, 32));

    // A new frame changes the footprint and the frame count.
    scene.meshes[0].frames.push(Bounds::from_size(4.0, 3.0));
    let attack = &scene.meshes[0];
    let before = atlas.placement("orc_attack").unwrap();
    atlas.update_dirty(attack).unwrap();
    let after = atlas.placement("orc_attack").unwrap();
    assert_eq!(after.frame_count, 3);
    assert!(!after.rect.intersects(&before.rect));
    assert!(atlas.page(0).unwrap().dead_area() > 0);

    // Rebuild reclaims the abandoned space and places in name order.
    atlas.renderer_mut().drawn.clear();
    let report = atlas.rebuild_all(&scene);
    assert_eq!(report.assigned, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(atlas.page(0).unwrap().dead_area(), 0);
    assert_eq!(atlas.renderer().drawn, ["banner", "orc_attack", "orc_idle"]);
}

#[test]
fn every_heuristic_packs_without_overlap() {
    let sizes: Vec<Size> = (0..60).map(|i| Size::new(4 + (i * 7) % 23, 3 + (i * 11) % 17)).collect();

    for heuristic in Heuristic::ALL {
        let mut allocator = RectAllocator::new(128, 128);
        let placed: Vec<Rect> = sizes.iter().filter_map(|&size| allocator.insert(size, heuristic)).collect();
        assert!(!placed.is_empty(), "{heuristic} placed nothing");
        allocator.validate().unwrap_or_else(|e| panic!("{heuristic}: {e}"));
        assert!(allocator.occupancy() > 0.4, "{heuristic} left the page mostly empty");
    }
}

#[test]
fn bottom_left_lays_tall_strips_flat() {
    let mut atlas = AtlasManager::new(config(), MemoryStore::new(), Recorder::default());
    let scene = Scene {
        meshes: vec![Mesh::new("wide", &[(20.0, 2.0)]), Mesh::new("tall", &[(2.0, 8.0)])],
    };
    for mesh in scene.items() {
        atlas.auto_assign(mesh, Heuristic::BottomLeft).unwrap();
    }
    // Bottom-left lays the tall strip flat right under the wide one.
    let tall = atlas.placement("tall").unwrap();
    assert_eq!(tall.rect, Rect::new(1, 23, 82, 22));
    assert!(tall.rotated);
}
