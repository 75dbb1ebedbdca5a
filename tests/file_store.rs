use std::fs;

use sprite_atlas::atlas::PageHeader;
use sprite_atlas::{
    AtlasConfig, AtlasError, AtlasManager, ContentItem, FileStore, Heuristic, PageStore, SolidRenderer,
};

fn config() -> AtlasConfig {
    AtlasConfig {
        page_width: 128,
        page_height: 128,
        dpi: 8,
        padding: 2,
        prefix: "sheet".to_string(),
        ..AtlasConfig::default()
    }
}

#[test]
fn pages_survive_a_save_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let items = vec![
        ContentItem::new("hero_idle", 3.0, 4.0).with_frames(2),
        ContentItem::new("hero_walk", 2.5, 4.0).with_frames(3),
        ContentItem::new("tree", 6.0, 6.0),
    ];

    let mut atlas = AtlasManager::new(config(), FileStore::new(dir.path()), SolidRenderer);
    for item in &items {
        atlas.auto_assign(item, Heuristic::BestAreaFit).unwrap();
    }
    let saved = atlas.save_dirty().unwrap();
    assert_eq!(saved, atlas.page_count());
    assert!(dir.path().join("sheet00.atlas").exists());
    assert!(dir.path().join("sheet00.png").exists());

    let placements: Vec<_> = items.iter().map(|item| atlas.placement(&item.name)).collect();
    let pixels = atlas.page(0).unwrap().pixels().clone();

    let reopened = AtlasManager::open(config(), FileStore::new(dir.path()), SolidRenderer).unwrap();
    assert_eq!(reopened.page_count(), atlas.page_count());
    let restored: Vec<_> = items.iter().map(|item| reopened.placement(&item.name)).collect();
    assert_eq!(restored, placements);
    assert_eq!(reopened.page(0).unwrap().pixels(), &pixels);
    assert!(reopened.stale_pages().is_empty());

    let walk = reopened.page(0).unwrap().find_rect("hero_walk").unwrap();
    assert_eq!(walk.frame_count, 3);
    assert_eq!(walk.bounds.width(), 2.5);
}

#[test]
fn unmanaged_and_corrupt_pages_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("sheet00.atlas"), "w 64\nh 64\nd 8\nbogus 1\n").unwrap();
    fs::write(dir.path().join("handmade.atlas"), "w 64\nh 64\nd 8\np 2\n").unwrap();

    let mut atlas = AtlasManager::open(config(), FileStore::new(dir.path()), SolidRenderer).unwrap();
    assert_eq!(atlas.page_count(), 0);

    // The corrupt page still reserves its name.
    atlas.auto_assign(&ContentItem::new("rock", 1.0, 1.0), Heuristic::BestAreaFit).unwrap();
    assert_eq!(atlas.page(0).unwrap().name(), "sheet01");
}

#[test]
fn parse_errors_name_file_and_line() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("sheet00.atlas"), "w 64\nh 64\nd 8\np 2\nr \"a\" 1 1 x 4 1 0\n").unwrap();

    let store = FileStore::new(dir.path());
    match store.load_page("sheet00") {
        Err(AtlasError::Parse { line, message, .. }) => {
            assert_eq!(line, 5);
            assert!(message.contains("'x'"));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn missing_pixels_load_blank() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::new(dir.path().join("nested"));
    let header = PageHeader { width: 32, height: 32, dpi: 1, padding: 0 };
    store.create_page("sheet00", &header).unwrap();

    let stored = store.load_page("sheet00").unwrap();
    assert_eq!(stored.header, header);
    assert!(stored.rects.is_empty());
    assert!(stored.pixels.is_none());
    assert_eq!(store.page_names().unwrap(), ["sheet00"]);

    store.delete_page("sheet00").unwrap();
    assert!(store.page_names().unwrap().is_empty());
    assert!(matches!(store.load_page("sheet00"), Err(AtlasError::UnknownPage(_))));
}

#[test]
fn rebuild_removes_page_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut atlas = AtlasManager::new(config(), FileStore::new(dir.path()), SolidRenderer);
    let big = ContentItem::new("big", 14.0, 14.0);
    atlas.auto_assign(&ContentItem::new("small", 2.0, 2.0), Heuristic::BestAreaFit).unwrap();
    atlas.auto_assign(&big, Heuristic::BestAreaFit).unwrap();
    atlas.save_dirty().unwrap();
    assert_eq!(atlas.page_count(), 2);

    let report = atlas.rebuild_all(&vec![big]);
    atlas.save_dirty().unwrap();

    assert_eq!(report.deleted_pages, ["sheet01"]);
    assert!(!dir.path().join("sheet01.atlas").exists());
    assert!(!dir.path().join("sheet01.png").exists());
    assert_eq!(FileStore::new(dir.path()).page_names().unwrap(), ["sheet00"]);
}
