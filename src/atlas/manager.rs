// Page lifecycle: auto-assignment, resize handling and rebuild.
//
// The manager owns every page it created or loaded. Placements are not kept
// in a separate table; a content item is placed exactly when some page holds
// a valid entry for it.

use serde::Serialize;

#[allow(unused_imports)]
use log::{debug, error, info, warn};

use crate::atlas::allocator::{Heuristic, RectAllocator};
use crate::atlas::page::{AtlasPage, PageHeader};
use crate::atlas::rect::Rect;
use crate::atlas::registry::{is_managed_name, PageRegistry};
use crate::config::AtlasConfig;
use crate::content::{name_prefix, Content, ContentRegistry};
use crate::error::AtlasError;
use crate::render::Renderer;
use crate::store::PageStore;

/// Where a content item currently lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub page: String,
    pub rect: Rect,
    pub frame_count: u32,
    pub rotated: bool,
}

/// Outcome of a full rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub assigned: usize,
    pub failed: usize,
    pub deleted_pages: Vec<String>,
    pub page_count: usize,
}

pub struct AtlasManager<S: PageStore, R: Renderer> {
    config: AtlasConfig,
    registry: PageRegistry,
    store: S,
    renderer: R,
    /// Loaded pages whose dpi or padding no longer match the config.
    stale: Vec<String>,
}

impl<S: PageStore, R: Renderer> AtlasManager<S, R> {
    /// Manager with no pages loaded. Names already present in the store are
    /// still honoured when naming new pages.
    pub fn new(config: AtlasConfig, store: S, renderer: R) -> Self {
        Self {
            config,
            registry: PageRegistry::new(),
            store,
            renderer,
            stale: Vec::new(),
        }
    }

    /// Manager with every managed page of `store` loaded. Pages that fail to
    /// load are logged and skipped.
    pub fn open(config: AtlasConfig, store: S, renderer: R) -> Result<Self, AtlasError> {
        let mut manager = Self::new(config, store, renderer);

        let mut names = manager.store.page_names()?;
        names.sort();

        for name in names.iter().filter(|name| is_managed_name(&manager.config.prefix, name)) {
            let stored = match manager.store.load_page(name) {
                Ok(stored) => stored,
                Err(e) => {
                    error!("Skipping page '{}': {}", name, e);
                    continue;
                }
            };

            let header = stored.header;
            let page = AtlasPage::restore(name, header, stored.rects, stored.pixels);
            if header.dpi != manager.config.dpi || header.padding != manager.config.padding {
                warn!(
                    "Page '{}' was packed at dpi {} padding {}, config is dpi {} padding {}; marked stale",
                    name, header.dpi, header.padding, manager.config.dpi, manager.config.padding
                );
                manager.stale.push(name.clone());
            }
            debug!("Loaded page '{}' with {} entries", name, page.live_count());
            manager.registry.push(page);
        }

        info!("Opened {} atlas pages", manager.registry.len());
        Ok(manager)
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn page_count(&self) -> usize {
        self.registry.len()
    }

    pub fn page(&self, index: usize) -> Option<&AtlasPage> {
        self.registry.get(index)
    }

    pub fn page_index(&self, name: &str) -> Option<usize> {
        self.registry.index_of(name)
    }

    pub fn pages(&self) -> impl Iterator<Item = &AtlasPage> {
        self.registry.iter()
    }

    /// Names of loaded pages still packed at an old scale.
    pub fn stale_pages(&self) -> &[String] {
        &self.stale
    }

    pub fn placement(&self, content: &str) -> Option<Placement> {
        self.registry.iter().find_map(|page| {
            page.find_rect(content).map(|entry| Placement {
                page: page.name().to_string(),
                rect: entry.rect,
                frame_count: entry.frame_count,
                rotated: entry.rotated,
            })
        })
    }

    pub fn needs_assignment(&self, content: &dyn Content) -> bool {
        self.registry.find_content(content.name()).is_none()
    }

    /// Place `content` on the first page with room, creating a page when none
    /// has any. Already placed content is left where it is. Returns the page
    /// index.
    pub fn auto_assign(&mut self, content: &dyn Content, heuristic: Heuristic) -> Result<usize, AtlasError> {
        if let Some(index) = self.registry.find_content(content.name()) {
            return Ok(index);
        }
        if content.frame_count() == 0 {
            return Err(AtlasError::NoFrames(content.name().to_string()));
        }

        for index in 0..self.registry.len() {
            let allocated = self
                .registry
                .get_mut(index)
                .and_then(|page| page.allocate_rect(content, heuristic));
            if allocated.is_some() {
                self.render(index, content);
                return Ok(index);
            }
        }

        let index = self.create_page_for(content, heuristic)?;
        self.render(index, content);
        Ok(index)
    }

    /// React to a change in the pixel footprint of `content`. Re-renders in
    /// place when the old rect still holds it, otherwise abandons the old rect
    /// and allocates again, same page first.
    pub fn update_dirty(&mut self, content: &dyn Content) -> Result<usize, AtlasError> {
        let heuristic = self.config.heuristic;

        let Some(index) = self.registry.find_content(content.name()) else {
            return self.auto_assign(content, heuristic);
        };
        let Some(page) = self.registry.get_mut(index) else {
            return Err(AtlasError::UnknownPage(index.to_string()));
        };

        let Some(required) = page.required_size(content) else {
            page.invalidate(content.name());
            return Err(AtlasError::NoFrames(content.name().to_string()));
        };

        let in_place = page
            .find_rect(content.name())
            .filter(|entry| entry.can_hold(required, content.frame_count()))
            .map(|entry| entry.rect);

        if let Some(rect) = in_place {
            debug!("Re-rendering '{}' in place at {:?}", content.name(), rect);
            page.clear_rect_pixels(rect);
            self.render(index, content);
            return Ok(index);
        }

        let old = page.invalidate(content.name());
        debug!("'{}' outgrew {:?} on page '{}', reallocating", content.name(), old, page.name());

        if page.allocate_rect(content, heuristic).is_some() {
            self.render(index, content);
            return Ok(index);
        }

        self.auto_assign(content, heuristic)
    }

    /// Repack everything from scratch: clear every page, reassign all content
    /// in `(prefix, name)` order and delete pages left empty.
    pub fn rebuild_all(&mut self, contents: &dyn ContentRegistry) -> RebuildReport {
        let heuristic = self.config.heuristic;
        let mut report = RebuildReport::default();

        let mut items = contents.items();
        items.retain(|item| {
            if item.frame_count() == 0 {
                debug!("Rebuild: '{}' has no frames, skipping", item.name());
                return false;
            }
            true
        });
        items.sort_by(|a, b| (name_prefix(a.name()), a.name()).cmp(&(name_prefix(b.name()), b.name())));

        let (dpi, padding) = (self.config.dpi, self.config.padding);
        for page in self.registry.iter_mut() {
            page.clear_all_rects();
            page.set_scale(dpi, padding);
        }
        self.stale.clear();

        for item in items {
            match self.auto_assign(item, heuristic) {
                Ok(_) => report.assigned += 1,
                Err(e) => {
                    error!("Rebuild: failed to place '{}': {}", item.name(), e);
                    report.failed += 1;
                }
            }
        }

        report.deleted_pages = self.delete_empty_pages();
        report.page_count = self.registry.len();

        info!(
            "Rebuilt atlas: {} assigned, {} failed, {} pages deleted, {} pages",
            report.assigned,
            report.failed,
            report.deleted_pages.len(),
            report.page_count
        );
        report
    }

    /// Repack a single page with the content it already holds. Entries that no
    /// longer fit are dropped and left unplaced. Returns the number placed.
    pub fn rebuild_page(&mut self, index: usize, contents: &dyn ContentRegistry) -> Result<usize, AtlasError> {
        let heuristic = self.config.heuristic;
        let (dpi, padding) = (self.config.dpi, self.config.padding);

        let Some(page) = self.registry.get_mut(index) else {
            return Err(AtlasError::UnknownPage(index.to_string()));
        };
        let page_name = page.name().to_string();
        let names: Vec<String> = page.valid_rects().map(|entry| entry.content.clone()).collect();

        page.clear_all_rects();
        page.set_scale(dpi, padding);
        self.stale.retain(|name| *name != page_name);

        let mut placed = 0;
        for name in &names {
            let Some(content) = contents.find(name) else {
                warn!("Rebuild of '{}': content '{}' no longer exists, dropping", page_name, name);
                continue;
            };

            let allocated = self
                .registry
                .get_mut(index)
                .and_then(|page| page.allocate_rect(content, heuristic));
            if allocated.is_some() {
                self.render(index, content);
                placed += 1;
            } else {
                error!("Rebuild of '{}': '{}' no longer fits, left unplaced", page_name, name);
            }
        }

        if placed < names.len() {
            warn!("Partial rebuild of '{}': {} of {} entries placed", page_name, placed, names.len());
        } else {
            info!("Rebuilt page '{}' ({} entries)", page_name, placed);
        }
        Ok(placed)
    }

    /// Rebuild every page loaded at an outdated scale. Returns the number of
    /// pages rebuilt.
    pub fn rebuild_stale(&mut self, contents: &dyn ContentRegistry) -> Result<usize, AtlasError> {
        let stale = std::mem::take(&mut self.stale);
        let mut rebuilt = 0;
        for name in &stale {
            let Some(index) = self.registry.index_of(name) else {
                continue;
            };
            self.rebuild_page(index, contents)?;
            rebuilt += 1;
        }
        Ok(rebuilt)
    }

    /// Forget a deleted content item. Its space stays claimed until a rebuild.
    pub fn remove_content(&mut self, content: &str) -> bool {
        let Some(index) = self.registry.find_content(content) else {
            return false;
        };
        match self.registry.get_mut(index) {
            Some(page) => page.invalidate(content).is_some(),
            None => false,
        }
    }

    /// Persist every dirty page. Every page is attempted; the first failure is
    /// returned after the rest have been tried.
    pub fn save_dirty(&mut self) -> Result<usize, AtlasError> {
        let mut saved = 0;
        let mut first_error = None;

        for page in self.registry.iter_mut().filter(|page| page.is_dirty()) {
            match self.store.save_page(page) {
                Ok(()) => {
                    page.mark_clean();
                    saved += 1;
                }
                Err(e) => {
                    error!("Failed to save page '{}': {}", page.name(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(saved),
        }
    }

    fn render(&mut self, index: usize, content: &dyn Content) {
        if let Some(page) = self.registry.get_mut(index) {
            page.render_content(content, &mut self.renderer);
        }
    }

    fn new_page_header(&self) -> PageHeader {
        PageHeader {
            width: self.config.page_width,
            height: self.config.page_height,
            dpi: self.config.dpi,
            padding: self.config.padding,
        }
    }

    /// Create a page, place `content` on it and register it. Nothing is
    /// created when the content would not fit an empty page.
    fn create_page_for(&mut self, content: &dyn Content, heuristic: Heuristic) -> Result<usize, AtlasError> {
        let header = self.new_page_header();
        let required = header.required_size(content).unwrap_or_default();
        let fits_empty = RectAllocator::new(header.width, header.height)
            .insert(required, heuristic)
            .is_some();

        if !fits_empty {
            error!(
                "'{}' ({}x{}) does not fit an empty {}x{} page",
                content.name(),
                required.w,
                required.h,
                header.width,
                header.height
            );
            return Err(AtlasError::ContentTooLargeForPage {
                content: content.name().to_string(),
                width: required.w,
                height: required.h,
                page_width: header.width,
                page_height: header.height,
            });
        }

        // Without the stored names a page skipped by `open` could be overwritten.
        let store_names = self.store.page_names().map_err(|e| {
            let page = self.registry.next_name(&self.config.prefix, std::iter::empty());
            error!("Could not list stored pages before creating '{}': {}", page, e);
            AtlasError::PageCreationFailed { page, source: Box::new(e) }
        })?;
        let name = self
            .registry
            .next_name(&self.config.prefix, store_names.iter().map(String::as_str));

        self.store
            .create_page(&name, &header)
            .map_err(|e| AtlasError::PageCreationFailed { page: name.clone(), source: Box::new(e) })?;
        info!("Created atlas page '{}' ({}x{})", name, header.width, header.height);

        let mut page = AtlasPage::new(&name, header);
        if page.allocate_rect(content, heuristic).is_none() {
            // Only reachable if the empty-page check above disagrees with a fresh page.
            return Err(AtlasError::AllocationFailed { content: content.name().to_string(), page: name });
        }
        Ok(self.registry.push(page))
    }

    fn delete_empty_pages(&mut self) -> Vec<String> {
        let mut deleted = Vec::new();
        let mut index = 0;
        while index < self.registry.len() {
            let empty = self.registry.get(index).map_or(false, |page| !page.has_valid_rects());
            if !empty {
                index += 1;
                continue;
            }
            let page = self.registry.remove(index);
            if let Err(e) = self.store.delete_page(page.name()) {
                error!("Failed to delete page files for '{}': {}", page.name(), e);
            }
            info!("Deleted empty atlas page '{}'", page.name());
            deleted.push(page.name().to_string());
        }
        deleted
    }
}
