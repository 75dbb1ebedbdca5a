// Ordered list of live pages owned by one manager.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::atlas::page::AtlasPage;

static SUFFIX_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)").expect("valid suffix regex"));

#[derive(Debug, Default)]
pub struct PageRegistry {
    pages: Vec<AtlasPage>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AtlasPage> {
        self.pages.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut AtlasPage> {
        self.pages.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtlasPage> {
        self.pages.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, AtlasPage> {
        self.pages.iter_mut()
    }

    pub fn push(&mut self, page: AtlasPage) -> usize {
        self.pages.push(page);
        self.pages.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> AtlasPage {
        self.pages.remove(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.pages.iter().position(|page| page.name() == name)
    }

    /// Page and index holding a live placement for `content`.
    pub fn find_content(&self, content: &str) -> Option<usize> {
        self.pages.iter().position(|page| page.find_rect(content).is_some())
    }

    /// Name for the next page: `prefix` followed by one more than the largest
    /// index found on any registered page or in `extra_names`.
    pub fn next_name<'a, I>(&self, prefix: &str, extra_names: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let registered = self.pages.iter().filter_map(|page| page_index(prefix, page.name()));
        let stored = extra_names.into_iter().filter_map(|name| page_index(prefix, name));
        let highest = registered.chain(stored).max();

        let next = highest.map_or(0, |index| index + 1);
        format!("{}{:02}", prefix, next)
    }
}

/// Whether `name` belongs to pages created with `prefix`.
pub fn is_managed_name(prefix: &str, name: &str) -> bool {
    !prefix.is_empty() && name.starts_with(prefix)
}

/// Leading digits after the prefix, if any.
fn page_index(prefix: &str, name: &str) -> Option<u64> {
    if !is_managed_name(prefix, name) {
        return None;
    }
    let captures = SUFFIX_INDEX.captures(&name[prefix.len()..])?;
    captures[1].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::page::PageHeader;

    fn page(name: &str) -> AtlasPage {
        AtlasPage::new(name, PageHeader { width: 16, height: 16, dpi: 1, padding: 0 })
    }

    #[test]
    fn test_first_name_is_zero() {
        let registry = PageRegistry::new();
        assert_eq!(registry.next_name("atlas", std::iter::empty()), "atlas00");
    }

    #[test]
    fn test_next_name_uses_highest_suffix() {
        let mut registry = PageRegistry::new();
        registry.push(page("atlas03"));
        registry.push(page("atlas01"));
        assert_eq!(registry.next_name("atlas", std::iter::empty()), "atlas04");
        assert_eq!(registry.next_name("atlas", ["atlas11", "other99"]), "atlas12");
    }

    #[test]
    fn test_next_name_ignores_unnumbered_names() {
        let mut registry = PageRegistry::new();
        registry.push(page("atlas_extra"));
        assert_eq!(registry.next_name("atlas", ["atlasx7"]), "atlas00");
        assert!(is_managed_name("atlas", "atlas_extra"));
        assert!(!is_managed_name("atlas", "hand_made"));
    }
}
