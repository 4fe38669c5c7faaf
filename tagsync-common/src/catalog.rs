//! Destination tag catalog
//!
//! Loaded once at startup from a JSON array of `{ "id": .., "name": .. }` objects
//! and used only for name lookups afterwards.

use crate::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One tag as exported by the destination site
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogTag {
    pub id: u64,
    pub name: String,
}

/// Tag name -> tag id mapping for the destination site
#[derive(Debug, Clone, Default)]
pub struct TagCatalog {
    by_name: HashMap<String, u64>,
}

impl TagCatalog {
    /// Build from catalog entries; a repeated name keeps the last id
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogTag>) -> Self {
        let by_name = entries.into_iter().map(|t| (t.name, t.id)).collect();
        Self { by_name }
    }

    /// Load the catalog JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let entries: Vec<CatalogTag> = serde_json::from_slice(&bytes)?;
        Ok(Self::from_entries(entries))
    }

    /// Tag id for a canonical tag name
    pub fn id_of(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_lookup() {
        let entries: Vec<CatalogTag> =
            serde_json::from_str(r#"[{"id":1,"name":"Array"},{"id":2,"name":"Graph"}]"#).unwrap();
        let catalog = TagCatalog::from_entries(entries);

        assert_eq!(catalog.id_of("Array"), Some(1));
        assert_eq!(catalog.id_of("Graph"), Some(2));
        assert_eq!(catalog.id_of("array"), None);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_duplicate_name_last_wins() {
        let catalog = TagCatalog::from_entries(vec![
            CatalogTag { id: 1, name: "DP".to_string() },
            CatalogTag { id: 9, name: "DP".to_string() },
        ]);
        assert_eq!(catalog.id_of("DP"), Some(9));
    }
}
