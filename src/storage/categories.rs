//! Category repository

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::LedgerResult;
use crate::models::{Category, CategoryId, OwnerId};

use super::{read_lock, write_lock};

/// In-memory category table
pub struct CategoryRepository {
    data: RwLock<HashMap<CategoryId, Category>>,
}

impl CategoryRepository {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn load(&self, categories: Vec<Category>) -> LedgerResult<()> {
        let mut data = write_lock(&self.data)?;
        data.clear();
        data.extend(categories.into_iter().map(|c| (c.id, c)));
        Ok(())
    }

    pub(crate) fn rows(&self) -> LedgerResult<Vec<Category>> {
        let data = read_lock(&self.data)?;
        let mut categories: Vec<_> = data.values().cloned().collect();
        categories.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    pub(crate) fn apply(&self, categories: &[Category]) -> LedgerResult<()> {
        let mut data = write_lock(&self.data)?;
        for category in categories {
            data.insert(category.id, category.clone());
        }
        Ok(())
    }

    pub fn get(&self, id: CategoryId) -> LedgerResult<Option<Category>> {
        let data = read_lock(&self.data)?;
        Ok(data.get(&id).cloned())
    }

    /// All categories of one owner, ordered by name
    pub fn for_owner(&self, owner_id: OwnerId) -> LedgerResult<Vec<Category>> {
        let data = read_lock(&self.data)?;
        let mut categories: Vec<_> = data
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(categories)
    }

    /// Case-insensitive name lookup within one owner
    pub fn get_by_name(&self, owner_id: OwnerId, name: &str) -> LedgerResult<Option<Category>> {
        let data = read_lock(&self.data)?;
        let name_lower = name.to_lowercase();
        Ok(data
            .values()
            .find(|c| c.owner_id == owner_id && c.name.to_lowercase() == name_lower)
            .cloned())
    }
}

impl Default for CategoryRepository {
    fn default() -> Self {
        Self::new()
    }
}
