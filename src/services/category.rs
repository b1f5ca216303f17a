//! Category service

use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Category, CategoryId, OwnerId, RolloverPolicy};
use crate::storage::{Changeset, Storage};

use super::locks::LockManager;

/// Service for category management
pub struct CategoryService<'a> {
    storage: &'a Storage,
    locks: &'a LockManager,
}

impl<'a> CategoryService<'a> {
    pub fn new(storage: &'a Storage, locks: &'a LockManager) -> Self {
        Self { storage, locks }
    }

    /// Create a category with a fixed rollover policy
    ///
    /// Runs under the owner's exclusive gate, so a category never appears
    /// halfway through a period close.
    pub fn create(
        &self,
        owner_id: OwnerId,
        name: &str,
        policy: RolloverPolicy,
    ) -> LedgerResult<Category> {
        let name = name.trim();
        let category = Category::new(owner_id, name, policy);
        category
            .validate()
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        self.locks.exclusive(owner_id, || {
            if self.storage.categories.get_by_name(owner_id, name)?.is_some() {
                return Err(LedgerError::Duplicate {
                    entity_type: "Category",
                    identifier: name.to_string(),
                });
            }

            let mut changes = Changeset::new();
            changes.put_category(category.clone());
            self.storage.commit(changes)
        })?;

        info!(category = %category.id, name = %category.name, policy = %policy, "category created");
        Ok(category)
    }

    pub fn get(&self, id: CategoryId) -> LedgerResult<Option<Category>> {
        self.storage.categories.get(id)
    }

    /// Give a category a new name, unique within the owner
    pub fn rename(&self, owner_id: OwnerId, id: CategoryId, new_name: &str) -> LedgerResult<Category> {
        let new_name = new_name.trim();

        let category = self.locks.exclusive(owner_id, || {
            let mut category = self.owned(owner_id, id)?;
            if let Some(existing) = self.storage.categories.get_by_name(owner_id, new_name)? {
                if existing.id != id {
                    return Err(LedgerError::Duplicate {
                        entity_type: "Category",
                        identifier: new_name.to_string(),
                    });
                }
            }

            category.rename(new_name);
            category
                .validate()
                .map_err(|e| LedgerError::Validation(e.to_string()))?;

            let mut changes = Changeset::new();
            changes.put_category(category.clone());
            self.storage.commit(changes)?;
            Ok(category)
        })?;

        info!(category = %id, name = %category.name, "category renamed");
        Ok(category)
    }

    /// Soft-delete a category
    ///
    /// It stays in summaries and keeps rolling over; only new postings and
    /// allocations are refused.
    pub fn archive(&self, owner_id: OwnerId, id: CategoryId) -> LedgerResult<Category> {
        let category = self.locks.exclusive(owner_id, || {
            let mut category = self.owned(owner_id, id)?;
            if category.archived {
                return Err(LedgerError::Validation(format!(
                    "category '{}' is already archived",
                    category.name
                )));
            }
            category.archive();

            let mut changes = Changeset::new();
            changes.put_category(category.clone());
            self.storage.commit(changes)?;
            Ok(category)
        })?;

        info!(category = %id, name = %category.name, "category archived");
        Ok(category)
    }

    /// An owned category that still accepts postings and allocations
    pub fn active(&self, owner_id: OwnerId, id: CategoryId) -> LedgerResult<Category> {
        let category = self.owned(owner_id, id)?;
        if category.archived {
            return Err(LedgerError::Validation(format!(
                "category '{}' is archived",
                category.name
            )));
        }
        Ok(category)
    }

    /// Fetch a category, rejecting ids that belong to someone else
    pub fn owned(&self, owner_id: OwnerId, id: CategoryId) -> LedgerResult<Category> {
        let category = self
            .storage
            .categories
            .get(id)?
            .ok_or_else(|| LedgerError::category_not_found(id.to_string()))?;
        if category.owner_id != owner_id {
            return Err(LedgerError::Validation(format!(
                "category {} belongs to another owner",
                id
            )));
        }
        Ok(category)
    }

    /// Find a category by name or ID string
    pub fn find(&self, owner_id: OwnerId, identifier: &str) -> LedgerResult<Option<Category>> {
        if let Some(category) = self.storage.categories.get_by_name(owner_id, identifier)? {
            return Ok(Some(category));
        }
        // Full UUID or the short "cat-xxxxxxxx" display form
        Ok(self.list(owner_id)?.into_iter().find(|c| {
            c.id.to_string() == identifier || c.id.as_uuid().to_string() == identifier
        }))
    }

    /// Every category of the owner, archived ones included
    pub fn list(&self, owner_id: OwnerId) -> LedgerResult<Vec<Category>> {
        self.storage.categories.for_owner(owner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockSettings;

    #[test]
    fn test_create_and_find() {
        let storage = Storage::in_memory();
        let locks = LockManager::new(LockSettings::default());
        let service = CategoryService::new(&storage, &locks);
        let owner = OwnerId::new();

        let groceries = service
            .create(owner, "Groceries", RolloverPolicy::CarryUnspent)
            .unwrap();
        assert_eq!(service.find(owner, "groceries").unwrap(), Some(groceries.clone()));
        assert_eq!(
            service.find(owner, &groceries.id.to_string()).unwrap(),
            Some(groceries)
        );
    }

    #[test]
    fn test_duplicate_and_empty_names() {
        let storage = Storage::in_memory();
        let locks = LockManager::new(LockSettings::default());
        let service = CategoryService::new(&storage, &locks);
        let owner = OwnerId::new();

        service.create(owner, "Rent", RolloverPolicy::NoCarry).unwrap();
        assert!(matches!(
            service.create(owner, "RENT", RolloverPolicy::NoCarry),
            Err(LedgerError::Duplicate { .. })
        ));
        assert!(service
            .create(owner, "   ", RolloverPolicy::NoCarry)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_rename() {
        let storage = Storage::in_memory();
        let locks = LockManager::new(LockSettings::default());
        let service = CategoryService::new(&storage, &locks);
        let owner = OwnerId::new();

        let food = service.create(owner, "Food", RolloverPolicy::CarryUnspent).unwrap();
        service.create(owner, "Rent", RolloverPolicy::NoCarry).unwrap();

        let renamed = service.rename(owner, food.id, " Groceries ").unwrap();
        assert_eq!(renamed.name, "Groceries");
        assert_eq!(renamed.rollover_policy, RolloverPolicy::CarryUnspent);
        assert_eq!(service.find(owner, "groceries").unwrap().map(|c| c.id), Some(food.id));
        assert!(service.find(owner, "Food").unwrap().is_none());

        // Case-only change of its own name is fine; taking another's is not
        service.rename(owner, food.id, "GROCERIES").unwrap();
        assert!(matches!(
            service.rename(owner, food.id, "rent"),
            Err(LedgerError::Duplicate { .. })
        ));
        assert!(service.rename(owner, food.id, "").unwrap_err().is_validation());
        assert!(service
            .rename(OwnerId::new(), food.id, "Mine")
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_archive() {
        let storage = Storage::in_memory();
        let locks = LockManager::new(LockSettings::default());
        let service = CategoryService::new(&storage, &locks);
        let owner = OwnerId::new();

        let gym = service.create(owner, "Gym", RolloverPolicy::CarryBoth).unwrap();
        assert!(service.active(owner, gym.id).is_ok());

        let archived = service.archive(owner, gym.id).unwrap();
        assert!(archived.archived);
        assert!(service.active(owner, gym.id).unwrap_err().is_validation());
        assert!(service.archive(owner, gym.id).unwrap_err().is_validation());

        // Still listed and still resolvable by name
        assert_eq!(service.list(owner).unwrap().len(), 1);
        assert!(service.find(owner, "gym").unwrap().unwrap().archived);
    }
}
