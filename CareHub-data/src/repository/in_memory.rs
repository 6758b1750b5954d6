use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::errors::RepositoryError;

/// In-memory table used when no database pool is configured.
///
/// Clones share the same underlying map, so a repository cloned into several
/// services sees a single consistent set of rows.
#[derive(Debug)]
pub struct InMemoryStore<T> {
    rows: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T> Clone for InMemoryStore<T> {
    fn clone(&self) -> Self {
        Self { rows: Arc::clone(&self.rows) }
    }
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InMemoryStore<T> {
    /// Create an empty store
    pub fn new() -> Self {
        Self { rows: Arc::new(RwLock::new(HashMap::new())) }
    }
}

impl<T: Clone> InMemoryStore<T> {
    /// Store a row under its id, replacing any previous value
    pub fn insert(&self, id: Uuid, row: T) -> Result<T, RepositoryError> {
        let mut rows = self.rows.write()?;
        rows.insert(id, row.clone());
        Ok(row)
    }

    /// Insert only if no existing row satisfies `conflicts`; the check and the
    /// insert happen under one write lock.
    pub fn insert_unless<F>(&self, id: Uuid, row: T, conflicts: F) -> Result<T, RepositoryError>
    where
        F: Fn(&T) -> bool,
    {
        let mut rows = self.rows.write()?;
        if rows.values().any(|existing| conflicts(existing)) {
            return Err(RepositoryError::Conflict("conflicting row exists".to_string()));
        }
        rows.insert(id, row.clone());
        Ok(row)
    }

    /// Get a row by id
    pub fn get(&self, id: &Uuid) -> Result<Option<T>, RepositoryError> {
        let rows = self.rows.read()?;
        Ok(rows.get(id).cloned())
    }

    /// First row matching the predicate
    pub fn find<F>(&self, predicate: F) -> Result<Option<T>, RepositoryError>
    where
        F: Fn(&T) -> bool,
    {
        let rows = self.rows.read()?;
        Ok(rows.values().find(|row| predicate(row)).cloned())
    }

    /// All rows matching the predicate, in no particular order
    pub fn filter<F>(&self, predicate: F) -> Result<Vec<T>, RepositoryError>
    where
        F: Fn(&T) -> bool,
    {
        let rows = self.rows.read()?;
        Ok(rows.values().filter(|row| predicate(row)).cloned().collect())
    }

    /// Mutate a row in place and return the updated copy
    pub fn update<F>(&self, id: &Uuid, mutate: F) -> Result<Option<T>, RepositoryError>
    where
        F: FnOnce(&mut T),
    {
        let mut rows = self.rows.write()?;
        Ok(rows.get_mut(id).map(|row| {
            mutate(row);
            row.clone()
        }))
    }

    /// Number of stored rows
    pub fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.rows.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_rows() {
        let store: InMemoryStore<String> = InMemoryStore::new();
        let clone = store.clone();

        let id = Uuid::new_v4();
        store.insert(id, "first".to_string()).unwrap();

        assert_eq!(clone.get(&id).unwrap(), Some("first".to_string()));
        assert_eq!(clone.len().unwrap(), 1);
    }

    #[test]
    fn test_insert_unless_rejects_conflicts() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        store.insert(Uuid::new_v4(), 7).unwrap();

        let result = store.insert_unless(Uuid::new_v4(), 7, |existing| *existing == 7);
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));

        let result = store.insert_unless(Uuid::new_v4(), 8, |existing| *existing == 8);
        assert!(result.is_ok());
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_update_missing_row_returns_none() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        let updated = store.update(&Uuid::new_v4(), |v| *v += 1).unwrap();
        assert!(updated.is_none());
    }
}
