//! An id associated table of objects.

use std::{mem, ops::Index};

use crate::{Generator, Id};

/// Owned storage for objects that are addressed by a stable [`Id`].
///
/// Removal only invalidates the row, so ids of the other objects stay valid.
#[derive(Debug)]
pub struct IdTable<T> {
    ids: Generator,
    rows: Vec<Option<T>>,
}

impl<T> Default for IdTable<T> {
    fn default() -> Self {
        Self {
            ids: Default::default(),
            rows: Default::default(),
        }
    }
}

impl<T> IdTable<T> {
    /// Store a value and return the id under which it can be found.
    pub fn insert(&mut self, value: T) -> Id {
        let id = self.ids.acquire();
        let index = usize::from(id);
        if index >= self.rows.len() {
            self.rows.resize_with(index + 1, || None);
        }
        self.rows[index] = Some(value);
        id
    }

    /// Remove the value and release its id.
    #[must_use]
    pub fn take(&mut self, id: Id) -> Option<T> {
        let value = mem::take(self.rows.get_mut(usize::from(id))?);
        if value.is_some() {
            self.ids.release(id);
        }
        value
    }

    pub fn get(&self, id: Id) -> Option<&T> {
        self.rows.get(usize::from(id))?.as_ref()
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        self.rows.get_mut(usize::from(id))?.as_mut()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, &T)> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(index, v)| v.as_ref().map(|v| (Id(index as u32), v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Id, &mut T)> {
        self.rows
            .iter_mut()
            .enumerate()
            .filter_map(|(index, v)| v.as_mut().map(|v| (Id(index as u32), v)))
    }

    pub fn ids(&self) -> Vec<Id> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.iter().filter(|row| row.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Indexing into a table is only possible with a valid id.
impl<T> Index<Id> for IdTable<T> {
    type Output = T;

    fn index(&self, index: Id) -> &Self::Output {
        self.get(index)
            .unwrap_or_else(|| panic!("Internal error: No row for id {index}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_invalidates_only_the_taken_row() {
        let mut table = IdTable::default();
        let a = table.insert("a");
        let b = table.insert("b");

        assert_eq!(table.take(a), Some("a"));
        assert_eq!(table.get(a), None);
        assert_eq!(table[b], "b");
        assert_eq!(table.len(), 1);
        assert_eq!(table.take(a), None);
    }

    #[test]
    fn ids_of_removed_rows_are_recycled() {
        let mut table = IdTable::default();
        let a = table.insert(1);
        let _ = table.take(a);
        let c = table.insert(3);
        assert_eq!(a, c);
        assert_eq!(table.iter().map(|(_, v)| *v).collect::<Vec<_>>(), [3]);
    }
}
