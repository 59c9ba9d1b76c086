use derive_more::{Deref, Display};

/// An identifier that can be used to index into rows to allow fast id associative storage and
/// retrieval of objects.
///
/// Ids start at 0 and their maximum value is never greater than the number of ids acquired. This
/// makes them usable as storage indices and allows them to be small (u32).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deref, Display)]
pub struct Id(pub(crate) u32);

#[derive(Debug, Default)]
pub struct Generator {
    next_id: u32,
    free_list: Vec<u32>,
}

impl Generator {
    pub fn acquire(&mut self) -> Id {
        if let Some(free) = self.free_list.pop() {
            return Id(free);
        }

        let this_id = self.next_id;
        self.next_id += 1;

        Id(this_id)
    }

    pub fn release(&mut self, id: Id) {
        debug_assert!(!self.free_list.contains(&id.0), "Id {id} released twice");
        self.free_list.push(id.0);
    }
}

impl From<Id> for usize {
    fn from(value: Id) -> Self {
        *value as _
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_ids_are_reused() {
        let mut generator = Generator::default();
        let a = generator.acquire();
        let b = generator.acquire();
        assert_eq!((*a, *b), (0, 1));

        generator.release(a);
        assert_eq!(generator.acquire(), a);
        assert_eq!(*generator.acquire(), 2);
    }
}
