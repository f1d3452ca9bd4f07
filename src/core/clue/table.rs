//! The clue table: an unordered multiset of clues accumulated by one scan run.
//!
//! Grown under a single coarse lock by concurrent workers, frozen at scan
//! end, then handed to analysis which produces a fresh list sharing no
//! mutable state with the inputs.

use std::sync::Mutex;

use crate::core::clue::Clue;

#[derive(Default)]
pub struct ClueTable {
    clues: Mutex<Vec<Clue>>,
}

impl ClueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a clue, merging into an existing equal clue (same `diff` and
    /// `digest`) if one is present. Returns `true` if a new entry was
    /// appended, `false` if it was merged into an existing one.
    pub fn insert(&self, clue: Clue) -> bool {
        let mut clues = self.clues.lock().expect("clue table lock poisoned");
        if let Some(existing) = clues.iter_mut().find(|c| c.same_backend(&clue)) {
            existing.merge_count(clue.count);
            false
        } else {
            clues.push(clue);
            true
        }
    }

    pub fn len(&self) -> usize {
        self.clues.lock().expect("clue table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze the table, returning its contents and leaving it empty.
    pub fn drain(&self) -> Vec<Clue> {
        std::mem::take(&mut *self.clues.lock().expect("clue table lock poisoned"))
    }

    /// Snapshot the current contents without draining.
    pub fn snapshot(&self) -> Vec<Clue> {
        self.clues.lock().expect("clue table lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clue(diff: i64, digest: &str) -> Clue {
        Clue {
            count: 1,
            local: diff,
            remote: 0,
            diff,
            digest: digest.to_string(),
            info: Default::default(),
            headers: Vec::new(),
        }
    }

    #[test]
    fn insertion_is_idempotent_in_size_and_increments_count() {
        let table = ClueTable::new();
        assert!(table.insert(clue(3, "abc")));
        assert_eq!(table.len(), 1);
        assert!(!table.insert(clue(3, "abc")));
        assert_eq!(table.len(), 1);
        let snap = table.snapshot();
        assert_eq!(snap[0].count, 2);
    }

    #[test]
    fn distinct_diff_or_digest_appends() {
        let table = ClueTable::new();
        table.insert(clue(3, "abc"));
        table.insert(clue(4, "abc"));
        table.insert(clue(3, "def"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn drain_empties_and_returns_contents() {
        let table = ClueTable::new();
        table.insert(clue(1, "x"));
        let drained = table.drain();
        assert_eq!(drained.len(), 1);
        assert!(table.is_empty());
    }
}
