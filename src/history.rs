use std::collections::VecDeque;

pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Linear snapshot history with a cursor.
///
/// Always holds at least one snapshot; the cursor points at the current one.
/// Recording after an undo discards everything past the cursor, and the
/// oldest snapshots are evicted once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct History<T: Clone> {
    snapshots: VecDeque<T>,
    cursor: usize,
    capacity: usize,
}

impl<T: Clone> History<T> {
    pub fn new(initial: T, capacity: usize) -> Self {
        let mut snapshots = VecDeque::new();
        snapshots.push_back(initial);
        Self {
            snapshots,
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, snapshot: T) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push_back(snapshot);
        self.cursor += 1;
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
            self.cursor -= 1;
        }
    }

    /// Steps back and returns the snapshot that is now current.
    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.snapshots.get(self.cursor)
    }

    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.snapshots.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Drops all history and starts over from `snapshot`.
    pub fn reset(&mut self, snapshot: T) {
        self.snapshots.clear();
        self.snapshots.push_back(snapshot);
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
