use log::debug;

/// Phase of a chunk inside a step.
///
/// A chunk moves `Filling -> Transforming -> Committing -> Committed`, and may
/// be `Aborted` from any of the three active phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Filling,
    Transforming,
    Committing,
    Committed,
    Aborted,
}

impl ChunkStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, ChunkStatus::Committed | ChunkStatus::Aborted)
    }

    pub fn can_advance_to(&self, next: ChunkStatus) -> bool {
        use ChunkStatus::*;
        matches!(
            (self, next),
            (Filling, Transforming)
                | (Transforming, Committing)
                | (Committing, Committed)
                | (Filling | Transforming | Committing, Aborted)
        )
    }
}

/// Ordered, bounded group of items committed as one unit.
pub struct Chunk<I> {
    number: usize,
    capacity: usize,
    items: Vec<I>,
    read_count: usize,
    status: ChunkStatus,
}

impl<I> Chunk<I> {
    /// Creates an empty chunk. `number` is 1-based and follows source order.
    pub fn new(number: usize, capacity: usize) -> Chunk<I> {
        Chunk {
            number,
            capacity,
            items: Vec::with_capacity(capacity),
            read_count: 0,
            status: ChunkStatus::Filling,
        }
    }

    pub fn push(&mut self, item: I) {
        debug_assert_eq!(self.status, ChunkStatus::Filling);
        self.items.push(item);
        self.read_count += 1;
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.read_count == 0
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Number of items read into this chunk, including ones already taken
    /// out for processing.
    pub fn read_count(&self) -> usize {
        self.read_count
    }

    pub fn status(&self) -> ChunkStatus {
        self.status
    }

    pub fn get_items(&self) -> &[I] {
        &self.items
    }

    /// Moves the buffered items out, leaving the chunk's bookkeeping intact.
    pub fn take_items(&mut self) -> Vec<I> {
        std::mem::take(&mut self.items)
    }

    /// Moves the chunk to `next`. Returns `false` and leaves the chunk
    /// untouched when the transition is not allowed.
    pub fn advance(&mut self, next: ChunkStatus) -> bool {
        if !self.status.can_advance_to(next) {
            return false;
        }
        debug!("Chunk {}: {:?} -> {:?}", self.number, self.status, next);
        self.status = next;
        true
    }
}
