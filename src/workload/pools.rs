use rand::Rng;
use rand::seq::SliceRandom;
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PoolKind {
    /// Resident in the engine, eligible for get and remove.
    Current,
    /// Touched this generation, becomes `Current` once it drains.
    Next,
    /// Removed from the engine, eligible for put.
    Evicted,
}

impl Display for PoolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PoolKind::Current => "current",
            PoolKind::Next => "next",
            PoolKind::Evicted => "evicted",
        })
    }
}

/// Three disjoint stacks of entry indices.
#[derive(Debug, Default)]
pub struct EntryPools {
    current: Vec<usize>,
    next: Vec<usize>,
    evicted: Vec<usize>,
}

impl EntryPools {
    pub fn with_capacity(n: usize) -> Self {
        EntryPools {
            current: Vec::with_capacity(n),
            next: Vec::with_capacity(n),
            evicted: Vec::with_capacity(n),
        }
    }

    fn stack(&mut self, pool: PoolKind) -> &mut Vec<usize> {
        match pool {
            PoolKind::Current => &mut self.current,
            PoolKind::Next => &mut self.next,
            PoolKind::Evicted => &mut self.evicted,
        }
    }

    #[inline]
    pub fn pop(&mut self, pool: PoolKind) -> Option<usize> {
        self.stack(pool).pop()
    }

    #[inline]
    pub fn push(&mut self, pool: PoolKind, index: usize) {
        self.stack(pool).push(index)
    }

    /// Promotes `next` to `current` once `current` is drained. Returns whether
    /// a rotation happened.
    #[inline]
    pub fn rotate(&mut self) -> bool {
        if !self.current.is_empty() {
            return false;
        }
        std::mem::swap(&mut self.current, &mut self.next);
        true
    }

    pub fn shuffle_current<R: Rng>(&mut self, rng: &mut R) {
        self.current.shuffle(rng);
    }

    /// `(current, next, evicted)`
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.current.len(), self.next.len(), self.evicted.len())
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.next.len() + self.evicted.len()
    }

    #[cfg(test)]
    pub fn current(&self) -> &[usize] {
        &self.current
    }
}
