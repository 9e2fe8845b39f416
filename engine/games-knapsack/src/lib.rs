//! 0/1 knapsack packing for the DMCTS engine
//!
//! A single-agent domain: starting from an empty knapsack, each action packs
//! one more item that still fits. The episode ends when nothing else fits,
//! and the score is the total value packed.
//!
//! # Usage
//!
//! ```rust
//! use dmcts_core::SearchState;
//! use games_knapsack::{Item, Knapsack};
//!
//! let items = vec![Item::new(60, 10), Item::new(100, 20), Item::new(120, 30)];
//! let start = Knapsack::new(items, 50);
//!
//! let packed = start.apply(&1).unwrap().apply(&2).unwrap();
//! assert_eq!(packed.value(), 220);
//! assert!(packed.is_terminal());
//! ```

use dmcts_core::{InvalidActionError, SearchState};
use std::sync::Arc;

/// An item that can be packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub value: u32,
    pub weight: u32,
}

impl Item {
    pub fn new(value: u32, weight: u32) -> Self {
        Self { value, weight }
    }
}

/// Knapsack state
///
/// The item list is shared between every state of one problem; only the
/// packing differs.
#[derive(Debug, Clone, PartialEq)]
pub struct Knapsack {
    items: Arc<[Item]>,
    capacity: u32,
    packed: Vec<bool>,
    weight: u32,
    value: u64,
}

impl Knapsack {
    /// Create an empty knapsack over `items`.
    pub fn new(items: Vec<Item>, capacity: u32) -> Self {
        let packed = vec![false; items.len()];
        Self {
            items: items.into(),
            capacity,
            packed,
            weight: 0,
            value: 0,
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Total weight packed so far.
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Total value packed so far.
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.capacity - self.weight
    }

    pub fn is_packed(&self, index: usize) -> bool {
        self.packed.get(index).copied().unwrap_or(false)
    }

    /// Indices of packed items, ascending.
    pub fn packed_items(&self) -> Vec<usize> {
        self.packed
            .iter()
            .enumerate()
            .filter_map(|(i, packed)| packed.then_some(i))
            .collect()
    }

    fn fits(&self, index: usize) -> bool {
        !self.packed[index] && self.items[index].weight <= self.remaining_capacity()
    }
}

impl SearchState for Knapsack {
    /// Index of the item to pack
    type Action = usize;

    fn available_actions(&self) -> Vec<usize> {
        (0..self.items.len()).filter(|&i| self.fits(i)).collect()
    }

    fn apply(&self, index: &usize) -> Result<Self, InvalidActionError> {
        let index = *index;
        if index >= self.items.len() {
            return Err(InvalidActionError::new(
                &index,
                format!("only {} items", self.items.len()),
            ));
        }
        if self.packed[index] {
            return Err(InvalidActionError::new(&index, "item already packed"));
        }
        let item = self.items[index];
        if item.weight > self.remaining_capacity() {
            return Err(InvalidActionError::new(
                &index,
                format!(
                    "weight {} exceeds remaining capacity {}",
                    item.weight,
                    self.remaining_capacity()
                ),
            ));
        }

        let mut next = self.clone();
        next.packed[index] = true;
        next.weight += item.weight;
        next.value += item.value as u64;
        Ok(next)
    }

    fn score(&self) -> f64 {
        self.value as f64
    }
}

/// Best achievable value, by dynamic programming over capacity.
///
/// Reference answer for checking search quality on small instances.
pub fn optimal_value(items: &[Item], capacity: u32) -> u64 {
    let capacity = capacity as usize;
    let mut best = vec![0u64; capacity + 1];
    for item in items {
        let weight = item.weight as usize;
        if weight > capacity {
            continue;
        }
        for c in (weight..=capacity).rev() {
            best[c] = best[c].max(best[c - weight] + item.value as u64);
        }
    }
    best[capacity]
}
