//! Stockpile - a city's resource inventory
//!
//! Resources are item strings such as `lumber`, `food_grain` or
//! `luxurygoods_silk`. The part before the first `_` is the raw resource;
//! the rest names a variant.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Prefix shared by all luxury resource items
pub const LUXURY_PREFIX: &str = "luxurygoods";

/// Raw resource of an item name: `food_grain` -> `food`
pub fn raw_resource(item: &str) -> &str {
    item.split('_').next().unwrap_or(item)
}

/// A multiset of resource items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Stockpile {
    /// Item name -> count
    items: AHashMap<String, u32>,
}

impl Stockpile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stockpile = Self::new();
        for item in items {
            stockpile.add(item);
        }
        stockpile
    }

    pub fn add(&mut self, item: impl Into<String>) {
        *self.items.entry(item.into()).or_insert(0) += 1;
    }

    /// Remove one instance of `item`, returns false if absent
    pub fn remove(&mut self, item: &str) -> bool {
        match self.items.get_mut(item) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.items.remove(item);
                true
            }
            None => false,
        }
    }

    /// Count of this exact item name
    pub fn count(&self, item: &str) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    /// Count of all items whose raw resource is `raw`
    pub fn raw_count(&self, raw: &str) -> u32 {
        self.items
            .iter()
            .filter(|(item, _)| raw_resource(item) == raw)
            .map(|(_, count)| *count)
            .sum()
    }

    /// Number of distinct luxury item names held
    pub fn luxury_count(&self) -> u32 {
        self.items
            .keys()
            .filter(|item| item.starts_with(LUXURY_PREFIX))
            .count() as u32
    }

    pub fn total(&self) -> u32 {
        self.items.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check if stockpile has enough of all required items
    pub fn has_materials(&self, requirements: &[&str]) -> bool {
        let mut needed: AHashMap<&str, u32> = AHashMap::new();
        for item in requirements {
            *needed.entry(*item).or_insert(0) += 1;
        }
        needed.iter().all(|(item, amount)| self.count(item) >= *amount)
    }

    /// Consume materials, returns true if successful. Nothing is removed
    /// unless every requirement is covered.
    pub fn consume_materials(&mut self, requirements: &[&str]) -> bool {
        if !self.has_materials(requirements) {
            return false;
        }
        for item in requirements {
            self.remove(item);
        }
        true
    }

    /// Expanded item list, sorted for stable output
    pub fn items(&self) -> Vec<String> {
        let mut items: Vec<String> = self
            .items
            .iter()
            .flat_map(|(item, count)| std::iter::repeat(item.clone()).take(*count as usize))
            .collect();
        items.sort();
        items
    }
}

impl From<Vec<String>> for Stockpile {
    fn from(items: Vec<String>) -> Self {
        Self::from_items(items)
    }
}

impl From<Stockpile> for Vec<String> {
    fn from(stockpile: Stockpile) -> Self {
        stockpile.items()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stockpile_add_remove() {
        let mut stockpile = Stockpile::from_items(["stone", "stone", "lumber"]);
        assert_eq!(stockpile.count("stone"), 2);
        assert!(stockpile.remove("stone"));
        assert!(stockpile.remove("stone"));
        assert!(!stockpile.remove("stone"));
        assert_eq!(stockpile.total(), 1);
    }

    #[test]
    fn test_raw_counts_strip_variants() {
        let stockpile = Stockpile::from_items(["food", "food_grain", "food_fish", "fuel_coal"]);
        assert_eq!(stockpile.raw_count("food"), 3);
        assert_eq!(stockpile.raw_count("fuel"), 1);
        assert_eq!(stockpile.count("food"), 1);
    }

    #[test]
    fn test_luxury_count_is_distinct() {
        let stockpile = Stockpile::from_items([
            "luxurygoods_silk",
            "luxurygoods_silk",
            "luxurygoods_spice",
            "food",
        ]);
        assert_eq!(stockpile.luxury_count(), 2);
    }

    #[test]
    fn test_consume_materials_is_all_or_nothing() {
        let mut stockpile = Stockpile::from_items(["stone", "lumber"]);
        assert!(!stockpile.consume_materials(&["stone", "stone"]));
        assert_eq!(stockpile.total(), 2);

        assert!(stockpile.consume_materials(&["stone", "lumber"]));
        assert!(stockpile.is_empty());
    }

    #[test]
    fn test_serializes_as_sorted_list() {
        let stockpile = Stockpile::from_items(["stone", "food", "stone"]);
        let json = serde_json::to_string(&stockpile).unwrap();
        assert_eq!(json, r#"["food","stone","stone"]"#);
        let back: Stockpile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stockpile);
    }
}
