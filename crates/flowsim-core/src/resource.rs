use crate::id::ResourceId;
use crate::production::Recipe;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Unit marker for resources constructed without an explicit unit.
pub const UNSPECIFIED_UNIT: &str = "unspecified";

/// An immutable unit of material flowing through the system.
///
/// Equality is by `id` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    id: ResourceId,
    resource_type: String,
    unit: String,
    /// Simulated time since topology start when the resource was made.
    created_at: Duration,
}

impl Resource {
    pub fn new(id: ResourceId, resource_type: impl Into<String>, created_at: Duration) -> Self {
        Self {
            id,
            resource_type: resource_type.into(),
            unit: UNSPECIFIED_UNIT.to_string(),
            created_at,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn created_at(&self) -> Duration {
        self.created_at
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Resource {}

/// A node's private holding area: one FIFO queue per resource type.
///
/// Insertion order is arrival order; removal always takes the oldest item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    entries: BTreeMap<String, VecDeque<Resource>>,
}

impl Stock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stock with an empty entry for each given type, so the types
    /// show up in counts even before anything arrives.
    pub fn with_types<'a>(types: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            entries: types
                .into_iter()
                .map(|t| (t.to_string(), VecDeque::new()))
                .collect(),
        }
    }

    /// Append a resource behind everything of its type already held.
    pub fn push(&mut self, resource: Resource) {
        self.entries
            .entry(resource.resource_type.clone())
            .or_default()
            .push_back(resource);
    }

    /// Remove and return the oldest resource of `resource_type`.
    pub fn take_oldest(&mut self, resource_type: &str) -> Option<Resource> {
        self.entries.get_mut(resource_type)?.pop_front()
    }

    /// Number of resources of one type.
    pub fn quantity(&self, resource_type: &str) -> usize {
        self.entries.get(resource_type).map_or(0, VecDeque::len)
    }

    /// Total resources across all types.
    pub fn total(&self) -> usize {
        self.entries.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Resources of one type, oldest first.
    pub fn iter_type(&self, resource_type: &str) -> impl Iterator<Item = &Resource> {
        self.entries.get(resource_type).into_iter().flatten()
    }

    /// Per-type counts, including types currently at zero.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.entries
            .iter()
            .map(|(t, q)| (t.clone(), q.len()))
            .collect()
    }

    /// Recipe entries this stock cannot currently cover, as
    /// `(type, still_needed)` pairs. Empty when the recipe is satisfiable.
    pub fn shortfall(&self, recipe: &Recipe) -> Vec<(String, u32)> {
        recipe
            .iter()
            .filter_map(|(resource_type, required)| {
                let have = self.quantity(resource_type);
                let required = required as usize;
                (have < required).then(|| (resource_type.to_string(), (required - have) as u32))
            })
            .collect()
    }

    /// Remove exactly the recipe's quantities, oldest first, if every entry
    /// is covered. Removes nothing and returns `None` otherwise.
    #[must_use = "debited resources are removed from stock and must be accounted for"]
    pub fn debit(&mut self, recipe: &Recipe) -> Option<Vec<Resource>> {
        if !self.shortfall(recipe).is_empty() {
            return None;
        }
        let mut debited = Vec::with_capacity(recipe.total_quantity() as usize);
        for (resource_type, required) in recipe.iter() {
            let queue = self.entries.get_mut(resource_type)?;
            debited.extend(queue.drain(..required as usize));
        }
        Some(debited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wood(n: u64) -> Resource {
        Resource::new(ResourceId::new("G", "wood", n), "wood", Duration::ZERO)
    }

    fn stone(n: u64) -> Resource {
        Resource::new(ResourceId::new("Q", "stone", n), "stone", Duration::ZERO)
    }

    #[test]
    fn resource_defaults_to_unspecified_unit() {
        let r = wood(1);
        assert_eq!(r.unit(), UNSPECIFIED_UNIT);
        assert_eq!(r.with_unit("log").unit(), "log");
    }

    #[test]
    fn resource_equality_is_by_id() {
        let a = Resource::new("x.wood.1".into(), "wood", Duration::ZERO);
        let b = Resource::new("x.wood.1".into(), "wood", Duration::from_secs(5)).with_unit("kg");
        let c = Resource::new("x.wood.2".into(), "wood", Duration::ZERO);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn stock_is_fifo_per_type() {
        let mut stock = Stock::new();
        stock.push(wood(1));
        stock.push(stone(1));
        stock.push(wood(2));

        assert_eq!(stock.quantity("wood"), 2);
        assert_eq!(stock.total(), 3);
        assert_eq!(stock.take_oldest("wood").unwrap().id().as_str(), "G.wood.1");
        assert_eq!(stock.take_oldest("wood").unwrap().id().as_str(), "G.wood.2");
        assert!(stock.take_oldest("wood").is_none());
        assert!(stock.take_oldest("iron").is_none());
        assert_eq!(stock.quantity("stone"), 1);
    }

    #[test]
    fn with_types_reports_zero_counts() {
        let stock = Stock::with_types(["wood", "nails"]);
        let counts = stock.counts();
        assert_eq!(counts.get("wood"), Some(&0));
        assert_eq!(counts.get("nails"), Some(&0));
        assert!(stock.is_empty());
    }

    #[test]
    fn debit_takes_exact_oldest_quantities() {
        let recipe = Recipe::from_pairs([("wood", 2), ("stone", 1)]);
        let mut stock = Stock::new();
        for n in 1..=3 {
            stock.push(wood(n));
        }
        stock.push(stone(1));

        let debited = stock.debit(&recipe).expect("recipe is covered");
        let ids: Vec<&str> = debited.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["Q.stone.1", "G.wood.1", "G.wood.2"]);
        assert_eq!(stock.quantity("wood"), 1);
        assert_eq!(stock.quantity("stone"), 0);
    }

    #[test]
    fn debit_is_all_or_nothing() {
        let recipe = Recipe::from_pairs([("wood", 2), ("stone", 1)]);
        let mut stock = Stock::new();
        stock.push(wood(1));
        stock.push(wood(2));

        assert!(stock.debit(&recipe).is_none());
        assert_eq!(stock.quantity("wood"), 2);
        assert_eq!(stock.shortfall(&recipe), vec![("stone".to_string(), 1)]);
    }
}
