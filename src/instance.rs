use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{BnpError, Result};
use crate::misc::HashSet;

/// Identifier of an item as given in the instance.
///
/// Merged items keep the identifier of the first item they were built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl std::hash::Hash for ItemId {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0)
    }
}

impl nohash_hasher::IsEnabled for ItemId {}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single item of the parsed instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub width: u32,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub processing_time: u32,
}

impl Item {
    pub fn new(id: u32, width: u32) -> Self {
        Item {
            id: ItemId(id),
            width,
            height: None,
            processing_time: 0,
        }
    }

    pub fn with_processing_time(mut self, processing_time: u32) -> Self {
        self.processing_time = processing_time;
        self
    }
}

/// What a column costs in the master problem
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Every bin costs one, minimise the number of bins
    #[default]
    BinCount,
    /// Every batch costs its longest processing time,
    /// minimise the total processing time on a single machine
    BatchProcessingTime,
}

impl Objective {
    /// Cost of a column containing the given processing times
    pub fn column_cost(&self, processing_times: impl IntoIterator<Item = u32>) -> f64 {
        match self {
            Objective::BinCount => 1.0,
            Objective::BatchProcessingTime => f64::from(processing_times.into_iter().max().unwrap_or(0)),
        }
    }

    /// Cost paid before any item is packed
    pub fn base_cost(&self) -> f64 {
        match self {
            Objective::BinCount => 1.0,
            Objective::BatchProcessingTime => 0.0,
        }
    }

    /// Rule to cutoff nodes once an incumbent exists.
    ///
    /// Both objectives only take integer values, so a bound of 4.2
    /// already cuts against an incumbent of 5.
    pub fn is_cutoff(&self, bound: f64, incumbent: f64, tolerance: f64) -> bool {
        if !incumbent.is_finite() {
            return false;
        }
        (bound - tolerance).ceil() >= incumbent - tolerance
    }
}

/// Parsed problem record consumed by the engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub capacity: u32,
    pub items: Vec<Item>,
    /// pairs of items that must never share a bin
    #[serde(default)]
    pub conflicts: Vec<(ItemId, ItemId)>,
    #[serde(default)]
    pub objective: Objective,
}

impl Instance {
    pub fn new(capacity: u32, items: Vec<Item>) -> Self {
        Instance {
            capacity,
            items,
            conflicts: Vec::new(),
            objective: Objective::BinCount,
        }
    }

    pub fn with_conflicts(mut self, conflicts: Vec<(ItemId, ItemId)>) -> Self {
        self.conflicts = conflicts;
        self
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Read an instance from its JSON representation
    pub fn from_json(input: &str) -> Result<Self> {
        let instance: Instance =
            serde_json::from_str(input).map_err(|e| BnpError::InvalidInstance(e.to_string()))?;
        instance.validate()?;
        Ok(instance)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(BnpError::InvalidInstance("capacity must be positive".to_string()));
        }

        let mut seen = HashSet::default();
        for item in &self.items {
            if !seen.insert(item.id) {
                return Err(BnpError::InvalidInstance(format!("duplicate item id {}", item.id)));
            }
            if item.width > self.capacity {
                return Err(BnpError::InvalidInstance(format!(
                    "item {} of width {} does not fit capacity {}",
                    item.id, item.width, self.capacity
                )));
            }
        }

        // every load below is a partial sum of distinct widths
        if self.items.iter().try_fold(0u32, |total, item| total.checked_add(item.width)).is_none() {
            return Err(BnpError::InvalidInstance("total item width exceeds u32::MAX".to_string()));
        }

        for &(u, v) in &self.conflicts {
            if !seen.contains(&u) || !seen.contains(&v) {
                return Err(BnpError::InvalidInstance(format!("conflict {u} - {v} names an unknown item")));
            }
            if u == v {
                return Err(BnpError::InvalidInstance(format!("item {u} cannot conflict with itself")));
            }
        }
        Ok(())
    }

    pub fn in_conflict(&self, u: ItemId, v: ItemId) -> bool {
        self.conflicts.iter().any(|&(a, b)| (a, b) == (u, v) || (a, b) == (v, u))
    }
}
