use itertools::Itertools;

use crate::instance::{Instance, Item, ItemId, Objective};

/// First fit decreasing packing of the instance, used as primal seed.
///
/// Items are taken by decreasing width (by decreasing processing time first
/// for batch scheduling) and go into the first open bin they fit without
/// a conflict.
pub fn first_fit_decreasing(instance: &Instance) -> Vec<Vec<ItemId>> {
    let order: Vec<&Item> = match instance.objective {
        Objective::BinCount => instance.items.iter().sorted_by(|a, b| b.width.cmp(&a.width)).collect(),
        Objective::BatchProcessingTime => instance
            .items
            .iter()
            .sorted_by(|a, b| b.processing_time.cmp(&a.processing_time).then(b.width.cmp(&a.width)))
            .collect(),
    };

    let mut bins: Vec<(u32, Vec<ItemId>)> = Vec::new();
    for item in order {
        let fits = |(load, packed): &&mut (u32, Vec<ItemId>)| {
            *load + item.width <= instance.capacity && !packed.iter().any(|&p| instance.in_conflict(p, item.id))
        };
        match bins.iter_mut().find(fits) {
            Some((load, packed)) => {
                *load += item.width;
                packed.push(item.id);
            }
            None => bins.push((item.width, vec![item.id])),
        }
    }

    bins.into_iter()
        .map(|(_, mut packed)| {
            packed.sort_unstable();
            packed
        })
        .collect()
}

/// Objective value of a packing given in original item ids
pub fn packing_cost(instance: &Instance, bins: &[Vec<ItemId>]) -> f64 {
    bins.iter()
        .map(|bin| {
            instance.objective.column_cost(
                instance
                    .items
                    .iter()
                    .filter(|item| bin.contains(&item.id))
                    .map(|item| item.processing_time),
            )
        })
        .sum()
}
