#![cfg(feature = "highs")]

use std::time::Duration;

use bnp_binpacking::{
    CutSelection, HighsBranchAndPrice, Instance, Item, ItemId, Objective, PricingKind, SearchResult, SearchStrategy,
    Settings, UI,
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

fn solve(instance: &Instance, settings: Settings) -> SearchResult {
    HighsBranchAndPrice::new(instance.clone(), settings)
        .solve(&UI::quiet())
        .unwrap()
}

fn assert_valid_packing(instance: &Instance, result: &SearchResult) {
    let mut packed: Vec<ItemId> = result.bins.iter().flatten().copied().collect();
    packed.sort_unstable();
    let mut expected: Vec<ItemId> = instance.items.iter().map(|i| i.id).collect();
    expected.sort_unstable();
    assert_eq!(packed, expected, "every item is packed exactly once");

    let mut cost = 0.0;
    for bin in &result.bins {
        let items: Vec<&Item> = instance.items.iter().filter(|i| bin.contains(&i.id)).collect();
        assert!(items.iter().map(|i| i.width).sum::<u32>() <= instance.capacity);
        for a in &items {
            for b in &items {
                assert!(!instance.in_conflict(a.id, b.id));
            }
        }
        cost += instance.objective.column_cost(items.iter().map(|i| i.processing_time));
    }
    assert!((cost - result.value).abs() < 1e-6);
}

/// Exhaustive search over all set partitions
fn brute_force(instance: &Instance) -> f64 {
    fn assign(instance: &Instance, next: usize, bins: &mut Vec<Vec<usize>>, best: &mut f64) {
        if next == instance.items.len() {
            let cost: f64 = bins
                .iter()
                .map(|bin| instance.objective.column_cost(bin.iter().map(|&i| instance.items[i].processing_time)))
                .sum();
            *best = best.min(cost);
            return;
        }

        let item = &instance.items[next];
        for b in 0..bins.len() {
            let load: u32 = bins[b].iter().map(|&i| instance.items[i].width).sum();
            let conflict = bins[b].iter().any(|&i| instance.in_conflict(instance.items[i].id, item.id));
            if load + item.width <= instance.capacity && !conflict {
                bins[b].push(next);
                assign(instance, next + 1, bins, best);
                bins[b].pop();
            }
        }
        bins.push(vec![next]);
        assign(instance, next + 1, bins, best);
        bins.pop();
    }

    let mut best = f64::INFINITY;
    assign(instance, 0, &mut Vec::new(), &mut best);
    best
}

fn random_instance(rng: &mut Pcg64Mcg, objective: Objective) -> Instance {
    let n = rng.gen_range(4..=7);
    let items = (1..=n)
        .map(|i| Item::new(i, rng.gen_range(2..=7)).with_processing_time(rng.gen_range(1..=9)))
        .collect();
    let mut conflicts = Vec::new();
    if rng.gen_bool(0.5) {
        let a = rng.gen_range(1..=n);
        let b = rng.gen_range(1..=n);
        if a != b {
            conflicts.push((ItemId(a), ItemId(b)));
        }
    }
    Instance::new(10, items).with_conflicts(conflicts).with_objective(objective)
}

#[test]
fn conflicting_pair_needs_two_bins() {
    let instance = Instance::new(10, vec![Item::new(1, 6), Item::new(2, 6), Item::new(3, 4)])
        .with_conflicts(vec![(ItemId(1), ItemId(2))]);

    let result = solve(&instance, Settings::default());

    assert_eq!(result.value, 2.0);
    assert!(result.proven_optimal);
    assert!(result.root_bound.unwrap() <= 2.0 + 1e-6);
    for bin in &result.bins {
        assert!(!(bin.contains(&ItemId(1)) && bin.contains(&ItemId(2))));
    }
    assert_valid_packing(&instance, &result);
}

#[test]
fn items_that_never_fit_together_are_solved_at_the_root() {
    let instance = Instance::new(5, (1..=5).map(|i| Item::new(i, 3)).collect());

    let result = solve(&instance, Settings::default());

    assert_eq!(result.value, 5.0);
    assert_eq!(result.nodes_explored, 1);
    assert!((result.root_bound.unwrap() - 5.0).abs() < 1e-6);
    assert_eq!(result.incumbent_history, vec![5.0]);
    assert!(result.bins.iter().all(|bin| bin.len() == 1));
}

#[test]
fn empty_instance_needs_no_bin() {
    let result = solve(&Instance::new(10, Vec::new()), Settings::default());
    assert_eq!(result.value, 0.0);
    assert!(result.bins.is_empty());
    assert!(result.proven_optimal);
}

#[test]
fn matches_exhaustive_search() {
    let mut rng = Pcg64Mcg::seed_from_u64(2024);

    for round in 0..12 {
        let objective = if round % 3 == 2 { Objective::BatchProcessingTime } else { Objective::BinCount };
        let instance = random_instance(&mut rng, objective);
        let expected = brute_force(&instance);

        let result = solve(&instance, Settings::default());
        assert!((result.value - expected).abs() < 1e-6, "round {round}: {} vs {expected}", result.value);
        assert!(result.proven_optimal);
        assert_valid_packing(&instance, &result);

        for pair in result.incumbent_history.windows(2) {
            assert!(pair[1] < pair[0]);
        }
    }
}

#[test]
fn heuristic_seed_matches_exhaustive_search() {
    let mut rng = Pcg64Mcg::seed_from_u64(4711);
    let mut branched = false;

    for round in 0..24 {
        let objective = if round % 4 == 3 { Objective::BinCount } else { Objective::BatchProcessingTime };
        let instance = random_instance(&mut rng, objective);
        let expected = brute_force(&instance);

        let result = solve(&instance, Settings { seed_with_heuristic: true, ..Settings::default() });
        assert!((result.value - expected).abs() < 1e-6, "round {round}: {} vs {expected}", result.value);
        assert!(result.proven_optimal, "round {round}");
        assert_valid_packing(&instance, &result);
        branched |= result.nodes_explored > 1;
    }

    assert!(branched, "no seeded instance needed a branch");
}

#[test]
fn search_strategies_agree() {
    let mut rng = Pcg64Mcg::seed_from_u64(7);

    for round in 0..6 {
        let instance = random_instance(&mut rng, Objective::BinCount);
        let expected = brute_force(&instance);

        for strategy in [SearchStrategy::DepthFirst, SearchStrategy::BreadthFirst, SearchStrategy::BestFirst] {
            let result = solve(&instance, Settings { strategy, ..Settings::default() });
            assert!((result.value - expected).abs() < 1e-6, "round {round} {strategy:?}");
            assert_valid_packing(&instance, &result);
        }
    }
}

#[test]
fn subset_row_cuts_keep_the_optimum() {
    let mut rng = Pcg64Mcg::seed_from_u64(99);

    for round in 0..6 {
        let instance = random_instance(&mut rng, Objective::BinCount);
        let expected = brute_force(&instance);

        for cuts in [CutSelection::Separate, CutSelection::Complete, CutSelection::Random { count: 5, seed: round }] {
            let result = solve(&instance, Settings { cuts, ..Settings::default() });
            assert!((result.value - expected).abs() < 1e-6, "round {round} {cuts:?}");
            assert_valid_packing(&instance, &result);
        }
    }
}

#[test]
fn mip_pricing_reaches_the_same_optimum() {
    let mut rng = Pcg64Mcg::seed_from_u64(5);

    for round in 0..4 {
        let objective = if round % 2 == 0 { Objective::BinCount } else { Objective::BatchProcessingTime };
        let instance = random_instance(&mut rng, objective);

        let dp = solve(&instance, Settings::default());
        let mip = solve(&instance, Settings { pricing: PricingKind::Mip, ..Settings::default() });

        assert!((dp.value - mip.value).abs() < 1e-6, "round {round}");
        assert_valid_packing(&instance, &mip);
    }
}

#[test]
fn batch_scheduling_groups_long_jobs() {
    let instance = Instance::new(
        4,
        vec![
            Item::new(1, 2).with_processing_time(9),
            Item::new(2, 2).with_processing_time(8),
            Item::new(3, 2).with_processing_time(2),
            Item::new(4, 2).with_processing_time(1),
        ],
    )
    .with_objective(Objective::BatchProcessingTime);

    let result = solve(&instance, Settings::default());

    assert_eq!(result.value, 11.0);
    assert_valid_packing(&instance, &result);
    assert!(result.bins.contains(&vec![ItemId(1), ItemId(2)]));
}

#[test]
fn parallel_workers_find_the_optimum() {
    let mut rng = Pcg64Mcg::seed_from_u64(31);

    for _ in 0..4 {
        let instance = random_instance(&mut rng, Objective::BinCount);
        let expected = brute_force(&instance);

        let result = solve(&instance, Settings { num_threads: 3, ..Settings::default() });
        assert!((result.value - expected).abs() < 1e-6);
        assert!(result.proven_optimal);
    }
}

#[test]
fn heuristic_seed_closes_cutting_stock_instance_at_the_root() {
    // rod of length 9, (piece length, demand)
    let demand = [(2, 4), (3, 2), (4, 6), (5, 6), (6, 2), (7, 2), (8, 2)];
    let mut items = Vec::new();
    for (width, count) in demand {
        for _ in 0..count {
            items.push(Item::new(items.len() as u32 + 1, width));
        }
    }
    let instance = Instance::new(9, items);

    let result = solve(&instance, Settings { seed_with_heuristic: true, ..Settings::default() });

    assert_eq!(result.value, 13.0);
    assert!(result.proven_optimal);
    assert_eq!(result.nodes_explored, 1);
    assert_eq!(result.incumbent_history, vec![13.0]);
    assert_valid_packing(&instance, &result);
}

#[test]
fn limits_stop_the_search_without_proof() {
    let instance = Instance::new(10, (1..=8).map(|i| Item::new(i, 3 + i % 4)).collect());

    let timed_out = solve(
        &instance,
        Settings {
            time_limit: Some(Duration::ZERO),
            seed_with_heuristic: true,
            ..Settings::default()
        },
    );
    assert!(!timed_out.proven_optimal);
    assert_eq!(timed_out.nodes_explored, 0);
    assert!(timed_out.value.is_finite());
    assert_valid_packing(&instance, &timed_out);

    let node_limited = solve(&instance, Settings { node_limit: Some(0), ..Settings::default() });
    assert!(!node_limited.proven_optimal);
    assert_eq!(node_limited.nodes_explored, 0);
    assert!(node_limited.value.is_infinite());
}

#[test]
fn invalid_instance_is_rejected() {
    let instance = Instance::new(5, vec![Item::new(1, 6)]);
    let error = HighsBranchAndPrice::new(instance, Settings::default())
        .solve(&UI::quiet())
        .unwrap_err();
    assert!(matches!(error, bnp_binpacking::BnpError::InvalidInstance(_)));
}
