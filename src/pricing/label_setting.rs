use binary_heap_plus::BinaryHeap;

use crate::error::Result;
use crate::instance::Objective;
use crate::pricing::{Duals, PricedColumn, PricingProblem, PricingSolver};
use crate::settings::Tolerances;

/// Read only data shared by all labels of one pricing run
pub struct LabelContext<'a> {
    pub problem: &'a PricingProblem<'a>,
    pub duals: &'a Duals,
    /// `membership[c][i]`: originals of item `i` in cut `c`
    pub membership: Vec<Vec<u8>>,
    pub tolerances: Tolerances,
}

impl<'a> LabelContext<'a> {
    pub fn new(problem: &'a PricingProblem<'a>, duals: &'a Duals, tolerances: Tolerances) -> Self {
        LabelContext {
            problem,
            duals,
            membership: problem.cut_membership(),
            tolerances,
        }
    }

    fn miu(&self, i: usize) -> f64 {
        self.duals.exact[i]
    }

    /// duals of `<=` rows are non positive, clamp solver noise
    fn lamb(&self, c: usize) -> f64 {
        self.duals.cuts.get(c).copied().unwrap_or(0.0).min(0.0)
    }
}

/// Partial packing in the pricing dynamic program.
///
/// Labels are never mutated, extending one produces a new label.
#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    /// index of the last item decided on, `None` for the empty root label
    pub last: Option<usize>,
    pub weight: u32,
    /// reduced cost accumulated so far
    pub cost: f64,
    /// longest processing time packed so far
    pub batch_time: u32,
    pub included: Vec<usize>,
    /// indices after `last` that still fit and do not conflict, ascending
    pub remaining: Vec<usize>,
    /// odd number of cut members included, per cut
    pub parity: Vec<bool>,
    /// contribution of the packing to each cut row
    pub z: Vec<u8>,
}

impl Label {
    pub fn root(ctx: &LabelContext) -> Self {
        let problem = ctx.problem;
        Label {
            last: None,
            weight: 0,
            cost: problem.objective.base_cost(),
            batch_time: 0,
            included: Vec::new(),
            remaining: (0..problem.items.len())
                .filter(|&i| problem.items[i].width <= problem.capacity)
                .collect(),
            parity: vec![false; problem.cuts.len()],
            z: vec![0; problem.cuts.len()],
        }
    }

    /// Number of cut members included, recovered from parity and contribution
    fn cut_count(&self, c: usize) -> u8 {
        match (self.z[c], self.parity[c]) {
            (0, false) => 0,
            (0, true) => 1,
            (_, false) => 2,
            (_, true) => 3,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Skip the next candidate
    pub fn exclude_next(&self) -> Option<Label> {
        let (&next, rest) = self.remaining.split_first()?;
        Some(Label {
            last: Some(next),
            remaining: rest.to_vec(),
            ..self.clone()
        })
    }

    /// Pack the next candidate.
    ///
    /// Candidates are filtered on creation, so including the head of
    /// `remaining` is always capacity and conflict feasible.
    pub fn include_next(&self, ctx: &LabelContext) -> Option<Label> {
        let (&next, rest) = self.remaining.split_first()?;
        let problem = ctx.problem;
        let item = &problem.items[next];

        let mut cost = self.cost - ctx.miu(next);
        let mut batch_time = self.batch_time;
        if problem.objective == Objective::BatchProcessingTime {
            cost += f64::from(item.processing_time.saturating_sub(batch_time));
            batch_time = batch_time.max(item.processing_time);
        }

        let mut parity = self.parity.clone();
        let mut z = self.z.clone();
        for (c, members) in ctx.membership.iter().enumerate() {
            let added = members[next];
            if added == 0 {
                continue;
            }
            let before = self.cut_count(c);
            let after = (before + added).min(3);
            if before < 2 && after >= 2 {
                cost -= ctx.lamb(c);
                z[c] = 1;
            }
            parity[c] = after % 2 == 1;
        }

        let weight = self.weight + item.width;
        let remaining = rest
            .iter()
            .copied()
            .filter(|&h| {
                weight + problem.items[h].width <= problem.capacity
                    && !problem.graph.has_edge(item.id, problem.items[h].id)
            })
            .collect();

        let mut included = self.included.clone();
        included.push(next);

        Some(Label {
            last: Some(next),
            weight,
            cost,
            batch_time,
            included,
            remaining,
            parity,
            z,
        })
    }

    /// Optimistic reduced cost of any completion.
    ///
    /// LP relaxation of the knapsack over the remaining candidates with the
    /// positive exact duals as profits. Cut and batch terms only add cost.
    pub fn completion_bound(&self, ctx: &LabelContext) -> f64 {
        let problem = ctx.problem;
        let mut candidates: Vec<(f64, u32)> = self
            .remaining
            .iter()
            .map(|&i| (ctx.miu(i), problem.items[i].width))
            .filter(|&(profit, _)| profit > 0.0)
            .collect();

        // zero width items first, then by profit density
        candidates.sort_unstable_by(|a, b| {
            let density = |&(p, w): &(f64, u32)| if w == 0 { f64::INFINITY } else { p / f64::from(w) };
            density(b).total_cmp(&density(a))
        });

        let mut free = f64::from(problem.capacity - self.weight);
        let mut gain = 0.0;
        for (profit, width) in candidates {
            let width = f64::from(width);
            if width <= free {
                free -= width;
                gain += profit;
            } else {
                gain += profit * free / width;
                break;
            }
        }

        self.cost - gain
    }

    pub fn should_be_fathomed(&self, ctx: &LabelContext) -> bool {
        self.completion_bound(ctx) >= -ctx.tolerances.reduced_cost
    }

    /// `self` dominates `other` if every completion of `other` can be
    /// matched by a completion of `self` that is at most as expensive.
    ///
    /// Not a total order, two labels may dominate each other.
    pub fn dominates(&self, other: &Label, ctx: &LabelContext) -> bool {
        if self.weight > other.weight {
            return false;
        }
        if self.batch_time < other.batch_time {
            return false;
        }

        // cuts where self may still pay and other would not
        let penalty: f64 = (0..self.z.len())
            .filter(|&c| {
                let mine = self.cut_count(c);
                let theirs = other.cut_count(c);
                mine < 2 && (theirs >= 2 || mine > theirs)
            })
            .map(|c| (-ctx.lamb(c)).max(0.0))
            .sum();

        // candidates only other can still take
        let credit: f64 = other
            .remaining
            .iter()
            .filter(|i| self.remaining.binary_search(i).is_err())
            .map(|&i| ctx.miu(i).max(0.0))
            .sum();

        self.cost + penalty <= other.cost - credit + ctx.tolerances.comparison
    }
}

/// Filter a label set by dominance.
///
/// Labels are visited in order; a label is dropped if a kept label
/// dominates it, otherwise it evicts the kept labels it dominates.
/// Of two mutually dominating labels the earlier one is kept, so the
/// set never collapses.
pub fn dominance_filter(labels: Vec<Label>, ctx: &LabelContext) -> Vec<Label> {
    let mut kept: Vec<Label> = Vec::with_capacity(labels.len());
    for label in labels {
        if kept.iter().any(|k| k.dominates(&label, ctx)) {
            continue;
        }
        kept.retain(|k| !label.dominates(k, ctx));
        kept.push(label);
    }
    kept
}

/// Label setting pricing oracle
#[derive(Default)]
pub struct LabelSetting {
    pub labels_created: usize,
    pub labels_dominated: usize,
    pub labels_fathomed: usize,
}

impl LabelSetting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the forward dynamic program and return every completed label
    /// with negative reduced cost, cheapest first.
    pub fn completed_labels(&mut self, ctx: &LabelContext, max_labels: usize) -> Vec<Label> {
        let n = ctx.problem.items.len();

        // bucket 0 is the empty partial solution, bucket k + 1 holds labels whose last item is k
        let mut buckets: Vec<Vec<Label>> = vec![Vec::new(); n + 1];
        buckets[0].push(Label::root(ctx));
        self.labels_created += 1;

        let mut completed = BinaryHeap::new_by(|a: &Label, b: &Label| b.cost.total_cmp(&a.cost));

        for j in 0..=n {
            let bucket = std::mem::take(&mut buckets[j]);
            let before = bucket.len();
            let bucket = dominance_filter(bucket, ctx);
            self.labels_dominated += before - bucket.len();

            for label in bucket {
                if label.is_complete() {
                    if label.cost < -ctx.tolerances.reduced_cost {
                        completed.push(label);
                    }
                    continue;
                }

                let next = label.remaining[0];
                for child in [label.include_next(ctx), label.exclude_next()].into_iter().flatten() {
                    self.labels_created += 1;
                    if child.should_be_fathomed(ctx) {
                        self.labels_fathomed += 1;
                    } else {
                        buckets[next + 1].push(child);
                    }
                }
            }
        }

        let mut best = Vec::with_capacity(max_labels);
        while best.len() < max_labels {
            match completed.pop() {
                Some(label) => best.push(label),
                None => break,
            }
        }
        best
    }
}

impl PricingSolver for LabelSetting {
    fn solve(
        &mut self,
        problem: &PricingProblem<'_>,
        duals: &Duals,
        max_columns: usize,
        tolerances: &Tolerances,
    ) -> Result<Vec<PricedColumn>> {
        let ctx = LabelContext::new(problem, duals, *tolerances);
        Ok(self
            .completed_labels(&ctx, max_columns.max(1))
            .into_iter()
            .map(|label| PricedColumn {
                reduced_cost: label.cost,
                items: label.included.iter().map(|&i| problem.items[i].id).collect(),
            })
            .collect())
    }
}
