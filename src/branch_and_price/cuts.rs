use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::instance::ItemId;
use crate::settings::CutSelection;

/// Subset-row inequality over a triple of original items:
/// `sum floor(|S ∩ column| / 2) * x_column <= 1`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubsetRowCut {
    pub items: [ItemId; 3],
}

impl SubsetRowCut {
    pub fn new(a: ItemId, b: ItemId, c: ItemId) -> Self {
        let mut items = [a, b, c];
        items.sort_unstable();
        SubsetRowCut { items }
    }

    /// Number of the given original items that belong to the triple
    pub fn count<'a>(&self, originals: impl IntoIterator<Item = &'a ItemId>) -> u8 {
        originals
            .into_iter()
            .filter(|id| self.items.contains(id))
            .count() as u8
    }

    /// Coefficient of a column containing `originals` in this cut
    pub fn coefficient<'a>(&self, originals: impl IntoIterator<Item = &'a ItemId>) -> u8 {
        self.count(originals) / 2
    }
}

/// Choose the triples that receive a cut in the root master problem
pub fn select_cuts(selection: CutSelection, items: &[ItemId]) -> Vec<SubsetRowCut> {
    match selection {
        CutSelection::None => Vec::new(),
        CutSelection::Separate => items
            .chunks_exact(3)
            .map(|c| SubsetRowCut::new(c[0], c[1], c[2]))
            .collect(),
        CutSelection::Complete => items
            .iter()
            .copied()
            .tuple_combinations()
            .map(|(a, b, c)| SubsetRowCut::new(a, b, c))
            .collect(),
        CutSelection::Random { count, seed } => {
            let mut all: Vec<SubsetRowCut> = items
                .iter()
                .copied()
                .tuple_combinations()
                .map(|(a, b, c)| SubsetRowCut::new(a, b, c))
                .collect();
            let mut rng = Pcg64Mcg::seed_from_u64(seed);
            all.shuffle(&mut rng);
            all.truncate(count);
            all
        }
    }
}
