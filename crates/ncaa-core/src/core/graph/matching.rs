use super::LabeledGraph;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, trace};

/// Upper bound on search steps spent on one seed pair while looking for a complete match.
const SEED_STEP_LIMIT: usize = 2_000;
/// Upper bound on search steps for the partial-overlap search.
const PARTIAL_STEP_LIMIT: usize = 2_000_000;

#[derive(Debug, Error, PartialEq)]
pub enum MatchError {
    #[error("Matching tolerance must lie within [0, 1], got {0}")]
    InvalidTolerance(f64),
    #[error("Cannot match an empty graph")]
    EmptyGraph,
    #[error(
        "Only {matched} of {possible} atoms could be matched, beyond the tolerated unmatched fraction {tolerance}"
    )]
    InsufficientOverlap {
        matched: usize,
        possible: usize,
        tolerance: f64,
    },
    #[error("Atom {index} appears in more than one pair")]
    DuplicateIndex { index: usize },
}

/// One-to-one pairing between atoms of two structures, as `(index in A, index in B)`.
///
/// No index appears twice on either side. Pairs are kept sorted by the A index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Correspondence {
    pairs: Vec<(usize, usize)>,
}

impl Correspondence {
    pub fn new(mut pairs: Vec<(usize, usize)>) -> Result<Self, MatchError> {
        let mut seen_a = HashSet::new();
        let mut seen_b = HashSet::new();
        for &(a, b) in &pairs {
            if !seen_a.insert(a) {
                return Err(MatchError::DuplicateIndex { index: a });
            }
            if !seen_b.insert(b) {
                return Err(MatchError::DuplicateIndex { index: b });
            }
        }
        pairs.sort_unstable();
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs.iter().copied()
    }

    /// The B index paired with `a`, if any.
    #[cfg(test)]
    pub(crate) fn image_of(&self, a: usize) -> Option<usize> {
        self.pairs
            .binary_search_by_key(&a, |&(x, _)| x)
            .ok()
            .map(|pos| self.pairs[pos].1)
    }
}

struct Search<'g> {
    a: &'g LabeledGraph,
    b: &'g LabeledGraph,
    a_to_b: Vec<Option<usize>>,
    b_to_a: Vec<Option<usize>>,
    skipped: Vec<bool>,
    mapped: usize,
    allow_skip: bool,
    steps_left: usize,
    target: usize,
    best: Vec<(usize, usize)>,
}

impl<'g> Search<'g> {
    fn new(a: &'g LabeledGraph, b: &'g LabeledGraph) -> Self {
        Self {
            a,
            b,
            a_to_b: vec![None; a.len()],
            b_to_a: vec![None; b.len()],
            skipped: vec![false; a.len()],
            mapped: 0,
            allow_skip: false,
            steps_left: 0,
            target: a.len().min(b.len()),
            best: Vec::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.best.len() == self.target
    }

    fn should_stop(&self) -> bool {
        self.is_complete() || self.steps_left == 0
    }

    fn assign(&mut self, a: usize, b: usize) {
        self.a_to_b[a] = Some(b);
        self.b_to_a[b] = Some(a);
        self.mapped += 1;
    }

    fn unassign(&mut self, a: usize, b: usize) {
        self.a_to_b[a] = None;
        self.b_to_a[b] = None;
        self.mapped -= 1;
    }

    fn record(&mut self) {
        if self.mapped > self.best.len() {
            self.best = self
                .a_to_b
                .iter()
                .enumerate()
                .filter_map(|(a, b)| b.map(|b| (a, b)))
                .collect();
            trace!(size = self.best.len(), "Improved partial match.");
        }
    }

    /// Lowest-index unmatched, unskipped atom of A bonded to a matched atom.
    fn next_frontier(&self) -> Option<usize> {
        (0..self.a.len()).find(|&node| {
            self.a_to_b[node].is_none()
                && !self.skipped[node]
                && self
                    .a
                    .neighbors(node)
                    .iter()
                    .any(|&n| self.a_to_b[n].is_some())
        })
    }

    /// B atoms that `node` may map to while keeping the match label-preserving and induced.
    fn candidates(&self, node: usize) -> Vec<usize> {
        let Some(anchor) = self
            .a
            .neighbors(node)
            .iter()
            .find_map(|&n| self.a_to_b[n])
        else {
            return Vec::new();
        };
        let label = self.a.label(node);

        self.b
            .neighbors(anchor)
            .iter()
            .copied()
            .filter(|&cand| self.b_to_a[cand].is_none() && self.b.label(cand) == label)
            .filter(|&cand| {
                let forward = self
                    .a
                    .neighbors(node)
                    .iter()
                    .filter_map(|&n| self.a_to_b[n])
                    .all(|image| self.b.are_adjacent(cand, image));
                let backward = self
                    .b
                    .neighbors(cand)
                    .iter()
                    .filter_map(|&n| self.b_to_a[n])
                    .all(|pre| self.a.are_adjacent(node, pre));
                forward && backward
            })
            .collect()
    }

    fn upper_bound(&self) -> usize {
        let open_a = (0..self.a.len())
            .filter(|&n| self.a_to_b[n].is_none() && !self.skipped[n])
            .count();
        let open_b = self.b.len() - self.mapped;
        self.mapped + open_a.min(open_b)
    }

    fn extend(&mut self) {
        if self.should_stop() {
            return;
        }
        self.steps_left -= 1;
        self.record();

        if self.upper_bound() <= self.best.len() {
            return;
        }
        let Some(node) = self.next_frontier() else {
            return;
        };

        for cand in self.candidates(node) {
            self.assign(node, cand);
            self.extend();
            self.unassign(node, cand);
            if self.should_stop() {
                return;
            }
        }

        if self.allow_skip {
            self.skipped[node] = true;
            self.extend();
            self.skipped[node] = false;
        }
    }

    fn seed_pairs(&self) -> Vec<(usize, usize)> {
        let mut seeds = Vec::new();
        for a in 0..self.a.len() {
            for b in 0..self.b.len() {
                if self.a.label(a) == self.b.label(b) {
                    seeds.push((a, b));
                }
            }
        }
        seeds
    }

    fn run(mut self) -> Vec<(usize, usize)> {
        let seeds = self.seed_pairs();

        for &(a, b) in &seeds {
            self.steps_left = SEED_STEP_LIMIT;
            self.assign(a, b);
            self.extend();
            self.unassign(a, b);
            if self.is_complete() {
                return self.best;
            }
        }

        debug!(
            best = self.best.len(),
            target = self.target,
            "No complete match found; searching for the largest partial overlap."
        );
        self.allow_skip = true;
        self.steps_left = PARTIAL_STEP_LIMIT;
        for &(a, b) in &seeds {
            if self.should_stop() {
                break;
            }
            self.assign(a, b);
            self.extend();
            self.unassign(a, b);
        }
        self.best
    }
}

/// Pairs the atoms of two labelled graphs.
///
/// The result is the largest connected common substructure found: matched atoms carry equal
/// labels, and two matched atoms are bonded in A exactly when their images are bonded in B. The
/// search is deterministic. It first looks for a complete match of the smaller graph from each
/// seed pair in index order, and falls back to a bounded search that may leave atoms
/// unmatched.
///
/// `tolerance` is the largest fraction of the smaller graph's atoms allowed to stay unmatched.
pub fn match_graphs(
    a: &LabeledGraph,
    b: &LabeledGraph,
    tolerance: f64,
) -> Result<Correspondence, MatchError> {
    if !(0.0..=1.0).contains(&tolerance) {
        return Err(MatchError::InvalidTolerance(tolerance));
    }
    if a.is_empty() || b.is_empty() {
        return Err(MatchError::EmptyGraph);
    }

    let possible = a.len().min(b.len());
    let pairs = Search::new(a, b).run();
    let unmatched = possible - pairs.len();
    if unmatched as f64 > tolerance * possible as f64 {
        return Err(MatchError::InsufficientOverlap {
            matched: pairs.len(),
            possible,
            tolerance,
        });
    }

    debug!(matched = pairs.len(), possible, "Graph match complete.");
    Correspondence::new(pairs)
}
