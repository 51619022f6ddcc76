//! Graph chaining for omalign
//!
//! Query and reference edges (label pairs skipping up to a few labels) are
//! matched by length. Every matching pair becomes a transition between two
//! matching-signal-pair vertices, in a forward graph for the query as read
//! and a reverse graph for its opposite orientation. Best paths through the
//! graphs become alignments.

pub mod edge;
pub mod graph;

pub use edge::{Edge, EdgeTable};
pub use graph::{MspGraph, Transition, Vertex};

use rayon::prelude::*;

use crate::config::AlignerParams;
use crate::error::AlignResult;
use crate::fuzzy::Tolerance;
use crate::types::{
    DataMolecule, EditOp, EditString, ExtensionResult, ReferenceSet, RegionSet, Strand,
};

/// Chains query edges against precomputed reference edge tables
#[derive(Debug, Clone)]
pub struct GraphChainer {
    params: AlignerParams,
    tolerance: Tolerance,
    /// Indexed by reference id
    tables: Vec<EdgeTable>,
}

impl GraphChainer {
    /// Build reference edge tables once, in parallel, keeping only edges
    /// inside `regions` when given.
    pub fn new(
        params: &AlignerParams,
        references: &ReferenceSet,
        regions: Option<&RegionSet>,
    ) -> Self {
        let maps: Vec<&DataMolecule> = references.iter().collect();
        let limit = params.edge_error_limit;

        let tables: Vec<EdgeTable> = maps
            .par_iter()
            .enumerate()
            .map(|(ref_id, map)| match regions {
                Some(r) => EdgeTable::build_restricted(map, limit, ref_id, r),
                None => EdgeTable::build(map, limit),
            })
            .collect();

        log::info!(
            "Built edge tables: {} edges over {} references (edge error limit {})",
            tables.iter().map(EdgeTable::len).sum::<usize>(),
            tables.len(),
            limit
        );

        Self {
            params: params.clone(),
            tolerance: params.tolerance(),
            tables,
        }
    }

    /// Alignments of `query` on both strands against every reference.
    /// Forward results precede reverse results for each reference.
    pub fn chain(
        &self,
        references: &ReferenceSet,
        query: &DataMolecule,
        restriction: Option<&RegionSet>,
    ) -> AlignResult<Vec<ExtensionResult>> {
        let query_table = EdgeTable::build(query, self.params.edge_error_limit);
        if query_table.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for (ref_id, (reference, table)) in references.iter().zip(&self.tables).enumerate() {
            let (mut forward, mut reverse) =
                self.build_graphs(ref_id, reference, table, &query_table, restriction);
            if forward.is_empty() {
                continue;
            }

            forward.score_all()?;
            reverse.score_all()?;
            results.extend(self.emit(&forward, reference, query, Strand::Forward)?);
            results.extend(self.emit(&reverse, reference, query, Strand::Reverse)?);
        }

        log::debug!("{}: graph chaining produced {} results", query.name, results.len());
        Ok(results)
    }

    fn build_graphs(
        &self,
        ref_id: usize,
        reference: &DataMolecule,
        table: &EdgeTable,
        query_table: &EdgeTable,
        restriction: Option<&RegionSet>,
    ) -> (MspGraph, MspGraph) {
        let limit = self.params.edge_error_limit;
        let mut forward = MspGraph::new();
        let mut reverse = MspGraph::new();

        for query_error in 0..=limit {
            for ref_error in 0..=limit {
                if query_error + ref_error > self.params.combined_error_limit {
                    continue;
                }
                let score = self.params.transition_score(ref_error, query_error);

                for q in query_table.edges(query_error) {
                    for r in table.window(ref_error, q.len, &self.tolerance) {
                        if !self.tolerance.matches(r.len, q.len) {
                            continue;
                        }
                        if let Some(regions) = restriction {
                            let start = reference.position(r.start);
                            if !regions.permits(ref_id, start, reference.position(r.end)) {
                                continue;
                            }
                        }
                        forward.add_transition((r.start, q.start), (r.end, q.end), score);
                        reverse.add_transition((r.start, q.end), (r.end, q.start), score);
                    }
                }
            }
        }

        (forward, reverse)
    }

    fn emit(
        &self,
        graph: &MspGraph,
        reference: &DataMolecule,
        query: &DataMolecule,
        strand: Strand,
    ) -> AlignResult<Vec<ExtensionResult>> {
        let mut results = Vec::new();

        for leader in graph.group_leaders()? {
            let best = graph.vertex(leader).score.unwrap_or(0.0);
            let score = best + self.params.match_score;
            if score < self.params.min_align_score {
                continue;
            }

            let path = graph.best_path(leader);
            let mut edits = EditString::new();
            edits.push(EditOp::Match);
            for pair in path.windows(2) {
                let (a, b) = (graph.vertex(pair[0]), graph.vertex(pair[1]));
                let query_step = a.query_label.abs_diff(b.query_label);
                edits.push_run(EditOp::Insert, query_step - 1);
                edits.push_run(EditOp::Delete, b.ref_label - a.ref_label - 1);
                edits.push(EditOp::Match);
            }

            let first = graph.vertex(path[0]);
            let last = graph.vertex(path[path.len() - 1]);
            let (query_start, query_stop) = match strand {
                Strand::Forward => (first.query_label, last.query_label),
                Strand::Reverse => (last.query_label, first.query_label),
            };
            let ref_span = reference.span(first.ref_label, last.ref_label);
            let query_span = query.span(query_start, query_stop);

            results.push(ExtensionResult {
                ref_name: reference.name.clone(),
                ref_start: first.ref_label,
                ref_stop: last.ref_label,
                query_start,
                query_stop,
                strand,
                edits,
                score,
                scale: (query_span > 0).then(|| ref_span as f64 / query_span as f64),
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Region;

    fn params() -> AlignerParams {
        AlignerParams { meas: 100.0, scale: 0.02, min_align_score: 8.0, ..Default::default() }
    }

    fn references() -> ReferenceSet {
        let map = DataMolecule::new("ref", 6000, vec![1000, 3000, 4500]).unwrap();
        ReferenceSet::from_maps(vec![map]).unwrap()
    }

    #[test]
    fn test_identical_molecule() {
        let refs = references();
        let chainer = GraphChainer::new(&params(), &refs, None);
        let query = DataMolecule::new("q", 6000, vec![1000, 3000, 4500]).unwrap();

        let results = chainer.chain(&refs, &query, None).unwrap();
        let best = &results[0];
        assert_eq!(best.strand, Strand::Forward);
        assert_eq!(best.edits.to_raw_string(), "MMM");
        assert_eq!(best.score, 15.0);
        assert_eq!((best.ref_start, best.ref_stop), (0, 2));
        assert!(results.iter().all(|r| r.is_consistent()));
    }

    #[test]
    fn test_missing_label_both_strands() {
        let refs = references();
        let chainer = GraphChainer::new(&params(), &refs, None);
        let query = DataMolecule::new("q", 6000, vec![1000, 4500]).unwrap();

        let results = chainer.chain(&refs, &query, None).unwrap();
        assert_eq!(results.len(), 2);

        let forward = &results[0];
        assert_eq!(forward.strand, Strand::Forward);
        assert_eq!(forward.edits.to_raw_string(), "MDM");
        assert_eq!(forward.score, 8.0);
        assert_eq!((forward.query_start, forward.query_stop), (0, 1));

        let reverse = &results[1];
        assert_eq!(reverse.strand, Strand::Reverse);
        assert_eq!(reverse.edits.to_raw_string(), "MDM");
        assert_eq!((reverse.query_start, reverse.query_stop), (0, 1));
        assert!(reverse.is_consistent());
    }

    #[test]
    fn test_reverse_orientation() {
        let refs = ReferenceSet::from_maps(vec![
            DataMolecule::new("ref", 20_000, vec![1000, 3000, 4500, 8000, 9200]).unwrap(),
        ])
        .unwrap();
        let chainer = GraphChainer::new(&params(), &refs, None);
        let query = refs.get(0).unwrap().reversed();

        let results = chainer.chain(&refs, &query, None).unwrap();
        let best = results
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .unwrap();
        assert_eq!(best.strand, Strand::Reverse);
        assert_eq!(best.edits.to_raw_string(), "MMMMM");
        assert_eq!((best.query_start, best.query_stop), (0, 4));
    }

    #[test]
    fn test_low_scores_discarded() {
        let refs = references();
        let strict = AlignerParams { min_align_score: 20.0, ..params() };
        let chainer = GraphChainer::new(&strict, &refs, None);
        let query = DataMolecule::new("q", 6000, vec![1000, 3000, 4500]).unwrap();
        assert!(chainer.chain(&refs, &query, None).unwrap().is_empty());
    }

    #[test]
    fn test_restriction_and_degenerate_query() {
        let refs = references();
        let chainer = GraphChainer::new(&params(), &refs, None);
        let query = DataMolecule::new("q", 6000, vec![1000, 3000, 4500]).unwrap();

        let elsewhere = RegionSet::build(&[Region::new("ref", 5000, 6000)], &refs).unwrap();
        assert!(chainer.chain(&refs, &query, Some(&elsewhere)).unwrap().is_empty());

        let single = DataMolecule::new("q", 6000, vec![1000]).unwrap();
        assert!(chainer.chain(&refs, &single, None).unwrap().is_empty());
    }
}
