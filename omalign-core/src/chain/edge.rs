//! Length-sorted edge tables
//!
//! An edge with error count `e` joins label `s` to label `s + e + 1`,
//! skipping `e` labels. Tables keep one length-sorted list per error count
//! so fuzzy matches are a binary-searched window.

use crate::fuzzy::Tolerance;
use crate::types::{DataMolecule, GenomicPos, RegionSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub start: usize,
    pub end: usize,
    pub len: GenomicPos,
}

#[derive(Debug, Clone, Default)]
pub struct EdgeTable {
    by_error: Vec<Vec<Edge>>,
}

impl EdgeTable {
    /// All edges skipping at most `max_error` labels.
    pub fn build(molecule: &DataMolecule, max_error: usize) -> Self {
        Self::build_filtered(molecule, max_error, |_| true)
    }

    /// Reference table keeping only edges whose span a region permits.
    pub fn build_restricted(
        molecule: &DataMolecule,
        max_error: usize,
        ref_id: usize,
        regions: &RegionSet,
    ) -> Self {
        Self::build_filtered(molecule, max_error, |edge| {
            regions.permits(ref_id, molecule.position(edge.start), molecule.position(edge.end))
        })
    }

    fn build_filtered(
        molecule: &DataMolecule,
        max_error: usize,
        keep: impl Fn(&Edge) -> bool,
    ) -> Self {
        let labels = molecule.signal_count();
        let by_error = (0..=max_error)
            .map(|e| {
                let mut edges: Vec<Edge> = (0..labels.saturating_sub(e + 1))
                    .map(|start| {
                        let end = start + e + 1;
                        Edge { start, end, len: molecule.span(start, end) }
                    })
                    .filter(|edge| keep(edge))
                    .collect();
                edges.sort_by_key(|edge| (edge.len, edge.start));
                edges
            })
            .collect();
        Self { by_error }
    }

    pub fn max_error(&self) -> usize {
        self.by_error.len().saturating_sub(1)
    }

    pub fn edges(&self, error: usize) -> &[Edge] {
        self.by_error.get(error).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_error.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Edges with `error` skipped labels whose length can match query length `q`.
    ///
    /// Every edge with a length inside the inverse bounds is returned,
    /// including all edges sharing a boundary length.
    pub fn window(&self, error: usize, q: GenomicPos, tolerance: &Tolerance) -> &[Edge] {
        let edges = self.edges(error);
        let (lo, hi) = tolerance.ref_window(q);
        let from = edges.partition_point(|edge| edge.len < lo);
        let to = edges.partition_point(|edge| edge.len <= hi);
        &edges[from..to.max(from)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReferenceSet, Region};

    fn molecule() -> DataMolecule {
        DataMolecule::new("m", 10_000, vec![1000, 3000, 4500, 6000, 9000]).unwrap()
    }

    #[test]
    fn test_edge_counts() {
        let table = EdgeTable::build(&molecule(), 2);
        assert_eq!(table.max_error(), 2);
        assert_eq!(table.edges(0).len(), 4);
        assert_eq!(table.edges(1).len(), 3);
        assert_eq!(table.edges(2).len(), 2);
        assert!(table.edges(3).is_empty());
        assert_eq!(table.len(), 9);
    }

    #[test]
    fn test_sorted_with_ties_contiguous() {
        let table = EdgeTable::build(&molecule(), 0);
        let lens: Vec<_> = table.edges(0).iter().map(|e| e.len).collect();
        assert_eq!(lens, vec![1500, 1500, 2000, 3000]);

        let hits = table.window(0, 1500, &Tolerance::exact());
        assert_eq!(hits.len(), 2);
        assert_eq!((hits[0].start, hits[1].start), (1, 2));
    }

    #[test]
    fn test_window_tolerance() {
        let table = EdgeTable::build(&molecule(), 1);
        let tight = table.window(1, 3450, &Tolerance::new(10.0, 0.0));
        assert!(tight.is_empty());

        let loose = table.window(1, 3450, &Tolerance::new(100.0, 0.0));
        assert_eq!(loose, &[Edge { start: 0, end: 2, len: 3500 }]);
    }

    #[test]
    fn test_too_few_labels() {
        let single = DataMolecule::new("s", 2000, vec![1000]).unwrap();
        assert!(EdgeTable::build(&single, 2).is_empty());
    }

    #[test]
    fn test_restricted_edges() {
        let refs = ReferenceSet::from_maps(vec![molecule()]).unwrap();
        let regions = RegionSet::build(&[Region::new("m", 0, 4500)], &refs).unwrap();
        let table = EdgeTable::build_restricted(refs.get(0).unwrap(), 2, 0, &regions);

        assert_eq!(table.edges(0).len(), 2);
        assert_eq!(table.edges(1).len(), 1);
        assert!(table.edges(2).is_empty());
    }
}
