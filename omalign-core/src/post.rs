//! Post-processing of alignment records
//!
//! Processors run in sequence over all records of one query. The default
//! pipeline drops low scores and then resolves records competing for the
//! same query labels.

use std::cmp::Ordering;

use crate::config::AlignerParams;
use crate::types::{AlignmentRecord, Strand};

/// A step applied to the records of one query
pub trait ResultProcessor: Send + Sync {
    fn process(&self, records: Vec<AlignmentRecord>) -> Vec<AlignmentRecord>;

    fn name(&self) -> &'static str;
}

/// Drops records scoring below a threshold
#[derive(Debug, Clone, Copy)]
pub struct ScoreFilter {
    pub min_score: f64,
}

impl ResultProcessor for ScoreFilter {
    fn process(&self, mut records: Vec<AlignmentRecord>) -> Vec<AlignmentRecord> {
        records.retain(|r| r.score >= self.min_score);
        records
    }

    fn name(&self) -> &'static str {
        "score-filter"
    }
}

/// Keeps records greedily in score order, dropping any record sharing more
/// than `max_overlap_fraction` of its query labels with a kept one.
///
/// The fraction is taken relative to the shorter of the two records.
#[derive(Debug, Clone, Copy)]
pub struct OverlapResolver {
    pub max_overlap_fraction: f64,
}

impl ResultProcessor for OverlapResolver {
    fn process(&self, mut records: Vec<AlignmentRecord>) -> Vec<AlignmentRecord> {
        records.sort_by(compare_records);

        let mut kept: Vec<AlignmentRecord> = Vec::with_capacity(records.len());
        for record in records {
            let conflicts = kept.iter().any(|k| {
                let shared = k.query_overlap(&record) as f64;
                let shorter = k.query_label_count().min(record.query_label_count()) as f64;
                shared / shorter > self.max_overlap_fraction
            });
            if !conflicts {
                kept.push(record);
            }
        }
        kept
    }

    fn name(&self) -> &'static str {
        "overlap-resolver"
    }
}

/// Score descending, forward before reverse, then reference name and start.
pub fn compare_records(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| strand_rank(a.strand).cmp(&strand_rank(b.strand)))
        .then_with(|| a.ref_name.cmp(&b.ref_name))
        .then_with(|| a.interval.start.cmp(&b.interval.start))
}

fn strand_rank(strand: Strand) -> u8 {
    match strand {
        Strand::Forward => 0,
        Strand::Reverse => 1,
    }
}

/// Ordered chain of processors
#[derive(Default)]
pub struct PostPipeline {
    processors: Vec<Box<dyn ResultProcessor>>,
}

impl PostPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score filter followed by overlap resolution.
    pub fn from_params(params: &AlignerParams) -> Self {
        Self::new()
            .with(ScoreFilter { min_score: params.min_align_score })
            .with(OverlapResolver { max_overlap_fraction: params.max_overlap_fraction })
    }

    pub fn with(mut self, processor: impl ResultProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn process(&self, records: Vec<AlignmentRecord>) -> Vec<AlignmentRecord> {
        self.processors
            .iter()
            .fold(records, |records, processor| processor.process(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EditOp, EditString, GenomicInterval};

    fn record(
        ref_name: &str,
        strand: Strand,
        query: (usize, usize),
        score: f64,
    ) -> AlignmentRecord {
        let mut edits = EditString::new();
        edits.push_run(EditOp::Match, query.1 - query.0 + 1);
        AlignmentRecord {
            query_name: "q".to_string(),
            ref_name: ref_name.to_string(),
            interval: GenomicInterval::new(1000, 5000),
            strand,
            sub_ref_start: 0,
            sub_ref_stop: query.1 - query.0,
            sub_query_start: query.0,
            sub_query_stop: query.1,
            edits,
            score,
            scale: Some(1.0),
        }
    }

    #[test]
    fn test_score_filter() {
        let filter = ScoreFilter { min_score: 10.0 };
        let kept = filter.process(vec![
            record("a", Strand::Forward, (0, 3), 9.5),
            record("a", Strand::Forward, (0, 3), 10.0),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].score, 10.0);
    }

    #[test]
    fn test_overlap_resolution_keeps_best() {
        let resolver = OverlapResolver { max_overlap_fraction: 0.5 };
        let kept = resolver.process(vec![
            record("b", Strand::Forward, (0, 9), 20.0),
            record("a", Strand::Forward, (2, 9), 30.0),
            // Disjoint query labels survive
            record("c", Strand::Forward, (10, 15), 12.0),
        ]);
        let names: Vec<_> = kept.iter().map(|r| r.ref_name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_forward_wins_ties() {
        let resolver = OverlapResolver { max_overlap_fraction: 0.5 };
        let kept = resolver.process(vec![
            record("a", Strand::Reverse, (0, 1), 8.0),
            record("a", Strand::Forward, (0, 1), 8.0),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].strand, Strand::Forward);
    }

    #[test]
    fn test_small_overlap_allowed() {
        let resolver = OverlapResolver { max_overlap_fraction: 0.5 };
        let kept = resolver.process(vec![
            record("a", Strand::Forward, (0, 9), 30.0),
            record("b", Strand::Forward, (8, 17), 25.0),
        ]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_pipeline_order() {
        let params = AlignerParams { min_align_score: 15.0, ..Default::default() };
        let pipeline = PostPipeline::from_params(&params);
        assert_eq!(pipeline.names(), vec!["score-filter", "overlap-resolver"]);

        let kept = pipeline.process(vec![
            record("a", Strand::Forward, (0, 3), 10.0),
            record("b", Strand::Forward, (0, 3), 20.0),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].ref_name, "b");

        let single = vec![record("a", Strand::Forward, (0, 1), 1.0)];
        assert_eq!(PostPipeline::new().process(single).len(), 1);
    }
}
