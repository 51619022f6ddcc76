//! Fuzzy seed index over reference k-mers
//!
//! Reference k-mers are kept sorted by their first segment length. A query
//! k-mer selects the window of first lengths that can match it under the
//! tolerance and then verifies the remaining lengths one by one.

use rayon::prelude::*;
use std::collections::HashMap;

use super::kmer::{Kmer, KmerExtractor};
use crate::fuzzy::Tolerance;
use crate::types::{DataMolecule, ReferenceSet, RegionSet};

/// A query k-mer matching a reference k-mer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeedHit {
    pub ref_id: usize,
    pub ref_index: usize,
    pub query_index: usize,
}

impl SeedHit {
    fn diagonal(&self) -> i64 {
        self.ref_index as i64 - self.query_index as i64
    }
}

/// Run of hits sharing a reference and diagonal with consecutive query k-mers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinedSeed {
    pub ref_id: usize,
    pub ref_index: usize,
    pub query_index: usize,
    pub kmer_count: usize,
    pub k: usize,
}

impl JoinedSeed {
    /// Number of inner segments covered
    pub fn segment_len(&self) -> usize {
        self.k + self.kmer_count - 1
    }
}

#[derive(Debug, Clone)]
struct IndexedKmer {
    ref_id: usize,
    kmer: Kmer,
}

/// Read-only after construction; restriction changes build a new index
#[derive(Debug, Clone)]
pub struct SeedIndex {
    k: usize,
    entries: Vec<IndexedKmer>,
}

impl SeedIndex {
    /// Index all reference k-mers, keeping only those inside `regions` when given.
    pub fn build(
        references: &ReferenceSet,
        extractor: &KmerExtractor,
        regions: Option<&RegionSet>,
    ) -> Self {
        let maps: Vec<&DataMolecule> = references.iter().collect();

        let mut entries: Vec<IndexedKmer> = maps
            .par_iter()
            .enumerate()
            .flat_map_iter(|(ref_id, map)| {
                extractor
                    .extract(map)
                    .into_iter()
                    .filter(move |kmer| {
                        regions.map_or(true, |r| {
                            r.permits(ref_id, kmer.position, kmer.position + kmer.span())
                        })
                    })
                    .map(move |kmer| IndexedKmer { ref_id, kmer })
            })
            .collect();

        entries.sort_by(|a, b| {
            a.kmer.values[0]
                .cmp(&b.kmer.values[0])
                .then(a.ref_id.cmp(&b.ref_id))
                .then(a.kmer.index.cmp(&b.kmer.index))
        });

        log::info!(
            "Built seed index: {} k-mers (k = {}) over {} references{}",
            entries.len(),
            extractor.k(),
            references.len(),
            if regions.is_some() { " (restricted)" } else { "" }
        );

        Self {
            k: extractor.k(),
            entries,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reference k-mers whose every length matches the query k-mer.
    pub fn lookup(&self, query: &Kmer, tolerance: &Tolerance) -> Vec<SeedHit> {
        if query.k() != self.k || query.values.is_empty() {
            return Vec::new();
        }

        let (lo, hi) = tolerance.ref_window(query.values[0]);
        let start = self.entries.partition_point(|e| e.kmer.values[0] < lo);

        self.entries[start..]
            .iter()
            .take_while(|e| e.kmer.values[0] <= hi)
            .filter(|e| {
                e.kmer
                    .values
                    .iter()
                    .zip(&query.values)
                    .all(|(&r, &q)| tolerance.matches(r, q))
            })
            .map(|e| SeedHit {
                ref_id: e.ref_id,
                ref_index: e.kmer.index,
                query_index: query.index,
            })
            .collect()
    }

    pub fn find_hits(&self, query_kmers: &[Kmer], tolerance: &Tolerance) -> Vec<SeedHit> {
        query_kmers
            .iter()
            .flat_map(|kmer| self.lookup(kmer, tolerance))
            .collect()
    }
}

/// Drop hits of query k-mers sitting in neighborhoods with more than
/// `max_seed_number` hits. `max_seed_number == 0` keeps everything.
pub fn filter_dense_hits(
    hits: Vec<SeedHit>,
    query_kmer_count: usize,
    max_seed_number: usize,
    radius: usize,
) -> Vec<SeedHit> {
    if max_seed_number == 0 || hits.is_empty() || query_kmer_count == 0 {
        return hits;
    }

    let mut counts = vec![0usize; query_kmer_count];
    for hit in &hits {
        if let Some(c) = counts.get_mut(hit.query_index) {
            *c += 1;
        }
    }

    let mut prefix = vec![0usize; query_kmer_count + 1];
    for (i, &c) in counts.iter().enumerate() {
        prefix[i + 1] = prefix[i] + c;
    }

    let dense: Vec<bool> = (0..query_kmer_count)
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(query_kmer_count);
            prefix[hi] - prefix[lo] > max_seed_number
        })
        .collect();

    let before = hits.len();
    let kept: Vec<SeedHit> = hits
        .into_iter()
        .filter(|hit| !dense.get(hit.query_index).copied().unwrap_or(false))
        .collect();

    if kept.len() < before {
        log::debug!("Density filter removed {} of {} seed hits", before - kept.len(), before);
    }
    kept
}

/// Keep hits whose reference span lies inside a permitted region.
pub fn restrict_hits(
    hits: Vec<SeedHit>,
    references: &ReferenceSet,
    regions: &RegionSet,
    k: usize,
) -> Vec<SeedHit> {
    hits.into_iter()
        .filter(|hit| {
            references.get(hit.ref_id).map_or(false, |map| {
                regions.permits(
                    hit.ref_id,
                    map.position(hit.ref_index),
                    map.position(hit.ref_index + k),
                )
            })
        })
        .collect()
}

/// Merge hits on the same reference and diagonal whose query k-mers are
/// consecutive. Longest seeds come first.
pub fn join_hits(hits: &[SeedHit], k: usize) -> Vec<JoinedSeed> {
    let mut by_diagonal: HashMap<(usize, i64), Vec<SeedHit>> = HashMap::new();
    for hit in hits {
        by_diagonal
            .entry((hit.ref_id, hit.diagonal()))
            .or_default()
            .push(*hit);
    }

    let mut joined = Vec::new();
    for (_, mut group) in by_diagonal {
        group.sort_by_key(|h| h.query_index);
        group.dedup();

        let mut current: Option<JoinedSeed> = None;
        for hit in group {
            let extends = current
                .as_ref()
                .map_or(false, |seed| seed.query_index + seed.kmer_count == hit.query_index);
            if extends {
                if let Some(seed) = current.as_mut() {
                    seed.kmer_count += 1;
                }
            } else {
                joined.extend(current.take());
                current = Some(JoinedSeed {
                    ref_id: hit.ref_id,
                    ref_index: hit.ref_index,
                    query_index: hit.query_index,
                    kmer_count: 1,
                    k,
                });
            }
        }
        joined.extend(current);
    }

    joined.sort_by(|a, b| {
        b.kmer_count
            .cmp(&a.kmer_count)
            .then(a.query_index.cmp(&b.query_index))
            .then(a.ref_id.cmp(&b.ref_id))
            .then(a.ref_index.cmp(&b.ref_index))
    });
    joined
}
