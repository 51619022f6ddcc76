//! Seeding for omalign
//!
//! Seeds are tuples of k consecutive label-to-label distances. Reference
//! seeds are indexed once; query seeds are looked up under the fuzzy
//! tolerance, thinned in repetitive neighborhoods and joined into longer
//! anchors for extension.

pub mod index;
pub mod kmer;


pub use index::{filter_dense_hits, join_hits, restrict_hits, JoinedSeed, SeedHit, SeedIndex};
pub use kmer::{Kmer, KmerExtractor};

use crate::config::AlignerParams;
use crate::types::{DataMolecule, ReferenceSet, RegionSet};

/// Seeds of one query orientation, ready for extension
pub fn seed_query(
    index: &SeedIndex,
    references: &ReferenceSet,
    query: &DataMolecule,
    params: &AlignerParams,
    restriction: Option<&RegionSet>,
) -> Vec<JoinedSeed> {
    let extractor = KmerExtractor::new(index.k(), params.max_nosignal);
    let query_kmers = extractor.extract(query);
    if query_kmers.is_empty() {
        return Vec::new();
    }

    let mut hits = index.find_hits(&query_kmers, &params.tolerance());
    let raw = hits.len();

    hits = filter_dense_hits(
        hits,
        query.inner_segments().len(),
        params.max_seed_number,
        params.seed_neighborhood,
    );
    if let Some(regions) = restriction {
        hits = restrict_hits(hits, references, regions, index.k());
    }

    let seeds = join_hits(&hits, index.k());
    log::debug!(
        "{}: {} query k-mers, {} hits ({} after filtering), {} joined seeds",
        query.name,
        query_kmers.len(),
        raw,
        hits.len(),
        seeds.len()
    );
    seeds
}
