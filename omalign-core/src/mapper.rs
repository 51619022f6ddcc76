//! Per-query alignment orchestration
//!
//! A [`Mapper`] turns one query molecule into extension results against
//! every reference. [`OpticalMapAligner`] wraps a mapper with the query
//! pre-checks, strand handling, record building and post-processing.

use std::collections::HashSet;
use std::sync::Arc;

use crate::chain::GraphChainer;
use crate::config::{AlignMode, AlignerParams};
use crate::error::{AlignError, AlignResult};
use crate::extend::{omitted_pairs, SegmentTrack, TurnExtender};
use crate::post::PostPipeline;
use crate::seed::{seed_query, KmerExtractor, SeedIndex};
use crate::types::{
    AlignmentRecord, DataMolecule, ExtensionResult, GenomicInterval, ReferenceSet, Region,
    RegionSet, Strand,
};

/// Alignment engine behind an [`OpticalMapAligner`]
pub trait Mapper: Send + Sync {
    /// Extension results of `query` against all references.
    fn map(
        &self,
        query: &DataMolecule,
        restriction: Option<&RegionSet>,
    ) -> AlignResult<Vec<ExtensionResult>>;

    /// Get the name of this alignment engine
    fn name(&self) -> &'static str;

    /// Whether results already cover the reverse strand of the query
    fn reports_both_strands(&self) -> bool {
        false
    }
}

/// Seed lookup followed by turn-based extension, one query orientation per call
pub struct SeedExtendMapper {
    params: AlignerParams,
    references: Arc<ReferenceSet>,
    index: SeedIndex,
    extender: TurnExtender,
    forward: Vec<SegmentTrack>,
    mirrored: Vec<SegmentTrack>,
}

impl SeedExtendMapper {
    pub fn new(
        params: &AlignerParams,
        references: Arc<ReferenceSet>,
        regions: Option<&RegionSet>,
    ) -> Self {
        let extractor = KmerExtractor::new(params.k, params.max_nosignal);
        let index = SeedIndex::build(&references, &extractor, regions);
        let forward: Vec<SegmentTrack> =
            references.iter().cloned().map(SegmentTrack::new).collect();
        let mirrored = forward.iter().map(SegmentTrack::reversed).collect();

        Self {
            params: params.clone(),
            extender: TurnExtender::new(params),
            references,
            index,
            forward,
            mirrored,
        }
    }

    pub fn index(&self) -> &SeedIndex {
        &self.index
    }
}

impl Mapper for SeedExtendMapper {
    fn map(
        &self,
        query: &DataMolecule,
        restriction: Option<&RegionSet>,
    ) -> AlignResult<Vec<ExtensionResult>> {
        let seeds = seed_query(&self.index, &self.references, query, &self.params, restriction);
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let query_track = SegmentTrack::new(query.clone());
        let query_mirror = query_track.reversed();
        let last_query = query_track.labels() - 1;

        // (ref id, ref label, query label) pairs already covered by a result
        let mut omitted: HashSet<(usize, usize, usize)> = HashSet::new();
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for seed in seeds {
            if omitted.contains(&(seed.ref_id, seed.ref_index, seed.query_index)) {
                continue;
            }
            let reference = &self.forward[seed.ref_id];
            let last_ref = reference.labels() - 1;

            // Walk left on the mirrored pair, then extend right from where it stopped
            let (ref_start, query_start) = match self.extender.extend(
                &self.mirrored[seed.ref_id],
                &query_mirror,
                last_ref - seed.ref_index,
                last_query - seed.query_index,
            ) {
                Some(left) => (last_ref - left.ref_stop, last_query - left.query_stop),
                None => (seed.ref_index, seed.query_index),
            };

            let extended = self.extender.extend(reference, &query_track, ref_start, query_start);
            if let Some(result) = extended {
                for (k, f) in omitted_pairs(&result, &self.params) {
                    omitted.insert((seed.ref_id, k, f));
                }
                let key = (
                    seed.ref_id,
                    result.ref_start,
                    result.ref_stop,
                    result.query_start,
                    result.query_stop,
                );
                if seen.insert(key) {
                    results.push(result);
                }
            }
        }

        log::debug!("{}: {} extension results", query.name, results.len());
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "seed-extend"
    }
}

/// Edge-table graph chaining; covers both strands in one call
pub struct GraphChainMapper {
    references: Arc<ReferenceSet>,
    chainer: GraphChainer,
}

impl GraphChainMapper {
    pub fn new(
        params: &AlignerParams,
        references: Arc<ReferenceSet>,
        regions: Option<&RegionSet>,
    ) -> Self {
        let chainer = GraphChainer::new(params, &references, regions);
        Self { references, chainer }
    }
}

impl Mapper for GraphChainMapper {
    fn map(
        &self,
        query: &DataMolecule,
        restriction: Option<&RegionSet>,
    ) -> AlignResult<Vec<ExtensionResult>> {
        self.chainer.chain(&self.references, query, restriction)
    }

    fn name(&self) -> &'static str {
        "graph-chain"
    }

    fn reports_both_strands(&self) -> bool {
        true
    }
}

/// Factory for creating alignment engines
pub struct MapperFactory;

impl MapperFactory {
    /// Create the mapper selected by `params.mode`
    pub fn create(
        params: &AlignerParams,
        references: Arc<ReferenceSet>,
        regions: Option<&RegionSet>,
    ) -> Arc<dyn Mapper> {
        match params.mode {
            AlignMode::SeedExtend => Arc::new(SeedExtendMapper::new(params, references, regions)),
            AlignMode::GraphChain => Arc::new(GraphChainMapper::new(params, references, regions)),
        }
    }

    /// List all available alignment modes
    pub fn available_modes() -> Vec<&'static str> {
        vec!["seed-extend", "graph-chain"]
    }
}

/// Aligns query molecules against a fixed reference set.
///
/// Cloning is cheap: indices are shared, and every clone is independently
/// usable from its own thread.
#[derive(Clone)]
pub struct OpticalMapAligner {
    params: Arc<AlignerParams>,
    references: Arc<ReferenceSet>,
    mapper: Arc<dyn Mapper>,
    pipeline: Arc<PostPipeline>,
}

impl OpticalMapAligner {
    /// Validate parameters and build the indices for the configured mode.
    pub fn new(params: AlignerParams, references: ReferenceSet) -> AlignResult<Self> {
        params.validate()?;
        let references = Arc::new(references);
        let mapper = MapperFactory::create(&params, Arc::clone(&references), None);
        Ok(Self::assemble(params, references, mapper))
    }

    /// Use a caller-supplied mapper instead of building one.
    pub fn with_mapper(
        params: AlignerParams,
        references: Arc<ReferenceSet>,
        mapper: Arc<dyn Mapper>,
    ) -> AlignResult<Self> {
        params.validate()?;
        Ok(Self::assemble(params, references, mapper))
    }

    fn assemble(
        params: AlignerParams,
        references: Arc<ReferenceSet>,
        mapper: Arc<dyn Mapper>,
    ) -> Self {
        let pipeline = Arc::new(PostPipeline::from_params(&params));
        log::info!(
            "Aligner ready: {} mode, {} references",
            mapper.name(),
            references.len()
        );
        Self {
            params: Arc::new(params),
            references,
            mapper,
            pipeline,
        }
    }

    pub fn with_pipeline(mut self, pipeline: PostPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn params(&self) -> &AlignerParams {
        &self.params
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    pub fn mapper_name(&self) -> &'static str {
        self.mapper.name()
    }

    /// Rebuild the indices over `regions` only. Only this instance changes;
    /// clones made earlier keep their indices.
    pub fn restrict_region(&mut self, regions: &[Region]) -> AlignResult<()> {
        let set = RegionSet::build(regions, &self.references)?;
        self.mapper = MapperFactory::create(&self.params, Arc::clone(&self.references), Some(&set));
        log::info!("Restricted {} aligner to {} regions", self.mapper.name(), regions.len());
        Ok(())
    }

    /// Rebuild the indices over the whole reference set.
    pub fn clear_restriction(&mut self) {
        self.mapper = MapperFactory::create(&self.params, Arc::clone(&self.references), None);
    }

    /// Final records for `query`. `None` aligns anywhere; an empty region
    /// list aligns nowhere.
    pub fn align(
        &self,
        query: &DataMolecule,
        regions: Option<&[Region]>,
    ) -> AlignResult<Vec<AlignmentRecord>> {
        let records = self.align_partial(query, regions)?;
        Ok(self.pipeline.process(records))
    }

    /// Records before post-processing.
    pub fn align_partial(
        &self,
        query: &DataMolecule,
        regions: Option<&[Region]>,
    ) -> AlignResult<Vec<AlignmentRecord>> {
        let restriction = match regions {
            Some([]) => return Ok(Vec::new()),
            Some(list) => Some(RegionSet::build(list, &self.references)?),
            None => None,
        };

        if query.signal_count() < self.params.min_signal || query.size() < self.params.min_size {
            log::debug!(
                "{}: skipped ({} labels, {} bp)",
                query.name,
                query.signal_count(),
                query.size()
            );
            return Ok(Vec::new());
        }

        let mut results = self.mapper.map(query, restriction.as_ref())?;

        if !self.mapper.reports_both_strands() {
            let mirrored = query.reversed();
            let last = query.signal_count().saturating_sub(1);
            for mut result in self.mapper.map(&mirrored, restriction.as_ref())? {
                let (start, stop) = (last - result.query_stop, last - result.query_start);
                result.query_start = start;
                result.query_stop = stop;
                result.strand = Strand::Reverse;
                results.push(result);
            }
        }

        let mut records = Vec::with_capacity(results.len());
        for result in results {
            let reference = self
                .references
                .get_by_name(&result.ref_name)
                .ok_or_else(|| AlignError::UnknownReference(result.ref_name.clone()))?;
            if !self.params.allow_exact_match && is_exact_match(&result, reference, query) {
                continue;
            }
            records.push(AlignmentRecord {
                query_name: query.name.clone(),
                ref_name: result.ref_name,
                interval: GenomicInterval::new(
                    reference.position(result.ref_start),
                    reference.position(result.ref_stop),
                ),
                strand: result.strand,
                sub_ref_start: result.ref_start,
                sub_ref_stop: result.ref_stop,
                sub_query_start: result.query_start,
                sub_query_stop: result.query_stop,
                edits: result.edits,
                score: result.score,
                scale: result.scale,
            });
        }

        Ok(records)
    }
}

/// All labels matched and every aligned segment length identical.
fn is_exact_match(
    result: &ExtensionResult,
    reference: &DataMolecule,
    query: &DataMolecule,
) -> bool {
    if !result.edits.is_all_match() {
        return false;
    }
    let query = match result.strand {
        Strand::Forward => query.clone(),
        Strand::Reverse => query.reversed(),
    };
    let last = query.signal_count() - 1;
    let query_start = match result.strand {
        Strand::Forward => result.query_start,
        Strand::Reverse => last - result.query_stop,
    };
    (0..result.ref_stop - result.ref_start).all(|step| {
        let r = reference.span(result.ref_start + step, result.ref_start + step + 1);
        let q = query.span(query_start + step, query_start + step + 1);
        r == q
    })
}
