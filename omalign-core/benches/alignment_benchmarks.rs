use criterion::{black_box, criterion_group, criterion_main, Criterion};
use omalign_core::seed::{KmerExtractor, SeedIndex};
use omalign_core::{
    AlignMode, AlignerParams, DataMolecule, OpticalMapAligner, ReferenceSet, Tolerance,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn generate_reference(rng: &mut StdRng, name: &str, labels: usize) -> DataMolecule {
    let mut pos = 0;
    let positions: Vec<i64> = (0..labels)
        .map(|_| {
            pos += rng.gen_range(1500..15_000);
            pos
        })
        .collect();
    DataMolecule::new(name, pos + 5000, positions).unwrap()
}

/// Noisy copy of labels `from..=to` with every fifth label dropped
fn generate_query(
    rng: &mut StdRng,
    reference: &DataMolecule,
    from: usize,
    to: usize,
) -> DataMolecule {
    let offset = reference.position(from) - 1000;
    let positions: Vec<i64> = (from..=to)
        .filter(|i| (i - from) % 5 != 4)
        .map(|i| reference.position(i) - offset + rng.gen_range(-60..=60))
        .collect();
    let size = positions[positions.len() - 1] + 1000;
    DataMolecule::new("query", size, positions).unwrap()
}

fn setup() -> (ReferenceSet, Vec<DataMolecule>) {
    let mut rng = StdRng::seed_from_u64(42);
    let maps: Vec<DataMolecule> = (0..4)
        .map(|i| generate_reference(&mut rng, &format!("chr{}", i + 1), 2000))
        .collect();
    let queries = (0..16)
        .map(|i| {
            let from = 50 + i * 100;
            generate_query(&mut rng, &maps[i % maps.len()], from, from + 40)
        })
        .collect();
    (ReferenceSet::from_maps(maps).unwrap(), queries)
}

fn bench_index_build(c: &mut Criterion) {
    let (references, _) = setup();
    let extractor = KmerExtractor::new(3, 0);

    c.bench_function("seed_index_8k_labels", |b| {
        b.iter(|| black_box(SeedIndex::build(black_box(&references), &extractor, None)))
    });
}

fn bench_lookup(c: &mut Criterion) {
    let (references, queries) = setup();
    let extractor = KmerExtractor::new(3, 0);
    let index = SeedIndex::build(&references, &extractor, None);
    let kmers = extractor.extract(&queries[0]);
    let tolerance = Tolerance::new(500.0, 0.05);

    c.bench_function("seed_lookup_default_tolerance", |b| {
        b.iter(|| black_box(index.find_hits(black_box(&kmers), &tolerance)))
    });
}

fn bench_alignment(c: &mut Criterion) {
    let (references, queries) = setup();

    for mode in [AlignMode::SeedExtend, AlignMode::GraphChain] {
        let params = AlignerParams { mode, meas: 200.0, scale: 0.02, ..Default::default() };
        let aligner = OpticalMapAligner::new(params, references.clone()).unwrap();
        let name = format!("align_16_queries_{}", aligner.mapper_name());

        c.bench_function(&name, |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(aligner.align(black_box(query), None).unwrap());
                }
            })
        });
    }
}

criterion_group!(benches, bench_index_build, bench_lookup, bench_alignment);
criterion_main!(benches);
