//! k-mer extraction over inner segment lengths

use crate::types::{DataMolecule, GenomicPos};

/// k consecutive inner segment lengths of a molecule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kmer {
    pub source: String,
    /// Index of the first label (and first inner segment)
    pub index: usize,
    /// Absolute position of the first label
    pub position: GenomicPos,
    pub values: Vec<GenomicPos>,
}

impl Kmer {
    pub fn k(&self) -> usize {
        self.values.len()
    }

    /// Distance between the first and last label of the k-mer
    pub fn span(&self) -> GenomicPos {
        self.values.iter().sum()
    }
}

/// Extracts every k-mer of a molecule
#[derive(Debug, Clone, Copy)]
pub struct KmerExtractor {
    k: usize,
    max_nosignal: usize,
}

impl KmerExtractor {
    pub fn new(k: usize, max_nosignal: usize) -> Self {
        Self { k, max_nosignal }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// All windows of k inner segments, skipping windows that cross more than
    /// `max_nosignal` no-signal segments.
    pub fn extract(&self, molecule: &DataMolecule) -> Vec<Kmer> {
        let inner = molecule.inner_segments();
        if self.k == 0 || inner.len() < self.k {
            return Vec::new();
        }

        let nosignal: Vec<bool> = (0..inner.len())
            .map(|j| molecule.is_nosignal_segment(j))
            .collect();

        let mut kmers = Vec::with_capacity(inner.len() + 1 - self.k);
        let mut in_window = nosignal[..self.k].iter().filter(|&&b| b).count();

        for j in 0..=(inner.len() - self.k) {
            if j > 0 {
                // Slide: drop segment j-1, add segment j+k-1
                if nosignal[j - 1] {
                    in_window -= 1;
                }
                if nosignal[j + self.k - 1] {
                    in_window += 1;
                }
            }
            if in_window > self.max_nosignal {
                continue;
            }
            kmers.push(Kmer {
                source: molecule.name.clone(),
                index: j,
                position: molecule.position(j),
                values: inner[j..j + self.k].to_vec(),
            });
        }

        kmers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenomicInterval;

    fn molecule() -> DataMolecule {
        DataMolecule::new("ref", 10_000, vec![500, 1500, 3500, 4000, 7000, 9000]).unwrap()
    }

    #[test]
    fn test_kmer_generation() {
        let kmers = KmerExtractor::new(2, 0).extract(&molecule());
        assert_eq!(kmers.len(), 4);
        assert_eq!(kmers[0].values, vec![1000, 2000]);
        assert_eq!(kmers[0].position, 500);
        assert_eq!(kmers[3].values, vec![3000, 2000]);
        assert_eq!(kmers[3].index, 3);
        assert_eq!(kmers[3].span(), 5000);
        assert!(kmers.iter().all(|k| k.source == "ref" && k.k() == 2));
    }

    #[test]
    fn test_too_few_segments() {
        let m = DataMolecule::new("short", 3000, vec![1000, 2000]).unwrap();
        assert_eq!(KmerExtractor::new(1, 0).extract(&m).len(), 1);
        assert!(KmerExtractor::new(2, 0).extract(&m).is_empty());

        let empty = DataMolecule::new("empty", 3000, vec![]).unwrap();
        assert!(KmerExtractor::new(1, 0).extract(&empty).is_empty());
    }

    #[test]
    fn test_nosignal_limit() {
        // Segment 2 (3500..4000) lies in a no-signal region
        let m = molecule().with_nosignal(vec![GenomicInterval::new(3600, 3700)]);

        let strict = KmerExtractor::new(2, 0).extract(&m);
        assert_eq!(strict.iter().map(|k| k.index).collect::<Vec<_>>(), vec![0, 3]);

        let relaxed = KmerExtractor::new(2, 1).extract(&m);
        assert_eq!(relaxed.len(), 4);
    }

    #[test]
    fn test_reversed_kmers() {
        let m = molecule();
        let forward = KmerExtractor::new(3, 0).extract(&m);
        let reverse = KmerExtractor::new(3, 0).extract(&m.reversed());
        assert_eq!(forward.len(), reverse.len());

        let mut rev_values: Vec<i64> = forward[0].values.clone();
        rev_values.reverse();
        assert_eq!(reverse.last().map(|k| k.values.clone()), Some(rev_values));
    }
}
