use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{AlignError, AlignResult};

pub type GenomicPos = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomicInterval {
    pub start: GenomicPos,
    pub stop: GenomicPos,
}

impl GenomicInterval {
    pub fn new(start: GenomicPos, stop: GenomicPos) -> Self {
        Self { start, stop }
    }

    pub fn len(&self) -> GenomicPos {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }

    pub fn contains(&self, start: GenomicPos, stop: GenomicPos) -> bool {
        self.start <= start && stop <= self.stop
    }

    pub fn overlaps(&self, start: GenomicPos, stop: GenomicPos) -> bool {
        self.start < stop && start < self.stop
    }

    /// Interval seen from the other end of a molecule of length `size`
    pub fn mirrored(&self, size: GenomicPos) -> Self {
        Self {
            start: size - self.stop,
            stop: size - self.start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn flip(self) -> Self {
        match self {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
        }
    }
}

impl From<bool> for Strand {
    fn from(forward: bool) -> Self {
        if forward {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
}

impl From<Strand> for i8 {
    fn from(strand: Strand) -> Self {
        match strand {
            Strand::Forward => 1,
            Strand::Reverse => -1,
        }
    }
}

impl From<Strand> for char {
    fn from(strand: Strand) -> Self {
        match strand {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// A reference map or a query molecule: strictly increasing label positions
/// inside `[0, size]`.
///
/// A molecule with `N` labels has `N + 1` segments. The first and last are
/// boundary segments to the molecule ends; the `N - 1` inner segments are the
/// label-to-label distances compared by the aligners. Inner segment `j` lies
/// between labels `j` and `j + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMolecule")]
pub struct DataMolecule {
    pub name: String,
    size: GenomicPos,
    refp: Vec<GenomicPos>,
    nosignal: Vec<GenomicInterval>,
}

/// Unchecked serialized form of a [`DataMolecule`]
#[derive(Deserialize)]
struct RawMolecule {
    name: String,
    size: GenomicPos,
    refp: Vec<GenomicPos>,
    #[serde(default)]
    nosignal: Vec<GenomicInterval>,
}

impl TryFrom<RawMolecule> for DataMolecule {
    type Error = AlignError;

    fn try_from(raw: RawMolecule) -> AlignResult<Self> {
        Ok(DataMolecule::new(raw.name, raw.size, raw.refp)?.with_nosignal(raw.nosignal))
    }
}

impl DataMolecule {
    pub fn new(
        name: impl Into<String>,
        size: GenomicPos,
        refp: Vec<GenomicPos>,
    ) -> AlignResult<Self> {
        let name = name.into();
        if size < 0 {
            return Err(AlignError::InvalidMolecule(format!("{}: negative size {}", name, size)));
        }
        if let Some(w) = refp.windows(2).find(|w| w[0] >= w[1]) {
            return Err(AlignError::InvalidMolecule(format!(
                "{}: label positions not strictly increasing ({} >= {})",
                name, w[0], w[1]
            )));
        }
        if let (Some(&first), Some(&last)) = (refp.first(), refp.last()) {
            if first < 0 || last > size {
                return Err(AlignError::InvalidMolecule(format!(
                    "{}: labels [{}, {}] outside molecule of size {}",
                    name, first, last, size
                )));
            }
        }
        Ok(Self {
            name,
            size,
            refp,
            nosignal: Vec::new(),
        })
    }

    /// Builds a molecule from its full segment list, boundary segments included.
    pub fn from_segments(name: impl Into<String>, segments: &[GenomicPos]) -> AlignResult<Self> {
        let name = name.into();
        if segments.is_empty() {
            return Err(AlignError::InvalidMolecule(format!("{}: empty segment list", name)));
        }
        if let Some(&s) = segments.iter().find(|&&s| s < 0) {
            return Err(AlignError::InvalidMolecule(format!("{}: negative segment {}", name, s)));
        }
        let mut refp = Vec::with_capacity(segments.len() - 1);
        let mut pos = 0;
        for &s in &segments[..segments.len() - 1] {
            pos += s;
            refp.push(pos);
        }
        let size = pos + segments[segments.len() - 1];
        Self::new(name, size, refp)
    }

    /// Attaches regions where the source recorded no signal.
    pub fn with_nosignal(mut self, mut regions: Vec<GenomicInterval>) -> Self {
        regions.sort_by_key(|r| (r.start, r.stop));
        self.nosignal = regions;
        self
    }

    pub fn size(&self) -> GenomicPos {
        self.size
    }

    pub fn positions(&self) -> &[GenomicPos] {
        &self.refp
    }

    pub fn position(&self, label: usize) -> GenomicPos {
        self.refp[label]
    }

    pub fn nosignal_regions(&self) -> &[GenomicInterval] {
        &self.nosignal
    }

    pub fn signal_count(&self) -> usize {
        self.refp.len()
    }

    pub fn segment_count(&self) -> usize {
        self.refp.len() + 1
    }

    /// Segment `i` of the full `N + 1` segment list.
    pub fn segment(&self, i: usize) -> GenomicPos {
        let n = self.refp.len();
        if n == 0 {
            return self.size;
        }
        if i == 0 {
            self.refp[0]
        } else if i == n {
            self.size - self.refp[n - 1]
        } else {
            self.refp[i] - self.refp[i - 1]
        }
    }

    pub fn segments(&self) -> Vec<GenomicPos> {
        (0..self.segment_count()).map(|i| self.segment(i)).collect()
    }

    /// Label-to-label distances only.
    pub fn inner_segments(&self) -> Vec<GenomicPos> {
        self.refp.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Distance between two labels, `from <= to`.
    pub fn span(&self, from: usize, to: usize) -> GenomicPos {
        self.refp[to] - self.refp[from]
    }

    /// Whether inner segment `j` touches a no-signal region.
    pub fn is_nosignal_segment(&self, j: usize) -> bool {
        let (a, b) = (self.refp[j], self.refp[j + 1]);
        self.nosignal.iter().any(|r| r.overlaps(a, b))
    }

    /// Opposite-strand view: positions mirrored and order reversed.
    pub fn reversed(&self) -> Self {
        let size = self.size;
        let mut nosignal: Vec<GenomicInterval> =
            self.nosignal.iter().map(|r| r.mirrored(size)).collect();
        nosignal.reverse();
        Self {
            name: self.name.clone(),
            size,
            refp: self.refp.iter().rev().map(|&p| size - p).collect(),
            nosignal,
        }
    }

    /// Maps a label index on the mirrored molecule back to this one.
    pub fn mirror_label(&self, label: usize) -> usize {
        self.refp.len() - 1 - label
    }
}

/// Insertion-ordered reference maps addressable by name.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    maps: Vec<DataMolecule>,
    by_name: HashMap<String, usize>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, map: DataMolecule) -> AlignResult<usize> {
        if self.by_name.contains_key(&map.name) {
            return Err(AlignError::DuplicateReference(map.name));
        }
        let id = self.maps.len();
        self.by_name.insert(map.name.clone(), id);
        self.maps.push(map);
        Ok(id)
    }

    pub fn from_maps(maps: impl IntoIterator<Item = DataMolecule>) -> AlignResult<Self> {
        let mut set = Self::new();
        for map in maps {
            set.insert(map)?;
        }
        Ok(set)
    }

    pub fn get(&self, id: usize) -> Option<&DataMolecule> {
        self.maps.get(id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&DataMolecule> {
        self.by_name.get(name).map(|&id| &self.maps[id])
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataMolecule> {
        self.maps.iter()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

/// A permitted reference sub-interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub ref_name: String,
    pub interval: GenomicInterval,
}

impl Region {
    pub fn new(ref_name: impl Into<String>, start: GenomicPos, stop: GenomicPos) -> Self {
        Self {
            ref_name: ref_name.into(),
            interval: GenomicInterval::new(start, stop),
        }
    }
}

/// Regions grouped per reference id for fast containment checks.
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    per_ref: HashMap<usize, Vec<GenomicInterval>>,
}

impl RegionSet {
    /// Regions naming unknown references are rejected.
    pub fn build(regions: &[Region], references: &ReferenceSet) -> AlignResult<Self> {
        let mut per_ref: HashMap<usize, Vec<GenomicInterval>> = HashMap::new();
        for region in regions {
            let id = references
                .id_of(&region.ref_name)
                .ok_or_else(|| AlignError::UnknownReference(region.ref_name.clone()))?;
            per_ref.entry(id).or_default().push(region.interval);
        }
        Ok(Self { per_ref })
    }

    /// Whether `[start, stop]` on reference `ref_id` lies inside one region.
    pub fn permits(&self, ref_id: usize, start: GenomicPos, stop: GenomicPos) -> bool {
        self.per_ref
            .get(&ref_id)
            .map_or(false, |list| list.iter().any(|r| r.contains(start, stop)))
    }

    pub fn is_empty(&self) -> bool {
        self.per_ref.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditOp {
    /// Label present in both molecules
    Match,
    /// Extra query label (false positive)
    Insert,
    /// Missing reference label (false negative)
    Delete,
}

impl EditOp {
    pub fn symbol(self) -> char {
        match self {
            EditOp::Match => 'M',
            EditOp::Insert => 'I',
            EditOp::Delete => 'D',
        }
    }
}

/// Label-level edit operations read along the reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditString(Vec<EditOp>);

impl EditString {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, op: EditOp) {
        self.0.push(op);
    }

    pub fn push_run(&mut self, op: EditOp, count: usize) {
        self.0.extend(std::iter::repeat(op).take(count));
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub fn ops(&self) -> &[EditOp] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self, op: EditOp) -> usize {
        self.0.iter().filter(|&&o| o == op).count()
    }

    /// One character per operation, e.g. `MMDM`.
    pub fn to_raw_string(&self) -> String {
        self.0.iter().map(|op| op.symbol()).collect()
    }

    /// Number of reference labels covered.
    pub fn ref_labels(&self) -> usize {
        self.count(EditOp::Match) + self.count(EditOp::Delete)
    }

    /// Number of query labels covered.
    pub fn query_labels(&self) -> usize {
        self.count(EditOp::Match) + self.count(EditOp::Insert)
    }

    pub fn is_all_match(&self) -> bool {
        self.0.iter().all(|&op| op == EditOp::Match)
    }
}

impl From<Vec<EditOp>> for EditString {
    fn from(ops: Vec<EditOp>) -> Self {
        Self(ops)
    }
}

/// Run-length form, e.g. `2M1D1M`.
impl fmt::Display for EditString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter().peekable();
        while let Some(&op) = iter.next() {
            let mut run = 1;
            while iter.peek() == Some(&&op) {
                iter.next();
                run += 1;
            }
            write!(f, "{}{}", run, op.symbol())?;
        }
        Ok(())
    }
}

/// Candidate produced by either aligner. Label indices are inclusive and
/// refer to the query as it was read (`strand`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionResult {
    pub ref_name: String,
    pub ref_start: usize,
    pub ref_stop: usize,
    pub query_start: usize,
    pub query_stop: usize,
    pub strand: Strand,
    pub edits: EditString,
    pub score: f64,
    pub scale: Option<f64>,
}

impl ExtensionResult {
    /// Edit string length agrees with both index ranges.
    pub fn is_consistent(&self) -> bool {
        self.ref_stop >= self.ref_start
            && self.query_stop >= self.query_start
            && self.edits.ref_labels() == self.ref_stop - self.ref_start + 1
            && self.edits.query_labels() == self.query_stop - self.query_start + 1
    }
}

/// Final alignment of one query against one reference interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub query_name: String,
    pub ref_name: String,
    pub interval: GenomicInterval,
    pub strand: Strand,
    pub sub_ref_start: usize,
    pub sub_ref_stop: usize,
    /// Query label range in the original orientation of the molecule
    pub sub_query_start: usize,
    pub sub_query_stop: usize,
    pub edits: EditString,
    pub score: f64,
    pub scale: Option<f64>,
}

impl AlignmentRecord {
    pub fn matched_signals(&self) -> usize {
        self.edits.count(EditOp::Match)
    }

    pub fn query_label_count(&self) -> usize {
        self.sub_query_stop - self.sub_query_start + 1
    }

    /// Number of query labels shared with `other`.
    pub fn query_overlap(&self, other: &AlignmentRecord) -> usize {
        let start = self.sub_query_start.max(other.sub_query_start);
        let stop = self.sub_query_stop.min(other.sub_query_stop);
        if stop >= start {
            stop - start + 1
        } else {
            0
        }
    }
}
