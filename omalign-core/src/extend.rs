//! Turn-based seed extension
//!
//! Grows an anchor (a reference label paired with a query label) into a
//! gapped alignment. Every step compares the next query segment, plus any
//! pending extra-label residue, with the next reference segment, plus any
//! pending missing-label residue. Ambiguous steps fork a new hypothesis
//! ("turn") onto an explicit work-list instead of recursing; the best stop
//! over all turns wins.

use crate::config::AlignerParams;
use crate::fuzzy::Tolerance;
use crate::types::{DataMolecule, EditOp, EditString, ExtensionResult, GenomicPos, Strand};

/// A molecule with its inner segments precomputed
#[derive(Debug, Clone)]
pub struct SegmentTrack {
    pub molecule: DataMolecule,
    pub inner: Vec<GenomicPos>,
}

impl SegmentTrack {
    pub fn new(molecule: DataMolecule) -> Self {
        let inner = molecule.inner_segments();
        Self { molecule, inner }
    }

    pub fn labels(&self) -> usize {
        self.molecule.signal_count()
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.molecule.reversed())
    }
}

#[derive(Debug, Clone)]
struct Turn {
    /// Next reference inner segment
    i: usize,
    /// Next query inner segment
    j: usize,
    ref_residue: GenomicPos,
    query_residue: GenomicPos,
    edits: EditString,
    matched: usize,
    false_pos: usize,
    false_neg: usize,
    consecutive_errors: usize,
}

impl Turn {
    fn start(i: usize, j: usize) -> Self {
        let mut edits = EditString::new();
        edits.push(EditOp::Match);
        Self {
            i,
            j,
            ref_residue: 0,
            query_residue: 0,
            edits,
            matched: 1,
            false_pos: 0,
            false_neg: 0,
            consecutive_errors: 0,
        }
    }

    fn extra_query_label(&mut self, qlen: GenomicPos) {
        self.query_residue = qlen;
        self.j += 1;
        self.false_pos += 1;
        self.consecutive_errors += 1;
        self.edits.push(EditOp::Insert);
    }

    fn missing_ref_label(&mut self, rlen: GenomicPos) {
        self.ref_residue = rlen;
        self.i += 1;
        self.false_neg += 1;
        self.consecutive_errors += 1;
        self.edits.push(EditOp::Delete);
    }

    fn matched_label(&mut self) {
        self.ref_residue = 0;
        self.query_residue = 0;
        self.i += 1;
        self.j += 1;
        self.matched += 1;
        self.consecutive_errors = 0;
        self.edits.push(EditOp::Match);
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    score: f64,
    matched: usize,
    ref_stop: usize,
    query_stop: usize,
    edits: EditString,
}

impl Candidate {
    fn beats(&self, other: &Candidate) -> bool {
        self.score > other.score || (self.score == other.score && self.matched > other.matched)
    }
}

/// Turn-based extender; holds no per-query state between calls
#[derive(Debug, Clone)]
pub struct TurnExtender {
    tolerance: Tolerance,
    clean: Tolerance,
    match_score: f64,
    fpp: f64,
    fnp: f64,
    local: bool,
    max_consecutive_errors: usize,
    max_turns: usize,
}

impl TurnExtender {
    pub fn new(params: &AlignerParams) -> Self {
        let tolerance = params.tolerance();
        Self {
            tolerance,
            clean: tolerance.halved(),
            match_score: params.match_score,
            fpp: params.fpp,
            fnp: params.fnp,
            local: params.local,
            max_consecutive_errors: params.max_consecutive_errors,
            max_turns: params.max_turns,
        }
    }

    /// Extend from reference label `ref_start` paired with query label `query_start`.
    ///
    /// Returns `None` when no turn matches a single label beyond the anchor.
    pub fn extend(
        &self,
        reference: &SegmentTrack,
        query: &SegmentTrack,
        ref_start: usize,
        query_start: usize,
    ) -> Option<ExtensionResult> {
        // Fewer than 3 segments means no label-to-label distance at all
        if reference.inner.is_empty() || query.inner.is_empty() {
            return None;
        }
        if ref_start >= reference.labels() || query_start >= query.labels() {
            return None;
        }

        let qs = &query.inner;
        let fp_limit = query.molecule.segment_count();

        // Alternative starts: anchor followed by a true label, one or two extra labels
        let mut turns = vec![Turn::start(ref_start, query_start)];
        let mut residue = 0;
        for extra in 0..2 {
            let j = query_start + extra;
            if j + 1 >= qs.len() {
                break;
            }
            residue += qs[j];
            let mut alt = turns[turns.len() - 1].clone();
            alt.extra_query_label(residue);
            turns.push(alt);
        }
        let mut spawned = turns.len();

        let mut best: Option<Candidate> = None;

        while let Some(mut turn) = turns.pop() {
            let mut last: Option<Candidate> = None;
            let mut aborted = false;

            while turn.i < reference.inner.len() && turn.j < qs.len() {
                let rlen = turn.ref_residue + reference.inner[turn.i];
                let qlen = turn.query_residue + qs[turn.j];
                let tolerance = if turn.query_residue == 0 { &self.clean } else { &self.tolerance };

                if tolerance.matches(rlen, qlen) {
                    if spawned < self.max_turns {
                        // Extra query label absorbed into this segment
                        if turn.j + 1 < qs.len()
                            && self.tolerance.matches(rlen, qlen + qs[turn.j + 1])
                        {
                            let mut alt = turn.clone();
                            alt.extra_query_label(qlen);
                            turns.push(alt);
                            spawned += 1;
                        }
                        // Reference label missing from the query
                        if spawned < self.max_turns
                            && turn.i + 1 < reference.inner.len()
                            && self.tolerance.matches(rlen + reference.inner[turn.i + 1], qlen)
                        {
                            let mut alt = turn.clone();
                            alt.missing_ref_label(rlen);
                            turns.push(alt);
                            spawned += 1;
                        }
                    }

                    turn.matched_label();
                    let candidate = self.candidate(&turn, reference, query, ref_start, query_start);
                    if self.local {
                        if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                            best = Some(candidate);
                        }
                    } else {
                        last = Some(candidate);
                    }
                } else if qlen < rlen {
                    turn.extra_query_label(qlen);
                } else {
                    turn.missing_ref_label(rlen);
                }

                if turn.consecutive_errors > self.max_consecutive_errors
                    || turn.false_pos * 2 > fp_limit
                {
                    aborted = true;
                    break;
                }
            }

            if !self.local && !aborted {
                if let Some(candidate) = last {
                    if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                        best = Some(candidate);
                    }
                }
            }
        }

        let best = best?;
        let ref_span = reference.molecule.span(ref_start, best.ref_stop);
        let query_span = query.molecule.span(query_start, best.query_stop);

        Some(ExtensionResult {
            ref_name: reference.molecule.name.clone(),
            ref_start,
            ref_stop: best.ref_stop,
            query_start,
            query_stop: best.query_stop,
            strand: Strand::Forward,
            edits: best.edits,
            score: best.score,
            scale: (query_span > 0).then(|| ref_span as f64 / query_span as f64),
        })
    }

    fn candidate(
        &self,
        turn: &Turn,
        reference: &SegmentTrack,
        query: &SegmentTrack,
        ref_start: usize,
        query_start: usize,
    ) -> Candidate {
        // After a match the last aligned labels are the segment indices
        let (ref_stop, query_stop) = (turn.i, turn.j);
        let raw = self.match_score * turn.matched as f64
            - self.fnp * turn.false_neg as f64
            - self.fpp * turn.false_pos as f64;

        let ref_span = reference.molecule.span(ref_start, ref_stop) as f64;
        let query_span = query.molecule.span(query_start, query_stop) as f64;
        let longer = ref_span.max(query_span);
        let mut score = if longer > 0.0 { raw * ref_span.min(query_span) / longer } else { raw };

        if !self.local {
            let total = query.molecule.span(0, query.labels() - 1) as f64;
            if total > 0.0 {
                score *= query_span / total;
            }
        }

        Candidate {
            score,
            matched: turn.matched,
            ref_stop,
            query_stop,
            edits: turn.edits.clone(),
        }
    }
}

/// Label pairs covered by an accepted result, replayed from its start while
/// the running score stays positive. Anchors on these pairs are redundant.
pub fn omitted_pairs(result: &ExtensionResult, params: &AlignerParams) -> Vec<(usize, usize)> {
    let (mut k, mut f) = (result.ref_start, result.query_start);
    let mut score = 0.0;
    let mut pairs = Vec::new();

    for &op in result.edits.ops() {
        match op {
            EditOp::Match => {
                score += params.match_score;
                if score <= 0.0 {
                    break;
                }
                pairs.push((k, f));
                k += 1;
                f += 1;
            }
            EditOp::Insert => {
                score -= params.fpp;
                if score <= 0.0 {
                    break;
                }
                f += 1;
            }
            EditOp::Delete => {
                score -= params.fnp;
                if score <= 0.0 {
                    break;
                }
                k += 1;
            }
        }
    }

    pairs
}
