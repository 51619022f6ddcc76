//! Matching-signal-pair graph
//!
//! Vertices pair a reference label with a query label; transitions join
//! pairs whose edges matched. Label indices grow along every reference
//! step, so the graph is acyclic and best paths are memoised bottom-up
//! with an explicit stack.

use std::collections::HashMap;

use crate::error::{AlignError, AlignResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub to: usize,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub ref_label: usize,
    pub query_label: usize,
    pub transitions: Vec<Transition>,
    /// Best score reachable from here; `None` until scored
    pub score: Option<f64>,
    pub best_next: Option<usize>,
}

impl Vertex {
    fn new(ref_label: usize, query_label: usize) -> Self {
        Self {
            ref_label,
            query_label,
            transitions: Vec::new(),
            score: None,
            best_next: None,
        }
    }
}

/// Arena of vertices keyed by `(ref label, query label)`
#[derive(Debug, Clone, Default)]
pub struct MspGraph {
    index: HashMap<(usize, usize), usize>,
    vertices: Vec<Vertex>,
    groups: Vec<usize>,
}

impl MspGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, id: usize) -> &Vertex {
        &self.vertices[id]
    }

    pub fn find(&self, ref_label: usize, query_label: usize) -> Option<usize> {
        self.index.get(&(ref_label, query_label)).copied()
    }

    /// Existing vertex for the pair, or a new one.
    pub fn vertex_id(&mut self, ref_label: usize, query_label: usize) -> usize {
        if let Some(&id) = self.index.get(&(ref_label, query_label)) {
            return id;
        }
        let id = self.vertices.len();
        self.vertices.push(Vertex::new(ref_label, query_label));
        self.index.insert((ref_label, query_label), id);
        id
    }

    pub fn add_transition(&mut self, from: (usize, usize), to: (usize, usize), score: f64) {
        let from = self.vertex_id(from.0, from.1);
        let to = self.vertex_id(to.0, to.1);
        self.vertices[from].transitions.push(Transition { to, score });
    }

    /// Memoise the best path score of every vertex.
    pub fn score_all(&mut self) -> AlignResult<()> {
        let mut stack: Vec<(usize, bool)> = Vec::new();

        for root in 0..self.vertices.len() {
            if self.vertices[root].score.is_some() {
                continue;
            }
            stack.push((root, false));

            while let Some((v, expanded)) = stack.pop() {
                if self.vertices[v].score.is_some() {
                    continue;
                }
                if !expanded {
                    stack.push((v, true));
                    for t in &self.vertices[v].transitions {
                        if self.vertices[t.to].score.is_none() {
                            stack.push((t.to, false));
                        }
                    }
                    continue;
                }

                let mut best = 0.0;
                let mut best_next = None;
                for t in &self.vertices[v].transitions {
                    let next = &self.vertices[t.to];
                    let next_score = next.score.ok_or(AlignError::UnscoredVertex {
                        ref_label: next.ref_label,
                        query_label: next.query_label,
                    })?;
                    let candidate = t.score + next_score;
                    if candidate > best {
                        best = candidate;
                        best_next = Some(t.to);
                    }
                }
                let vertex = &mut self.vertices[v];
                vertex.score = Some(best);
                vertex.best_next = best_next;
            }
        }

        self.assign_groups();
        Ok(())
    }

    /// Union every vertex with its best successor.
    fn assign_groups(&mut self) {
        let mut parent: Vec<usize> = (0..self.vertices.len()).collect();
        for v in 0..self.vertices.len() {
            if let Some(next) = self.vertices[v].best_next {
                let a = find_root(&mut parent, v);
                let b = find_root(&mut parent, next);
                if a != b {
                    parent[a] = b;
                }
            }
        }
        for v in 0..parent.len() {
            find_root(&mut parent, v);
        }
        self.groups = parent;
    }

    /// Group representative of a scored vertex.
    pub fn group(&self, id: usize) -> AlignResult<usize> {
        let vertex = &self.vertices[id];
        if vertex.score.is_none() || self.groups.len() != self.vertices.len() {
            return Err(AlignError::UnscoredVertex {
                ref_label: vertex.ref_label,
                query_label: vertex.query_label,
            });
        }
        Ok(self.groups[id])
    }

    /// Highest scoring vertex of each group; ties go to the lowest
    /// reference label, then the lowest query label.
    pub fn group_leaders(&self) -> AlignResult<Vec<usize>> {
        let mut leaders: HashMap<usize, usize> = HashMap::new();
        for id in 0..self.vertices.len() {
            let group = self.group(id)?;
            let leader = leaders.entry(group).or_insert(id);
            if self.precedes(id, *leader) {
                *leader = id;
            }
        }
        let mut leaders: Vec<usize> = leaders.into_values().collect();
        leaders.sort_unstable();
        Ok(leaders)
    }

    fn precedes(&self, a: usize, b: usize) -> bool {
        let (va, vb) = (&self.vertices[a], &self.vertices[b]);
        let (sa, sb) = (va.score.unwrap_or(0.0), vb.score.unwrap_or(0.0));
        sa > sb
            || (sa == sb
                && (va.ref_label, va.query_label) < (vb.ref_label, vb.query_label))
    }

    /// Vertices along the best-next chain from `start`.
    pub fn best_path(&self, start: usize) -> Vec<usize> {
        let mut path = vec![start];
        let mut current = start;
        while let Some(next) = self.vertices[current].best_next {
            path.push(next);
            current = next;
        }
        path
    }
}

fn find_root(parent: &mut [usize], v: usize) -> usize {
    let mut root = v;
    while parent[root] != root {
        root = parent[root];
    }
    let mut v = v;
    while parent[v] != root {
        let next = parent[v];
        parent[v] = root;
        v = next;
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Diamond with a cheap direct shortcut:
    /// (0,0) -> (1,1) -> (3,3), (0,0) -> (2,2) -> (3,3), (0,0) -> (3,3)
    fn diamond() -> MspGraph {
        let mut g = MspGraph::new();
        g.add_transition((0, 0), (1, 1), 5.0);
        g.add_transition((1, 1), (3, 3), 1.0);
        g.add_transition((0, 0), (2, 2), 3.0);
        g.add_transition((2, 2), (3, 3), 5.0);
        g.add_transition((0, 0), (3, 3), 4.0);
        g
    }

    #[test]
    fn test_vertex_reuse() {
        let g = diamond();
        assert_eq!(g.len(), 4);
        assert_eq!(g.find(0, 0), Some(0));
        assert_eq!(g.find(3, 3), Some(2));
        assert_eq!(g.find(3, 0), None);
    }

    #[test]
    fn test_best_path_through_dag() {
        let mut g = diamond();
        g.score_all().unwrap();

        let start = g.find(0, 0).unwrap();
        assert_eq!(g.vertex(start).score, Some(8.0));
        let labels: Vec<_> = g
            .best_path(start)
            .into_iter()
            .map(|v| (g.vertex(v).ref_label, g.vertex(v).query_label))
            .collect();
        assert_eq!(labels, vec![(0, 0), (2, 2), (3, 3)]);
        assert_eq!(g.vertex(g.find(3, 3).unwrap()).score, Some(0.0));
    }

    #[test]
    fn test_groups_and_leaders() {
        let mut g = diamond();
        // Separate component
        g.add_transition((10, 10), (11, 12), 3.0);
        g.score_all().unwrap();

        let a = g.group(g.find(0, 0).unwrap()).unwrap();
        assert_eq!(a, g.group(g.find(2, 2).unwrap()).unwrap());
        assert_ne!(a, g.group(g.find(10, 10).unwrap()).unwrap());

        let leaders = g.group_leaders().unwrap();
        let leader_labels: Vec<_> = leaders
            .iter()
            .map(|&v| (g.vertex(v).ref_label, g.vertex(v).query_label))
            .collect();
        assert!(leader_labels.contains(&(0, 0)));
        assert!(leader_labels.contains(&(10, 10)));
    }

    #[test]
    fn test_group_before_scoring_is_error() {
        let g = diamond();
        assert!(matches!(
            g.group(0),
            Err(AlignError::UnscoredVertex { ref_label: 0, query_label: 0 })
        ));
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let mut g = MspGraph::new();
        for i in 0..100_000 {
            g.add_transition((i, i), (i + 1, i + 1), 1.0);
        }
        g.score_all().unwrap();
        assert_eq!(g.vertex(g.find(0, 0).unwrap()).score, Some(100_000.0));
    }
}
