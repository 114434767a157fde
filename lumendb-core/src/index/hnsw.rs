//! HNSW (Hierarchical Navigable Small World) graph index.
//!
//! A multi-layer navigable-small-world graph providing approximate
//! nearest-neighbor search in expected `O(log N)` time.
//!
//! # References
//!
//! - Malkov & Yashunin (2018): "Efficient and robust approximate nearest
//!   neighbor search using HNSW graphs"

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::distance::LinearMetric;
use crate::error::{Error, Result};
use crate::index::IndexSearchResult;
use crate::vector::Vector;

/// Construction and search parameters for one HNSW index. All are per-store;
/// callers that don't supply one get these defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Target out-degree above layer 0.
    pub m: usize,
    /// Cap at layer 0 (typically `2*M`).
    pub m_max0: usize,
    /// Candidate-list width during insertion.
    pub ef_construction: usize,
    /// Candidate-list width during search, unless overridden per query.
    pub ef_search: usize,
    /// Distance kernel used to rank neighbors.
    pub metric: LinearMetric,
    /// RNG seed for level sampling. Fixed by default so construction is
    /// reproducible; callers needing variety set this explicitly.
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            m_max0: 32,
            ef_construction: 200,
            ef_search: 50,
            metric: LinearMetric::Euclidean,
            seed: 0x5eed_1234_c0ff_ee42,
        }
    }
}

impl HnswConfig {
    pub fn with_m(m: usize) -> Self {
        Self {
            m,
            m_max0: m * 2,
            ..Default::default()
        }
    }
}

/// A node in the HNSW graph.
#[derive(Debug, Clone)]
struct Node {
    vector: Vector,
    level: usize,
    /// `neighbors[layer]` = set of neighbor ids at that layer.
    neighbors: Vec<HashSet<u64>>,
    /// Ids of nodes that list this node as a neighbor at any layer. Distinct
    /// from `neighbors` because pruning can make edges asymmetric.
    back_links: HashSet<u64>,
}

impl Node {
    fn new(vector: Vector, level: usize) -> Self {
        Self {
            vector,
            level,
            neighbors: vec![HashSet::new(); level + 1],
            back_links: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: u64,
    distance: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    // Min-heap: closest distance has the highest priority.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Clone, Copy)]
struct Furthest(Candidate);

impl PartialEq for Furthest {
    fn eq(&self, other: &Self) -> bool {
        self.0.distance == other.0.distance
    }
}
impl Eq for Furthest {}
impl PartialOrd for Furthest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Furthest {
    // Max-heap: furthest distance has the highest priority.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .distance
            .partial_cmp(&other.0.distance)
            .unwrap_or(Ordering::Equal)
    }
}

/// HNSW index over a fixed-dimension vector space.
pub struct HnswIndex {
    dimension: usize,
    config: HnswConfig,
    ml: f64,
    entry_point: Option<u64>,
    top_level: usize,
    nodes: HashMap<u64, Node>,
    rng: StdRng,
}

impl HnswIndex {
    pub fn new(dimension: usize, config: HnswConfig) -> Self {
        let ml = 1.0 / (config.m as f64).ln();
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            dimension,
            ml,
            entry_point: None,
            top_level: 0,
            nodes: HashMap::new(),
            rng,
            config,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    fn random_level(&mut self) -> usize {
        let r: f64 = self.rng.gen();
        (-r.ln() * self.ml).floor() as usize
    }

    fn m_max(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m_max0
        } else {
            self.config.m
        }
    }

    /// Distance between `query` and node `id`, transformed so that a lower
    /// value always means "closer", regardless of whether the configured
    /// metric is a distance or a similarity.
    fn query_distance(&self, query: &[f32], id: u64) -> f32 {
        let raw = self.config.metric.score(query, self.nodes[&id].vector.as_slice());
        if self.config.metric.lower_is_closer() {
            raw
        } else {
            -raw
        }
    }

    fn node_distance(&self, a: u64, b: u64) -> f32 {
        let raw = self
            .config
            .metric
            .score(self.nodes[&a].vector.as_slice(), self.nodes[&b].vector.as_slice());
        if self.config.metric.lower_is_closer() {
            raw
        } else {
            -raw
        }
    }

    /// Records that node `from` has `to` as a neighbor at `lc`.
    fn link(&mut self, from: u64, to: u64, lc: usize) {
        self.nodes.get_mut(&from).unwrap().neighbors[lc].insert(to);
        self.nodes.get_mut(&to).unwrap().back_links.insert(from);
    }

    /// Removes the `from -> to` edge at `lc`. Clears `to`'s back-link to
    /// `from` only if `from` no longer references `to` at any layer.
    fn unlink(&mut self, from: u64, to: u64, lc: usize) {
        if let Some(node) = self.nodes.get_mut(&from) {
            if lc < node.neighbors.len() {
                node.neighbors[lc].remove(&to);
            }
        }
        let still_referenced = self
            .nodes
            .get(&from)
            .map(|n| n.neighbors.iter().any(|layer| layer.contains(&to)))
            .unwrap_or(false);
        if !still_referenced {
            if let Some(to_node) = self.nodes.get_mut(&to) {
                to_node.back_links.remove(&from);
            }
        }
    }

    /// The classic HNSW `SEARCH-LAYER(q, ep, ef, lc)` greedy beam search.
    fn search_layer(&self, query: &[f32], entry_points: &[u64], ef: usize, lc: usize) -> Vec<Candidate> {
        let mut visited: HashSet<u64> = entry_points.iter().copied().collect();
        let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
        let mut w: BinaryHeap<Furthest> = BinaryHeap::new();

        for &ep in entry_points {
            let d = self.query_distance(query, ep);
            candidates.push(Candidate { id: ep, distance: d });
            w.push(Furthest(Candidate { id: ep, distance: d }));
        }

        while let Some(c) = candidates.pop() {
            if let Some(worst) = w.peek() {
                if c.distance > worst.0.distance && w.len() >= ef {
                    break;
                }
            }
            if let Some(node) = self.nodes.get(&c.id) {
                if lc < node.neighbors.len() {
                    let neighbors: Vec<u64> = node.neighbors[lc].iter().copied().collect();
                    for e in neighbors {
                        if visited.insert(e) {
                            let d = self.query_distance(query, e);
                            let worse_than_w =
                                w.len() >= ef && w.peek().map(|f| d >= f.0.distance).unwrap_or(false);
                            if !worse_than_w {
                                candidates.push(Candidate { id: e, distance: d });
                                w.push(Furthest(Candidate { id: e, distance: d }));
                                while w.len() > ef {
                                    w.pop();
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut result: Vec<Candidate> = w.into_iter().map(|f| f.0).collect();
        result.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        result
    }

    /// Diversity-pruning neighbor selection heuristic: keep a candidate only
    /// if it's closer to `q` than to every already-selected result; readmit
    /// nearest discards if short of `m`.
    fn select_neighbors_heuristic(&self, candidates: &[Candidate], m: usize) -> Vec<u64> {
        let mut sorted = candidates.to_vec();
        sorted.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));

        let mut selected: Vec<Candidate> = Vec::new();
        let mut discarded: Vec<Candidate> = Vec::new();

        for c in sorted {
            if selected.len() >= m {
                discarded.push(c);
                continue;
            }
            let keeps_diversity = selected
                .iter()
                .all(|s| c.distance < self.node_distance(c.id, s.id));
            if keeps_diversity {
                selected.push(c);
            } else {
                discarded.push(c);
            }
        }

        if selected.len() < m {
            discarded.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
            for c in discarded {
                if selected.len() >= m {
                    break;
                }
                selected.push(c);
            }
        }

        selected.into_iter().map(|c| c.id).collect()
    }

    /// The classic HNSW `INSERT(q)` procedure.
    pub fn insert(&mut self, id: u64, vector: Vector) -> Result<()> {
        if vector.dimension() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: vector.dimension(),
            });
        }

        let level = self.random_level();
        let query = vector.as_slice().to_vec();

        if self.entry_point.is_none() {
            self.nodes.insert(id, Node::new(vector, level));
            self.entry_point = Some(id);
            self.top_level = level;
            return Ok(());
        }

        self.nodes.insert(id, Node::new(vector, level));
        let mut ep = self.entry_point.unwrap();

        for layer in (level + 1..=self.top_level).rev() {
            let found = self.search_layer(&query, &[ep], 1, layer);
            if let Some(best) = found.first() {
                ep = best.id;
            }
        }

        let mut ep_set = vec![ep];
        for layer in (0..=level.min(self.top_level)).rev() {
            let candidates = self.search_layer(&query, &ep_set, self.config.ef_construction, layer);
            let m = self.m_max(layer);
            let selected = self.select_neighbors_heuristic(&candidates, m);

            for &neighbor in &selected {
                self.link(id, neighbor, layer);
                self.link(neighbor, id, layer);

                let neighbor_degree = self.nodes[&neighbor].neighbors[layer].len();
                if neighbor_degree > m {
                    let neighbor_vector = self.nodes[&neighbor].vector.as_slice().to_vec();
                    let neighbor_candidates: Vec<Candidate> = self.nodes[&neighbor].neighbors[layer]
                        .iter()
                        .map(|&nid| Candidate {
                            id: nid,
                            distance: {
                                let raw = self.config.metric.score(&neighbor_vector, self.nodes[&nid].vector.as_slice());
                                if self.config.metric.lower_is_closer() {
                                    raw
                                } else {
                                    -raw
                                }
                            },
                        })
                        .collect();
                    let pruned: HashSet<u64> =
                        self.select_neighbors_heuristic(&neighbor_candidates, m).into_iter().collect();
                    let to_drop: Vec<u64> = self.nodes[&neighbor].neighbors[layer]
                        .iter()
                        .copied()
                        .filter(|nid| !pruned.contains(nid))
                        .collect();
                    for dropped in to_drop {
                        self.unlink(neighbor, dropped, layer);
                    }
                }
            }

            ep_set = candidates.iter().map(|c| c.id).collect();
        }

        if level > self.top_level {
            self.entry_point = Some(id);
            self.top_level = level;
        }

        Ok(())
    }

    /// The classic HNSW `K-NN-SEARCH(q, k, ef)` procedure.
    pub fn search(&self, query: &[f32], k: usize, ef: Option<usize>) -> Result<Vec<IndexSearchResult>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        let Some(entry_point) = self.entry_point else {
            return Err(Error::EmptyGraph);
        };

        let ef = ef.unwrap_or(self.config.ef_search).max(k);
        let mut ep = entry_point;
        for layer in (1..=self.top_level).rev() {
            let found = self.search_layer(query, &[ep], 1, layer);
            if let Some(best) = found.first() {
                ep = best.id;
            }
        }

        let candidates = self.search_layer(query, &[ep], ef, 0);
        Ok(candidates
            .into_iter()
            .take(k)
            .map(|c| IndexSearchResult {
                id: c.id,
                score: if self.config.metric.lower_is_closer() {
                    c.distance
                } else {
                    -c.distance
                },
            })
            .collect())
    }

    pub fn get(&self, id: u64) -> Option<&Vector> {
        self.nodes.get(&id).map(|n| &n.vector)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Removes a node and repairs every neighbor's adjacency list.
    pub fn delete(&mut self, id: u64) -> Result<()> {
        let node = self.nodes.remove(&id).ok_or(Error::UnknownNodeId(id))?;

        for &referrer in &node.back_links {
            if let Some(r) = self.nodes.get_mut(&referrer) {
                for layer in r.neighbors.iter_mut() {
                    layer.remove(&id);
                }
            }
        }
        // The removed node might also reference others; nothing further to
        // do for those edges since the node itself is gone.

        if self.entry_point == Some(id) {
            self.entry_point = self
                .nodes
                .iter()
                .map(|(&nid, n)| (n.level, nid))
                .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
                .map(|(_, nid)| nid);
            self.top_level = self.entry_point.map(|ep| self.nodes[&ep].level).unwrap_or(0);
        }

        Ok(())
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.entry_point = None;
        self.top_level = 0;
    }

    /// Exports the full graph state for snapshotting: node ids, vectors,
    /// per-layer adjacency, entry point, and top level. Back-links
    /// aren't included since they're fully determined by `neighbors` and are
    /// rebuilt by [`Self::import`].
    pub fn export(&self) -> HnswSnapshot {
        let nodes = self
            .nodes
            .iter()
            .map(|(&id, node)| HnswNodeSnapshot {
                id,
                vector: node.vector.as_slice().to_vec(),
                level: node.level,
                neighbors: node
                    .neighbors
                    .iter()
                    .map(|layer| layer.iter().copied().collect())
                    .collect(),
            })
            .collect();
        HnswSnapshot {
            dimension: self.dimension,
            config: self.config.clone(),
            entry_point: self.entry_point,
            top_level: self.top_level,
            nodes,
        }
    }

    /// Rebuilds a graph from an exported snapshot without replaying inserts.
    /// Back-links are derived from the adjacency lists so the result is
    /// identical to one built by `insert` in the original order.
    pub fn import(snapshot: HnswSnapshot) -> Result<Self> {
        let mut index = Self::new(snapshot.dimension, snapshot.config);
        let mut nodes = HashMap::new();
        for n in &snapshot.nodes {
            let vector = Vector::new(n.vector.clone())?;
            nodes.insert(
                n.id,
                Node {
                    vector,
                    level: n.level,
                    neighbors: n
                        .neighbors
                        .iter()
                        .map(|layer| layer.iter().copied().collect())
                        .collect(),
                    back_links: HashSet::new(),
                },
            );
        }
        for n in &snapshot.nodes {
            for layer in &n.neighbors {
                for &to in layer {
                    if let Some(target) = nodes.get_mut(&to) {
                        target.back_links.insert(n.id);
                    }
                }
            }
        }
        index.nodes = nodes;
        index.entry_point = snapshot.entry_point;
        index.top_level = snapshot.top_level;
        Ok(index)
    }
}

/// A snapshot of one HNSW node: id, vector, level, and per-layer adjacency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswNodeSnapshot {
    pub id: u64,
    pub vector: Vec<f32>,
    pub level: usize,
    pub neighbors: Vec<Vec<u64>>,
}

/// A full exported HNSW graph, as persisted by [`crate::snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswSnapshot {
    pub dimension: usize,
    pub config: HnswConfig,
    pub entry_point: Option<u64>,
    pub top_level: usize,
    pub nodes: Vec<HnswNodeSnapshot>,
}
