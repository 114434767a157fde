//! A static-style k-d tree, rebuilt lazily when dirty.
//!
//! Splits cycle through dimensions; nearest-N search uses a bounded max-heap
//! plus standard bounding-box pruning. Insert/delete only touch the live-id
//! set and the primary point list; the tree itself is rebuilt on the next
//! search once dirtiness crosses a threshold.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use serde::{Deserialize, Serialize};

use crate::distance::LinearMetric;
use crate::error::{Error, Result};
use crate::index::IndexSearchResult;
use crate::vector::Vector;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdTreeConfig {
    pub dimension: usize,
    pub metric: LinearMetric,
    /// Fraction of points changed since the last rebuild, above which the
    /// next search triggers a rebuild instead of scanning the pending set.
    pub dirty_threshold: f64,
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        Self {
            dimension: 0,
            metric: LinearMetric::Euclidean,
            dirty_threshold: 0.10,
        }
    }
}

#[derive(Debug, Clone)]
struct Point {
    id: u64,
    vector: Vector,
}

#[derive(Debug)]
enum TreeNode {
    Leaf,
    Branch {
        point: Point,
        axis: usize,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    id: u64,
    distance: f32,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    // Max-heap: furthest entry surfaces first, so it's the one evicted.
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.partial_cmp(&other.distance).unwrap_or(Ordering::Equal)
    }
}

/// A k-d tree over a fixed-dimension point set.
pub struct KdTree {
    config: KdTreeConfig,
    root: TreeNode,
    /// The point set the current `root` was built from.
    points: Vec<Point>,
    /// Ids currently live, independent of whether `root` has been rebuilt
    /// since their insertion/removal. A stale `root` can still reference a
    /// deleted id between rebuilds; search filters against this set so a
    /// deleted point never surfaces before the next rebuild.
    live_ids: HashSet<u64>,
    /// Dirty deltas accumulated since the last rebuild.
    dirty_count: usize,
}

impl KdTree {
    pub fn new(config: KdTreeConfig) -> Self {
        Self {
            config,
            root: TreeNode::Leaf,
            points: Vec::new(),
            live_ids: HashSet::new(),
            dirty_count: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn config_clone(&self) -> KdTreeConfig {
        self.config.clone()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn is_dirty_over_threshold(&self) -> bool {
        if self.points.is_empty() {
            return false;
        }
        self.dirty_count as f64 / self.points.len() as f64 > self.config.dirty_threshold
    }

    /// Marks a point inserted; schedules a rebuild once dirtiness exceeds
    /// the configured threshold.
    pub fn insert(&mut self, id: u64, vector: Vector) -> Result<()> {
        if vector.dimension() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                got: vector.dimension(),
            });
        }
        self.points.push(Point { id, vector });
        self.live_ids.insert(id);
        self.dirty_count += 1;
        if self.is_dirty_over_threshold() {
            self.rebuild();
        }
        Ok(())
    }

    pub fn delete(&mut self, id: u64) -> bool {
        let before = self.points.len();
        self.points.retain(|p| p.id != id);
        let removed = self.points.len() != before;
        if removed {
            self.live_ids.remove(&id);
            self.dirty_count += 1;
            if self.is_dirty_over_threshold() {
                self.rebuild();
            }
        }
        removed
    }

    pub fn contains(&self, id: u64) -> bool {
        self.live_ids.contains(&id)
    }

    pub fn get(&self, id: u64) -> Option<&Vector> {
        self.points.iter().find(|p| p.id == id).map(|p| &p.vector)
    }

    fn rebuild(&mut self) {
        self.root = Self::build(self.points.clone(), 0, self.config.dimension);
        self.dirty_count = 0;
    }

    fn build(mut points: Vec<Point>, depth: usize, dimension: usize) -> TreeNode {
        if points.is_empty() {
            return TreeNode::Leaf;
        }
        let axis = depth % dimension;
        points.sort_by(|a, b| {
            a.vector.as_slice()[axis]
                .partial_cmp(&b.vector.as_slice()[axis])
                .unwrap_or(Ordering::Equal)
        });
        let median = points.len() / 2;
        let right_half = points.split_off(median + 1);
        let point = points.pop().unwrap();
        let left_half = points;

        TreeNode::Branch {
            point,
            axis,
            left: Box::new(Self::build(left_half, depth + 1, dimension)),
            right: Box::new(Self::build(right_half, depth + 1, dimension)),
        }
    }

    /// Ensures the tree reflects the current point set before a search: if
    /// dirtiness is over the threshold (e.g. the tree was never built, or
    /// deletes/inserts accumulated without crossing the threshold at the
    /// time they happened but the tree is still stale), rebuild now.
    fn ensure_fresh(&mut self) {
        if matches!(self.root, TreeNode::Leaf) && !self.points.is_empty() {
            self.rebuild();
            return;
        }
        if self.is_dirty_over_threshold() {
            self.rebuild();
        }
    }

    pub fn search(&mut self, query: &[f32], k: usize) -> Result<Vec<IndexSearchResult>> {
        if query.len() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                got: query.len(),
            });
        }
        if self.points.is_empty() {
            return Err(Error::EmptyGraph);
        }

        self.ensure_fresh();

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        Self::search_node(&self.root, query, k, &self.config.metric, &self.live_ids, &mut heap);

        let mut results: Vec<HeapEntry> = heap.into_iter().collect();
        results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        let lower_is_closer = self.config.metric.lower_is_closer();
        Ok(results
            .into_iter()
            .map(|e| IndexSearchResult {
                id: e.id,
                score: if lower_is_closer { e.distance } else { -e.distance },
            })
            .collect())
    }

    fn search_node(
        node: &TreeNode,
        query: &[f32],
        k: usize,
        metric: &LinearMetric,
        live_ids: &HashSet<u64>,
        heap: &mut BinaryHeap<HeapEntry>,
    ) {
        let TreeNode::Branch { point, axis, left, right } = node else {
            return;
        };

        if live_ids.contains(&point.id) {
            let raw = metric.score(query, point.vector.as_slice());
            let distance = if metric.lower_is_closer() { raw } else { -raw };

            if heap.len() < k {
                heap.push(HeapEntry { id: point.id, distance });
            } else if let Some(worst) = heap.peek() {
                if distance < worst.distance {
                    heap.pop();
                    heap.push(HeapEntry { id: point.id, distance });
                }
            }
        }

        let diff = query[*axis] - point.vector.as_slice()[*axis];
        let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };

        Self::search_node(near, query, k, metric, live_ids, heap);

        // Bounding-box pruning: only descend into the far side if the
        // splitting plane is closer than the current worst kept distance.
        let plane_distance = diff.abs();
        let should_explore_far = heap.len() < k
            || heap
                .peek()
                .map(|worst| plane_distance < worst.distance.abs() || !metric.lower_is_closer())
                .unwrap_or(true);
        if should_explore_far {
            Self::search_node(far, query, k, metric, live_ids, heap);
        }
    }

    pub fn clear(&mut self) {
        self.root = TreeNode::Leaf;
        self.points.clear();
        self.live_ids.clear();
        self.dirty_count = 0;
    }

    /// All live `(id, vector)` pairs, in insertion order. The tree itself is
    /// rebuilt lazily, so a snapshot only needs the point set plus the
    /// config; [`KdTree::new`] followed by repeated [`Self::insert`]
    /// reconstructs an equivalent tree.
    pub fn export_points(&self) -> Vec<(u64, Vec<f32>)> {
        self.points
            .iter()
            .filter(|p| self.live_ids.contains(&p.id))
            .map(|p| (p.id, p.vector.as_slice().to_vec()))
            .collect()
    }
}
