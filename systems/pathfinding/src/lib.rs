#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic A* path engine with a closest-empty-tile fallback.

use std::{cmp::Reverse, collections::BinaryHeap};

use garrison_core::{CellCoord, CellGraphView};
use log::{debug, error};
use thiserror::Error;

const DEFAULT_MAX_RECONSTRUCTION_STEPS: usize = 100;

/// Configuration parameters that bound path searches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    max_reconstruction_steps: usize,
}

impl Config {
    /// Creates a new configuration with the provided reconstruction bound.
    #[must_use]
    pub const fn new(max_reconstruction_steps: usize) -> Self {
        Self {
            max_reconstruction_steps,
        }
    }

    /// Maximum number of predecessor links followed while rebuilding a path.
    #[must_use]
    pub const fn max_reconstruction_steps(&self) -> usize {
        self.max_reconstruction_steps
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECONSTRUCTION_STEPS)
    }
}

/// Broken search bookkeeping detected while rebuilding a path.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The predecessor chain was longer than the configured bound.
    #[error("path from {start:?} to {goal:?} exceeded {limit} reconstruction steps")]
    ReconstructionOverflow {
        /// Cell the search started from.
        start: CellCoord,
        /// Cell the search reached.
        goal: CellCoord,
        /// Configured reconstruction bound.
        limit: usize,
    },
    /// A reached cell had no predecessor leading back to the start.
    #[error("predecessor chain from {goal:?} ended before reaching {start:?}")]
    BrokenChain {
        /// Cell the search started from.
        start: CellCoord,
        /// Cell the search reached.
        goal: CellCoord,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeState {
    Unseen,
    Open,
    Closed,
}

#[derive(Clone, Copy, Debug)]
struct NodeRecord {
    g: u32,
    h: u32,
    predecessor: Option<CellCoord>,
    order: u64,
    state: NodeState,
}

impl NodeRecord {
    const UNSEEN: Self = Self {
        g: 0,
        h: 0,
        predecessor: None,
        order: 0,
        state: NodeState::Unseen,
    };
}

/// Open-list entry ordered by total cost, then heuristic, then insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct OpenEntry {
    f: u32,
    h: u32,
    order: u64,
    index: usize,
    cell: CellCoord,
}

/// Per-search scratch storage reused across searches.
///
/// Every search starts from fresh costs and predecessors; nothing leaks from
/// one query into the next.
#[derive(Clone, Debug, Default)]
pub struct SearchArena {
    nodes: Vec<NodeRecord>,
    open: BinaryHeap<Reverse<OpenEntry>>,
    next_order: u64,
}

impl SearchArena {
    fn reset(&mut self, cell_count: usize) {
        self.nodes.clear();
        self.nodes.resize(cell_count, NodeRecord::UNSEEN);
        self.open.clear();
        self.next_order = 0;
    }

    fn open(&mut self, index: usize, cell: CellCoord, g: u32, h: u32, from: Option<CellCoord>) {
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        if node.state == NodeState::Unseen {
            node.order = self.next_order;
            node.h = h;
            self.next_order += 1;
        }
        node.g = g;
        node.predecessor = from;
        node.state = NodeState::Open;
        self.open.push(Reverse(OpenEntry {
            f: g.saturating_add(node.h),
            h: node.h,
            order: node.order,
            index,
            cell,
        }));
    }

    fn pop(&mut self) -> Option<OpenEntry> {
        while let Some(Reverse(entry)) = self.open.pop() {
            let Some(node) = self.nodes.get_mut(entry.index) else {
                continue;
            };
            if node.state != NodeState::Open || node.g.saturating_add(node.h) != entry.f {
                continue;
            }
            node.state = NodeState::Closed;
            return Some(entry);
        }
        None
    }

    fn node(&self, index: usize) -> Option<&NodeRecord> {
        self.nodes.get(index)
    }
}

/// Path engine that owns its configuration and reusable search storage.
#[derive(Clone, Debug, Default)]
pub struct PathEngine {
    config: Config,
    arena: SearchArena,
}

impl PathEngine {
    /// Creates a new engine using the provided configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            arena: SearchArena::default(),
        }
    }

    /// Finds a route from `start` to `goal`.
    ///
    /// The returned path excludes `start` and ends at the reached cell. When
    /// `goal` cannot be reached the engine retries once towards the closest
    /// empty cell next to it.
    pub fn find_path<G>(
        &mut self,
        graph: &G,
        start: CellCoord,
        goal: CellCoord,
    ) -> Result<Option<Vec<CellCoord>>, PathError>
    where
        G: CellGraphView + ?Sized,
    {
        if let Some(path) = self.search(graph, start, goal)? {
            return Ok(Some(path));
        }

        let Some(closest) = self.find_closest_empty_tile(graph, start, &[goal])? else {
            debug!("no route from {start:?} towards {goal:?}");
            return Ok(None);
        };
        debug!("{goal:?} unreachable from {start:?}, settling for {closest:?}");
        self.search(graph, start, closest)
    }

    /// Finds the empty cell bordering `footprint` with the shortest route from `start`.
    ///
    /// `start` itself counts as a candidate when it borders the footprint, in
    /// which case the unit is already in place. Candidate routes never fall
    /// back further.
    pub fn find_closest_empty_tile<G>(
        &mut self,
        graph: &G,
        start: CellCoord,
        footprint: &[CellCoord],
    ) -> Result<Option<CellCoord>, PathError>
    where
        G: CellGraphView + ?Sized,
    {
        let mut candidates: Vec<CellCoord> = Vec::new();
        for cell in footprint {
            for &neighbor in graph.neighbors(*cell) {
                if (neighbor == start || graph.is_walkable(neighbor))
                    && !candidates.contains(&neighbor)
                {
                    candidates.push(neighbor);
                }
            }
        }

        let mut closest: Option<(usize, CellCoord)> = None;
        for candidate in candidates {
            let Some(path) = self.search(graph, start, candidate)? else {
                continue;
            };
            if closest.map_or(true, |(length, _)| path.len() < length) {
                closest = Some((path.len(), candidate));
            }
        }

        Ok(closest.map(|(_, cell)| cell))
    }

    fn search<G>(
        &mut self,
        graph: &G,
        start: CellCoord,
        goal: CellCoord,
    ) -> Result<Option<Vec<CellCoord>>, PathError>
    where
        G: CellGraphView + ?Sized,
    {
        if start == goal {
            return Ok(Some(Vec::new()));
        }
        let (Some(start_index), Some(_)) = (graph.index(start), graph.index(goal)) else {
            return Ok(None);
        };

        self.arena.reset(graph.cell_count());
        self.arena
            .open(start_index, start, 0, start.octile_distance(goal), None);

        while let Some(current) = self.arena.pop() {
            if current.cell == goal {
                return self.reconstruct(graph, start, goal).map(Some);
            }

            let current_g = self
                .arena
                .node(current.index)
                .map_or(0, |node| node.g);

            for &neighbor in graph.neighbors(current.cell) {
                if !graph.is_walkable(neighbor) {
                    continue;
                }
                let Some(index) = graph.index(neighbor) else {
                    continue;
                };
                let Some(node) = self.arena.node(index) else {
                    continue;
                };

                let cost = current_g.saturating_add(current.cell.octile_distance(neighbor));
                let improves = match node.state {
                    NodeState::Closed => false,
                    NodeState::Unseen => true,
                    NodeState::Open => cost < node.g,
                };
                if improves {
                    self.arena.open(
                        index,
                        neighbor,
                        cost,
                        neighbor.octile_distance(goal),
                        Some(current.cell),
                    );
                }
            }
        }

        Ok(None)
    }

    fn reconstruct<G>(
        &self,
        graph: &G,
        start: CellCoord,
        goal: CellCoord,
    ) -> Result<Vec<CellCoord>, PathError>
    where
        G: CellGraphView + ?Sized,
    {
        let limit = self.config.max_reconstruction_steps();
        let mut path = Vec::new();
        let mut cursor = goal;

        while cursor != start {
            if path.len() >= limit {
                error!("path from {start:?} to {goal:?} exceeded {limit} reconstruction steps");
                return Err(PathError::ReconstructionOverflow { start, goal, limit });
            }
            path.push(cursor);
            cursor = graph
                .index(cursor)
                .and_then(|index| self.arena.node(index))
                .and_then(|node| node.predecessor)
                .ok_or(PathError::BrokenChain { start, goal })?;
        }

        path.reverse();
        Ok(path)
    }
}

/// Finds a route using a default-configured engine.
pub fn find_path<G>(
    graph: &G,
    start: CellCoord,
    goal: CellCoord,
) -> Result<Option<Vec<CellCoord>>, PathError>
where
    G: CellGraphView + ?Sized,
{
    PathEngine::default().find_path(graph, start, goal)
}

/// Finds the closest empty cell bordering `footprint` using a default-configured engine.
pub fn find_closest_empty_tile<G>(
    graph: &G,
    start: CellCoord,
    footprint: &[CellCoord],
) -> Result<Option<CellCoord>, PathError>
where
    G: CellGraphView + ?Sized,
{
    PathEngine::default().find_closest_empty_tile(graph, start, footprint)
}
