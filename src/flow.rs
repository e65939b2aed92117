// Copyright 2019 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Min-cost max-flow over the bipartite source/sink graph. The solver is a
//! plain successive-shortest-path implementation; edges are scanned in
//! insertion order on every relaxation, so equal-cost alternatives always
//! resolve the same way.

#[derive(Debug)]
struct Arc {
    to: usize,
    cap: u64,
    cost: i64,
}

/// Edge handle returned by [`FlowNetwork::add_edge`].
#[derive(Debug, Copy, Clone)]
pub struct EdgeId(usize);

#[derive(Debug, Default)]
pub struct FlowNetwork {
    arcs: Vec<Arc>,
    adj: Vec<Vec<usize>>,
}

impl FlowNetwork {
    pub fn new() -> Self {
        FlowNetwork {
            arcs: Vec::new(),
            adj: Vec::new(),
        }
    }

    pub fn add_node(&mut self) -> usize {
        self.adj.push(Vec::new());
        self.adj.len() - 1
    }

    pub fn add_edge(&mut self, from: usize, to: usize, cap: u64, cost: u64) -> EdgeId {
        let id = self.arcs.len();
        self.adj[from].push(id);
        self.arcs.push(Arc {
            to,
            cap,
            cost: cost as i64,
        });
        self.adj[to].push(id + 1);
        self.arcs.push(Arc {
            to: from,
            cap: 0,
            cost: -(cost as i64),
        });
        EdgeId(id)
    }

    /// Flow pushed through an edge so far (the residual gained by its
    /// reverse arc).
    pub fn flow(&self, e: EdgeId) -> u64 {
        self.arcs[e.0 + 1].cap
    }

    /// Augments along shortest (by cost) residual paths until the sink is
    /// unreachable. Returns `(max_flow, total_cost)`.
    pub fn solve(&mut self, src: usize, snk: usize) -> (u64, u64) {
        let n = self.adj.len();
        let mut total_flow = 0u64;
        let mut total_cost = 0u64;

        loop {
            // Bellman-Ford; all original costs are non-negative, so the
            // residual network never holds a negative cycle.
            let mut dist = vec![i64::MAX; n];
            let mut pre: Vec<Option<usize>> = vec![None; n];
            dist[src] = 0;
            let mut changed = true;
            while changed {
                changed = false;
                for u in 0..n {
                    if dist[u] == i64::MAX {
                        continue;
                    }
                    for &ai in &self.adj[u] {
                        let arc = &self.arcs[ai];
                        if arc.cap > 0 && dist[u] + arc.cost < dist[arc.to] {
                            dist[arc.to] = dist[u] + arc.cost;
                            pre[arc.to] = Some(ai);
                            changed = true;
                        }
                    }
                }
            }
            if dist[snk] == i64::MAX {
                return (total_flow, total_cost);
            }

            let mut push = u64::MAX;
            let mut v = snk;
            while v != src {
                let ai = pre[v].unwrap();
                push = push.min(self.arcs[ai].cap);
                v = self.arcs[ai ^ 1].to;
            }
            let mut v = snk;
            while v != src {
                let ai = pre[v].unwrap();
                self.arcs[ai].cap -= push;
                self.arcs[ai ^ 1].cap += push;
                v = self.arcs[ai ^ 1].to;
            }
            total_flow += push;
            total_cost += push * dist[snk] as u64;
        }
    }
}

/// One inferred connection, in source/sink list indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub source: usize,
    pub sink: usize,
    pub dist: u64,
}

#[derive(Debug)]
pub struct Reconstruction {
    pub chosen: Vec<Assignment>,
    /// Sink indices the flow could not saturate.
    pub unresolved: Vec<usize>,
    pub flow: u64,
    pub cost: u64,
}

/// Builds the flow network for a feasibility matrix and reads the chosen
/// pairs back out. `order` fixes the insertion order of the pair edges (and
/// with it the tie-break); pass the index pairs sorted however ties should
/// resolve.
pub fn solve_assignment(
    matrix: &[Vec<Option<u64>>],
    n_sinks: usize,
    order: &[(usize, usize)],
    source_cap: u64,
) -> Reconstruction {
    let n_sources = matrix.len();

    let mut g = FlowNetwork::new();
    let super_src = g.add_node();
    let super_snk = g.add_node();
    let source_nodes: Vec<usize> = (0..n_sources).map(|_| g.add_node()).collect();
    let sink_nodes: Vec<usize> = (0..n_sinks).map(|_| g.add_node()).collect();

    for &node in &source_nodes {
        g.add_edge(super_src, node, source_cap, 0);
    }
    let mut pair_edges = Vec::new();
    for &(i, j) in order {
        if let Some(d) = matrix[i][j] {
            let e = g.add_edge(source_nodes[i], sink_nodes[j], 1, d);
            pair_edges.push((i, j, d, e));
        }
    }
    let sink_edges: Vec<EdgeId> = sink_nodes
        .iter()
        .map(|&node| g.add_edge(node, super_snk, 1, 0))
        .collect();

    let (flow, cost) = g.solve(super_src, super_snk);

    let chosen = pair_edges
        .iter()
        .filter(|(_, _, _, e)| g.flow(*e) > 0)
        .map(|&(source, sink, dist, _)| Assignment { source, sink, dist })
        .collect();
    let unresolved = sink_edges
        .iter()
        .enumerate()
        .filter(|(_, e)| g.flow(**e) == 0)
        .map(|(j, _)| j)
        .collect();

    Reconstruction {
        chosen,
        unresolved,
        flow,
        cost,
    }
}
