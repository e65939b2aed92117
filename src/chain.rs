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

//! What the surviving nets already reveal about signal flow between cells.
//! Feeding a cell's transitive driver from its own output would close a
//! combinational loop, so the matrix consults this chain before admitting a
//! source/sink pair.

use crate::layout::{Layout, Library, PinDirection};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Per-cell feeder graph derived from the observed nets.
pub type FeederGraph = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug)]
pub struct Chain {
    feeders: FeederGraph,
}

impl Chain {
    /// Records, for every cell with an INPUT pin on a surviving net, each
    /// other cell contributing an OUTPUT pin to the same net. Primary pins
    /// never become feeders.
    pub fn build(layout: &Layout, library: &Library) -> Chain {
        let mut feeders: FeederGraph = BTreeMap::new();
        for net in &layout.nets {
            let mut driving = Vec::new();
            let mut driven = Vec::new();
            for cp in &net.comp_pins {
                if cp.is_primary() {
                    continue;
                }
                let comp = layout.component(&cp.instance).unwrap();
                let mac = library.macro_def(&comp.macro_name).unwrap();
                match mac.pin(&cp.pin).unwrap().direction {
                    PinDirection::Output => driving.push(cp.instance.as_str()),
                    PinDirection::Input => driven.push(cp.instance.as_str()),
                    PinDirection::Inout => {}
                }
            }
            for v in &driven {
                for u in &driving {
                    if u != v {
                        feeders
                            .entry(v.to_string())
                            .or_insert_with(BTreeSet::new)
                            .insert(u.to_string());
                    }
                }
            }
        }
        Chain { feeders }
    }

    pub fn feeders(&self) -> &FeederGraph {
        &self.feeders
    }

    /// Every cell whose output (transitively) reaches an input of `cell`.
    /// Rediscovering `cell` itself means the observed layout already holds a
    /// loop; the walk terminates there instead of recursing forever.
    pub fn upstream(&self, cell: &str) -> BTreeSet<String> {
        let mut reached: BTreeSet<String> = BTreeSet::new();
        let mut stack = vec![cell];
        while let Some(current) = stack.pop() {
            if let Some(nexts) = self.feeders.get(current) {
                for next in nexts {
                    if next == cell || reached.contains(next) {
                        continue;
                    }
                    reached.insert(next.clone());
                    stack.push(next);
                }
            }
        }
        reached
    }
}

/// Searches an arbitrary feeder graph for a cycle; reachability runs first
/// and the cycle cells are recovered afterwards by walking parent pointers.
pub fn find_cycle(graph: &FeederGraph) -> Option<Vec<String>> {
    const UNSEEN: u8 = 0;
    const OPEN: u8 = 1;
    const DONE: u8 = 2;

    let mut state: HashMap<&str, u8> = HashMap::new();
    for root in graph.keys() {
        if *state.get(root.as_str()).unwrap_or(&UNSEEN) != UNSEEN {
            continue;
        }
        let mut parent: HashMap<&str, &str> = HashMap::new();
        // Each stack entry is (node, entered); a node is pushed twice so it
        // can be closed after its children are explored.
        let mut stack: Vec<(&str, bool)> = vec![(root.as_str(), false)];
        while let Some((node, entered)) = stack.pop() {
            if entered {
                state.insert(node, DONE);
                continue;
            }
            if *state.get(node).unwrap_or(&UNSEEN) != UNSEEN {
                continue;
            }
            state.insert(node, OPEN);
            stack.push((node, true));
            if let Some(nexts) = graph.get(node) {
                for next in nexts {
                    match *state.get(next.as_str()).unwrap_or(&UNSEEN) {
                        OPEN => {
                            // Back edge: walk parents from `node` to `next`.
                            let mut cycle = vec![next.to_string()];
                            let mut walk = node;
                            while walk != next {
                                cycle.push(walk.to_string());
                                walk = parent[walk];
                            }
                            cycle.reverse();
                            return Some(cycle);
                        }
                        UNSEEN => {
                            parent.insert(next.as_str(), node);
                            stack.push((next.as_str(), false));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::{die, inv_library};
    use crate::layout::{Component, Layout, Net, PinRef, Point};

    fn inv(id: &str) -> Component {
        Component {
            id: id.to_string(),
            macro_name: "INV_X1".to_string(),
            placed: Point::new(0, 0),
            orient: "N".to_string(),
        }
    }

    fn net(name: &str, pins: &[(&str, &str)]) -> Net {
        Net {
            name: name.to_string(),
            comp_pins: pins
                .iter()
                .map(|&(inst, pin)| {
                    if inst == "PIN" {
                        PinRef::primary(pin)
                    } else {
                        PinRef::cell(inst, pin)
                    }
                })
                .collect(),
            routes: Vec::new(),
        }
    }

    fn chain_of(nets: Vec<Net>, insts: &[&str]) -> Chain {
        let lib = inv_library();
        let layout = Layout::build(
            "top".to_string(),
            "5.7".to_string(),
            2000,
            die(),
            insts.iter().map(|i| inv(i)).collect(),
            Vec::new(),
            nets,
            &lib,
        )
        .unwrap();
        Chain::build(&layout, &lib)
    }

    #[test]
    fn feeders_follow_output_to_input() {
        let chain = chain_of(
            vec![net("x", &[("u1", "Z"), ("u2", "A")])],
            &["u1", "u2"],
        );
        assert!(chain.feeders()["u2"].contains("u1"));
        assert!(!chain.feeders().contains_key("u1"));
    }

    #[test]
    fn primary_pins_do_not_feed() {
        let chain = chain_of(vec![net("x", &[("u1", "A")])], &["u1"]);
        assert!(chain.feeders().is_empty());
    }

    #[test]
    fn upstream_is_transitive() {
        let chain = chain_of(
            vec![
                net("a", &[("u1", "Z"), ("u2", "A")]),
                net("b", &[("u2", "Z"), ("u3", "A")]),
            ],
            &["u1", "u2", "u3"],
        );
        let up = chain.upstream("u3");
        assert!(up.contains("u1") && up.contains("u2"));
        assert!(chain.upstream("u1").is_empty());
    }

    #[test]
    fn upstream_survives_existing_loop() {
        let chain = chain_of(
            vec![
                net("a", &[("u1", "Z"), ("u2", "A")]),
                net("b", &[("u2", "Z"), ("u1", "A")]),
            ],
            &["u1", "u2"],
        );
        // u1 feeds u2 feeds u1; the walk terminates on rediscovery.
        assert_eq!(
            chain.upstream("u1").into_iter().collect::<Vec<_>>(),
            vec!["u2".to_string()]
        );
    }

    #[test]
    fn find_cycle_extracts_participants() {
        let mut graph: FeederGraph = BTreeMap::new();
        graph
            .entry("a".to_string())
            .or_insert_with(BTreeSet::new)
            .insert("b".to_string());
        graph
            .entry("b".to_string())
            .or_insert_with(BTreeSet::new)
            .insert("c".to_string());
        graph
            .entry("c".to_string())
            .or_insert_with(BTreeSet::new)
            .insert("a".to_string());
        let cycle = find_cycle(&graph).unwrap();
        assert_eq!(cycle.len(), 3);
        assert!(cycle.contains(&"a".to_string()));
        assert!(cycle.contains(&"c".to_string()));
    }

    #[test]
    fn find_cycle_none_on_dag() {
        let mut graph: FeederGraph = BTreeMap::new();
        graph
            .entry("a".to_string())
            .or_insert_with(BTreeSet::new)
            .insert("b".to_string());
        graph
            .entry("c".to_string())
            .or_insert_with(BTreeSet::new)
            .insert("b".to_string());
        assert_eq!(find_cycle(&graph), None);
    }
}
