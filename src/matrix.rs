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

//! Feasibility and cost for every (source pin, sink pin) pair. `None` marks
//! a pair that must not be wired; `Some(d)` is the Manhattan distance
//! between the closest anchor points of the two nets.

use crate::chain::Chain;
use crate::geometry::NetGeometry;
use crate::layout::PinRef;
use itertools::iproduct;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};

pub struct MatrixInputs<'a> {
    pub sources: &'a [PinRef],
    pub sinks: &'a [PinRef],
    /// Index of the net carrying each classified pin.
    pub pin_net: &'a HashMap<PinRef, usize>,
    /// Component/pin list per net, aligned with `geometry`.
    pub net_pins: &'a [Vec<PinRef>],
    pub geometry: &'a [NetGeometry],
    pub primary_inputs: &'a HashSet<PinRef>,
    pub primary_outputs: &'a HashSet<PinRef>,
    pub chain: &'a Chain,
}

/// Sinks whose net already carries a source pin: the FEOL view alone proves
/// their driver.
pub fn done_sinks(inputs: &MatrixInputs) -> Vec<bool> {
    let source_set: HashSet<&PinRef> = inputs.sources.iter().collect();
    inputs
        .sinks
        .iter()
        .map(|k| {
            inputs.net_pins[inputs.pin_net[k]]
                .iter()
                .any(|cp| source_set.contains(cp))
        })
        .collect()
}

fn wires_can_meet(a: &NetGeometry, b: &NetGeometry) -> bool {
    a.end_points
        .iter()
        .any(|p| b.rects.iter().any(|r| r.contains(*p)))
        && b.end_points
            .iter()
            .any(|p| a.rects.iter().any(|r| r.contains(*p)))
}

fn closest_anchor_distance(a: &NetGeometry, b: &NetGeometry) -> Option<u64> {
    iproduct!(a.anchors(), b.anchors())
        .map(|(p, q)| p.manhattan(*q))
        .min()
}

/// Builds the dense matrix, one row per source. Rows are independent, so
/// they are filled in parallel; the row order itself is fixed by the source
/// list.
pub fn build(inputs: &MatrixInputs, done: &[bool]) -> Vec<Vec<Option<u64>>> {
    inputs
        .sources
        .par_iter()
        .map(|s| {
            let s_net = inputs.pin_net[s];

            // Cells this source must not feed: everything already upstream
            // of its own cell, plus everything sharing its net. The source's
            // own cell is exempt.
            let mut forbidden: BTreeSet<String> = inputs.chain.upstream(&s.instance);
            for cp in &inputs.net_pins[s_net] {
                if !cp.is_primary() {
                    forbidden.insert(cp.instance.clone());
                }
            }
            forbidden.remove(&s.instance);

            inputs
                .sinks
                .iter()
                .enumerate()
                .map(|(j, k)| {
                    let k_net = inputs.pin_net[k];
                    if done[j] {
                        // Already wired: forced at zero cost for the real
                        // driver, closed for everyone else.
                        if inputs.net_pins[k_net].contains(s) {
                            Some(0)
                        } else {
                            None
                        }
                    } else if inputs.primary_inputs.contains(s)
                        && inputs.primary_outputs.contains(k)
                    {
                        // At least one gate must sit between primary I/O.
                        None
                    } else if !k.is_primary() && forbidden.contains(&k.instance) {
                        None
                    } else if !wires_can_meet(&inputs.geometry[s_net], &inputs.geometry[k_net]) {
                        None
                    } else {
                        closest_anchor_distance(
                            &inputs.geometry[s_net],
                            &inputs.geometry[k_net],
                        )
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry;
    use crate::layout::tests::{die, inv_library};
    use crate::layout::{
        Component, IoPin, Layer, Layout, Net, PinDirection, Point, RouteSegment, Via,
    };

    // Inverter chain u1 -> u2 -> u3 where the u1->u2 and u2->u3 nets
    // survived, plus primary input P, primary output Q, and dangling stubs
    // for everything else:
    //
    //   P (0,0)  u1.A (10,0)  u1.Z/u2.A (20,0)  u2.Z/u3.A (25,0)
    //   u3.Z (30,0)  Q (40,0)
    fn fixture() -> (Layout, Vec<PinRef>, Vec<PinRef>) {
        let lib = inv_library();
        let comps = ["u1", "u2", "u3"]
            .iter()
            .enumerate()
            .map(|(i, id)| Component {
                id: id.to_string(),
                macro_name: "INV_X1".to_string(),
                placed: Point::new(10 * i as i64, 0),
                orient: "N".to_string(),
            })
            .collect();
        let io_pins = vec![
            IoPin {
                name: "P".to_string(),
                net: "P".to_string(),
                direction: PinDirection::Input,
                layer: Layer(1),
                placed: Point::new(0, 0),
            },
            IoPin {
                name: "Q".to_string(),
                net: "Q".to_string(),
                direction: PinDirection::Output,
                layer: Layer(1),
                placed: Point::new(40, 0),
            },
        ];
        let stub = |tag: &str, x: i64| RouteSegment {
            layer: Layer(1),
            points: vec![Point::new(x, 0)],
            end_via: Some(Via {
                name: format!("via1_{}", tag),
                at: Point::new(x, 0),
            }),
        };
        let nets = vec![
            Net {
                name: "P".to_string(),
                comp_pins: vec![PinRef::primary("P")],
                routes: vec![stub("p", 0)],
            },
            Net {
                name: "u1a".to_string(),
                comp_pins: vec![PinRef::cell("u1", "A")],
                routes: vec![stub("a", 10)],
            },
            Net {
                name: "w1".to_string(),
                comp_pins: vec![PinRef::cell("u1", "Z"), PinRef::cell("u2", "A")],
                routes: vec![stub("w1", 20)],
            },
            Net {
                name: "w2".to_string(),
                comp_pins: vec![PinRef::cell("u2", "Z"), PinRef::cell("u3", "A")],
                routes: vec![stub("w2", 25)],
            },
            Net {
                name: "u3z".to_string(),
                comp_pins: vec![PinRef::cell("u3", "Z")],
                routes: vec![stub("z", 30)],
            },
            Net {
                name: "Q".to_string(),
                comp_pins: vec![PinRef::primary("Q")],
                routes: vec![stub("q", 40)],
            },
        ];
        let layout = Layout::build(
            "t".to_string(),
            "5.7".to_string(),
            2000,
            die(),
            comps,
            io_pins,
            nets,
            &lib,
        )
        .unwrap();
        let sources = vec![
            PinRef::primary("P"),
            PinRef::cell("u1", "Z"),
            PinRef::cell("u2", "Z"),
            PinRef::cell("u3", "Z"),
        ];
        let sinks = vec![
            PinRef::primary("Q"),
            PinRef::cell("u1", "A"),
            PinRef::cell("u2", "A"),
            PinRef::cell("u3", "A"),
        ];
        (layout, sources, sinks)
    }

    fn matrix_for(
        layout: &Layout,
        sources: &[PinRef],
        sinks: &[PinRef],
    ) -> (Vec<Vec<Option<u64>>>, Vec<bool>) {
        let lib = inv_library();
        let mut pin_net = HashMap::new();
        for (i, net) in layout.nets.iter().enumerate() {
            for cp in &net.comp_pins {
                pin_net.entry(cp.clone()).or_insert(i);
            }
        }
        let geometry: Vec<_> = layout
            .nets
            .iter()
            .map(|n| geometry::analyze(n, layout, Layer(1), true))
            .collect();
        let net_pins: Vec<_> = layout.nets.iter().map(|n| n.comp_pins.clone()).collect();
        let chain = Chain::build(layout, &lib);
        let primary_inputs: HashSet<_> = vec![PinRef::primary("P")].into_iter().collect();
        let primary_outputs: HashSet<_> = vec![PinRef::primary("Q")].into_iter().collect();
        let inputs = MatrixInputs {
            sources,
            sinks,
            pin_net: &pin_net,
            net_pins: &net_pins,
            geometry: &geometry,
            primary_inputs: &primary_inputs,
            primary_outputs: &primary_outputs,
            chain: &chain,
        };
        let done = done_sinks(&inputs);
        let matrix = build(&inputs, &done);
        (matrix, done)
    }

    #[test]
    fn done_sink_forces_existing_driver() {
        let (layout, sources, sinks) = fixture();
        let (matrix, done) = matrix_for(&layout, &sources, &sinks);
        // u2.A shares net w1 with source u1.Z; u3.A shares w2 with u2.Z.
        assert_eq!(done, vec![false, false, true, true]);
        assert_eq!(matrix[1][2], Some(0));
        assert_eq!(matrix[2][3], Some(0));
        // Nobody else may claim a done sink.
        assert_eq!(matrix[0][2], None);
        assert_eq!(matrix[3][2], None);
    }

    #[test]
    fn primary_input_never_meets_primary_output() {
        let (layout, sources, sinks) = fixture();
        let (matrix, _) = matrix_for(&layout, &sources, &sinks);
        assert_eq!(matrix[0][0], None);
    }

    #[test]
    fn upstream_cell_is_forbidden_sink() {
        let (layout, sources, sinks) = fixture();
        let (matrix, _) = matrix_for(&layout, &sources, &sinks);
        // u3's driver chain is u1 -> u2 -> u3; wiring u3.Z back into u1.A
        // would close a combinational loop.
        assert_eq!(matrix[3][1], None);
        // The source's own cell is exempt from the forbidden set.
        assert_eq!(matrix[1][1], Some(10));
    }

    #[test]
    fn distance_is_closest_anchor_manhattan() {
        let (layout, sources, sinks) = fixture();
        let (matrix, _) = matrix_for(&layout, &sources, &sinks);
        // u3.Z stub at (30,0) to Q at (40,0).
        assert_eq!(matrix[3][0], Some(10));
        // P at (0,0) to u1.A at (10,0).
        assert_eq!(matrix[0][1], Some(10));
    }
}
