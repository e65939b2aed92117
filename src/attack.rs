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

//! The attack pipeline: classify the dangling pins, measure the geometry,
//! build the feasibility matrix, solve the flow, and assemble a netlist.

use crate::chain::{self, Chain};
use crate::flow;
use crate::geometry::{self, NetGeometry};
use crate::layout::{Layer, Layout, Library, Net, PinDirection, PinRef, Point, RouteSegment};
use crate::matrix::{self, MatrixInputs};
use crate::netlist::{self, Netlist};
use std::collections::{HashMap, HashSet};

pub struct AttackOptions {
    /// Maximum fan-out the flow may give one source. Defaults to the sink
    /// count, so saturation is never blocked by the cap.
    pub source_cap: Option<u64>,
    /// Treat nets without end-points as reachable from the whole die.
    pub die_area_fallback: bool,
}

impl Default for AttackOptions {
    fn default() -> Self {
        AttackOptions {
            source_cap: None,
            die_area_fallback: true,
        }
    }
}

pub struct AttackOutcome {
    pub netlist: Netlist,
    /// Sink pins no feasible source could saturate.
    pub unresolved: Vec<PinRef>,
    /// A combinational loop present in the assembled result, if any.
    pub inferred_cycle: Option<Vec<String>>,
    pub flow: u64,
    pub cost: u64,
}

struct Classified {
    sources: Vec<PinRef>,
    sinks: Vec<PinRef>,
    primary_inputs: HashSet<PinRef>,
    primary_outputs: HashSet<PinRef>,
    pin_net: HashMap<PinRef, usize>,
}

/// Walks every net's pin list plus the primary pins. A source produces a
/// signal (cell OUTPUT, or primary INPUT feeding the design); a sink
/// consumes one (cell INPUT, or primary OUTPUT). Classification order is
/// pin identity, which also fixes every later tie-break.
fn classify(layout: &Layout, library: &Library) -> Classified {
    let mut sources = Vec::new();
    let mut sinks = Vec::new();
    let mut primary_inputs = HashSet::new();
    let mut primary_outputs = HashSet::new();
    let mut pin_net: HashMap<PinRef, usize> = HashMap::new();

    for (idx, net) in layout.nets.iter().enumerate() {
        for cp in &net.comp_pins {
            if pin_net.contains_key(cp) {
                continue;
            }
            pin_net.insert(cp.clone(), idx);
            if cp.is_primary() {
                let pin = layout.io_pin(&cp.pin).unwrap();
                match pin.direction {
                    PinDirection::Input => {
                        primary_inputs.insert(cp.clone());
                        sources.push(cp.clone());
                    }
                    PinDirection::Output => {
                        primary_outputs.insert(cp.clone());
                        sinks.push(cp.clone());
                    }
                    PinDirection::Inout => {}
                }
            } else {
                let comp = layout.component(&cp.instance).unwrap();
                let mac = library.macro_def(&comp.macro_name).unwrap();
                match mac.pin(&cp.pin).unwrap().direction {
                    PinDirection::Input => sinks.push(cp.clone()),
                    PinDirection::Output => sources.push(cp.clone()),
                    PinDirection::Inout => {}
                }
            }
        }
    }

    sources.sort();
    sinks.sort();

    Classified {
        sources,
        sinks,
        primary_inputs,
        primary_outputs,
        pin_net,
    }
}

/// Primary pins whose net was censored away entirely still take part: each
/// becomes a singleton net holding just its placed point on the top FEOL
/// layer.
fn synthesize_orphan_pins(layout: &mut Layout, top: Layer) {
    let orphans: Vec<(String, Point)> = layout
        .io_pins
        .iter()
        .filter(|pin| {
            !layout
                .nets
                .iter()
                .any(|n| n.comp_pins.iter().any(|cp| cp.is_primary() && cp.pin == pin.name))
        })
        .map(|pin| (pin.name.clone(), pin.placed))
        .collect();
    for (name, placed) in orphans {
        println!(
            "[+] primary pin {} has no surviving net, synthesizing one",
            name
        );
        layout.push_net(Net {
            name: name.clone(),
            comp_pins: vec![PinRef::primary(&name)],
            routes: vec![RouteSegment {
                layer: top,
                points: vec![placed],
                end_via: None,
            }],
        });
    }
}

pub fn run(mut layout: Layout, library: &Library, options: &AttackOptions) -> AttackOutcome {
    let top = layout.top_feol_layer().unwrap_or(Layer(1));
    println!("[*] Top FEOL layer: {}", top);

    synthesize_orphan_pins(&mut layout, top);

    println!("[*] Classifying pins");
    let classified = classify(&layout, library);
    println!(
        " [+] {} source pins, {} sink pins",
        classified.sources.len(),
        classified.sinks.len()
    );

    println!("[*] Analyzing net geometry");
    let geometry: Vec<NetGeometry> = layout
        .nets
        .iter()
        .map(|n| geometry::analyze(n, &layout, top, options.die_area_fallback))
        .collect();

    let chain = Chain::build(&layout, library);
    if let Some(cycle) = chain::find_cycle(chain.feeders()) {
        println!(
            "[!] layout already contains a combinational loop: {}",
            cycle.join(" -> ")
        );
    }

    println!(
        "[*] Building distance matrix ({} x {})",
        classified.sources.len(),
        classified.sinks.len()
    );
    let net_pins: Vec<Vec<PinRef>> = layout.nets.iter().map(|n| n.comp_pins.clone()).collect();
    let inputs = MatrixInputs {
        sources: &classified.sources,
        sinks: &classified.sinks,
        pin_net: &classified.pin_net,
        net_pins: &net_pins,
        geometry: &geometry,
        primary_inputs: &classified.primary_inputs,
        primary_outputs: &classified.primary_outputs,
        chain: &chain,
    };
    let done = matrix::done_sinks(&inputs);
    let matrix = matrix::build(&inputs, &done);

    let source_cap = options
        .source_cap
        .unwrap_or_else(|| (classified.sinks.len() as u64).max(1));
    println!("[*] Solving min-cost max-flow (source cap {})", source_cap);
    // Pair edges enter the network sorted by pin identity, so equal-cost
    // alternatives always resolve toward the lexicographically first pair.
    let mut order = Vec::new();
    for i in 0..classified.sources.len() {
        for j in 0..classified.sinks.len() {
            order.push((i, j));
        }
    }
    let reconstruction =
        flow::solve_assignment(&matrix, classified.sinks.len(), &order, source_cap);
    println!(
        " [+] flow {} over {} sinks, total cost {}",
        reconstruction.flow,
        classified.sinks.len(),
        reconstruction.cost
    );

    let unresolved: Vec<PinRef> = reconstruction
        .unresolved
        .iter()
        .map(|&j| classified.sinks[j].clone())
        .collect();
    for pin in &unresolved {
        eprintln!("[!] sink {} cannot be driven by any feasible source", pin);
    }

    println!("[*] Assembling netlist");
    let netlist = netlist::assemble(
        &layout,
        library,
        &classified.sources,
        &classified.sinks,
        &reconstruction,
    );

    // Re-derive the feeder graph from what was actually chosen and look for
    // loops the matrix could not see.
    let mut inferred = chain::FeederGraph::new();
    for a in &reconstruction.chosen {
        let s = &classified.sources[a.source];
        let k = &classified.sinks[a.sink];
        if !s.is_primary() && !k.is_primary() && s.instance != k.instance {
            inferred
                .entry(k.instance.clone())
                .or_insert_with(Default::default)
                .insert(s.instance.clone());
        }
    }
    let inferred_cycle = chain::find_cycle(&inferred);
    if let Some(cycle) = &inferred_cycle {
        eprintln!(
            "[!] inferred netlist contains a combinational loop: {}",
            cycle.join(" -> ")
        );
    }

    AttackOutcome {
        netlist,
        unresolved,
        inferred_cycle,
        flow: reconstruction.flow,
        cost: reconstruction.cost,
    }
}
