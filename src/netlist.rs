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

//! Turns the chosen source/sink pairs into a gate-level netlist. Each
//! source and its sinks form one electrical net, named after a primary pin
//! when one participates and freshly otherwise.

use crate::flow::Reconstruction;
use crate::layout::{Layout, Library, PinDirection, PinRef};
use itertools::Itertools;
use std::collections::HashMap;

/// Net name given to sink pins the reconstruction could not drive.
pub const UNRESOLVED_NET: &str = "UNRESOLVED";

#[derive(Debug, PartialEq)]
pub struct Instance {
    pub macro_name: String,
    pub id: String,
    /// `(pin, net)` pairs in the macro's pin declaration order.
    pub connections: Vec<(String, String)>,
}

#[derive(Debug)]
pub struct Netlist {
    pub design: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub wires: Vec<String>,
    pub instances: Vec<Instance>,
}

impl Netlist {
    pub fn to_verilog(&self) -> String {
        let mut s = String::new();
        let ports = self
            .inputs
            .iter()
            .chain(self.outputs.iter())
            .join(", ");
        s += &format!("module {} ( {} );\n", self.design, ports);
        if !self.inputs.is_empty() {
            s += &format!("  input  {} ;\n", self.inputs.iter().join(", "));
        }
        if !self.outputs.is_empty() {
            s += &format!("  output {} ;\n", self.outputs.iter().join(", "));
        }
        if !self.wires.is_empty() {
            s += &format!("  wire   {} ;\n", self.wires.iter().join(", "));
        }
        for inst in &self.instances {
            let conns = inst
                .connections
                .iter()
                .map(|(pin, net)| format!(".{}({})", pin, net))
                .join(", ");
            s += &format!("  {} {} ( {} );\n", inst.macro_name, inst.id, conns);
        }
        s += "endmodule\n";
        s
    }
}

/// Groups each source with its chosen sinks, names the classes, and emits
/// one instance per component with every INPUT/OUTPUT pin connected.
pub fn assemble(
    layout: &Layout,
    library: &Library,
    sources: &[PinRef],
    sinks: &[PinRef],
    reconstruction: &Reconstruction,
) -> Netlist {
    let mut sinks_of: Vec<Vec<usize>> = vec![Vec::new(); sources.len()];
    for a in &reconstruction.chosen {
        sinks_of[a.source].push(a.sink);
    }

    let mut assigned: HashMap<&PinRef, String> = HashMap::new();
    let mut wires: Vec<String> = Vec::new();
    let mut fresh = 0usize;

    for (i, source) in sources.iter().enumerate() {
        let mut members: Vec<&PinRef> = vec![source];
        members.extend(sinks_of[i].iter().map(|&j| &sinks[j]));

        let primary_input = members.iter().find(|m| {
            m.is_primary()
                && layout
                    .io_pin(&m.pin)
                    .map(|p| p.direction == PinDirection::Input)
                    .unwrap_or(false)
        });
        let primary_output = members.iter().find(|m| {
            m.is_primary()
                && layout
                    .io_pin(&m.pin)
                    .map(|p| p.direction == PinDirection::Output)
                    .unwrap_or(false)
        });
        let name = if let Some(p) = primary_input {
            p.pin.clone()
        } else if let Some(p) = primary_output {
            p.pin.clone()
        } else {
            fresh += 1;
            let w = format!("n{}", fresh);
            wires.push(w.clone());
            w
        };
        for m in members {
            assigned.entry(m).or_insert_with(|| name.clone());
        }
    }

    let mut unresolved_used = false;
    for &j in &reconstruction.unresolved {
        assigned.insert(&sinks[j], UNRESOLVED_NET.to_string());
        unresolved_used = true;
    }

    let inputs: Vec<String> = layout
        .io_pins
        .iter()
        .filter(|p| p.direction == PinDirection::Input)
        .map(|p| p.name.clone())
        .collect();
    let outputs: Vec<String> = layout
        .io_pins
        .iter()
        .filter(|p| p.direction == PinDirection::Output)
        .map(|p| p.name.clone())
        .collect();

    let mut instances = Vec::new();
    for comp in &layout.components {
        let mac = library.macro_def(&comp.macro_name).unwrap();
        let mut connections = Vec::new();
        for pin in &mac.pins {
            if pin.direction == PinDirection::Inout {
                continue;
            }
            let pin_ref = PinRef::cell(&comp.id, &pin.name);
            let net = match assigned.get(&pin_ref) {
                Some(name) => name.clone(),
                None => {
                    // A pin with no surviving fragment at all is just as
                    // unresolved as a sink the flow left dry.
                    unresolved_used = true;
                    UNRESOLVED_NET.to_string()
                }
            };
            connections.push((pin.name.clone(), net));
        }
        instances.push(Instance {
            macro_name: comp.macro_name.clone(),
            id: comp.id.clone(),
            connections,
        });
    }

    if unresolved_used {
        wires.push(UNRESOLVED_NET.to_string());
    }

    Netlist {
        design: layout.design.clone(),
        inputs,
        outputs,
        wires,
        instances,
    }
}
