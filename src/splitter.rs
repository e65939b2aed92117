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

//! Produces the obfuscated partial layout a split foundry would see: routes
//! on censored layers are dropped, stub vias stay visible, and each net's
//! surviving fragments become separate nets regrouped by geometry. Test
//! input generation only; the attack never calls this.

use crate::error::Result;
use crate::layout::{
    via_base, Layer, Layout, Library, Net, PinRef, Point, RouteSegment, MAX_METAL,
};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::Path;

/// Pin-to-border wire length in the reference library, database units. Route
/// fragments closer than this share a via and stay electrically one piece.
pub const VIA_PITCH: i64 = 70;

/// Contents of `split_def.ini`: the previous run's settings, used as
/// defaults for flags the user omits. Booleans omitted from the file mean
/// those layers get stripped.
#[derive(Debug, Default, PartialEq)]
pub struct SplitConfig {
    pub input: Option<String>,
    pub output: Option<String>,
    pub split_layer: Option<Layer>,
    pub front_end: bool,
    pub back_end: bool,
}

fn parse_bool(token: &str) -> bool {
    !token.is_empty() && !token.eq_ignore_ascii_case("false")
}

impl SplitConfig {
    pub fn parse(text: &str) -> SplitConfig {
        let mut cfg = SplitConfig::default();
        for line in text.lines() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 3 || tokens[1] != "=" {
                continue;
            }
            match tokens[0] {
                "INPUT_FILE_NAME" => cfg.input = Some(tokens[2].to_string()),
                "OUTPUT_FILE_NAME" => cfg.output = Some(tokens[2].to_string()),
                "SPLIT_LAYER" => cfg.split_layer = Layer::parse(tokens[2]),
                "FRONT_END" => cfg.front_end = parse_bool(tokens[2]),
                "BACK_END" => cfg.back_end = parse_bool(tokens[2]),
                _ => {}
            }
        }
        cfg
    }

    pub fn render(&self) -> String {
        let mut s = String::new();
        if let Some(input) = &self.input {
            s += &format!("INPUT_FILE_NAME = {}\n", input);
        }
        s += &format!(
            "BACK_END = {}\n",
            if self.back_end { "True" } else { "False" }
        );
        s += &format!(
            "FRONT_END = {}\n",
            if self.front_end { "True" } else { "False" }
        );
        if let Some(layer) = self.split_layer {
            s += &format!("SPLIT_LAYER = {}\n", layer);
        }
        if let Some(output) = &self.output {
            s += &format!("OUTPUT_FILE_NAME = {}\n", output);
        }
        s
    }

    pub fn load(path: &str) -> io::Result<Option<SplitConfig>> {
        if !Path::new(path).exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(SplitConfig::parse(&text)))
    }

    pub fn store(&self, path: &str) -> io::Result<()> {
        fs::write(path, self.render())
    }
}

/// The layer set surviving a split: the front end is everything strictly
/// below the split layer, the back end is the rest.
pub fn kept_layers(front_end: bool, back_end: bool, split: Layer) -> BTreeSet<Layer> {
    let mut kept = BTreeSet::new();
    for k in 0..=MAX_METAL {
        let layer = Layer(k);
        let below = layer < split;
        if (below && front_end) || (!below && back_end) {
            kept.insert(layer);
        }
    }
    kept
}

// Union-find with path compression, one entry per surviving route segment.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

fn segments_touch(a: &RouteSegment, b: &RouteSegment) -> bool {
    a.points
        .iter()
        .any(|p| b.points.iter().any(|q| p.manhattan(*q) <= VIA_PITCH as u64))
}

// Whether a surviving fragment segment electrically reaches the given pin.
// Cell pins sit on metal1, so only a via1 termination or the segment's own
// points can land inside the cell; primary pins connect through the fixed
// pin-to-border stub.
fn touches_pin(
    cp: &PinRef,
    seg: &RouteSegment,
    layout: &Layout,
    library: &Library,
) -> bool {
    if cp.is_primary() {
        let pin = layout.io_pin(&cp.pin).unwrap();
        let p = pin.placed;
        let taps = [
            Point::new(p.x - VIA_PITCH, p.y),
            Point::new(p.x + VIA_PITCH, p.y),
            Point::new(p.x, p.y - VIA_PITCH),
            Point::new(p.x, p.y + VIA_PITCH),
        ];
        return seg.points.iter().any(|q| taps.contains(q));
    }
    let comp = layout.component(&cp.instance).unwrap();
    let mac = library.macro_def(&comp.macro_name).unwrap();
    let rect = comp.bounds(mac, layout.scale);
    match &seg.end_via {
        Some(via) => {
            if via_base(&via.name) != Some(1) && seg.layer != Layer(1) {
                return false;
            }
            rect.contains(via.at)
        }
        None => seg.points.iter().any(|p| rect.contains(*p)),
    }
}

// A pin stays on an emitted net only if its own metal is visible in the
// kept layer set.
fn pin_visible(
    cp: &PinRef,
    layout: &Layout,
    library: &Library,
    kept: &BTreeSet<Layer>,
) -> bool {
    if cp.is_primary() {
        let pin = layout.io_pin(&cp.pin).unwrap();
        kept.contains(&pin.layer)
    } else {
        let comp = layout.component(&cp.instance).unwrap();
        let mac = library.macro_def(&comp.macro_name).unwrap();
        kept.contains(&mac.pin(&cp.pin).unwrap().layer)
    }
}

/// Splits one net whose routing crosses the censored boundary into derived
/// fragment nets named `<name>_<k>`.
fn split_net(
    net: &Net,
    layout: &Layout,
    library: &Library,
    split: Layer,
    kept: &BTreeSet<Layer>,
) -> Vec<Net> {
    let stub_layer = Layer(split.0 - 1);
    let stub_base = split.0 - 1;

    let mut survivors: Vec<RouteSegment> = Vec::new();
    for seg in &net.routes {
        if kept.contains(&seg.layer) {
            survivors.push(seg.clone());
        } else if let Some(via) = &seg.end_via {
            // The via into the censored layer is still visible; keep it as
            // a one-point stub on the layer below the cut.
            if via_base(&via.name) == Some(stub_base) && kept.contains(&stub_layer) {
                survivors.push(RouteSegment {
                    layer: stub_layer,
                    points: vec![via.at],
                    end_via: Some(via.clone()),
                });
            }
        }
    }

    let mut uf = UnionFind::new(survivors.len());
    for i in 0..survivors.len() {
        for j in i + 1..survivors.len() {
            if segments_touch(&survivors[i], &survivors[j]) {
                uf.union(i, j);
            }
        }
    }

    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for i in 0..survivors.len() {
        let root = uf.find(i);
        let group = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(i);
    }

    groups
        .iter()
        .enumerate()
        .map(|(k, seg_ids)| {
            let mut comp_pins = Vec::new();
            for cp in &net.comp_pins {
                if comp_pins.contains(cp) || !pin_visible(cp, layout, library, kept) {
                    continue;
                }
                if seg_ids
                    .iter()
                    .any(|&si| touches_pin(cp, &survivors[si], layout, library))
                {
                    comp_pins.push(cp.clone());
                }
            }
            Net {
                name: format!("{}_{}", net.name, k),
                comp_pins,
                routes: seg_ids.iter().map(|&si| survivors[si].clone()).collect(),
            }
        })
        .collect()
}

/// Derives the partial layout for the given kept layer set. Primary pins
/// stay visible regardless; components survive only with the bottom metal.
pub fn split_layout(
    layout: &Layout,
    library: &Library,
    split: Layer,
    kept: &BTreeSet<Layer>,
) -> Result<Layout> {
    let mut nets = Vec::new();
    for net in &layout.nets {
        match net.top_layer() {
            Some(top) if kept.contains(&top) => {
                let comp_pins = net
                    .comp_pins
                    .iter()
                    .filter(|cp| pin_visible(cp, layout, library, kept))
                    .cloned()
                    .collect();
                let routes = net
                    .routes
                    .iter()
                    .filter(|seg| kept.contains(&seg.layer))
                    .cloned()
                    .collect();
                nets.push(Net {
                    name: net.name.clone(),
                    comp_pins,
                    routes,
                });
            }
            _ => nets.extend(split_net(net, layout, library, split, kept)),
        }
    }

    let components = if kept.contains(&Layer(1)) {
        layout.components.clone()
    } else {
        Vec::new()
    };

    Layout::build(
        layout.design.clone(),
        layout.version.clone(),
        layout.scale,
        layout.die_area,
        components,
        layout.io_pins.clone(),
        nets,
        library,
    )
}
