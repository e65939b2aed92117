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

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Instance id used by DEF to mark a primary I/O pin inside a net's
/// component/pin list.
pub const PIN_SENTINEL: &str = "PIN";

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Point { x, y }
    }

    pub fn manhattan(self, other: Point) -> u64 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as u64
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "( {} {} )", self.x, self.y)
    }
}

/// A routing layer. `poly` is 0, `metalK` is K; the numeric value gives the
/// total vertical order. `viaK` bridges metal K and metal K+1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Layer(pub u8);

pub const MAX_METAL: u8 = 10;

impl Layer {
    pub fn parse(name: &str) -> Option<Layer> {
        if name == "poly" {
            return Some(Layer(0));
        }
        let num = name.strip_prefix("metal")?;
        match num.parse::<u8>() {
            Ok(k) if k >= 1 && k <= MAX_METAL => Some(Layer(k)),
            _ => None,
        }
    }

    /// Name of the via climbing from this layer into the next one up.
    pub fn via_name(self) -> String {
        format!("via{}", self.0)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0 == 0 {
            write!(f, "poly")
        } else {
            write!(f, "metal{}", self.0)
        }
    }
}

/// Extracts the metal index K from a via name such as `via2` or `via2_7`.
pub fn via_base(name: &str) -> Option<u8> {
    let rest = name.strip_prefix("via")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u8>().ok()
}

/// Axis-aligned rectangle; `contains` is inclusive on all edges.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn new(min: Point, max: Point) -> Self {
        Rect { min, max }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
    Inout,
}

impl PinDirection {
    pub fn parse(token: &str) -> Option<PinDirection> {
        match token {
            "INPUT" => Some(PinDirection::Input),
            "OUTPUT" => Some(PinDirection::Output),
            "INOUT" => Some(PinDirection::Inout),
            _ => None,
        }
    }
}

impl fmt::Display for PinDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PinDirection::Input => write!(f, "INPUT"),
            PinDirection::Output => write!(f, "OUTPUT"),
            PinDirection::Inout => write!(f, "INOUT"),
        }
    }
}

/// A pin of a library cell. `layer` is the topmost metal of its port shapes.
#[derive(Debug, Clone)]
pub struct MacroPin {
    pub name: String,
    pub direction: PinDirection,
    pub layer: Layer,
}

/// A standard cell from the library. Size is in library microns; multiply by
/// the layout scale for database units. Pins keep their declaration order.
#[derive(Debug, Clone)]
pub struct Macro {
    pub name: String,
    pub size_x: f64,
    pub size_y: f64,
    pub pins: Vec<MacroPin>,
}

impl Macro {
    pub fn pin(&self, name: &str) -> Option<&MacroPin> {
        self.pins.iter().find(|p| p.name == name)
    }
}

/// The parsed cell library.
#[derive(Debug, Default)]
pub struct Library {
    macros: HashMap<String, Macro>,
}

impl Library {
    pub fn new() -> Self {
        Library {
            macros: HashMap::new(),
        }
    }

    pub fn add_macro(&mut self, m: Macro) {
        self.macros.insert(m.name.clone(), m);
    }

    pub fn macro_def(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

/// A placed cell instance.
#[derive(Debug, Clone)]
pub struct Component {
    pub id: String,
    pub macro_name: String,
    pub placed: Point,
    pub orient: String,
}

impl Component {
    /// Footprint of the placed cell in database units.
    pub fn bounds(&self, macro_def: &Macro, scale: u32) -> Rect {
        let w = (macro_def.size_x * scale as f64).round() as i64;
        let h = (macro_def.size_y * scale as f64).round() as i64;
        Rect::new(
            self.placed,
            Point::new(self.placed.x + w, self.placed.y + h),
        )
    }
}

/// A primary I/O pin of the design.
#[derive(Debug, Clone)]
pub struct IoPin {
    pub name: String,
    pub net: String,
    pub direction: PinDirection,
    pub layer: Layer,
    pub placed: Point,
}

/// Reference to a pin from a net: either `(instance, pin)` for a cell pin or
/// `("PIN", name)` for a primary I/O.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinRef {
    pub instance: String,
    pub pin: String,
}

impl PinRef {
    pub fn cell(instance: &str, pin: &str) -> Self {
        PinRef {
            instance: instance.to_string(),
            pin: pin.to_string(),
        }
    }

    pub fn primary(name: &str) -> Self {
        PinRef {
            instance: PIN_SENTINEL.to_string(),
            pin: name.to_string(),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.instance == PIN_SENTINEL
    }
}

impl fmt::Display for PinRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.instance, self.pin)
    }
}

/// One routed wire: an ordered point list on a single layer, optionally
/// terminated by a via climbing to the next layer up (or dropping down).
#[derive(Debug, Clone)]
pub struct RouteSegment {
    pub layer: Layer,
    pub points: Vec<Point>,
    pub end_via: Option<Via>,
}

#[derive(Debug, Clone)]
pub struct Via {
    pub name: String,
    pub at: Point,
}

#[derive(Debug, Clone)]
pub struct Net {
    pub name: String,
    pub comp_pins: Vec<PinRef>,
    pub routes: Vec<RouteSegment>,
}

impl Net {
    pub fn top_layer(&self) -> Option<Layer> {
        self.routes.iter().map(|r| r.layer).max()
    }
}

/// The partial layout under attack: immutable once built, with map-backed
/// lookup by name and iteration in file order.
#[derive(Debug)]
pub struct Layout {
    pub design: String,
    pub version: String,
    pub scale: u32,
    pub die_area: Rect,
    pub components: Vec<Component>,
    pub io_pins: Vec<IoPin>,
    pub nets: Vec<Net>,
    comp_index: HashMap<String, usize>,
    pin_index: HashMap<String, usize>,
    net_index: HashMap<String, usize>,
}

impl Layout {
    /// Assembles a layout and checks the referential invariants: every net
    /// endpoint must resolve against a primary pin or a component pin of a
    /// known macro, and every resolved direction must be INPUT or OUTPUT.
    pub fn build(
        design: String,
        version: String,
        scale: u32,
        die_area: Rect,
        components: Vec<Component>,
        io_pins: Vec<IoPin>,
        nets: Vec<Net>,
        library: &Library,
    ) -> Result<Layout> {
        let comp_index: HashMap<String, usize> = components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        let pin_index: HashMap<String, usize> = io_pins
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        let net_index: HashMap<String, usize> = nets
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i))
            .collect();

        for comp in &components {
            if library.macro_def(&comp.macro_name).is_none() {
                return Err(Error::Schema(format!(
                    "component {} references unknown macro {}",
                    comp.id, comp.macro_name
                )));
            }
        }
        for pin in &io_pins {
            if pin.direction == PinDirection::Inout {
                return Err(Error::Schema(format!(
                    "primary pin {} must be INPUT or OUTPUT",
                    pin.name
                )));
            }
        }
        for net in &nets {
            for cp in &net.comp_pins {
                if cp.is_primary() {
                    if !pin_index.contains_key(&cp.pin) {
                        return Err(Error::Schema(format!(
                            "net {} references unknown primary pin {}",
                            net.name, cp.pin
                        )));
                    }
                    continue;
                }
                let comp = match comp_index.get(&cp.instance) {
                    Some(&i) => &components[i],
                    None => {
                        return Err(Error::Schema(format!(
                            "net {} references unknown component {}",
                            net.name, cp.instance
                        )))
                    }
                };
                // Macro existence was checked above.
                let macro_def = library.macro_def(&comp.macro_name).unwrap();
                match macro_def.pin(&cp.pin) {
                    None => {
                        return Err(Error::Schema(format!(
                            "net {} references pin {} absent from macro {}",
                            net.name, cp.pin, macro_def.name
                        )))
                    }
                    Some(p) if p.direction == PinDirection::Inout => {
                        return Err(Error::Schema(format!(
                            "net {} connects to {}/{} whose direction is neither INPUT nor OUTPUT",
                            net.name, cp.instance, cp.pin
                        )))
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Layout {
            design,
            version,
            scale,
            die_area,
            components,
            io_pins,
            nets,
            comp_index,
            pin_index,
            net_index,
        })
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.comp_index.get(id).map(|&i| &self.components[i])
    }

    pub fn io_pin(&self, name: &str) -> Option<&IoPin> {
        self.pin_index.get(name).map(|&i| &self.io_pins[i])
    }

    pub fn net(&self, name: &str) -> Option<&Net> {
        self.net_index.get(name).map(|&i| &self.nets[i])
    }

    /// Highest layer appearing on any route of any surviving net. Stub vias
    /// named for this layer mark where signals escape into censored metal.
    pub fn top_feol_layer(&self) -> Option<Layer> {
        self.nets.iter().filter_map(|n| n.top_layer()).max()
    }

    /// The splitter is the only caller: it appends the derived fragment nets
    /// that replace a censored one.
    pub fn push_net(&mut self, net: Net) {
        self.net_index.insert(net.name.clone(), self.nets.len());
        self.nets.push(net);
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn inv_macro() -> Macro {
        Macro {
            name: "INV_X1".to_string(),
            size_x: 0.38,
            size_y: 1.4,
            pins: vec![
                MacroPin {
                    name: "A".to_string(),
                    direction: PinDirection::Input,
                    layer: Layer(1),
                },
                MacroPin {
                    name: "Z".to_string(),
                    direction: PinDirection::Output,
                    layer: Layer(1),
                },
            ],
        }
    }

    pub fn inv_library() -> Library {
        let mut lib = Library::new();
        lib.add_macro(inv_macro());
        lib
    }

    pub fn die() -> Rect {
        Rect::new(Point::new(0, 0), Point::new(100_000, 100_000))
    }

    #[test]
    fn layer_order_and_names() {
        let poly = Layer::parse("poly").unwrap();
        let m1 = Layer::parse("metal1").unwrap();
        let m10 = Layer::parse("metal10").unwrap();
        assert!(poly < m1 && m1 < m10);
        assert_eq!(m1.to_string(), "metal1");
        assert_eq!(m1.via_name(), "via1");
        assert!(Layer::parse("metal11").is_none());
        assert!(Layer::parse("via1").is_none());
    }

    #[test]
    fn via_base_parses_suffixed_names() {
        assert_eq!(via_base("via1_4"), Some(1));
        assert_eq!(via_base("via2"), Some(2));
        assert_eq!(via_base("via10_0"), Some(10));
        assert_eq!(via_base("metal2"), None);
        assert_eq!(via_base("via_x"), None);
    }

    #[test]
    fn manhattan_distance() {
        assert_eq!(Point::new(0, 0).manhattan(Point::new(3, -4)), 7);
        assert_eq!(Point::new(5, 5).manhattan(Point::new(5, 5)), 0);
    }

    #[test]
    fn rect_contains_is_inclusive() {
        let r = Rect::new(Point::new(0, 0), Point::new(10, 10));
        assert!(r.contains(Point::new(0, 10)));
        assert!(r.contains(Point::new(5, 5)));
        assert!(!r.contains(Point::new(11, 5)));
    }

    #[test]
    fn build_rejects_unknown_macro_pin() {
        let lib = inv_library();
        let components = vec![Component {
            id: "u0".to_string(),
            macro_name: "INV_X1".to_string(),
            placed: Point::new(1000, 1000),
            orient: "N".to_string(),
        }];
        let nets = vec![Net {
            name: "x".to_string(),
            comp_pins: vec![PinRef::cell("u0", "Q")],
            routes: Vec::new(),
        }];
        let err = Layout::build(
            "top".to_string(),
            "5.7".to_string(),
            2000,
            die(),
            components,
            Vec::new(),
            nets,
            &lib,
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("absent from macro"));
    }

    #[test]
    fn build_rejects_inout_net_pin() {
        let mut lib = inv_library();
        let mut m = inv_macro();
        m.name = "FILL_X1".to_string();
        m.pins.push(MacroPin {
            name: "VDD".to_string(),
            direction: PinDirection::Inout,
            layer: Layer(1),
        });
        lib.add_macro(m);
        let components = vec![Component {
            id: "u0".to_string(),
            macro_name: "FILL_X1".to_string(),
            placed: Point::new(0, 0),
            orient: "N".to_string(),
        }];
        let nets = vec![Net {
            name: "pwr".to_string(),
            comp_pins: vec![PinRef::cell("u0", "VDD")],
            routes: Vec::new(),
        }];
        let err = Layout::build(
            "top".to_string(),
            "5.7".to_string(),
            2000,
            die(),
            components,
            Vec::new(),
            nets,
            &lib,
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("neither INPUT nor OUTPUT"));
    }

    #[test]
    fn top_feol_layer_is_max_over_routes() {
        let lib = inv_library();
        let nets = vec![
            Net {
                name: "a".to_string(),
                comp_pins: Vec::new(),
                routes: vec![RouteSegment {
                    layer: Layer(1),
                    points: vec![Point::new(0, 0)],
                    end_via: None,
                }],
            },
            Net {
                name: "b".to_string(),
                comp_pins: Vec::new(),
                routes: vec![RouteSegment {
                    layer: Layer(2),
                    points: vec![Point::new(0, 0)],
                    end_via: None,
                }],
            },
        ];
        let layout = Layout::build(
            "top".to_string(),
            "5.7".to_string(),
            2000,
            die(),
            Vec::new(),
            Vec::new(),
            nets,
            &lib,
        )
        .unwrap();
        assert_eq!(layout.top_feol_layer(), Some(Layer(2)));
    }
}
