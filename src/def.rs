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

//! DEF layout reader and writer. The reader interprets the sections the
//! attack consumes (DESIGN, UNITS, DIEAREA, COMPONENTS, PINS, NETS with
//! routed segments and via terminations); everything else is skipped and
//! accounted for. The writer renders a layout back into the same subset,
//! which is what the splitter emits.

use crate::error::{Error, Result};
use crate::layout::{
    Component, IoPin, Layer, Layout, Library, Net, PinDirection, PinRef, Point, Rect,
    RouteSegment, Via, PIN_SENTINEL,
};
use itertools::Itertools;
use std::fs;

struct Cursor<'a> {
    file: &'a str,
    toks: Vec<(usize, &'a str)>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, file: &'a str) -> Self {
        let mut toks = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            for tok in line.split_whitespace() {
                toks.push((idx + 1, tok));
            }
        }
        Cursor { file, toks, pos: 0 }
    }

    fn line(&self) -> usize {
        self.toks
            .get(self.pos.min(self.toks.len().saturating_sub(1)))
            .map(|t| t.0)
            .unwrap_or(0)
    }

    fn err(&self, expected: &str) -> Error {
        Error::parse(self.file, self.line(), expected)
    }

    fn peek(&self) -> Option<&'a str> {
        self.toks.get(self.pos).map(|t| t.1)
    }

    fn next(&mut self) -> Option<&'a str> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, what: &str) -> Result<&'a str> {
        match self.next() {
            Some(t) => Ok(t),
            None => Err(self.err(what)),
        }
    }

    fn expect_tok(&mut self, tok: &str) -> Result<()> {
        match self.next() {
            Some(t) if t == tok => Ok(()),
            _ => Err(Error::parse(self.file, self.line(), &format!("'{}'", tok))),
        }
    }

    fn skip_statement(&mut self) {
        while let Some(t) = self.next() {
            if t == ";" {
                return;
            }
        }
    }

    fn skip_block(&mut self, keyword: &str) {
        while let Some(t) = self.next() {
            if t == "END" && self.peek() == Some(keyword) {
                self.next();
                return;
            }
        }
    }
}

fn parse_coord(cur: &Cursor, tok: &str, prev: Option<i64>, what: &str) -> Result<i64> {
    if tok == "*" {
        return prev.ok_or_else(|| cur.err(what));
    }
    tok.parse::<i64>().map_err(|_| cur.err(what))
}

// `( x y )` with `*` standing for the matching coordinate of the previous
// point in the same route.
fn parse_point(cur: &mut Cursor, prev: Option<Point>) -> Result<Point> {
    cur.expect_tok("(")?;
    let xt = cur.expect("x coordinate")?;
    let yt = cur.expect("y coordinate")?;
    cur.expect_tok(")")?;
    let x = parse_coord(cur, xt, prev.map(|p| p.x), "x coordinate")?;
    let y = parse_coord(cur, yt, prev.map(|p| p.y), "y coordinate")?;
    Ok(Point::new(x, y))
}

fn parse_routes(cur: &mut Cursor) -> Result<Vec<RouteSegment>> {
    let mut segs = Vec::new();
    loop {
        let layer_tok = cur.expect("route layer")?;
        let layer = Layer::parse(layer_tok).ok_or_else(|| cur.err("route layer name"))?;
        let mut points: Vec<Point> = Vec::new();
        while cur.peek() == Some("(") {
            let prev = points.last().copied();
            points.push(parse_point(cur, prev)?);
        }
        if points.is_empty() {
            return Err(cur.err("route points"));
        }
        let mut end_via = None;
        if let Some(t) = cur.peek() {
            if t != ";" && t != "+" && t != "NEW" {
                let name = cur.expect("via name")?;
                end_via = Some(Via {
                    name: name.to_string(),
                    at: *points.last().unwrap(),
                });
            }
        }
        segs.push(RouteSegment {
            layer,
            points,
            end_via,
        });
        if cur.peek() == Some("NEW") {
            cur.next();
            continue;
        }
        return Ok(segs);
    }
}

fn parse_components(cur: &mut Cursor, out: &mut Vec<Component>, ignored: &mut usize) -> Result<()> {
    loop {
        match cur.next() {
            Some("-") => {
                let id = cur.expect("component id")?.to_string();
                let macro_name = cur.expect("macro name")?.to_string();
                let mut placed = Point::new(0, 0);
                let mut orient = "N".to_string();
                loop {
                    match cur.next() {
                        Some(";") => break,
                        Some("+") => {}
                        Some("PLACED") | Some("FIXED") => {
                            placed = parse_point(cur, None)?;
                            if let Some(o) = cur.peek() {
                                if o != ";" && o != "+" {
                                    orient = o.to_string();
                                    cur.next();
                                }
                            }
                        }
                        Some(_) => *ignored += 1,
                        None => return Err(cur.err("';'")),
                    }
                }
                out.push(Component {
                    id,
                    macro_name,
                    placed,
                    orient,
                });
            }
            Some("END") => {
                cur.expect_tok("COMPONENTS")?;
                return Ok(());
            }
            _ => return Err(cur.err("'-' or END COMPONENTS")),
        }
    }
}

fn parse_pins(cur: &mut Cursor, out: &mut Vec<IoPin>, ignored: &mut usize) -> Result<()> {
    loop {
        match cur.next() {
            Some("-") => {
                let name = cur.expect("pin name")?.to_string();
                let mut net = name.clone();
                let mut direction = None;
                let mut layer = Layer(1);
                let mut placed = Point::new(0, 0);
                loop {
                    match cur.next() {
                        Some(";") => break,
                        Some("+") => {}
                        Some("NET") => net = cur.expect("net name")?.to_string(),
                        Some("DIRECTION") => {
                            let tok = cur.expect("pin direction")?;
                            direction = Some(
                                PinDirection::parse(tok)
                                    .ok_or_else(|| cur.err("pin direction"))?,
                            );
                        }
                        Some("USE") => {
                            cur.next();
                        }
                        Some("LAYER") => {
                            let tok = cur.expect("layer name")?;
                            layer = Layer::parse(tok).ok_or_else(|| cur.err("layer name"))?;
                            // Shape rectangle, if present; the placement point
                            // is what matters to the attack.
                            while cur.peek() == Some("(") {
                                parse_point(cur, None)?;
                            }
                        }
                        Some("PLACED") | Some("FIXED") => {
                            placed = parse_point(cur, None)?;
                            if let Some(o) = cur.peek() {
                                if o != ";" && o != "+" {
                                    cur.next();
                                }
                            }
                        }
                        Some(_) => *ignored += 1,
                        None => return Err(cur.err("';'")),
                    }
                }
                let direction = direction.ok_or_else(|| cur.err("pin DIRECTION"))?;
                out.push(IoPin {
                    name,
                    net,
                    direction,
                    layer,
                    placed,
                });
            }
            Some("END") => {
                cur.expect_tok("PINS")?;
                return Ok(());
            }
            _ => return Err(cur.err("'-' or END PINS")),
        }
    }
}

fn parse_nets(cur: &mut Cursor, out: &mut Vec<Net>, ignored: &mut usize) -> Result<()> {
    loop {
        match cur.next() {
            Some("-") => {
                let name = cur.expect("net name")?.to_string();
                let mut comp_pins = Vec::new();
                while cur.peek() == Some("(") {
                    cur.next();
                    let instance = cur.expect("instance id")?;
                    let pin = cur.expect("pin name")?;
                    cur.expect_tok(")")?;
                    comp_pins.push(if instance == PIN_SENTINEL {
                        PinRef::primary(pin)
                    } else {
                        PinRef::cell(instance, pin)
                    });
                }
                let mut routes = Vec::new();
                loop {
                    match cur.next() {
                        Some(";") => break,
                        Some("+") => {}
                        Some("ROUTED") => routes = parse_routes(cur)?,
                        Some("USE") | Some("SOURCE") | Some("WEIGHT") => {
                            cur.next();
                        }
                        Some(_) => *ignored += 1,
                        None => return Err(cur.err("';'")),
                    }
                }
                out.push(Net {
                    name,
                    comp_pins,
                    routes,
                });
            }
            Some("END") => {
                cur.expect_tok("NETS")?;
                return Ok(());
            }
            _ => return Err(cur.err("'-' or END NETS")),
        }
    }
}

pub fn parse_file(path: &str, library: &Library) -> Result<Layout> {
    let text = fs::read_to_string(path)?;
    parse_str(&text, path, library)
}

pub fn parse_str(text: &str, file: &str, library: &Library) -> Result<Layout> {
    let mut cur = Cursor::new(text, file);
    let mut design = None;
    let mut version = "5.7".to_string();
    let mut scale = None;
    let mut die_area = None;
    let mut components = Vec::new();
    let mut io_pins = Vec::new();
    let mut nets = Vec::new();
    let mut ignored = 0usize;

    while let Some(tok) = cur.next() {
        match tok {
            "VERSION" => {
                version = cur.expect("version number")?.to_string();
                cur.skip_statement();
            }
            "DESIGN" => {
                design = Some(cur.expect("design name")?.to_string());
                cur.skip_statement();
            }
            "UNITS" => {
                cur.expect_tok("DISTANCE")?;
                cur.expect_tok("MICRONS")?;
                let tok = cur.expect("database unit scale")?;
                scale = Some(
                    tok.parse::<u32>()
                        .map_err(|_| cur.err("database unit scale"))?,
                );
                cur.skip_statement();
            }
            "DIEAREA" => {
                let min = parse_point(&mut cur, None)?;
                let max = parse_point(&mut cur, None)?;
                die_area = Some(Rect::new(min, max));
                cur.skip_statement();
            }
            "COMPONENTS" => {
                cur.expect("component count")?;
                cur.expect_tok(";")?;
                parse_components(&mut cur, &mut components, &mut ignored)?;
            }
            "PINS" => {
                cur.expect("pin count")?;
                cur.expect_tok(";")?;
                parse_pins(&mut cur, &mut io_pins, &mut ignored)?;
            }
            "NETS" => {
                cur.expect("net count")?;
                cur.expect_tok(";")?;
                parse_nets(&mut cur, &mut nets, &mut ignored)?;
            }
            "PROPERTYDEFINITIONS" | "VIAS" | "REGIONS" | "SPECIALNETS" | "GROUPS"
            | "BLOCKAGES" => cur.skip_block(tok),
            "ROW" | "TRACKS" | "GCELLGRID" | "DIVIDERCHAR" | "BUSBITCHARS" | "TECHNOLOGY"
            | "HISTORY" | "PROPERTY" => cur.skip_statement(),
            "END" => {
                if cur.next() == Some("DESIGN") {
                    break;
                }
            }
            _ => {
                ignored += 1;
                cur.skip_statement();
            }
        }
    }

    if ignored > 0 {
        println!("[*] def: {} unrecognized items ignored in {}", ignored, file);
    }

    let design = design.ok_or_else(|| cur.err("DESIGN statement"))?;
    let scale = scale.ok_or_else(|| cur.err("UNITS DISTANCE MICRONS statement"))?;
    let die_area = die_area.ok_or_else(|| cur.err("DIEAREA statement"))?;
    Layout::build(
        design, version, scale, die_area, components, io_pins, nets, library,
    )
}

fn route_text(seg: &RouteSegment) -> String {
    let pts = seg.points.iter().map(|p| p.to_string()).join(" ");
    match &seg.end_via {
        Some(via) => format!("{} {} {}", seg.layer, pts, via.name),
        None => format!("{} {}", seg.layer, pts),
    }
}

/// Renders a layout in the DEF subset the parser consumes.
pub fn write_def(layout: &Layout, notes: &[String]) -> String {
    let mut s = String::new();
    for note in notes {
        s += &format!("#  {}\n", note);
    }
    if !notes.is_empty() {
        s.push('\n');
    }
    s += &format!("VERSION {} ;\n", layout.version);
    s += &format!("DESIGN {} ;\n", layout.design);
    s += &format!("UNITS DISTANCE MICRONS {} ;\n\n", layout.scale);
    s += &format!(
        "DIEAREA {} {} ;\n\n",
        layout.die_area.min, layout.die_area.max
    );

    s += &format!("COMPONENTS {} ;\n", layout.components.len());
    for c in &layout.components {
        s += &format!(
            "- {} {} + PLACED {} {} ;\n",
            c.id, c.macro_name, c.placed, c.orient
        );
    }
    s += "END COMPONENTS\n\n";

    s += &format!("PINS {} ;\n", layout.io_pins.len());
    for p in &layout.io_pins {
        s += &format!(
            "- {} + NET {} + DIRECTION {} + USE SIGNAL\n  + LAYER {}\n  + PLACED {} N ;\n",
            p.name, p.net, p.direction, p.layer, p.placed
        );
    }
    s += "END PINS\n\n";

    s += &format!("NETS {} ;\n", layout.nets.len());
    for net in &layout.nets {
        s += &format!("- {}", net.name);
        for cp in &net.comp_pins {
            s += &format!(" ( {} {} )", cp.instance, cp.pin);
        }
        s.push('\n');
        for (i, seg) in net.routes.iter().enumerate() {
            if i == 0 {
                s += &format!("  + ROUTED {}\n", route_text(seg));
            } else {
                s += &format!("    NEW {}\n", route_text(seg));
            }
        }
        s += " ;\n";
    }
    s += "END NETS\n\nEND DESIGN\n";
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lef;

    const SMALL_LEF: &str = r#"
MACRO INV_X1
  SIZE 0.38 BY 1.4 ;
  PIN A
    DIRECTION INPUT ;
    PORT
      LAYER metal1 ;
    END
  END A
  PIN Z
    DIRECTION OUTPUT ;
    PORT
      LAYER metal1 ;
    END
  END Z
END INV_X1
"#;

    const SMALL_DEF: &str = r#"
VERSION 5.7 ;
DIVIDERCHAR "/" ;
DESIGN trivial ;
UNITS DISTANCE MICRONS 2000 ;

DIEAREA ( 0 0 ) ( 20000 20000 ) ;

ROW CORE_ROW_0 FreePDK45 0 0 N DO 20 BY 1 STEP 380 0 ;
TRACKS X 190 DO 52 STEP 380 LAYER metal1 ;

COMPONENTS 1 ;
- u0 INV_X1 + PLACED ( 5000 5000 ) N ;
END COMPONENTS

PINS 2 ;
- A + NET A + DIRECTION INPUT + USE SIGNAL
  + LAYER metal1 ( -70 0 ) ( 70 140 )
  + PLACED ( 0 5100 ) N ;
- Z + NET Z + DIRECTION OUTPUT + USE SIGNAL
  + LAYER metal1 ( -70 0 ) ( 70 140 )
  + PLACED ( 19000 5100 ) N ;
END PINS

NETS 2 ;
- A ( PIN A ) ( u0 A )
  + ROUTED metal1 ( 0 5100 ) ( 5100 * ) via1_0
 ;
- Z ( PIN Z ) ( u0 Z )
  + ROUTED metal1 ( 5200 5100 ) ( 19000 * )
    NEW metal2 ( 5200 5100 ) ( 5200 6000 ) via2_3
 ;
END NETS

END DESIGN
"#;

    #[test]
    fn parses_layout_sections() {
        let lib = lef::parse_str(SMALL_LEF, "small.lef").unwrap();
        let layout = parse_str(SMALL_DEF, "small.def", &lib).unwrap();
        assert_eq!(layout.design, "trivial");
        assert_eq!(layout.scale, 2000);
        assert_eq!(layout.die_area.max, Point::new(20000, 20000));
        assert_eq!(layout.components.len(), 1);
        assert_eq!(layout.component("u0").unwrap().placed, Point::new(5000, 5000));
        assert_eq!(layout.io_pins.len(), 2);
        assert_eq!(
            layout.io_pin("A").unwrap().direction,
            PinDirection::Input
        );

        let net_a = layout.net("A").unwrap();
        assert_eq!(net_a.comp_pins.len(), 2);
        assert!(net_a.comp_pins[0].is_primary());
        // `( 5100 * )` repeats the previous y coordinate.
        assert_eq!(net_a.routes[0].points[1], Point::new(5100, 5100));
        let via = net_a.routes[0].end_via.as_ref().unwrap();
        assert_eq!(via.name, "via1_0");
        assert_eq!(via.at, Point::new(5100, 5100));

        let net_z = layout.net("Z").unwrap();
        assert_eq!(net_z.routes.len(), 2);
        assert_eq!(net_z.routes[1].layer, Layer(2));
        assert_eq!(net_z.top_layer(), Some(Layer(2)));
    }

    #[test]
    fn reports_parse_error_position() {
        let lib = lef::parse_str(SMALL_LEF, "small.lef").unwrap();
        let text = "DESIGN bad ;\nUNITS DISTANCE MICRONS 2000 ;\nDIEAREA ( 0 x ) ( 1 1 ) ;\n";
        let err = parse_str(text, "bad.def", &lib).unwrap_err();
        assert_eq!(format!("{}", err), "bad.def:3: expected y coordinate");
    }

    #[test]
    fn writer_output_reparses_identically() {
        let lib = lef::parse_str(SMALL_LEF, "small.lef").unwrap();
        let layout = parse_str(SMALL_DEF, "small.def", &lib).unwrap();
        let text = write_def(&layout, &["test".to_string()]);
        let again = parse_str(&text, "rt.def", &lib).unwrap();
        assert_eq!(again.design, layout.design);
        assert_eq!(again.nets.len(), layout.nets.len());
        let net_z = again.net("Z").unwrap();
        assert_eq!(net_z.routes.len(), 2);
        assert_eq!(
            net_z.routes[1].end_via.as_ref().unwrap().name,
            "via2_3"
        );
        // A second render is byte-identical.
        assert_eq!(text, write_def(&again, &["test".to_string()]));
    }
}
