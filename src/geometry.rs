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

//! Per-net geometry: where a net's signal escapes into the censored layers,
//! and which region of the die a continuation wire could plausibly reach.

use crate::layout::{Layer, Layout, Net, Point, Rect};
use crate::layout::via_base;
use std::collections::HashMap;

#[derive(Debug)]
pub struct NetGeometry {
    /// Points from which the signal departs into the missing layers: origins
    /// of vias that climb past the top FEOL layer, plus the placed points of
    /// the net's primary pins.
    pub end_points: Vec<Point>,
    /// Every routed point mapped to the other points of its segments.
    pub adjacency: HashMap<Point, Vec<Point>>,
    /// One reachable rectangle per end-point; see [`reachable_rect`].
    pub rects: Vec<Rect>,
    all_points: Vec<Point>,
}

impl NetGeometry {
    /// Points used for distance measurement: the end-points when the net has
    /// any, otherwise every routed point (a net fully below the cut still has
    /// measurable geometry even though nothing escapes it).
    pub fn anchors(&self) -> &[Point] {
        if self.end_points.is_empty() {
            &self.all_points
        } else {
            &self.end_points
        }
    }
}

/// The axis-aligned region a continuation wire from `end` could reach
/// without doubling back through the metal already attached to it. Each
/// neighbor clips away the half-plane the existing wire occupies.
fn reachable_rect(die: Rect, end: Point, neighbors: &[Point]) -> Rect {
    let mut r = die;
    for n in neighbors {
        let dx = n.x - end.x;
        let dy = n.y - end.y;
        if dx > 0 {
            r.max.x = r.max.x.min(end.x);
        } else if dx < 0 {
            r.min.x = r.min.x.max(end.x);
        }
        if dy > 0 {
            r.max.y = r.max.y.min(end.y);
        } else if dy < 0 {
            r.min.y = r.min.y.max(end.y);
        }
    }
    r
}

/// Analyzes one net against the given top FEOL layer. With
/// `die_area_fallback` set, a net with no end-points is treated as reachable
/// from the whole die; without it such nets get no reachable region at all.
pub fn analyze(net: &Net, layout: &Layout, top: Layer, die_area_fallback: bool) -> NetGeometry {
    let mut adjacency: HashMap<Point, Vec<Point>> = HashMap::new();
    let mut all_points = Vec::new();
    for seg in &net.routes {
        for (i, p) in seg.points.iter().enumerate() {
            all_points.push(*p);
            for (j, q) in seg.points.iter().enumerate() {
                if i != j {
                    adjacency.entry(*p).or_insert_with(Vec::new).push(*q);
                }
            }
        }
    }

    let mut end_points: Vec<Point> = Vec::new();
    for seg in &net.routes {
        if let Some(via) = &seg.end_via {
            if via_base(&via.name) == Some(top.0) && !end_points.contains(&via.at) {
                end_points.push(via.at);
            }
        }
    }
    for cp in &net.comp_pins {
        if !cp.is_primary() {
            continue;
        }
        if let Some(pin) = layout.io_pin(&cp.pin) {
            if !end_points.contains(&pin.placed) {
                end_points.push(pin.placed);
            }
        }
    }

    let rects = if end_points.is_empty() {
        if die_area_fallback {
            vec![layout.die_area]
        } else {
            Vec::new()
        }
    } else {
        end_points
            .iter()
            .map(|e| {
                let neighbors = adjacency.get(e).map(|v| v.as_slice()).unwrap_or(&[]);
                reachable_rect(layout.die_area, *e, neighbors)
            })
            .collect()
    };

    NetGeometry {
        end_points,
        adjacency,
        rects,
        all_points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::tests::{die, inv_library};
    use crate::layout::{IoPin, Layout, PinDirection, PinRef, RouteSegment, Via};

    fn layout_with(nets: Vec<Net>, io_pins: Vec<IoPin>) -> Layout {
        Layout::build(
            "top".to_string(),
            "5.7".to_string(),
            2000,
            die(),
            Vec::new(),
            io_pins,
            nets,
            &inv_library(),
        )
        .unwrap()
    }

    fn seg(layer: u8, points: Vec<(i64, i64)>, via: Option<(&str, (i64, i64))>) -> RouteSegment {
        RouteSegment {
            layer: Layer(layer),
            points: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            end_via: via.map(|(name, (x, y))| Via {
                name: name.to_string(),
                at: Point::new(x, y),
            }),
        }
    }

    #[test]
    fn via_on_top_layer_is_end_point() {
        let net = Net {
            name: "n".to_string(),
            comp_pins: Vec::new(),
            routes: vec![
                seg(1, vec![(100, 100)], Some(("via1_0", (100, 100)))),
                seg(2, vec![(100, 100), (100, 900)], Some(("via2_4", (100, 900)))),
            ],
        };
        let layout = layout_with(vec![net], Vec::new());
        let geo = analyze(&layout.nets[0], &layout, Layer(2), true);
        // Only the via climbing past metal2 counts; via1 stays internal.
        assert_eq!(geo.end_points, vec![Point::new(100, 900)]);
    }

    #[test]
    fn primary_pin_placement_is_end_point() {
        let net = Net {
            name: "A".to_string(),
            comp_pins: vec![PinRef::primary("A")],
            routes: vec![seg(1, vec![(0, 500), (400, 500)], None)],
        };
        let pin = IoPin {
            name: "A".to_string(),
            net: "A".to_string(),
            direction: PinDirection::Input,
            layer: Layer(1),
            placed: Point::new(0, 500),
        };
        let layout = layout_with(vec![net], vec![pin]);
        let geo = analyze(&layout.nets[0], &layout, Layer(2), true);
        assert_eq!(geo.end_points, vec![Point::new(0, 500)]);
    }

    #[test]
    fn adjacency_links_points_of_same_segment() {
        let net = Net {
            name: "n".to_string(),
            comp_pins: Vec::new(),
            routes: vec![seg(1, vec![(0, 0), (10, 0), (10, 20)], None)],
        };
        let layout = layout_with(vec![net], Vec::new());
        let geo = analyze(&layout.nets[0], &layout, Layer(2), true);
        let n = &geo.adjacency[&Point::new(10, 0)];
        assert!(n.contains(&Point::new(0, 0)));
        assert!(n.contains(&Point::new(10, 20)));
    }

    #[test]
    fn rect_clips_away_existing_wire() {
        // Wire extends rightward and upward from the end-point, so the
        // continuation region is the lower-left quadrant at (500, 600).
        let net = Net {
            name: "n".to_string(),
            comp_pins: Vec::new(),
            routes: vec![seg(
                2,
                vec![(900, 600), (500, 600), (500, 800)],
                Some(("via2_0", (500, 600))),
            )],
        };
        let layout = layout_with(vec![net], Vec::new());
        let geo = analyze(&layout.nets[0], &layout, Layer(2), true);
        assert_eq!(geo.end_points, vec![Point::new(500, 600)]);
        let r = geo.rects[0];
        assert_eq!(r.max, Point::new(500, 600));
        assert_eq!(r.min, Point::new(0, 0));
        assert!(r.contains(Point::new(100, 100)));
        assert!(!r.contains(Point::new(501, 600)));
    }

    #[test]
    fn no_end_points_defaults_to_die_area() {
        let net = Net {
            name: "n".to_string(),
            comp_pins: Vec::new(),
            routes: vec![seg(1, vec![(0, 0), (10, 0)], None)],
        };
        let layout = layout_with(vec![net], Vec::new());
        let open = analyze(&layout.nets[0], &layout, Layer(2), true);
        assert_eq!(open.rects, vec![die()]);
        let closed = analyze(&layout.nets[0], &layout, Layer(2), false);
        assert!(closed.rects.is_empty());
        // Distance anchors fall back to the routed points either way.
        assert_eq!(open.anchors(), &[Point::new(0, 0), Point::new(10, 0)]);
    }
}
