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

//! LEF cell-library reader. Only the constructs the attack consumes are
//! interpreted: MACRO size, pin directions and the topmost metal of each
//! pin's port geometry. Everything else is skipped and accounted for.

use crate::error::{Error, Result};
use crate::layout::{Layer, Library, Macro, MacroPin, PinDirection};
use std::fs;

// Section nesting is tracked with an explicit stack of tagged states: a LEF
// file is a small pushdown language (MACRO > PIN > PORT).
enum Frame {
    Macro(Macro),
    Pin(MacroPin),
    Port,
}

#[derive(Copy, Clone, PartialEq)]
enum FrameTag {
    Top,
    Macro,
    Pin,
    Port,
}

// Attribute keywords that are valid LEF but carry nothing the attack needs.
const SKIPPED_KEYWORDS: &[&str] = &[
    "VERSION",
    "BUSBITCHARS",
    "DIVIDERCHAR",
    "NAMESCASESENSITIVE",
    "UNITS",
    "DATABASE",
    "MANUFACTURINGGRID",
    "CLEARANCEMEASURE",
    "USEMINSPACING",
    "CLASS",
    "FOREIGN",
    "ORIGIN",
    "SYMMETRY",
    "SITE",
    "USE",
    "SHAPE",
    "RECT",
    "POLYGON",
    "PROPERTY",
];

pub fn parse_file(path: &str) -> Result<Library> {
    let text = fs::read_to_string(path)?;
    parse_str(&text, path)
}

pub fn parse_str(text: &str, file: &str) -> Result<Library> {
    let mut library = Library::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut ignored = 0usize;

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let keyword = tokens[0];
        let tag = match stack.last() {
            None => FrameTag::Top,
            Some(Frame::Macro(_)) => FrameTag::Macro,
            Some(Frame::Pin(_)) => FrameTag::Pin,
            Some(Frame::Port) => FrameTag::Port,
        };

        match (tag, keyword) {
            (FrameTag::Top, "MACRO") => {
                let name = tokens
                    .get(1)
                    .ok_or_else(|| Error::parse(file, lineno, "MACRO name"))?;
                stack.push(Frame::Macro(Macro {
                    name: name.to_string(),
                    size_x: 0.0,
                    size_y: 0.0,
                    pins: Vec::new(),
                }));
            }
            (FrameTag::Top, "END") => {}
            (FrameTag::Top, _) => {
                if !SKIPPED_KEYWORDS.contains(&keyword) {
                    // Top-level LAYER / VIA / SPACING sections and their bodies.
                    ignored += 1;
                }
            }

            (FrameTag::Macro, "SIZE") => {
                // SIZE <x> BY <y> ;
                if tokens.len() < 4 || tokens[2] != "BY" {
                    return Err(Error::parse(file, lineno, "SIZE <x> BY <y>"));
                }
                let size_x = tokens[1]
                    .parse::<f64>()
                    .map_err(|_| Error::parse(file, lineno, "macro width"))?;
                let size_y = tokens[3]
                    .trim_end_matches(';')
                    .parse::<f64>()
                    .map_err(|_| Error::parse(file, lineno, "macro height"))?;
                if let Some(Frame::Macro(mac)) = stack.last_mut() {
                    mac.size_x = size_x;
                    mac.size_y = size_y;
                }
            }
            (FrameTag::Macro, "PIN") => {
                let name = tokens
                    .get(1)
                    .ok_or_else(|| Error::parse(file, lineno, "PIN name"))?;
                stack.push(Frame::Pin(MacroPin {
                    name: name.to_string(),
                    direction: PinDirection::Inout,
                    layer: Layer(1),
                }));
            }
            (FrameTag::Macro, "OBS") => stack.push(Frame::Port),
            (FrameTag::Macro, "END") => {
                let closes = match stack.last() {
                    Some(Frame::Macro(mac)) => tokens.get(1) == Some(&mac.name.as_str()),
                    _ => false,
                };
                if !closes {
                    return Err(Error::parse(file, lineno, "END <macro name>"));
                }
                if let Some(Frame::Macro(done)) = stack.pop() {
                    library.add_macro(done);
                }
            }
            (FrameTag::Macro, _) => {
                if !SKIPPED_KEYWORDS.contains(&keyword) {
                    ignored += 1;
                }
            }

            (FrameTag::Pin, "DIRECTION") => {
                let dir = tokens
                    .get(1)
                    .map(|t| t.trim_end_matches(';'))
                    .and_then(PinDirection::parse)
                    .ok_or_else(|| Error::parse(file, lineno, "pin direction"))?;
                if let Some(Frame::Pin(pin)) = stack.last_mut() {
                    pin.direction = dir;
                }
            }
            (FrameTag::Pin, "PORT") => stack.push(Frame::Port),
            (FrameTag::Pin, "END") => {
                let closes = match stack.last() {
                    Some(Frame::Pin(pin)) => tokens.get(1) == Some(&pin.name.as_str()),
                    _ => false,
                };
                if !closes {
                    return Err(Error::parse(file, lineno, "END <pin name>"));
                }
                if let Some(Frame::Pin(done)) = stack.pop() {
                    match stack.last_mut() {
                        Some(Frame::Macro(mac)) => mac.pins.push(done),
                        _ => return Err(Error::parse(file, lineno, "PIN inside MACRO")),
                    }
                }
            }
            (FrameTag::Pin, _) => {
                if !SKIPPED_KEYWORDS.contains(&keyword) && !keyword.starts_with("ANTENNA") {
                    ignored += 1;
                }
            }

            (FrameTag::Port, "LAYER") => {
                let layer = tokens
                    .get(1)
                    .map(|t| t.trim_end_matches(';'))
                    .and_then(Layer::parse);
                // The pin's layer is the topmost metal over all its ports.
                if let Some(layer) = layer {
                    let below = stack.len().wrapping_sub(2);
                    if let Some(Frame::Pin(pin)) = stack.get_mut(below) {
                        if layer > pin.layer {
                            pin.layer = layer;
                        }
                    }
                }
            }
            (FrameTag::Port, "END") => {
                stack.pop();
            }
            (FrameTag::Port, _) => {
                if !SKIPPED_KEYWORDS.contains(&keyword) {
                    ignored += 1;
                }
            }
        }
    }

    if ignored > 0 {
        println!("[*] lef: {} unrecognized lines ignored in {}", ignored, file);
    }
    if library.is_empty() {
        return Err(Error::parse(file, text.lines().count(), "at least one MACRO"));
    }
    Ok(library)
}
