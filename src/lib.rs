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

//! Reconstructs the hidden upper-metal interconnect of a split-manufactured
//! layout from its FEOL view, as a min-cost max-flow assignment between
//! dangling source and sink pins.

pub mod attack;
pub mod chain;
pub mod def;
pub mod error;
pub mod flow;
pub mod geometry;
pub mod layout;
pub mod lef;
pub mod matrix;
pub mod netlist;
pub mod splitter;
