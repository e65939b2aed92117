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

use clap::{App, Arg, ArgMatches};
use feol_attack::error::{Error, Result};
use feol_attack::layout::Layer;
use feol_attack::splitter::{self, SplitConfig};
use feol_attack::{def, lef};
use itertools::Itertools;
use std::fs;
use std::process;

fn run(parameters: &ArgMatches) -> Result<()> {
    let config_path = parameters.value_of("config").unwrap_or("split_def.ini");
    let last = SplitConfig::load(config_path)?.unwrap_or_default();
    if last != SplitConfig::default() {
        println!("[*] Last setup loaded from {}", config_path);
    }

    let input = parameters
        .value_of("input")
        .map(str::to_string)
        .or(last.input)
        .ok_or_else(|| Error::Schema("no input DEF file given (--input)".to_string()))?;
    let output = parameters
        .value_of("output")
        .map(str::to_string)
        .or(last.output)
        .ok_or_else(|| Error::Schema("no output DEF file given (--output)".to_string()))?;
    let split_layer = match parameters.value_of("split_layer") {
        Some(v) => Layer::parse(v)
            .ok_or_else(|| Error::Schema(format!("invalid split layer '{}'", v)))?,
        None => last
            .split_layer
            .ok_or_else(|| Error::Schema("no split layer given (--split-layer)".to_string()))?,
    };
    if split_layer == Layer(0) {
        return Err(Error::Schema(
            "split layer must be metal1..metal10".to_string(),
        ));
    }
    // Flags override the stored booleans as a pair; with neither flag the
    // previous run decides, and a missing file strips everything but the
    // front end (the layout a malicious foundry would hold).
    let cli_sides =
        parameters.is_present("front_end") || parameters.is_present("back_end");
    let (front_end, back_end) = if cli_sides {
        (
            parameters.is_present("front_end"),
            parameters.is_present("back_end"),
        )
    } else if last.front_end || last.back_end {
        (last.front_end, last.back_end)
    } else {
        (true, false)
    };

    let lef_path = parameters.value_of("lef").unwrap();
    println!("[*] Reading cell library {}", lef_path);
    let library = lef::parse_file(lef_path)?;

    println!("[*] Reading layout {}", input);
    let layout = def::parse_file(&input, &library)?;

    let kept = splitter::kept_layers(front_end, back_end, split_layer);
    println!(
        "[*] Splitting {} at {} (kept: {})",
        layout.design,
        split_layer,
        kept.iter().map(|l| l.to_string()).join(" ")
    );
    let partial = splitter::split_layout(&layout, &library, split_layer, &kept)?;
    println!(
        " [+] {} nets in, {} nets out",
        layout.nets.len(),
        partial.nets.len()
    );

    let notes = vec![format!(
        "Included metal layers: {}",
        kept.iter().map(|l| l.to_string()).join(" ")
    )];
    fs::write(&output, def::write_def(&partial, &notes))?;
    println!("[*] Partial layout written to {}", output);

    let config = SplitConfig {
        input: Some(input),
        output: Some(output),
        split_layer: Some(split_layer),
        front_end,
        back_end,
    };
    config.store(config_path)?;
    Ok(())
}

fn main() {
    let parameters = App::new("DEF splitter")
        .version("0.1")
        .about(
            "Strips a layout down to the layers one foundry of a split \
             manufacturing flow would see, for attack testing",
        )
        .arg(
            Arg::with_name("lef")
                .long("lef")
                .help("Standard-cell library (LEF)")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("input")
                .long("input")
                .help("Full layout (DEF); defaults to the last run's input")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("output")
                .long("output")
                .help("Path for the partial DEF; defaults to the last run's output")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("split_layer")
                .long("split-layer")
                .help("First censored layer (metal1..metal10)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("front_end")
                .long("front-end")
                .help("Keep the layers below the split"),
        )
        .arg(
            Arg::with_name("back_end")
                .long("back-end")
                .help("Keep the split layer and everything above"),
        )
        .arg(
            Arg::with_name("config")
                .long("config")
                .help("Settings file persisting the last run (default split_def.ini)")
                .takes_value(true),
        )
        .get_matches();

    process::exit(match run(&parameters) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("[!] {}", e);
            1
        }
    });
}
