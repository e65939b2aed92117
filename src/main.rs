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
use feol_attack::attack::{self, AttackOptions};
use feol_attack::error::{Error, Result};
use feol_attack::{def, lef};
use std::fs;
use std::process;

fn run(parameters: &ArgMatches) -> Result<i32> {
    let lef_path = parameters.value_of("lef").unwrap();
    let def_path = parameters.value_of("input").unwrap();
    let out_path = parameters.value_of("output").unwrap();

    let source_cap = match parameters.value_of("source_cap") {
        Some(v) => Some(v.parse::<u64>().map_err(|_| {
            Error::Schema(format!(
                "--source-cap expects a positive integer, got '{}'",
                v
            ))
        })?),
        None => None,
    };
    let options = AttackOptions {
        source_cap,
        die_area_fallback: !parameters.is_present("no_die_fallback"),
    };

    println!("[*] Reading cell library {}", lef_path);
    let library = lef::parse_file(lef_path)?;
    println!(" [+] {} macros", library.len());

    println!("[*] Reading layout {}", def_path);
    let layout = def::parse_file(def_path, &library)?;
    println!(
        " [+] design {}: {} components, {} pins, {} nets",
        layout.design,
        layout.components.len(),
        layout.io_pins.len(),
        layout.nets.len()
    );

    let outcome = attack::run(layout, &library, &options);

    fs::write(out_path, outcome.netlist.to_verilog())?;
    println!("[*] Netlist written to {}", out_path);

    if !outcome.unresolved.is_empty() {
        eprintln!(
            "[!] reconstruction incomplete: {} sinks left unresolved",
            outcome.unresolved.len()
        );
        return Ok(2);
    }
    if outcome.inferred_cycle.is_some() && parameters.is_present("strict") {
        return Ok(3);
    }
    Ok(0)
}

fn main() {
    let parameters = App::new("FEOL network-flow attack")
        .version("0.1")
        .about(
            "Infers the censored upper-metal connections of a split-manufactured \
             layout and emits a gate-level netlist",
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
                .help("Partial layout under attack (DEF)")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("output")
                .long("output")
                .help("Path for the inferred gate-level netlist")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name("strict")
                .long("strict")
                .help("Fail (exit 3) when the inferred netlist contains a combinational loop"),
        )
        .arg(
            Arg::with_name("source_cap")
                .long("source-cap")
                .help("Maximum fan-out per source pin (default: number of sinks)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("no_die_fallback")
                .long("no-die-fallback")
                .help("Do not treat nets without end-points as reachable from the whole die"),
        )
        .get_matches();

    process::exit(match run(&parameters) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[!] {}", e);
            1
        }
    });
}
