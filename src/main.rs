// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entry point: the eight-stage generator pipeline (`spec.md` §2).
//! Every stage either advances the model or aborts the whole run; there
//! is no partial output and nothing is retried (`spec.md` §7).

use clap::Parser;

mod align;
mod captbl;
mod cli;
mod emit;
mod error;
mod ingest;
mod model;
mod mpu;
mod place;
mod validate;

use align::ArmV7M;
use cli::Args;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    cli::validate(&args)?;

    let mut project = ingest::project::load(&args.project_xml)?;
    println!("loaded project {} ({} processes)", project.name, project.processes.len());
    let chip = ingest::chip::load(&ingest::chip::chip_xml_path(
        &args.rme_root,
        &project.platform,
        &project.chip_class,
    ))?;
    println!("loaded chip {} ({} cores, {} MPU regions)", chip.class, chip.cores, chip.mpu_regions);

    validate::validate(&project, &chip)?;

    let aligner = ArmV7M;
    for process in &mut project.processes {
        align::align_all(&aligner, &mut process.code)?;
        align::align_all(&aligner, &mut process.data)?;
    }

    let placement = place::place(&chip, &mut project)?;
    println!(
        "placed RME code {:#010x}, RVM code {:#010x}, RME data {:#010x}, RVM data {:#010x}",
        placement.rme_code, placement.rvm_code, placement.rme_data, placement.rvm_data
    );

    let alloc = captbl::allocate(&project)?;
    println!("allocated {} global capability IDs", alloc.frontier());

    emit::emit(
        &args.output_dir,
        &args.rme_root,
        &args.rvm_root,
        args.format,
        &project,
        &chip,
        &placement,
        &alloc,
    )?;
    println!("emitted project tree to {}", args.output_dir.display());

    Ok(())
}
