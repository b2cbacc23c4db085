// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linker/scatter script generation (`spec.md` §4.7 group 2, §6
//! "Linker/scatter output"). Grounded on
//! `xtask::dist::generate_kernel_linker_script`/
//! `generate_task_linker_script`: a `MEMORY { ... }` block written with
//! plain `writeln!` calls, one region per named segment, addresses and
//! sizes taken straight from placement.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result as AnyResult};

use crate::cli::ProjectFormat;
use crate::emit::tree::OutputLayout;
use crate::error::{GenError, Result};
use crate::model::{MemKind, Project};
use crate::place::Placement;

struct Region {
    name: String,
    start: u32,
    size: u32,
}

pub fn write_all(
    layout: &OutputLayout,
    project: &Project,
    placement: &Placement,
    format: ProjectFormat,
) -> Result<()> {
    let rme_regions = vec![
        Region { name: "FLASH".into(), start: placement.rme_code, size: project.rme.code_size },
        Region { name: "RAM".into(), start: placement.rme_data, size: project.rme.data_size },
    ];
    write_one(&layout.rme_project.join("link"), &rme_regions, format)?;

    let rvm_regions = vec![
        Region { name: "FLASH".into(), start: placement.rvm_code, size: project.rvm.code_size },
        Region { name: "RAM".into(), start: placement.rvm_data, size: project.rvm.data_size },
    ];
    write_one(&layout.rvm_project.join("link"), &rvm_regions, format)?;

    for process in &project.processes {
        let mut regions = Vec::new();
        for (i, seg) in process.memory(MemKind::Code).iter().enumerate() {
            regions.push(Region {
                name: format!("FLASH{i}"),
                start: seg.start.concrete().expect("placement fills every start"),
                size: seg.size,
            });
        }
        for (i, seg) in process.memory(MemKind::Data).iter().enumerate() {
            regions.push(Region {
                name: format!("RAM{i}"),
                start: seg.start.concrete().expect("placement fills every start"),
                size: seg.size,
            });
        }
        let root = &layout.process_roots[&process.name];
        write_one(&root.join("link"), &regions, format)?;
    }

    Ok(())
}

fn write_one(stem: &Path, regions: &[Region], format: ProjectFormat) -> Result<()> {
    let result = match format {
        ProjectFormat::Keil => write_scatter(&stem.with_extension("scat"), regions),
        ProjectFormat::Eclipse | ProjectFormat::Makefile => write_ld(&stem.with_extension("ld"), regions),
    };
    result.map_err(|e| GenError::emission(format!("{e:#}")))
}

fn write_ld(path: &Path, regions: &[Region]) -> AnyResult<()> {
    let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    writeln!(f, "MEMORY\n{{")?;
    for r in regions {
        writeln!(
            f,
            "  {} (rwx) : ORIGIN = 0x{:08x}, LENGTH = 0x{:08x}",
            r.name, r.start, r.size
        )?;
    }
    writeln!(f, "}}")?;
    Ok(())
}

fn write_scatter(path: &Path, regions: &[Region]) -> AnyResult<()> {
    let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    for r in regions {
        writeln!(f, "{} 0x{:08x} 0x{:08x} {{", r.name, r.start, r.size)?;
        writeln!(f, "  {}.o (+RO)", r.name)?;
        writeln!(f, "}}")?;
    }
    Ok(())
}
