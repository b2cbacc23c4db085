// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IDE/Makefile project file generation (`spec.md` §4.7 group 4).
//!
//! The source is not authoritative on Makefile flags (`spec.md` §9), so
//! the Makefile mirrors whatever compiler flags the Keil/Eclipse project
//! would carry for the same process, built by the same `compiler_flags`
//! helper all three formats share.

use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result as AnyResult};

use crate::cli::ProjectFormat;
use crate::emit::tree::OutputLayout;
use crate::error::{GenError, Result};
use crate::model::{CompilerOptions, OptLevel, Project};

fn compiler_flags(opts: &CompilerOptions) -> Vec<&'static str> {
    let mut flags = vec![match opts.opt_level {
        OptLevel::O0 => "-O0",
        OptLevel::O1 => "-O1",
        OptLevel::O2 => "-O2",
        OptLevel::O3 => "-O3",
        OptLevel::Os => "-Os",
    }];
    if opts.prefer_size {
        flags.push("-fdata-sections");
        flags.push("-ffunction-sections");
    }
    flags
}

pub fn write(layout: &OutputLayout, project: &Project, format: ProjectFormat) -> Result<()> {
    let result = match format {
        ProjectFormat::Keil => write_keil(layout, project),
        ProjectFormat::Eclipse => write_eclipse(layout, project),
        ProjectFormat::Makefile => write_makefile(layout, project),
    };
    result.map_err(|e| GenError::emission(format!("{e:#}")))
}

fn write_keil(layout: &OutputLayout, project: &Project) -> AnyResult<()> {
    let path = layout.rme_project.join("project.uvprojx");
    let mut f = create(&path)?;
    writeln!(f, "<?xml version=\"1.0\"?>")?;
    writeln!(f, "<Project>")?;
    writeln!(f, "  <Target><Name>{}</Name>", project.name)?;
    writeln!(f, "  <Device>{}</Device>", project.chip_full)?;
    writeln!(f, "  <Cads><Flags>{}</Flags></Cads>", compiler_flags(&project.rme.compiler).join(" "))?;
    writeln!(f, "  </Target>")?;
    writeln!(f, "</Project>")?;

    let mut rf = create(&layout.rvm_project.join("project.uvprojx"))?;
    writeln!(rf, "<?xml version=\"1.0\"?>")?;
    writeln!(rf, "<Project>")?;
    writeln!(rf, "  <Target><Name>{}.rvm</Name>", project.name)?;
    writeln!(rf, "  <Device>{}</Device>", project.chip_full)?;
    writeln!(rf, "  <Cads><Flags>{}</Flags></Cads>", compiler_flags(&project.rvm.compiler).join(" "))?;
    writeln!(rf, "  </Target>")?;
    writeln!(rf, "</Project>")?;

    for process in &project.processes {
        let root = &layout.process_roots[&process.name];
        let mut pf = create(&root.join("project.uvprojx"))?;
        writeln!(pf, "<?xml version=\"1.0\"?>")?;
        writeln!(pf, "<Project>")?;
        writeln!(pf, "  <Target><Name>{}</Name>", process.name)?;
        writeln!(pf, "  <Cads><Flags>{}</Flags></Cads>", compiler_flags(&process.compiler).join(" "))?;
        writeln!(pf, "  </Target>")?;
        writeln!(pf, "</Project>")?;
    }
    Ok(())
}

fn write_eclipse(layout: &OutputLayout, project: &Project) -> AnyResult<()> {
    let path = layout.rme_project.join(".cproject");
    let mut f = create(&path)?;
    writeln!(f, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(f, "<cproject storage_type_id=\"org.eclipse.cdt.core.XmlProjectDescriptionStorage\">")?;
    writeln!(f, "  <!-- {} ({}) -->", project.name, project.chip_full)?;
    writeln!(f, "  <option name=\"flags\" value=\"{}\"/>", compiler_flags(&project.rme.compiler).join(" "))?;
    writeln!(f, "</cproject>")?;

    let mut rf = create(&layout.rvm_project.join(".cproject"))?;
    writeln!(rf, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(rf, "<cproject storage_type_id=\"org.eclipse.cdt.core.XmlProjectDescriptionStorage\">")?;
    writeln!(rf, "  <!-- {}.rvm ({}) -->", project.name, project.chip_full)?;
    writeln!(rf, "  <option name=\"flags\" value=\"{}\"/>", compiler_flags(&project.rvm.compiler).join(" "))?;
    writeln!(rf, "</cproject>")?;

    for process in &project.processes {
        let root = &layout.process_roots[&process.name];
        let mut pf = create(&root.join(".cproject"))?;
        writeln!(pf, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(pf, "<cproject storage_type_id=\"org.eclipse.cdt.core.XmlProjectDescriptionStorage\">")?;
        writeln!(pf, "  <!-- {} -->", process.name)?;
        writeln!(pf, "  <option name=\"flags\" value=\"{}\"/>", compiler_flags(&process.compiler).join(" "))?;
        writeln!(pf, "</cproject>")?;
    }
    Ok(())
}

fn write_makefile(layout: &OutputLayout, project: &Project) -> AnyResult<()> {
    let path = layout.rme_project.join("Makefile");
    let mut f = create(&path)?;
    writeln!(f, "# generated for {}", project.name)?;
    writeln!(f, "CFLAGS = {}", compiler_flags(&project.rme.compiler).join(" "))?;
    writeln!(f, "all:\n\t$(CC) $(CFLAGS) -o kernel.elf")?;

    let mut rf = create(&layout.rvm_project.join("Makefile"))?;
    writeln!(rf, "# generated for {}.rvm", project.name)?;
    writeln!(rf, "CFLAGS = {}", compiler_flags(&project.rvm.compiler).join(" "))?;
    writeln!(rf, "all:\n\t$(CC) $(CFLAGS) -o rvm.elf")?;

    for process in &project.processes {
        let root = &layout.process_roots[&process.name];
        let mut pf = create(&root.join("Makefile"))?;
        writeln!(pf, "# generated for {}", process.name)?;
        writeln!(pf, "CFLAGS = {}", compiler_flags(&process.compiler).join(" "))?;
        writeln!(pf, "all:\n\t$(CC) $(CFLAGS) -o {}.elf", process.name)?;
    }
    Ok(())
}

fn create(path: &std::path::Path) -> AnyResult<File> {
    File::create(path).with_context(|| format!("creating {}", path.display()))
}
