// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel configuration header generation. The RME/RVM `General` blocks
//! and the chip's raw attribute/option/vector tables are "passed to the
//! architecture back end verbatim" (`spec.md` §3); this is that back
//! end — a single generated header the copied kernel sources `#include`,
//! grounded on the plain `writeln!`-into-a-`File::create` style of
//! `xtask::dist`'s `allocations.txt`/`map.txt` side files.

use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result as AnyResult};

use crate::emit::tree::OutputLayout;
use crate::error::{GenError, Result};
use crate::model::{Chip, Project, RecoveryPolicy};

pub fn write(layout: &OutputLayout, project: &Project, chip: &Chip) -> Result<()> {
    write_inner(layout, project, chip).map_err(|e| GenError::emission(format!("{e:#}")))
}

fn write_inner(layout: &OutputLayout, project: &Project, chip: &Chip) -> AnyResult<()> {
    let path = layout.rme_include_kernel.join("rme_config.h");
    let mut f = File::create(&path).with_context(|| format!("creating {}", path.display()))?;

    writeln!(f, "#ifndef RME_CONFIG_H")?;
    writeln!(f, "#define RME_CONFIG_H")?;
    writeln!(f)?;

    writeln!(f, "#define RME_EXTRA_KMEM ({})", project.rme.extra_kmem)?;
    writeln!(f, "#define RME_KERN_PRIOS ({})", project.rme.kern_prios)?;
    if !project.rme.kmem_order.is_empty() {
        writeln!(f, "#define RME_KMEM_ORDER {{{}}}", project.rme.kmem_order.join(", "))?;
    }
    for (name, value) in &project.rme.platform_attrs {
        writeln!(f, "#define RME_PLATFORM_{name} ({value})")?;
    }
    for (name, value) in &project.rme.chip_attrs {
        writeln!(f, "#define RME_CHIP_{name} ({value})")?;
    }
    writeln!(f)?;

    writeln!(f, "#define RVM_EXTRA_CAPTBL ({})", project.rvm.extra_captbl)?;
    let recovery = match project.rvm.recovery {
        RecoveryPolicy::Thread => "RVM_RECOVERY_THREAD",
        RecoveryPolicy::Process => "RVM_RECOVERY_PROCESS",
        RecoveryPolicy::System => "RVM_RECOVERY_SYSTEM",
    };
    writeln!(f, "#define RVM_RECOVERY {recovery}")?;
    writeln!(f)?;

    writeln!(f, "#define RME_CHIP_VENDOR \"{}\"", chip.vendor)?;
    writeln!(f, "#define RME_CHIP_CORES ({})", chip.cores)?;
    writeln!(f, "#define RME_CHIP_MPU_REGIONS ({})", chip.mpu_regions)?;
    for (name, value) in &chip.attrs {
        writeln!(f, "#define RME_CHIP_ATTR_{name} ({value})")?;
    }
    for opt in &chip.options {
        let kind = match opt.kind {
            crate::model::ChipOptionKind::Range => "Range",
            crate::model::ChipOptionKind::Select => "Select",
        };
        writeln!(f, "/* {} ({kind}) */", opt.name)?;
        writeln!(f, "#define {} ({})", opt.macro_name, opt.range)?;
    }
    for (name, vector) in &chip.vectors {
        writeln!(f, "#define RME_VECTOR_{name} ({})", vector.number)?;
    }

    writeln!(f)?;
    writeln!(f, "#endif /* RME_CONFIG_H */")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ChipOption, ChipOptionKind, CompilerOptions, InterruptVector, OptLevel, RmeConfig, RvmConfig,
    };
    use indexmap::IndexMap;

    fn compiler() -> CompilerOptions {
        CompilerOptions { opt_level: OptLevel::O2, prefer_size: true }
    }

    fn project() -> Project {
        let mut platform_attrs = IndexMap::new();
        platform_attrs.insert("STACK_CHECK".into(), "1".into());
        Project {
            name: "demo".into(),
            platform: "A7M".into(),
            chip_class: "C".into(),
            chip_full: "C".into(),
            rme: RmeConfig {
                compiler: compiler(),
                code_start: 0x0800_0000,
                code_size: 0x1000,
                data_start: 0x2000_0000,
                data_size: 0x200,
                extra_kmem: 0x40,
                kmem_order: vec!["4".into(), "5".into()],
                kern_prios: 32,
                platform_attrs,
                chip_attrs: IndexMap::new(),
            },
            rvm: RvmConfig {
                compiler: compiler(),
                code_size: 0x1000,
                data_size: 0x200,
                extra_captbl: 4,
                recovery: RecoveryPolicy::Process,
            },
            processes: vec![],
        }
    }

    fn chip() -> Chip {
        let mut vectors = IndexMap::new();
        vectors.insert("Timer".to_string(), InterruptVector { number: 28 });
        Chip {
            class: "STM32F405".into(),
            vendor: "ST".into(),
            platform: "A7M".into(),
            cores: 1,
            mpu_regions: 8,
            attrs: IndexMap::new(),
            code: vec![],
            data: vec![],
            device: vec![],
            options: vec![ChipOption {
                name: "Freq".into(),
                kind: ChipOptionKind::Range,
                macro_name: "RME_CHIP_FREQ".into(),
                range: "168000000".into(),
            }],
            vectors,
        }
    }

    #[test]
    fn header_carries_config_and_chip_constants() {
        let tmp = std::env::temp_dir().join(format!("rme-projgen-configtest-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        let project = project();
        let layout = crate::emit::tree::create(&tmp, "A7M", "C", &project).unwrap();
        write(&layout, &project, &chip()).unwrap();
        let contents = std::fs::read_to_string(layout.rme_include_kernel.join("rme_config.h")).unwrap();
        assert!(contents.contains("#define RME_EXTRA_KMEM (64)"));
        assert!(contents.contains("#define RME_KERN_PRIOS (32)"));
        assert!(contents.contains("#define RVM_RECOVERY RVM_RECOVERY_PROCESS"));
        assert!(contents.contains("#define RME_CHIP_FREQ (168000000)"));
        assert!(contents.contains("#define RME_VECTOR_Timer (28)"));
        std::fs::remove_dir_all(&tmp).ok();
    }
}
