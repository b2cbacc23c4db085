// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot-time capability script generation (`spec.md` §4.7 group 3, §6
//! "Boot capability script output"). Creates kernel objects in the
//! agreed global-ID order, then emits delegations — grounded on the
//! `writeln!`-into-a-generated-source-file style of
//! `xtask::dist::generate_kernel_linker_script`'s descriptor table.

use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result as AnyResult};

use crate::captbl::{CapAllocation, GlobalKind};
use crate::emit::tree::OutputLayout;
use crate::error::{GenError, Result};
use crate::model::{Addr, Project};

fn addr_arg(addr: Addr) -> String {
    match addr {
        Addr::Concrete(a) => format!("0x{a:08x}u"),
        Addr::Auto => "RME_ADDR_AUTO".into(),
    }
}

pub fn write(layout: &OutputLayout, project: &Project, alloc: &CapAllocation) -> Result<()> {
    write_inner(layout, project, alloc).map_err(|e| GenError::emission(format!("{e:#}")))
}

fn write_inner(layout: &OutputLayout, project: &Project, alloc: &CapAllocation) -> AnyResult<()> {
    let path = layout.rvm_project.join("boot_caps.c");
    let mut f = File::create(&path).with_context(|| format!("creating {}", path.display()))?;

    writeln!(f, "/* generated boot-time capability creation script */")?;
    for (gid, entry) in alloc.global.iter().enumerate() {
        match entry.kind {
            GlobalKind::Captbl => {
                let proc = project.process(&entry.owner_process).expect("captbl owner exists");
                let ids = &alloc.process_ids[&proc.name];
                writeln!(f, "RVM_Captbl_Crt({gid}, {}); /* {} */", ids.captbl_size, proc.name)?;
            }
            GlobalKind::Process => {
                writeln!(f, "RVM_Process_Crt({gid}); /* {} */", entry.owner_process)?;
            }
            GlobalKind::Thread => {
                let proc = project.process(&entry.owner_process).expect("thread owner exists");
                let t = proc
                    .threads
                    .iter()
                    .find(|t| t.name == entry.object_name)
                    .expect("thread entry matches an allocated thread");
                writeln!(
                    f,
                    "RVM_Thd_Crt({gid}, {}, {}, {}, \"{}\", {}); /* {}::{} */",
                    t.entry,
                    addr_arg(t.stack_addr),
                    t.stack_size,
                    t.parameter,
                    t.priority,
                    proc.name,
                    t.name
                )?;
            }
            GlobalKind::Invocation => {
                let proc = project.process(&entry.owner_process).expect("invocation owner exists");
                let i = proc
                    .invocations
                    .iter()
                    .find(|i| i.name == entry.object_name)
                    .expect("invocation entry matches an allocated invocation");
                writeln!(
                    f,
                    "RVM_Inv_Crt({gid}, {}, {}, {}); /* {}::{} */",
                    i.entry,
                    addr_arg(i.stack_addr),
                    i.stack_size,
                    proc.name,
                    i.name
                )?;
            }
            GlobalKind::Receive => {
                writeln!(
                    f,
                    "RVM_Recv_Crt({gid}); /* {}::{} */",
                    entry.owner_process, entry.object_name
                )?;
            }
        }
    }

    writeln!(f, "/* delegations */")?;
    for process in &project.processes {
        for port in &process.ports {
            let gid = alloc.port_global[&(process.name.clone(), port.name.clone())];
            writeln!(
                f,
                "RVM_Port_Delegate({}, {gid}); /* {}.{} -> {} */",
                gid, process.name, port.name, port.target_process
            )?;
        }
        for send in &process.sends {
            let gid = alloc.send_global[&(process.name.clone(), send.name.clone())];
            writeln!(
                f,
                "RVM_Send_Delegate({}, {gid}); /* {}.{} -> {} */",
                gid, process.name, send.name, send.target_process
            )?;
        }
        for vector in &process.vectors {
            writeln!(
                f,
                "RVM_Vect_Delegate({}, {}); /* {}.{} */",
                vector.interrupt_number, process.name, process.name, vector.name
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captbl::allocate;
    use crate::model::{
        Addr, CompilerOptions, Invocation, MemAttrs, MemKind, MemorySegment, OptLevel, Port,
        Process, RecoveryPolicy, RmeConfig, RvmConfig,
    };
    use indexmap::IndexMap;

    fn compiler() -> CompilerOptions {
        CompilerOptions { opt_level: OptLevel::O2, prefer_size: true }
    }

    fn seg(kind: MemKind) -> MemorySegment {
        MemorySegment { start: Addr::Concrete(0x1000), size: 0x1000, kind, attrs: MemAttrs::R, align: 32 }
    }

    #[test]
    fn creation_order_matches_global_ids() {
        let mut a = Process {
            name: "A".into(),
            extra_captbl: 0,
            compiler: compiler(),
            code: vec![seg(MemKind::Code)],
            data: vec![seg(MemKind::Data)],
            device: vec![],
            threads: vec![],
            invocations: vec![Invocation {
                name: "Foo".into(),
                entry: "foo".into(),
                stack_addr: Addr::Auto,
                stack_size: 0x100,
            }],
            ports: vec![],
            receives: vec![],
            sends: vec![],
            vectors: vec![],
        };
        let mut b = a.clone_shape("B");
        b.ports.push(Port { name: "Foo".into(), target_process: "A".into() });
        a.name = "A".into();

        let project = Project {
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
                extra_kmem: 0,
                kmem_order: vec![],
                kern_prios: 32,
                platform_attrs: IndexMap::new(),
                chip_attrs: IndexMap::new(),
            },
            rvm: RvmConfig {
                compiler: compiler(),
                code_size: 0x1000,
                data_size: 0x200,
                extra_captbl: 0,
                recovery: RecoveryPolicy::Thread,
            },
            processes: vec![a, b],
        };
        let alloc = allocate(&project).unwrap();

        let tmp = std::env::temp_dir().join(format!("rme-projgen-boottest-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        let layout = crate::emit::tree::create(&tmp, "A7M", "C", &project).unwrap();
        write(&layout, &project, &alloc).unwrap();
        let contents = std::fs::read_to_string(layout.rvm_project.join("boot_caps.c")).unwrap();
        assert!(contents.contains("RVM_Captbl_Crt(0"));
        assert!(contents.contains("RVM_Port_Delegate"));
        std::fs::remove_dir_all(&tmp).ok();
    }

    impl Process {
        fn clone_shape(&self, name: &str) -> Process {
            let mut p = self.clone();
            p.name = name.into();
            p.invocations.clear();
            p
        }
    }
}
