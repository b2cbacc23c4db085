// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-process MPU page-table emission (`spec.md` §4.5, §4.7).
//!
//! `mpu::synthesize` hands back a tree of regions/subregions; this walks
//! it pre-order and lowers each node to a `RME_Pgtbl_Crt`/`_Con` pair and
//! each mapped leaf to a `RME_Pgtbl_Set_Attr`, the same
//! generated-source-file style as `bootscript.rs`.

use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result as AnyResult};

use crate::emit::tree::OutputLayout;
use crate::error::{GenError, Result};
use crate::model::{MemAttrs, MemKind, Project};
use crate::mpu::{self, MpuNode, Subregion};

fn attr_macro(attrs: MemAttrs) -> String {
    let mut parts = Vec::new();
    if attrs.contains(MemAttrs::R) {
        parts.push("RME_PGTBL_R");
    }
    if attrs.contains(MemAttrs::W) {
        parts.push("RME_PGTBL_W");
    }
    if attrs.contains(MemAttrs::X) {
        parts.push("RME_PGTBL_X");
    }
    if attrs.contains(MemAttrs::BUFFERABLE) {
        parts.push("RME_PGTBL_BUFFERABLE");
    }
    if attrs.contains(MemAttrs::CACHEABLE) {
        parts.push("RME_PGTBL_CACHEABLE");
    }
    if attrs.contains(MemAttrs::STATIC) {
        parts.push("RME_PGTBL_STATIC");
    }
    if parts.is_empty() {
        "0".into()
    } else {
        parts.join(" | ")
    }
}

/// Flattens a tree into `(node_id, parent_id, subregion_index_in_parent)`
/// create calls followed by the leaf attribute sets, in the order the
/// boot script expects to issue them: parents before children.
fn flatten(f: &mut File, node: &MpuNode, id: u32, parent: Option<(u32, usize)>) -> AnyResult<u32> {
    match parent {
        Some((pid, idx)) => writeln!(
            f,
            "RME_Pgtbl_Crt({id}, {pid}, {idx}, /* base */ 0x{:08x}u, /* size_order */ {}, /* num_order */ {});",
            node.base, node.size_order, node.num_order
        ),
        None => writeln!(
            f,
            "RME_Pgtbl_Crt_Root({id}, /* base */ 0x{:08x}u, /* size_order */ {}, /* num_order */ {});",
            node.base, node.size_order, node.num_order
        ),
    }?;

    let mut next_id = id + 1;
    for (idx, sub) in node.subregions.iter().enumerate() {
        match sub {
            Subregion::Mapped(attrs) => {
                writeln!(f, "RME_Pgtbl_Set_Attr({id}, {idx}, {});", attr_macro(*attrs))?;
            }
            Subregion::Disabled => {}
            Subregion::Child(child) => {
                next_id = flatten(f, child, next_id, Some((id, idx)))?;
            }
        }
    }
    Ok(next_id)
}

/// Builds the combined code+data+device segment list the synthesizer
/// covers for a single process, then writes `pgtbl.c` into that
/// process's output root.
pub fn write(layout: &OutputLayout, project: &Project) -> Result<()> {
    write_inner(layout, project).map_err(|e| GenError::emission(format!("{e:#}")))
}

fn write_inner(layout: &OutputLayout, project: &Project) -> AnyResult<()> {
    for process in &project.processes {
        let mut segs = Vec::new();
        for kind in [MemKind::Code, MemKind::Data, MemKind::Device] {
            for seg in process.memory(kind) {
                let Some(start) = seg.start.concrete() else { continue };
                segs.push((start as u64..start as u64 + seg.size as u64, seg.attrs));
            }
        }
        if segs.is_empty() {
            continue;
        }
        segs.sort_by_key(|(r, _)| r.start);

        let root = layout
            .process_roots
            .get(&process.name)
            .ok_or_else(|| anyhow::anyhow!("no output root for process '{}'", process.name))?;
        let path = root.join("pgtbl.c");
        let mut f = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        writeln!(f, "/* generated MPU page table for process '{}' */", process.name)?;

        let tree = mpu::synthesize(&segs, 32)?;
        flatten(&mut f, &tree, 0, None)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Addr, CompilerOptions, MemorySegment, OptLevel, Process, RecoveryPolicy, RmeConfig,
        RvmConfig,
    };
    use indexmap::IndexMap;

    fn compiler() -> CompilerOptions {
        CompilerOptions { opt_level: OptLevel::O2, prefer_size: true }
    }

    fn seg(kind: MemKind, start: u32, size: u32, attrs: MemAttrs) -> MemorySegment {
        MemorySegment { start: Addr::Concrete(start), size, kind, attrs, align: 32 }
    }

    fn project_with(process: Process) -> Project {
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
            processes: vec![process],
        }
    }

    #[test]
    fn writes_one_pgtbl_file_per_process() {
        let process = Process {
            name: "A".into(),
            extra_captbl: 0,
            compiler: compiler(),
            code: vec![seg(MemKind::Code, 0x0801_0000, 0x1000, MemAttrs::R | MemAttrs::X)],
            data: vec![seg(MemKind::Data, 0x2000_0000, 0x400, MemAttrs::R | MemAttrs::W)],
            device: vec![],
            threads: vec![],
            invocations: vec![],
            ports: vec![],
            receives: vec![],
            sends: vec![],
            vectors: vec![],
        };
        let project = project_with(process);
        let tmp = std::env::temp_dir().join(format!("rme-projgen-pgtbltest-{}", std::process::id()));
        std::fs::create_dir_all(&tmp).unwrap();
        let layout = crate::emit::tree::create(&tmp, "A7M", "C", &project).unwrap();
        write(&layout, &project).unwrap();
        let contents = std::fs::read_to_string(layout.process_roots["A"].join("pgtbl.c")).unwrap();
        assert!(contents.contains("RME_Pgtbl_Crt_Root"));
        assert!(contents.contains("RME_PGTBL_R | RME_PGTBL_X"));
        std::fs::remove_dir_all(&tmp).ok();
    }
}
