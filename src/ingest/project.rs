// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project XML ingestion (`spec.md` §6 "Project XML shape").

use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use roxmltree::Node;

use super::chip::parse_process_memory;
use super::numeric::{parse_hex, parse_uint, parse_uint_concrete};
use super::xml::{self, all_children, children, text_child, text_child_opt};
use crate::error::GenError;
use crate::model::{
    Addr, CompilerOptions, Invocation, MemKind, OptLevel, Port, Process, Project, Receive,
    RecoveryPolicy, RmeConfig, RvmConfig, Send, Thread, Vector,
};

pub fn load(path: &Path) -> Result<Project, GenError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading {display}"))
        .map_err(|e| GenError::xml(&display, format!("{e:#}")))?;
    let doc = xml::parse_document(&display, &bytes)?;
    let root = xml::root(&display, &doc, "Project")?;
    parse_project(root, "Project")
}

fn parse_project(node: Node, path: &str) -> Result<Project, GenError> {
    let name = text_child(node, "Name", path)?;
    let platform = text_child(node, "Platform", path)?;
    let chip_class = text_child(node, "Chip_Class", path)?;
    let chip_full = text_child(node, "Chip_Full", path)?;

    let rme_node = xml::require_child(node, "RME", path)?;
    let rme = parse_rme(rme_node, &format!("{path}.RME"))?;

    let rvm_node = xml::require_child(node, "RVM", path)?;
    let rvm = parse_rvm(rvm_node, &format!("{path}.RVM"))?;

    let mut processes = Vec::new();
    for (i, proc_node) in children(node, "Process").into_iter().enumerate() {
        processes.push(parse_process(proc_node, &format!("{path}.Process[{i}]"))?);
    }

    Ok(Project {
        name,
        platform,
        chip_class,
        chip_full,
        rme,
        rvm,
        processes,
    })
}

fn parse_compiler(node: Node, path: &str) -> Result<CompilerOptions, GenError> {
    let opt_raw = text_child(node, "Optimization", path)?;
    let opt_level = match opt_raw.as_str() {
        "O0" => OptLevel::O0,
        "O1" => OptLevel::O1,
        "O2" => OptLevel::O2,
        "O3" => OptLevel::O3,
        "OS" => OptLevel::Os,
        other => {
            return Err(GenError::xml(
                format!("{path}.Optimization"),
                format!("{other} is not one of O0, O1, O2, O3, OS"),
            ))
        }
    };
    let prefer_raw = text_child_opt(node, "Prefer", path)?.unwrap_or_else(|| "Size".to_string());
    let prefer_size = match prefer_raw.as_str() {
        "Size" => true,
        "Time" => false,
        other => {
            return Err(GenError::xml(
                format!("{path}.Prefer"),
                format!("{other} is not one of Size, Time"),
            ))
        }
    };
    Ok(CompilerOptions {
        opt_level,
        prefer_size,
    })
}

fn parse_attr_map(node: Node) -> IndexMap<String, String> {
    all_children(node)
        .into_iter()
        .map(|c| (c.tag_name().name().to_string(), c.text().unwrap_or("").trim().to_string()))
        .collect()
}

fn parse_rme(node: Node, path: &str) -> Result<RmeConfig, GenError> {
    let compiler_node = xml::require_child(node, "Compiler", path)?;
    let compiler = parse_compiler(compiler_node, &format!("{path}.Compiler"))?;

    let general = xml::require_child(node, "General", path)?;
    let gpath = format!("{path}.General");
    let code_start = expect_concrete(
        &format!("{gpath}.Code_Start"),
        parse_hex(&format!("{gpath}.Code_Start"), &text_child(general, "Code_Start", &gpath)?)?,
    )?;
    let code_size = expect_concrete(
        &format!("{gpath}.Code_Size"),
        parse_hex(&format!("{gpath}.Code_Size"), &text_child(general, "Code_Size", &gpath)?)?,
    )?;
    let data_start = expect_concrete(
        &format!("{gpath}.Data_Start"),
        parse_hex(&format!("{gpath}.Data_Start"), &text_child(general, "Data_Start", &gpath)?)?,
    )?;
    let data_size = expect_concrete(
        &format!("{gpath}.Data_Size"),
        parse_hex(&format!("{gpath}.Data_Size"), &text_child(general, "Data_Size", &gpath)?)?,
    )?;
    let extra_kmem = expect_concrete(
        &format!("{gpath}.Extra_Kmem"),
        parse_uint(&format!("{gpath}.Extra_Kmem"), &text_child(general, "Extra_Kmem", &gpath)?)?,
    )?;
    let kmem_order_raw = text_child(general, "Kmem_Order", &gpath)?;
    let kmem_order: Vec<String> = kmem_order_raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let kern_prios =
        parse_uint_concrete(&format!("{gpath}.Kern_Prios"), &text_child(general, "Kern_Prios", &gpath)?)?;

    let platform_attrs = match xml::children(node, "Platform").into_iter().next() {
        Some(n) => parse_attr_map(n),
        None => IndexMap::new(),
    };
    let chip_attrs = match xml::children(node, "Chip").into_iter().next() {
        Some(n) => parse_attr_map(n),
        None => IndexMap::new(),
    };

    Ok(RmeConfig {
        compiler,
        code_start,
        code_size,
        data_start,
        data_size,
        extra_kmem,
        kmem_order,
        kern_prios,
        platform_attrs,
        chip_attrs,
    })
}

fn parse_rvm(node: Node, path: &str) -> Result<RvmConfig, GenError> {
    let compiler_node = xml::require_child(node, "Compiler", path)?;
    let compiler = parse_compiler(compiler_node, &format!("{path}.Compiler"))?;

    let general = xml::require_child(node, "General", path)?;
    let gpath = format!("{path}.General");
    let code_size = expect_concrete(
        &format!("{gpath}.Code_Size"),
        parse_hex(&format!("{gpath}.Code_Size"), &text_child(general, "Code_Size", &gpath)?)?,
    )?;
    let data_size = expect_concrete(
        &format!("{gpath}.Data_Size"),
        parse_hex(&format!("{gpath}.Data_Size"), &text_child(general, "Data_Size", &gpath)?)?,
    )?;
    let extra_captbl = expect_concrete(
        &format!("{gpath}.Extra_Captbl"),
        parse_uint(&format!("{gpath}.Extra_Captbl"), &text_child(general, "Extra_Captbl", &gpath)?)?,
    )?;
    let recovery_raw = text_child(general, "Recovery", &gpath)?;
    let recovery = match recovery_raw.as_str() {
        "Thread" => RecoveryPolicy::Thread,
        "Process" => RecoveryPolicy::Process,
        "System" => RecoveryPolicy::System,
        other => {
            return Err(GenError::xml(
                format!("{gpath}.Recovery"),
                format!("{other} is not one of Thread, Process, System"),
            ))
        }
    };

    // `VMM` is parsed-but-unused in the source this was distilled from and
    // is explicitly called out as "currently unused"; we accept its
    // presence without giving it semantics (spec.md §9 Open Questions).
    let _ = xml::children(node, "VMM");

    Ok(RvmConfig {
        compiler,
        code_size,
        data_size,
        extra_captbl,
        recovery,
    })
}

fn parse_process(node: Node, path: &str) -> Result<Process, GenError> {
    let general = xml::require_child(node, "General", path)?;
    let gpath = format!("{path}.General");
    let name = text_child(general, "Name", &gpath)?;
    let extra_captbl = expect_concrete(
        &format!("{gpath}.Extra_Captbl"),
        parse_uint(&format!("{gpath}.Extra_Captbl"), &text_child(general, "Extra_Captbl", &gpath)?)?,
    )?;

    let compiler_node = xml::require_child(node, "Compiler", path)?;
    let compiler = parse_compiler(compiler_node, &format!("{path}.Compiler"))?;

    let mut code = Vec::new();
    let mut data = Vec::new();
    let mut device = Vec::new();
    for (i, mem) in children(node, "Memory").into_iter().enumerate() {
        let seg = parse_process_memory(mem, &format!("{path}.Memory[{i}]"))?;
        match seg.kind {
            MemKind::Code => code.push(seg),
            MemKind::Data => data.push(seg),
            MemKind::Device => device.push(seg),
        }
    }
    if code.is_empty() {
        return Err(GenError::semantic(&name, "process has no code segment"));
    }
    if data.is_empty() {
        return Err(GenError::semantic(&name, "process has no data segment"));
    }

    let mut threads = Vec::new();
    for (i, t) in children(node, "Thread").into_iter().enumerate() {
        threads.push(parse_thread(t, &format!("{path}.Thread[{i}]"))?);
    }

    let mut invocations = Vec::new();
    for (i, inv) in children(node, "Invocation").into_iter().enumerate() {
        invocations.push(parse_invocation(inv, &format!("{path}.Invocation[{i}]"))?);
    }

    let mut ports = Vec::new();
    for (i, p) in children(node, "Port").into_iter().enumerate() {
        ports.push(parse_port(p, &format!("{path}.Port[{i}]"))?);
    }

    let mut receives = Vec::new();
    for (i, r) in children(node, "Receive").into_iter().enumerate() {
        let rpath = format!("{path}.Receive[{i}]");
        receives.push(Receive {
            name: text_child(r, "Name", &rpath)?,
        });
    }

    let mut sends = Vec::new();
    for (i, s) in children(node, "Send").into_iter().enumerate() {
        sends.push(parse_send(s, &format!("{path}.Send[{i}]"))?);
    }

    let mut vectors = Vec::new();
    for (i, v) in children(node, "Vector").into_iter().enumerate() {
        vectors.push(parse_vector(v, &format!("{path}.Vector[{i}]"))?);
    }

    Ok(Process {
        name,
        extra_captbl,
        compiler,
        code,
        data,
        device,
        threads,
        invocations,
        ports,
        receives,
        sends,
        vectors,
    })
}

fn parse_thread(node: Node, path: &str) -> Result<Thread, GenError> {
    let name = text_child(node, "Name", path)?;
    let entry = text_child(node, "Entry", path)?;
    let stack_addr = parse_hex(
        &format!("{path}.Stack_Addr"),
        &text_child(node, "Stack_Addr", path)?,
    )?;
    let stack_size = expect_concrete(
        &format!("{path}.Stack_Size"),
        parse_hex(&format!("{path}.Stack_Size"), &text_child(node, "Stack_Size", path)?)?,
    )?;
    let parameter = text_child_opt(node, "Parameter", path)?.unwrap_or_default();
    let priority = parse_uint_concrete(
        &format!("{path}.Priority"),
        &text_child(node, "Priority", path)?,
    )?;
    Ok(Thread {
        name,
        entry,
        stack_addr,
        stack_size,
        parameter,
        priority,
    })
}

fn parse_invocation(node: Node, path: &str) -> Result<Invocation, GenError> {
    let name = text_child(node, "Name", path)?;
    let entry = text_child(node, "Entry", path)?;
    let stack_addr = parse_hex(
        &format!("{path}.Stack_Addr"),
        &text_child(node, "Stack_Addr", path)?,
    )?;
    let stack_size = expect_concrete(
        &format!("{path}.Stack_Size"),
        parse_hex(&format!("{path}.Stack_Size"), &text_child(node, "Stack_Size", path)?)?,
    )?;
    Ok(Invocation {
        name,
        entry,
        stack_addr,
        stack_size,
    })
}

fn parse_port(node: Node, path: &str) -> Result<Port, GenError> {
    Ok(Port {
        name: text_child(node, "Name", path)?,
        target_process: text_child(node, "Process", path)?,
    })
}

fn parse_send(node: Node, path: &str) -> Result<Send, GenError> {
    Ok(Send {
        name: text_child(node, "Name", path)?,
        target_process: text_child(node, "Process", path)?,
    })
}

fn parse_vector(node: Node, path: &str) -> Result<Vector, GenError> {
    let name = text_child(node, "Name", path)?;
    let interrupt_number = parse_uint_concrete(
        &format!("{path}.Number"),
        &text_child(node, "Number", path)?,
    )?;
    Ok(Vector {
        name,
        interrupt_number,
    })
}

fn expect_concrete(path: &str, addr: Addr) -> Result<u32, GenError> {
    addr.concrete()
        .ok_or_else(|| GenError::xml(path, "Auto is not permitted here"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn sample() -> &'static str {
        indoc! {r#"
            <Project>
                <Name>demo</Name>
                <Platform>A7M</Platform>
                <Chip_Class>STM32F405</Chip_Class>
                <Chip_Full>STM32F405RGT6</Chip_Full>
                <RME>
                    <Compiler><Optimization>O2</Optimization></Compiler>
                    <General>
                        <Code_Start>0x08000000</Code_Start>
                        <Code_Size>0x4000</Code_Size>
                        <Data_Start>0x20000000</Data_Start>
                        <Data_Size>0x1000</Data_Size>
                        <Extra_Kmem>0</Extra_Kmem>
                        <Kmem_Order>4,5,6</Kmem_Order>
                        <Kern_Prios>32</Kern_Prios>
                    </General>
                </RME>
                <RVM>
                    <Compiler><Optimization>OS</Optimization></Compiler>
                    <General>
                        <Code_Size>0x4000</Code_Size>
                        <Data_Size>0x1000</Data_Size>
                        <Extra_Captbl>0</Extra_Captbl>
                        <Recovery>Thread</Recovery>
                    </General>
                </RVM>
                <Process>
                    <General><Name>A</Name><Extra_Captbl>0</Extra_Captbl></General>
                    <Compiler><Optimization>O1</Optimization></Compiler>
                    <Memory>
                        <Start>Auto</Start><Size>0x1000</Size>
                        <Type>Code</Type><Attribute>RX</Attribute>
                    </Memory>
                    <Memory>
                        <Start>Auto</Start><Size>0x400</Size>
                        <Type>Data</Type><Attribute>RWS</Attribute>
                    </Memory>
                    <Thread>
                        <Name>Main</Name><Entry>main</Entry>
                        <Stack_Addr>Auto</Stack_Addr><Stack_Size>0x200</Stack_Size>
                        <Priority>4</Priority>
                    </Thread>
                </Process>
            </Project>
        "#}
    }

    #[test]
    fn parses_minimal_project() {
        let doc = xml::parse_document("t", sample().as_bytes()).unwrap();
        let root = xml::root("t", &doc, "Project").unwrap();
        let proj = parse_project(root, "Project").unwrap();
        assert_eq!(proj.name, "demo");
        assert_eq!(proj.processes.len(), 1);
        assert_eq!(proj.processes[0].threads.len(), 1);
        assert_eq!(proj.rme.kmem_order, vec!["4", "5", "6"]);
        assert_eq!(proj.rvm.recovery, RecoveryPolicy::Thread);
    }

    #[test]
    fn process_without_data_segment_fails() {
        let xml = indoc! {r#"
            <Project>
                <Name>demo</Name>
                <Platform>A7M</Platform>
                <Chip_Class>STM32F405</Chip_Class>
                <Chip_Full>STM32F405RGT6</Chip_Full>
                <RME>
                    <Compiler><Optimization>O2</Optimization></Compiler>
                    <General>
                        <Code_Start>0x08000000</Code_Start>
                        <Code_Size>0x4000</Code_Size>
                        <Data_Start>0x20000000</Data_Start>
                        <Data_Size>0x1000</Data_Size>
                        <Extra_Kmem>0</Extra_Kmem>
                        <Kmem_Order>4,5,6</Kmem_Order>
                        <Kern_Prios>32</Kern_Prios>
                    </General>
                </RME>
                <RVM>
                    <Compiler><Optimization>OS</Optimization></Compiler>
                    <General>
                        <Code_Size>0x4000</Code_Size>
                        <Data_Size>0x1000</Data_Size>
                        <Extra_Captbl>0</Extra_Captbl>
                        <Recovery>Thread</Recovery>
                    </General>
                </RVM>
                <Process>
                    <General><Name>A</Name><Extra_Captbl>0</Extra_Captbl></General>
                    <Compiler><Optimization>O1</Optimization></Compiler>
                    <Memory>
                        <Start>Auto</Start><Size>0x1000</Size>
                        <Type>Code</Type><Attribute>RX</Attribute>
                    </Memory>
                    <Thread>
                        <Name>Main</Name><Entry>main</Entry>
                        <Stack_Addr>Auto</Stack_Addr><Stack_Size>0x200</Stack_Size>
                        <Priority>4</Priority>
                    </Thread>
                </Process>
            </Project>
        "#};
        let doc = xml::parse_document("t", xml.as_bytes()).unwrap();
        let root = xml::root("t", &doc, "Project").unwrap();
        assert!(parse_project(root, "Project").is_err());
    }
}
