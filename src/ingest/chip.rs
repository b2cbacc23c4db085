// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chip XML ingestion (`spec.md` §6 "Chip XML shape").

use std::path::{Path, PathBuf};

use anyhow::Context;
use indexmap::IndexMap;
use roxmltree::Node;

use super::numeric::{parse_mem_attrs, parse_uint_concrete};
use super::xml::{self, children, text, text_child};
use crate::error::GenError;
use crate::model::{
    Addr, Chip, ChipOption, ChipOptionKind, InterruptVector, MemKind, MemorySegment,
};

/// The chip XML file path is derived from the platform and chip-class
/// names, under the RME root, mirroring the `Platform/<plat>/Chips/<chip>`
/// layout of the emitted output tree (`spec.md` §6).
pub fn chip_xml_path(rme_root: &Path, platform: &str, chip_class: &str) -> PathBuf {
    rme_root
        .join("Platform")
        .join(platform)
        .join("Chips")
        .join(chip_class)
        .join("chip.xml")
}

pub fn load(path: &Path) -> Result<Chip, GenError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading {display}"))
        .map_err(|e| GenError::xml(&display, format!("{e:#}")))?;
    let doc = xml::parse_document(&display, &bytes)?;
    let root = xml::root(&display, &doc, "Chip")?;
    parse_chip(root, "Chip")
}

fn parse_chip(node: Node, path: &str) -> Result<Chip, GenError> {
    let class = text_child(node, "Class", path)?;
    let vendor = text_child(node, "Vendor", path)?;
    let platform = text_child(node, "Platform", path)?;
    let cores = parse_uint_concrete(&format!("{path}.Cores"), &text_child(node, "Cores", path)?)?;
    let mpu_regions =
        parse_uint_concrete(&format!("{path}.Regions"), &text_child(node, "Regions", path)?)?;

    let mut attrs = IndexMap::new();
    for attr in children(node, "Attribute") {
        let name = attr
            .attribute("Name")
            .ok_or_else(|| GenError::xml(path, "Attribute missing Name"))?;
        attrs.insert(name.to_string(), text(attr, &format!("{path}.Attribute"))?);
    }

    let mut code = Vec::new();
    let mut data = Vec::new();
    let mut device = Vec::new();
    for (i, mem) in children(node, "Memory").into_iter().enumerate() {
        let seg = parse_memory(mem, &format!("{path}.Memory[{i}]"), true)?;
        match seg.kind {
            MemKind::Code => code.push(seg),
            MemKind::Data => data.push(seg),
            MemKind::Device => device.push(seg),
        }
    }
    code.sort_by_key(|s| s.start.concrete().unwrap_or(0));
    data.sort_by_key(|s| s.start.concrete().unwrap_or(0));
    device.sort_by_key(|s| s.start.concrete().unwrap_or(0));

    let mut options = Vec::new();
    for opt in children(node, "Option") {
        options.push(parse_option(opt, &format!("{path}.Option"))?);
    }

    let mut vectors = IndexMap::new();
    for vec_node in children(node, "Vector") {
        let name = text_child(vec_node, "Name", &format!("{path}.Vector"))?;
        let number = parse_uint_concrete(
            &format!("{path}.Vector.{name}.Number"),
            &text_child(vec_node, "Number", &format!("{path}.Vector.{name}"))?,
        )?;
        vectors.insert(name, InterruptVector { number });
    }

    Ok(Chip {
        class,
        vendor,
        platform,
        cores,
        mpu_regions,
        attrs,
        code,
        data,
        device,
        options,
        vectors,
    })
}

fn parse_memory(node: Node, path: &str, chip_segment: bool) -> Result<MemorySegment, GenError> {
    let start_raw = text_child(node, "Start", path)?;
    let start = super::numeric::parse_hex(&format!("{path}.Start"), &start_raw)?;
    if chip_segment && matches!(start, Addr::Auto) {
        return Err(GenError::xml(
            format!("{path}.Start"),
            "chip memory segments must have a concrete Start",
        ));
    }
    let size_raw = text_child(node, "Size", path)?;
    let size = match super::numeric::parse_hex(&format!("{path}.Size"), &size_raw)? {
        Addr::Concrete(v) => v,
        Addr::Auto => {
            return Err(GenError::xml(format!("{path}.Size"), "Size cannot be Auto"))
        }
    };
    if size == 0 {
        return Err(GenError::semantic(path, "memory segment size must be > 0"));
    }
    if let Addr::Concrete(s) = start {
        if s.checked_add(size).is_none() {
            return Err(GenError::semantic(
                path,
                "segment start + size overflows the 32-bit address space",
            ));
        }
    }
    let kind_raw = text_child(node, "Type", path)?;
    let kind = match kind_raw.as_str() {
        "Code" => MemKind::Code,
        "Data" => MemKind::Data,
        "Device" => MemKind::Device,
        other => {
            return Err(GenError::xml(
                format!("{path}.Type"),
                format!("{other} is not one of Code, Data, Device"),
            ))
        }
    };
    let attrs_raw = text_child(node, "Attribute", path)?;
    let attrs = parse_mem_attrs(&format!("{path}.Attribute"), &attrs_raw)?;

    Ok(MemorySegment {
        start,
        size,
        kind,
        attrs,
        align: 0,
    })
}

// Process memory trunks share the exact same shape as chip memory trunks,
// except `Start` may be `Auto`; `ingest::project` reuses this parser.
pub(super) fn parse_process_memory(node: Node, path: &str) -> Result<MemorySegment, GenError> {
    parse_memory(node, path, false)
}

fn parse_option(node: Node, path: &str) -> Result<ChipOption, GenError> {
    let name = text_child(node, "Name", path)?;
    let kind_raw = text_child(node, "Type", path)?;
    let kind = match kind_raw.as_str() {
        "Range" => ChipOptionKind::Range,
        "Select" => ChipOptionKind::Select,
        other => {
            return Err(GenError::xml(
                format!("{path}.Type"),
                format!("{other} is not one of Range, Select"),
            ))
        }
    };
    let macro_name = text_child(node, "Macro", path)?;
    let range = text_child(node, "Range", path)?;
    Ok(ChipOption {
        name,
        kind,
        macro_name,
        range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn parses_minimal_chip() {
        let xml = indoc! {"
            <Chip>
                <Class>STM32F405</Class>
                <Vendor>ST</Vendor>
                <Platform>A7M</Platform>
                <Cores>1</Cores>
                <Regions>8</Regions>
                <Memory>
                    <Start>0x08000000</Start>
                    <Size>0x10000</Size>
                    <Type>Code</Type>
                    <Attribute>RX</Attribute>
                </Memory>
                <Memory>
                    <Start>0x20000000</Start>
                    <Size>0x8000</Size>
                    <Type>Data</Type>
                    <Attribute>RWS</Attribute>
                </Memory>
                <Vector>
                    <Name>Timer</Name>
                    <Number>28</Number>
                </Vector>
            </Chip>
        "};
        let doc = xml::parse_document("t", xml.as_bytes()).unwrap();
        let root = xml::root("t", &doc, "Chip").unwrap();
        let chip = parse_chip(root, "Chip").unwrap();
        assert_eq!(chip.class, "STM32F405");
        assert_eq!(chip.code.len(), 1);
        assert_eq!(chip.data.len(), 1);
        assert_eq!(chip.vectors["Timer"].number, 28);
    }

    #[test]
    fn chip_memory_cannot_be_auto() {
        let xml = indoc! {"
            <Chip>
                <Class>C</Class><Vendor>V</Vendor><Platform>A7M</Platform>
                <Cores>1</Cores><Regions>8</Regions>
                <Memory>
                    <Start>Auto</Start>
                    <Size>0x1000</Size>
                    <Type>Code</Type>
                    <Attribute>RX</Attribute>
                </Memory>
            </Chip>
        "};
        let doc = xml::parse_document("t", xml.as_bytes()).unwrap();
        let root = xml::root("t", &doc, "Chip").unwrap();
        assert!(parse_chip(root, "Chip").is_err());
    }
}
