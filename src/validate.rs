// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stage 3: validation (`spec.md` §4.2).
//!
//! Identifier shape and uniqueness are checked eagerly here, case-
//! insensitively throughout as the spec requires. Liveness of ports and
//! sends is deferred to `captbl::resolve` (§4.6), after global IDs
//! exist, exactly as `spec.md` §4.2 specifies.

use std::collections::HashSet;

use crate::error::{GenError, Result};
use crate::model::{Chip, Project};

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(what: &str, name: &str) -> Result<()> {
    if !is_identifier(name) {
        return Err(GenError::semantic(
            what,
            format!("'{name}' is not a valid identifier"),
        ));
    }
    Ok(())
}

/// Case-insensitive uniqueness check over an iterator of names, reporting
/// the first duplicate found.
fn check_unique<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        let key = name.to_ascii_lowercase();
        if !seen.insert(key) {
            return Err(GenError::semantic(what, format!("duplicate name '{name}'")));
        }
    }
    Ok(())
}

pub fn validate(project: &Project, chip: &Chip) -> Result<()> {
    check_identifier("Project.Name", &project.name)?;
    if !chip.class.eq_ignore_ascii_case(&project.chip_class) {
        return Err(GenError::semantic(
            "Project.Chip_Class",
            format!(
                "declares '{}' but the chip XML at that path declares class '{}'",
                project.chip_class, chip.class
            ),
        ));
    }
    if !chip.platform.eq_ignore_ascii_case(&project.platform) {
        return Err(GenError::semantic(
            "Project.Platform",
            format!(
                "declares '{}' but the chip XML declares platform '{}'",
                project.platform, chip.platform
            ),
        ));
    }
    check_unique(
        "Process",
        project.processes.iter().map(|p| p.name.as_str()),
    )?;

    // Vector endpoints share a dispatch namespace with receive endpoints
    // and are unique globally, not just per-process.
    let mut global_names = HashSet::new();
    for process in &project.processes {
        for v in &process.vectors {
            let key = v.name.to_ascii_lowercase();
            if !global_names.insert(key) {
                return Err(GenError::semantic(
                    "Vector",
                    format!("'{}' collides with another vector or receive endpoint name", v.name),
                ));
            }
        }
        for r in &process.receives {
            let key = r.name.to_ascii_lowercase();
            if !global_names.insert(key) {
                return Err(GenError::semantic(
                    "Receive",
                    format!(
                        "'{}' collides with another vector or receive endpoint name",
                        r.name
                    ),
                ));
            }
        }
    }

    for process in &project.processes {
        check_identifier("Process.Name", &process.name)?;

        check_unique(
            &format!("{}.Thread", process.name),
            process.threads.iter().map(|t| t.name.as_str()),
        )?;
        check_unique(
            &format!("{}.Invocation", process.name),
            process.invocations.iter().map(|i| i.name.as_str()),
        )?;
        check_unique(
            &format!("{}.Receive", process.name),
            process.receives.iter().map(|r| r.name.as_str()),
        )?;

        for t in &process.threads {
            check_identifier(&format!("{}.Thread", process.name), &t.name)?;
        }
        for i in &process.invocations {
            check_identifier(&format!("{}.Invocation", process.name), &i.name)?;
        }
        for r in &process.receives {
            check_identifier(&format!("{}.Receive", process.name), &r.name)?;
        }
        for v in &process.vectors {
            check_identifier(&format!("{}.Vector", process.name), &v.name)?;
        }

        // Port (target_process, name) pairs are unique within a process,
        // and a port cannot target its own process.
        let mut port_keys = HashSet::new();
        for p in &process.ports {
            check_identifier(&format!("{}.Port", process.name), &p.name)?;
            if p.target_process.eq_ignore_ascii_case(&process.name) {
                return Err(GenError::semantic(
                    format!("{}.Port.{}", process.name, p.name),
                    "a port cannot target its own process",
                ));
            }
            let key = (p.target_process.to_ascii_lowercase(), p.name.to_ascii_lowercase());
            if !port_keys.insert(key) {
                return Err(GenError::semantic(
                    format!("{}.Port", process.name),
                    format!("duplicate port ({}, {})", p.target_process, p.name),
                ));
            }
        }

        // Send (target_process, name) pairs are unique within a process.
        let mut send_keys = HashSet::new();
        for s in &process.sends {
            check_identifier(&format!("{}.Send", process.name), &s.name)?;
            let key = (s.target_process.to_ascii_lowercase(), s.name.to_ascii_lowercase());
            if !send_keys.insert(key) {
                return Err(GenError::semantic(
                    format!("{}.Send", process.name),
                    format!("duplicate send ({}, {})", s.target_process, s.name),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_rule() {
        assert!(is_identifier("Foo_1"));
        assert!(is_identifier("_bar"));
        assert!(!is_identifier("1Foo"));
        assert!(!is_identifier("foo-bar"));
        assert!(!is_identifier(""));
    }

    fn chip() -> Chip {
        Chip {
            class: "STM32F405".into(),
            vendor: "ST".into(),
            platform: "A7M".into(),
            cores: 1,
            mpu_regions: 8,
            attrs: Default::default(),
            code: vec![],
            data: vec![],
            device: vec![],
            options: vec![],
            vectors: Default::default(),
        }
    }

    fn project() -> Project {
        use crate::model::{CompilerOptions, OptLevel, RecoveryPolicy, RmeConfig, RvmConfig};
        Project {
            name: "demo".into(),
            platform: "A7M".into(),
            chip_class: "STM32F405".into(),
            chip_full: "STM32F405RGT6".into(),
            rme: RmeConfig {
                compiler: CompilerOptions { opt_level: OptLevel::O2, prefer_size: true },
                code_start: 0x0800_0000,
                code_size: 0x1000,
                data_start: 0x2000_0000,
                data_size: 0x200,
                extra_kmem: 0,
                kmem_order: vec![],
                kern_prios: 32,
                platform_attrs: Default::default(),
                chip_attrs: Default::default(),
            },
            rvm: RvmConfig {
                compiler: CompilerOptions { opt_level: OptLevel::O2, prefer_size: true },
                code_size: 0x1000,
                data_size: 0x200,
                extra_captbl: 0,
                recovery: RecoveryPolicy::Thread,
            },
            processes: vec![],
        }
    }

    #[test]
    fn matching_chip_class_and_platform_pass() {
        assert!(validate(&project(), &chip()).is_ok());
    }

    #[test]
    fn mismatched_chip_class_fails() {
        let mut c = chip();
        c.class = "STM32F103".into();
        assert!(validate(&project(), &c).is_err());
    }

    #[test]
    fn mismatched_platform_fails() {
        let mut c = chip();
        c.platform = "RISCV".into();
        assert!(validate(&project(), &c).is_err());
    }
}
