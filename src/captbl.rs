// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stage 7: capability allocation (`spec.md` §4.6).
//!
//! Local IDs are a single per-process counter in the fixed order
//! Threads → Invocations → Ports → Receives → Sends → Vectors. Global
//! linear IDs are minted in one contiguous range (captbls, processes,
//! threads, invocations, receives) that the RVM boot script iterates in
//! order. Back-resolution of ports/sends is grounded on
//! `xtask::dist::resolve_task_slots`'s pattern: look the target up by
//! name in a sibling collection, copy its identity across, and fail
//! loudly on a dangling reference.

use indexmap::IndexMap;

use crate::error::{GenError, Result};
use crate::model::Project;

#[derive(Debug, Default, Clone)]
pub struct ProcessIds {
    pub thread: IndexMap<String, u32>,
    pub invocation: IndexMap<String, u32>,
    pub port: IndexMap<String, u32>,
    pub receive: IndexMap<String, u32>,
    pub send: IndexMap<String, u32>,
    pub vector: IndexMap<String, u32>,
    pub captbl_frontier: u32,
    pub captbl_size: u32,
}

#[derive(Debug, Clone)]
pub enum GlobalKind {
    Captbl,
    Process,
    Thread,
    Invocation,
    Receive,
}

#[derive(Debug, Clone)]
pub struct GlobalEntry {
    pub owner_process: String,
    pub object_name: String,
    pub kind: GlobalKind,
}

#[derive(Debug, Default)]
pub struct CapAllocation {
    pub process_ids: IndexMap<String, ProcessIds>,
    pub global: Vec<GlobalEntry>,
    /// `(process, port_name) -> global id of the resolved invocation`.
    pub port_global: IndexMap<(String, String), u32>,
    /// `(process, send_name) -> global id of the resolved receive`.
    pub send_global: IndexMap<(String, String), u32>,
}

impl CapAllocation {
    pub fn frontier(&self) -> u32 {
        self.global.len() as u32
    }
}

pub fn allocate(project: &Project) -> Result<CapAllocation> {
    let mut out = CapAllocation::default();

    for process in &project.processes {
        let mut ids = ProcessIds::default();
        let mut next = 0u32;
        for t in &process.threads {
            ids.thread.insert(t.name.clone(), next);
            next += 1;
        }
        for i in &process.invocations {
            ids.invocation.insert(i.name.clone(), next);
            next += 1;
        }
        for p in &process.ports {
            ids.port.insert(p.name.clone(), next);
            next += 1;
        }
        for r in &process.receives {
            ids.receive.insert(r.name.clone(), next);
            next += 1;
        }
        for s in &process.sends {
            ids.send.insert(s.name.clone(), next);
            next += 1;
        }
        for v in &process.vectors {
            ids.vector.insert(v.name.clone(), next);
            next += 1;
        }
        ids.captbl_frontier = next;
        ids.captbl_size = next + process.extra_captbl;
        out.process_ids.insert(process.name.clone(), ids);
    }

    for process in &project.processes {
        out.global.push(GlobalEntry {
            owner_process: process.name.clone(),
            object_name: process.name.clone(),
            kind: GlobalKind::Captbl,
        });
    }
    for process in &project.processes {
        out.global.push(GlobalEntry {
            owner_process: process.name.clone(),
            object_name: process.name.clone(),
            kind: GlobalKind::Process,
        });
    }

    for process in &project.processes {
        for t in &process.threads {
            out.global.push(GlobalEntry {
                owner_process: process.name.clone(),
                object_name: t.name.clone(),
                kind: GlobalKind::Thread,
            });
        }
    }

    let mut invocation_global: IndexMap<(String, String), u32> = IndexMap::new();
    for process in &project.processes {
        for i in &process.invocations {
            invocation_global.insert((process.name.clone(), i.name.clone()), out.global.len() as u32);
            out.global.push(GlobalEntry {
                owner_process: process.name.clone(),
                object_name: i.name.clone(),
                kind: GlobalKind::Invocation,
            });
        }
    }

    let mut receive_global: IndexMap<(String, String), u32> = IndexMap::new();
    for process in &project.processes {
        for r in &process.receives {
            receive_global.insert((process.name.clone(), r.name.clone()), out.global.len() as u32);
            out.global.push(GlobalEntry {
                owner_process: process.name.clone(),
                object_name: r.name.clone(),
                kind: GlobalKind::Receive,
            });
        }
    }
    resolve(project, &invocation_global, &receive_global, &mut out)?;

    Ok(out)
}

fn resolve(
    project: &Project,
    invocation_global: &IndexMap<(String, String), u32>,
    receive_global: &IndexMap<(String, String), u32>,
    out: &mut CapAllocation,
) -> Result<()> {
    for process in &project.processes {
        for port in &process.ports {
            let target = project.process(&port.target_process).ok_or_else(|| {
                GenError::semantic(
                    format!("{}.Port.{}", process.name, port.name),
                    format!("target process '{}' does not exist", port.target_process),
                )
            })?;
            let invocation = target
                .invocations
                .iter()
                .find(|i| i.name.eq_ignore_ascii_case(&port.name))
                .ok_or_else(|| {
                    GenError::semantic(
                        format!("{}.Port.{}", process.name, port.name),
                        format!(
                            "no invocation named '{}' in process '{}'",
                            port.name, target.name
                        ),
                    )
                })?;
            let gid = *invocation_global
                .get(&(target.name.clone(), invocation.name.clone()))
                .expect("invocation allocated a global id above");
            out.port_global
                .insert((process.name.clone(), port.name.clone()), gid);
        }

        for send in &process.sends {
            let target = project.process(&send.target_process).ok_or_else(|| {
                GenError::semantic(
                    format!("{}.Send.{}", process.name, send.name),
                    format!("target process '{}' does not exist", send.target_process),
                )
            })?;
            let receive = target
                .receives
                .iter()
                .find(|r| r.name.eq_ignore_ascii_case(&send.name))
                .ok_or_else(|| {
                    GenError::semantic(
                        format!("{}.Send.{}", process.name, send.name),
                        format!(
                            "no receive endpoint named '{}' in process '{}'",
                            send.name, target.name
                        ),
                    )
                })?;
            let gid = *receive_global
                .get(&(target.name.clone(), receive.name.clone()))
                .expect("receive allocated a global id above");
            out.send_global
                .insert((process.name.clone(), send.name.clone()), gid);
        }
    }
    Ok(())
}
