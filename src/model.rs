// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed domain model produced by ingestion (`spec.md` §3) and consumed by
//! every later stage. Nothing here parses XML; `ingest` builds these types.

use indexmap::IndexMap;

/// A 32-bit address, or the `Auto` sentinel meaning "placement decides".
///
/// The source represents `Auto`/`Invalid` as tagged/widened numeric
/// sentinels threaded through every call site; an enum gives the same
/// "never collides with a legal address" guarantee by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addr {
    Concrete(u32),
    Auto,
}

impl Addr {
    pub fn concrete(self) -> Option<u32> {
        match self {
            Addr::Concrete(a) => Some(a),
            Addr::Auto => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemKind {
    Code,
    Data,
    Device,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemAttrs: u8 {
        const R = 0b0000_0001;
        const W = 0b0000_0010;
        const X = 0b0000_0100;
        const BUFFERABLE = 0b0000_1000;
        const CACHEABLE   = 0b0001_0000;
        const STATIC      = 0b0010_0000;
    }
}

impl MemAttrs {
    pub fn has_access(self) -> bool {
        self.intersects(MemAttrs::R | MemAttrs::W | MemAttrs::X)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySegment {
    pub start: Addr,
    pub size: u32,
    pub kind: MemKind,
    pub attrs: MemAttrs,
    pub align: u32,
}

impl MemorySegment {
    pub fn end(&self) -> Option<u64> {
        self.start
            .concrete()
            .map(|s| s as u64 + self.size as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptLevel {
    O0,
    O1,
    O2,
    O3,
    Os,
}

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub opt_level: OptLevel,
    pub prefer_size: bool,
}

#[derive(Debug, Clone)]
pub struct RmeConfig {
    pub compiler: CompilerOptions,
    pub code_start: u32,
    pub code_size: u32,
    pub data_start: u32,
    pub data_size: u32,
    pub extra_kmem: u32,
    pub kmem_order: Vec<String>,
    pub kern_prios: u32,
    pub platform_attrs: IndexMap<String, String>,
    pub chip_attrs: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPolicy {
    Thread,
    Process,
    System,
}

#[derive(Debug, Clone)]
pub struct RvmConfig {
    pub compiler: CompilerOptions,
    pub code_size: u32,
    pub data_size: u32,
    pub extra_captbl: u32,
    pub recovery: RecoveryPolicy,
}

#[derive(Debug, Clone)]
pub struct Thread {
    pub name: String,
    pub entry: String,
    pub stack_addr: Addr,
    pub stack_size: u32,
    pub parameter: String,
    pub priority: u32,
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub name: String,
    pub entry: String,
    pub stack_addr: Addr,
    pub stack_size: u32,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub name: String,
    pub target_process: String,
}

#[derive(Debug, Clone)]
pub struct Receive {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Send {
    pub name: String,
    pub target_process: String,
}

#[derive(Debug, Clone)]
pub struct Vector {
    pub name: String,
    pub interrupt_number: u32,
}

#[derive(Debug, Clone)]
pub struct Process {
    pub name: String,
    pub extra_captbl: u32,
    pub compiler: CompilerOptions,
    pub code: Vec<MemorySegment>,
    pub data: Vec<MemorySegment>,
    pub device: Vec<MemorySegment>,
    pub threads: Vec<Thread>,
    pub invocations: Vec<Invocation>,
    pub ports: Vec<Port>,
    pub receives: Vec<Receive>,
    pub sends: Vec<Send>,
    pub vectors: Vec<Vector>,
}

impl Process {
    pub fn memory(&self, kind: MemKind) -> &[MemorySegment] {
        match kind {
            MemKind::Code => &self.code,
            MemKind::Data => &self.data,
            MemKind::Device => &self.device,
        }
    }

    pub fn memory_mut(&mut self, kind: MemKind) -> &mut Vec<MemorySegment> {
        match kind {
            MemKind::Code => &mut self.code,
            MemKind::Data => &mut self.data,
            MemKind::Device => &mut self.device,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    pub platform: String,
    pub chip_class: String,
    pub chip_full: String,
    pub rme: RmeConfig,
    pub rvm: RvmConfig,
    pub processes: Vec<Process>,
}

impl Project {
    pub fn process(&self, name: &str) -> Option<&Process> {
        self.processes
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptVector {
    pub number: u32,
}

#[derive(Debug, Clone)]
pub struct ChipOption {
    pub name: String,
    pub kind: ChipOptionKind,
    pub macro_name: String,
    pub range: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipOptionKind {
    Range,
    Select,
}

#[derive(Debug, Clone)]
pub struct Chip {
    pub class: String,
    pub vendor: String,
    pub platform: String,
    pub cores: u32,
    pub mpu_regions: u32,
    pub attrs: IndexMap<String, String>,
    pub code: Vec<MemorySegment>,
    pub data: Vec<MemorySegment>,
    pub device: Vec<MemorySegment>,
    pub options: Vec<ChipOption>,
    pub vectors: IndexMap<String, InterruptVector>,
}

impl Chip {
    pub fn memory(&self, kind: MemKind) -> &[MemorySegment] {
        match kind {
            MemKind::Code => &self.code,
            MemKind::Data => &self.data,
            MemKind::Device => &self.device,
        }
    }
}
