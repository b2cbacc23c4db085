// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stage 8: emission (`spec.md` §4.7, §6).
//!
//! Grounded on `xtask::dist::package`'s shape (build a directory tree,
//! write linker scripts from the placement result, then archive/project
//! files) but producing a static project tree instead of invoking
//! `cargo`/`objcopy`: nothing here shells out.

pub mod bootscript;
pub mod config;
pub mod linker;
pub mod pagetable;
pub mod projectfiles;
pub mod tree;

use std::path::Path;

use crate::captbl::CapAllocation;
use crate::cli::ProjectFormat;
use crate::error::Result;
use crate::model::{Chip, Project};
use crate::place::Placement;

pub use tree::OutputLayout;

/// Runs every emission sub-stage against an already-created output tree.
#[allow(clippy::too_many_arguments)]
pub fn emit(
    output_dir: &Path,
    rme_root: &Path,
    rvm_root: &Path,
    format: ProjectFormat,
    project: &Project,
    chip: &Chip,
    placement: &Placement,
    alloc: &CapAllocation,
) -> Result<OutputLayout> {
    let layout = tree::create(output_dir, &project.platform, &project.chip_class, project)?;
    tree::copy_static(rme_root, rvm_root, &project.platform, &project.chip_class, &layout)?;
    config::write(&layout, project, chip)?;
    linker::write_all(&layout, project, placement, format)?;
    pagetable::write(&layout, project)?;
    bootscript::write(&layout, project, alloc)?;
    projectfiles::write(&layout, project, format)?;
    Ok(layout)
}
