// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Output directory skeleton and static file copy (`spec.md` §6
//! "Output tree", §4.7 group 1).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result as AnyResult};
use indexmap::IndexMap;

use crate::error::{GenError, Result};
use crate::model::Project;

/// Every directory the emitter writes into, resolved up front so later
/// sub-stages never re-derive a path.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub rme_root: PathBuf,
    pub rme_include_kernel: PathBuf,
    pub rme_include_chip: PathBuf,
    pub rme_kernel: PathBuf,
    pub rme_platform: PathBuf,
    pub rme_project: PathBuf,
    pub rvm_root: PathBuf,
    pub rvm_project: PathBuf,
    pub process_roots: IndexMap<String, PathBuf>,
}

fn mkdirs(dirs: &[&Path]) -> AnyResult<()> {
    for d in dirs {
        fs::create_dir_all(d).with_context(|| format!("creating {}", d.display()))?;
    }
    Ok(())
}

pub fn create(
    output_dir: &Path,
    platform: &str,
    chip_class: &str,
    project: &Project,
) -> Result<OutputLayout> {
    create_inner(output_dir, platform, chip_class, project)
        .map_err(|e| GenError::emission(format!("{e:#}")))
}

fn create_inner(
    output_dir: &Path,
    platform: &str,
    chip_class: &str,
    project: &Project,
) -> AnyResult<OutputLayout> {
    let rme_root = output_dir.join("M7M1_MuEukaron");
    let rme_include = rme_root.join("MEukaron").join("Include");
    let rme_include_kernel = rme_include.join("Kernel");
    let rme_include_chip = rme_include
        .join("Platform")
        .join(platform)
        .join("Chips")
        .join(chip_class);
    let rme_kernel = rme_root.join("MEukaron").join("Kernel");
    let rme_platform = rme_root.join("MEukaron").join("Platform").join(platform);
    let rme_project = rme_root.join("Project");
    let rme_docs = rme_root.join("Documents");

    let rvm_root = output_dir.join("M7M2_MuAmmonite");
    let rvm_project = rvm_root.join("Project");

    mkdirs(&[
        &rme_docs,
        &rme_include_kernel,
        &rme_include_chip,
        &rme_kernel,
        &rme_platform,
        &rme_project,
        &rvm_project,
    ])?;

    let mut process_roots = IndexMap::new();
    for process in &project.processes {
        let root = output_dir.join(&process.name);
        fs::create_dir_all(&root).with_context(|| format!("creating {}", root.display()))?;
        process_roots.insert(process.name.clone(), root);
    }

    Ok(OutputLayout {
        rme_root,
        rme_include_kernel,
        rme_include_chip,
        rme_kernel,
        rme_platform,
        rme_project,
        rvm_root,
        rvm_project,
        process_roots,
    })
}

/// Copies kernel sources from the RME root and runtime sources from the
/// RVM root into the output tree. A missing chip subtree under the RME
/// root is the one place "source file missing" (`spec.md` §7 Emission)
/// is checked directly, since every other copy is a whole-directory walk.
pub fn copy_static(
    rme_root: &Path,
    rvm_root: &Path,
    platform: &str,
    chip_class: &str,
    layout: &OutputLayout,
) -> Result<()> {
    let chip_src = rme_root
        .join("Platform")
        .join(platform)
        .join("Chips")
        .join(chip_class);
    if !chip_src.is_dir() {
        return Err(GenError::emission(format!(
            "{}: chip source tree missing under RME root",
            chip_src.display()
        )));
    }
    copy_static_inner(rme_root, rvm_root, platform, &chip_src, layout)
        .map_err(|e| GenError::emission(format!("{e:#}")))
}

fn copy_static_inner(
    rme_root: &Path,
    rvm_root: &Path,
    platform: &str,
    chip_src: &Path,
    layout: &OutputLayout,
) -> AnyResult<()> {
    copy_dir_all(chip_src, &layout.rme_include_chip)?;

    let kernel_src = rme_root.join("Kernel");
    if kernel_src.is_dir() {
        copy_dir_all(&kernel_src, &layout.rme_kernel)?;
    }

    let platform_src = rme_root.join("Platform").join(platform);
    if platform_src.is_dir() {
        copy_dir_all_except(&platform_src, &layout.rme_platform, "Chips")?;
    }

    copy_dir_all(rvm_root, &layout.rvm_root.join("Source"))?;

    Ok(())
}

fn copy_dir_all(src: &Path, dst: &Path) -> AnyResult<()> {
    fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("reading {}", src.display()))? {
        let entry = entry?;
        let to = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_all(&entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), &to).with_context(|| format!("copying {}", entry.path().display()))?;
        }
    }
    Ok(())
}

fn copy_dir_all_except(src: &Path, dst: &Path, skip_name: &str) -> AnyResult<()> {
    fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("reading {}", src.display()))? {
        let entry = entry?;
        if entry.file_name() == skip_name {
            continue;
        }
        let to = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_all(&entry.path(), &to)?;
        } else {
            fs::copy(entry.path(), &to).with_context(|| format!("copying {}", entry.path().display()))?;
        }
    }
    Ok(())
}
