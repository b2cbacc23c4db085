// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stage 1: command interface (`spec.md` §2 row 1, §6).
//!
//! Exactly five required flags; `clap`'s derive API rejects any other
//! count or an unknown flag on its own, the same way `xtask`'s `Xtask`
//! enum leans on `clap::Parser` to do argument-shape validation for it.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use crate::error::{GenError, Result};

#[derive(Debug, Parser)]
#[clap(
    name = "rme-projgen",
    about = "generate a buildable RME/RVM project tree from a project and chip XML description"
)]
pub struct Args {
    /// Input project description (XML).
    #[clap(short = 'i')]
    pub project_xml: PathBuf,

    /// Output directory; must exist and be empty.
    #[clap(short = 'o')]
    pub output_dir: PathBuf,

    /// RME (kernel) source root; must exist and be non-empty.
    #[clap(short = 'k')]
    pub rme_root: PathBuf,

    /// RVM (user runtime) source root; must exist and be non-empty.
    #[clap(short = 'u')]
    pub rvm_root: PathBuf,

    /// IDE/Makefile project format to emit.
    #[clap(short = 'f')]
    pub format: ProjectFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFormat {
    Keil,
    Eclipse,
    Makefile,
}

impl std::str::FromStr for ProjectFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "keil" => Ok(ProjectFormat::Keil),
            "eclipse" => Ok(ProjectFormat::Eclipse),
            "makefile" => Ok(ProjectFormat::Makefile),
            other => Err(format!(
                "{other}: expected one of keil, eclipse, makefile"
            )),
        }
    }
}

/// Validates path preconditions that `clap` can't express: existence,
/// emptiness of the output directory, non-emptiness of the source roots.
pub fn validate(args: &Args) -> Result<()> {
    if !args.project_xml.is_file() {
        return Err(GenError::cmdline(format!(
            "-i {}: not a file",
            args.project_xml.display()
        )));
    }
    require_dir_exists('o', &args.output_dir)?;
    require_dir_empty('o', &args.output_dir)?;
    require_dir_exists('k', &args.rme_root)?;
    require_dir_non_empty('k', &args.rme_root)?;
    require_dir_exists('u', &args.rvm_root)?;
    require_dir_non_empty('u', &args.rvm_root)?;
    Ok(())
}

fn require_dir_exists(flag: char, path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(GenError::missing_dir(flag, path));
    }
    Ok(())
}

fn require_dir_empty(flag: char, path: &Path) -> Result<()> {
    let mut entries = read_dir(flag, path)?;
    if entries.next().is_some() {
        return Err(GenError::cmdline(format!(
            "-{flag} {}: must be empty",
            path.display()
        )));
    }
    Ok(())
}

fn require_dir_non_empty(flag: char, path: &Path) -> Result<()> {
    let mut entries = read_dir(flag, path)?;
    if entries.next().is_none() {
        return Err(GenError::cmdline(format!(
            "-{flag} {}: must be non-empty",
            path.display()
        )));
    }
    Ok(())
}

fn read_dir(flag: char, path: &Path) -> Result<std::fs::ReadDir> {
    std::fs::read_dir(path)
        .with_context(|| format!("-{flag} {}", path.display()))
        .map_err(|e| GenError::cmdline(format!("{e:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_known_values() {
        assert_eq!("keil".parse::<ProjectFormat>().unwrap(), ProjectFormat::Keil);
        assert_eq!(
            "eclipse".parse::<ProjectFormat>().unwrap(),
            ProjectFormat::Eclipse
        );
        assert_eq!(
            "makefile".parse::<ProjectFormat>().unwrap(),
            ProjectFormat::Makefile
        );
        assert!("foo".parse::<ProjectFormat>().is_err());
    }

    #[test]
    fn rejects_nonexistent_output_dir() {
        let args = Args {
            project_xml: PathBuf::from("/nonexistent/project.xml"),
            output_dir: PathBuf::from("/nonexistent/out"),
            rme_root: PathBuf::from("/nonexistent/rme"),
            rvm_root: PathBuf::from("/nonexistent/rvm"),
            format: ProjectFormat::Makefile,
        };
        assert!(validate(&args).is_err());
    }
}
