// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fatal error taxonomy (`spec.md` §7). Every stage either succeeds or
//! aborts the whole pipeline with one of these, carrying a breadcrumb
//! naming the failing construct.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("command line: {0}")]
    CommandLine(String),

    #[error("{path}: {detail}")]
    XmlSyntax { path: String, detail: String },

    #[error("{what}: {detail}")]
    Semantic { what: String, detail: String },

    #[error("placement: {0}")]
    Placement(String),

    #[error("emission: {0}")]
    Emission(String),
}

impl GenError {
    pub fn cmdline(msg: impl Into<String>) -> Self {
        GenError::CommandLine(msg.into())
    }

    pub fn xml(path: impl Into<String>, detail: impl Into<String>) -> Self {
        GenError::XmlSyntax {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn semantic(what: impl Into<String>, detail: impl Into<String>) -> Self {
        GenError::Semantic {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub fn placement(msg: impl Into<String>) -> Self {
        GenError::Placement(msg.into())
    }

    pub fn emission(msg: impl Into<String>) -> Self {
        GenError::Emission(msg.into())
    }

    pub fn missing_dir(flag: char, path: &Path) -> Self {
        GenError::CommandLine(format!(
            "-{flag} {}: does not exist",
            path.display()
        ))
    }
}

pub type Result<T> = std::result::Result<T, GenError>;
