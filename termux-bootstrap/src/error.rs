// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
///
/// Nothing in the bootstrap pipeline is recoverable locally. Variants carry the
/// package name and entry path where known so a failed run can be diagnosed from
/// the error alone.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[cfg(feature = "http")]
    #[error("HTTP error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0:?}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("integer parsing error: {0:?}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("zip error: {0:?}")]
    Zip(#[from] zip::result::ZipError),

    #[error("directory walk error: {0:?}")]
    WalkDir(#[from] walkdir::Error),

    #[error("I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("I/O error reading {path} of package {package}: {source:?}")]
    PackageIo {
        package: String,
        path: String,
        source: std::io::Error,
    },

    #[error("error fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("control file parse error: {0}")]
    ControlParse(String),

    #[error("required field missing in control paragraph: {0}")]
    ControlRequiredFieldMissing(&'static str),

    #[error("package {package} has no data.tar member; it may be malformed or renamed upstream")]
    MissingDataArchive { package: String },

    #[error("unknown compression in deb archive member: {0}")]
    UnknownCompression(String),

    #[error("illegal path in package {package}: {path}")]
    IllegalPath { package: String, path: String },

    #[error("found a hard link at {path} (to {target}) in package {package}; hard links do not work on the target platform")]
    HardLink {
        package: String,
        path: String,
        target: String,
    },

    #[error("unsupported {kind} entry at {path} in package {package}")]
    UnsupportedEntry {
        package: String,
        path: String,
        kind: String,
    },

    #[error("did not find bootstrap package '{package}'; available: {}", .available.join(", "))]
    MissingPackage {
        package: String,
        available: Vec<String>,
    },

    #[error("did not find {field} field for package '{package}'")]
    MissingField {
        package: String,
        field: &'static str,
    },

    #[error("symlink {link} resolves to {target}, which is outside the installation prefix {prefix}")]
    SymlinkOutsidePrefix {
        link: String,
        target: String,
        prefix: String,
    },

    #[error("symlink {link} points at itself or below itself: {target}")]
    SymlinkSelfReference { link: String, target: String },

    #[error("symlink {link} has an empty target")]
    EmptySymlinkTarget { link: String },

    #[error("size mismatch writing {path} of package {package}: expected {expected} bytes; wrote {actual}")]
    SizeMismatch {
        package: String,
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("bootstrap builds failed for: {}", .0.join(", "))]
    BuildsFailed(Vec<String>),

    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },
}

impl<W> From<std::io::IntoInnerError<W>> for BootstrapError {
    fn from(e: std::io::IntoInnerError<W>) -> Self {
        Self::Io(e.into())
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, BootstrapError>;
