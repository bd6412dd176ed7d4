// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Bootstrap build configuration.

Every value has a compiled-in default matching the official Termux
bootstraps. [BootstrapConfig] can be deserialized so the defaults can be
overridden from a configuration file.
*/

use {
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
    strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr},
    url::Url,
};

/// Installation prefix of the Termux app on device.
pub const DEFAULT_PREFIX: &str = "/data/data/com.termux/files/usr/";

/// Repository the official bootstraps are assembled from.
pub const DEFAULT_REPOSITORY_URL: &str = "http://termux.net/";

/// Packages making up a bootstrap, in installation order.
pub const DEFAULT_BOOTSTRAP_PACKAGES: &[&str] = &[
    // Having bash as shell:
    "bash",
    "readline",
    "ncurses",
    "command-not-found",
    "termux-tools",
    // Needed for bin/sh:
    "dash",
    // For use by dpkg and apt:
    "liblzma",
    // Needed by dpkg:
    "libandroid-support",
    // dpkg uses tar (and wants 'find' in path for some operations):
    "busybox",
    // apt uses STL:
    "libc++",
    // gnupg for package verification:
    "gpgv",
    // For package management:
    "dpkg",
    "apt",
];

/// A repository architecture.
#[derive(
    AsRefStr,
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    IntoStaticStr,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum Architecture {
    #[serde(rename = "arm")]
    #[strum(serialize = "arm")]
    Arm,

    #[serde(rename = "i686")]
    #[strum(serialize = "i686")]
    I686,

    #[serde(rename = "aarch64")]
    #[strum(serialize = "aarch64")]
    Aarch64,

    #[serde(rename = "x86_64")]
    #[strum(serialize = "x86_64")]
    X86_64,

    /// Architecture independent packages.
    #[serde(rename = "all")]
    #[strum(serialize = "all")]
    All,
}

impl Architecture {
    /// Device architectures a bootstrap is built for.
    pub fn bootstrap_targets() -> Vec<Self> {
        vec![Self::Arm, Self::I686, Self::Aarch64, Self::X86_64]
    }

    /// File name of the published bootstrap archive.
    pub fn bootstrap_zip_name(&self) -> String {
        format!("bootstrap-{}.zip", self)
    }

    /// File name the freshly built archive is uploaded under before it replaces
    /// the published one.
    pub fn staging_zip_name(&self) -> String {
        format!("new-bootstrap-{}.zip", self)
    }
}

/// Where and how a built bootstrap is published.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PublishConfig {
    /// SSH host receiving the archives.
    pub host: String,

    /// Directory on the host holding the published archives.
    #[serde(default = "default_publish_directory")]
    pub directory: String,

    /// Command run locally once an archive was replaced, e.g. to purge a CDN cache.
    #[serde(default)]
    pub purge_command: Option<Vec<String>>,
}

fn default_publish_directory() -> String {
    "/var/www/html/bootstrap/".to_string()
}

/// Configuration of a bootstrap build.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Installation prefix packages are built for.
    ///
    /// Always stored with a trailing `/`.
    pub prefix: String,

    /// Base URL of the package repository.
    pub repository_url: Url,

    /// Repository distribution, found under `dists/`.
    pub distribution: String,

    /// Repository component.
    pub component: String,

    /// Packages to install, in order.
    pub packages: Vec<String>,

    /// Architectures to build bootstraps for.
    pub architectures: Vec<Architecture>,

    /// Directory bootstraps are assembled in.
    ///
    /// Each architecture uses a subdirectory named after it, which is deleted at
    /// the start of its build.
    pub build_dir: PathBuf,

    /// How to publish built archives.
    pub publish: Option<PublishConfig>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            repository_url: Url::parse(DEFAULT_REPOSITORY_URL)
                .expect("default repository URL should parse"),
            distribution: "stable".to_string(),
            component: "main".to_string(),
            packages: DEFAULT_BOOTSTRAP_PACKAGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            architectures: Architecture::bootstrap_targets(),
            build_dir: std::env::temp_dir().join("termux-bootstrap-zip"),
            publish: None,
        }
    }
}

impl BootstrapConfig {
    /// The installation prefix, normalized to end with `/`.
    pub fn prefix(&self) -> String {
        if self.prefix.ends_with('/') {
            self.prefix.clone()
        } else {
            format!("{}/", self.prefix)
        }
    }

    /// The directory an architecture's bootstrap is assembled in.
    ///
    /// Each architecture has its own directory so archives of earlier
    /// architectures survive later builds in the same run.
    pub fn arch_build_dir(&self, arch: Architecture) -> PathBuf {
        self.build_dir.join(arch.as_ref())
    }

    /// The directory inside an architecture's build directory corresponding to
    /// the installation prefix.
    ///
    /// This is the root of the published archive.
    pub fn prefix_dir(&self, arch: Architecture) -> PathBuf {
        prefix_dir(&self.arch_build_dir(arch), &self.prefix())
    }

    /// Path of the `Packages.xz` index for an architecture, relative to the repository root.
    pub fn packages_index_path(&self, arch: Architecture) -> String {
        format!(
            "dists/{}/{}/binary-{}/Packages.xz",
            self.distribution.trim_matches('/'),
            self.component.trim_matches('/'),
            arch
        )
    }
}

pub(crate) fn prefix_dir(build_dir: &Path, prefix: &str) -> PathBuf {
    build_dir.join(prefix.trim_matches('/'))
}
