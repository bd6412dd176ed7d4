// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Writing package payloads into the build tree. */

use {
    crate::{
        config::prefix_dir,
        deb::reader::{ArchiveEntry, DataTarReader},
        error::{BootstrapError, Result},
        ledger::ContentLedger,
        symlink::{resolve_symlink, SymlinkManifestWriter, SYMLINKS_FILENAME},
    },
    log::{debug, warn},
    std::{
        fs::File,
        io::{BufWriter, Read},
        path::{Path, PathBuf},
    },
};

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = file.metadata()?.permissions();
    permissions.set_mode(mode & 0o7777);
    file.set_permissions(permissions)
}

#[cfg(windows)]
fn set_mode(_file: &File, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

/// State of the bootstrap being assembled for one architecture.
///
/// Owns the [ContentLedger] and the writer of the symlink manifest.
pub struct BuildContext {
    build_dir: PathBuf,
    prefix: String,
    ledger: ContentLedger,
    symlinks: SymlinkManifestWriter<BufWriter<File>>,
}

impl BuildContext {
    /// Create a context writing into `build_dir`.
    ///
    /// `prefix` must end with `/`. The prefix directory and an empty symlink
    /// manifest are created.
    pub fn new(build_dir: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let build_dir = build_dir.as_ref().to_path_buf();
        let prefix_dir = prefix_dir(&build_dir, prefix);

        std::fs::create_dir_all(&prefix_dir)
            .map_err(|e| BootstrapError::IoPath(format!("{}", prefix_dir.display()), e))?;

        let manifest_path = prefix_dir.join(SYMLINKS_FILENAME);
        let fh = File::create(&manifest_path)
            .map_err(|e| BootstrapError::IoPath(format!("{}", manifest_path.display()), e))?;

        Ok(Self {
            build_dir,
            prefix: prefix.to_string(),
            ledger: ContentLedger::default(),
            symlinks: SymlinkManifestWriter::new(BufWriter::new(fh)),
        })
    }

    /// The directory corresponding to the installation prefix.
    pub fn prefix_dir(&self) -> PathBuf {
        prefix_dir(&self.build_dir, &self.prefix)
    }

    pub fn ledger(&self) -> &ContentLedger {
        &self.ledger
    }

    /// Filesystem location of an absolute package path in the build tree.
    pub fn output_path(&self, path: &str) -> PathBuf {
        self.build_dir.join(path.trim_start_matches('/'))
    }

    /// Write every entry of a package payload.
    ///
    /// Returns the number of entries processed. Processing stops at the first
    /// error; entries already written stay recorded.
    pub fn materialize_package(&mut self, data: &mut DataTarReader<'_>) -> Result<usize> {
        let package = data.package().to_string();
        self.ledger.register_package(&package);

        let mut count = 0;
        for entry in data.entries()? {
            self.materialize_entry(&package, entry?)?;
            count += 1;
        }

        Ok(count)
    }

    /// Write a single payload entry.
    pub fn materialize_entry(&mut self, package: &str, entry: ArchiveEntry<'_, '_>) -> Result<()> {
        if !entry.path().starts_with(&self.prefix) {
            warn!(
                "{}: {} is outside {} and will not be in the bootstrap",
                package,
                entry.path(),
                self.prefix
            );
        }

        match entry {
            ArchiveEntry::RegularFile {
                path,
                mode,
                size,
                mut content,
            } => {
                debug!("{}: writing {} ({} bytes)", package, path, size);
                self.write_file(package, &path, mode, size, &mut content)?;
                self.ledger.record(package, &path);
            }
            ArchiveEntry::Symlink { path, target } => {
                let symlink = resolve_symlink(&self.prefix, &path, &target)?;
                debug!(
                    "{}: symlink {} -> {}",
                    package, symlink.link_path, symlink.relative_target
                );
                self.symlinks.write_entry(&symlink)?;
                self.ledger.record_symlink(package, &path);
            }
            ArchiveEntry::Directory { .. } => {}
            ArchiveEntry::HardLink { path, target } => {
                return Err(BootstrapError::HardLink {
                    package: package.to_string(),
                    path,
                    target,
                });
            }
        }

        Ok(())
    }

    fn write_file(
        &self,
        package: &str,
        path: &str,
        mode: u32,
        size: u64,
        content: &mut impl Read,
    ) -> Result<()> {
        let dest_path = self.output_path(path);
        let io_error = |e| BootstrapError::IoPath(format!("{}", dest_path.display()), e);

        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BootstrapError::IoPath(format!("{}", parent.display()), e))?;
        }

        let fh = File::create(&dest_path).map_err(io_error)?;
        let mut writer = BufWriter::new(fh);
        let written =
            std::io::copy(content, &mut writer).map_err(|e| BootstrapError::PackageIo {
                package: package.to_string(),
                path: path.to_string(),
                source: e,
            })?;
        let fh = writer.into_inner()?;

        if written != size {
            return Err(BootstrapError::SizeMismatch {
                package: package.to_string(),
                path: path.to_string(),
                expected: size,
                actual: written,
            });
        }

        set_mode(&fh, mode).map_err(io_error)?;

        Ok(())
    }

    /// Flush the symlink manifest and release the ledger.
    pub fn finish(self) -> Result<ContentLedger> {
        self.symlinks.finish()?;

        Ok(self.ledger)
    }
}
