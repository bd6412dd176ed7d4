// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Filesystem based Debian repositories. */

use {
    crate::{
        error::{BootstrapError, Result},
        repository::{DataResolver, RepositoryRootReader},
    },
    std::{
        io::{BufReader, Read},
        path::{Path, PathBuf},
    },
    url::Url,
};

/// A readable interface to a Debian repository backed by a filesystem.
///
/// Useful for building bootstraps from a local mirror.
#[derive(Clone, Debug)]
pub struct FilesystemRepositoryReader {
    root_dir: PathBuf,
}

impl FilesystemRepositoryReader {
    /// Construct a new instance, bound to the root directory specified.
    ///
    /// No validation of the passed path is performed.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            root_dir: path.as_ref().to_path_buf(),
        }
    }
}

impl DataResolver for FilesystemRepositoryReader {
    fn url(&self) -> Result<Url> {
        let root_dir = if self.root_dir.is_absolute() {
            self.root_dir.clone()
        } else {
            std::env::current_dir()?.join(&self.root_dir)
        };

        Url::from_directory_path(&root_dir).map_err(|_| BootstrapError::Transport {
            url: format!("{}", root_dir.display()),
            message: "error converting filesystem path to URL".to_string(),
        })
    }

    fn get_path(&self, path: &str) -> Result<Box<dyn Read>> {
        let path = self.root_dir.join(path);

        let f = std::fs::File::open(&path)
            .map_err(|e| BootstrapError::IoPath(format!("{}", path.display()), e))?;

        Ok(Box::new(BufReader::new(f)))
    }
}

impl RepositoryRootReader for FilesystemRepositoryReader {}
