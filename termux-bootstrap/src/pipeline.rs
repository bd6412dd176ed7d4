// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Assembly of bootstraps from a repository. */

use {
    crate::{
        config::{Architecture, BootstrapConfig, PublishConfig},
        deb::reader::BinaryPackageReader,
        dpkg::write_package_database,
        error::{BootstrapError, Result},
        io::drain_reader,
        materialize::BuildContext,
        publish::{package_bootstrap, publish_bootstrap, CommandRunner},
        repository::RepositoryRootReader,
    },
    log::{error, info},
    std::path::{Path, PathBuf},
};

/// Outcome of a successful bootstrap build.
#[derive(Clone, Debug)]
pub struct BootstrapBuild {
    pub arch: Architecture,

    /// Path of the `new-bootstrap-<arch>.zip` archive.
    pub zip_path: PathBuf,

    /// Number of installed paths, symlinks included.
    pub paths: usize,

    pub symlinks: usize,

    /// Whether the archive was published.
    pub published: bool,
}

/// Delete and recreate a directory.
pub fn prepare_build_dir(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)
            .map_err(|e| BootstrapError::IoPath(format!("{}", path.display()), e))?;
    }

    std::fs::create_dir_all(path)
        .map_err(|e| BootstrapError::IoPath(format!("{}", path.display()), e))?;

    Ok(())
}

/// Builds bootstraps from a repository.
pub struct BootstrapBuilder<'a> {
    config: &'a BootstrapConfig,
    repository: &'a dyn RepositoryRootReader,
    publisher: Option<(&'a dyn CommandRunner, &'a PublishConfig)>,
    keep_going: bool,
}

impl<'a> BootstrapBuilder<'a> {
    pub fn new(config: &'a BootstrapConfig, repository: &'a dyn RepositoryRootReader) -> Self {
        Self {
            config,
            repository,
            publisher: None,
            keep_going: false,
        }
    }

    /// Publish every successfully built archive.
    pub fn publish_with(mut self, runner: &'a dyn CommandRunner, config: &'a PublishConfig) -> Self {
        self.publisher = Some((runner, config));
        self
    }

    /// Continue with the next architecture when a build fails.
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// Assemble the bootstrap archive for an architecture.
    ///
    /// The architecture's build directory is wiped first. Every configured
    /// package must be in the repository before anything is downloaded.
    pub fn build_archive(&self, arch: Architecture) -> Result<BootstrapBuild> {
        let config = self.config;
        let build_dir = config.arch_build_dir(arch);
        let prefix = config.prefix();

        prepare_build_dir(&build_dir)?;

        let index = self.repository.fetch_bootstrap_index(config, arch)?;
        info!("{}: repository has {} packages", arch, index.len());

        let records = config
            .packages
            .iter()
            .map(|package| index.require(package))
            .collect::<Result<Vec<_>>>()?;

        let mut context = BuildContext::new(&build_dir, &prefix)?;

        for record in records {
            let package = record.package()?;
            info!("{}: installing {} {}", arch, package, record.version_str()?);

            let mut reader = self.repository.fetch_binary_package(record)?;
            {
                let mut data = BinaryPackageReader::new(&mut reader).data_tar(package)?;
                context.materialize_package(&mut data)?;
            }

            // Reading to the end verifies the package digest.
            drain_reader(&mut reader).map_err(|e| BootstrapError::PackageIo {
                package: package.to_string(),
                path: record.filename().unwrap_or(package).to_string(),
                source: e,
            })?;
        }

        let ledger = context.finish()?;

        write_package_database(&build_dir, &prefix, &index, &config.packages, &ledger)?;

        let zip_path = package_bootstrap(&build_dir, &config.prefix_dir(arch), arch)?;

        Ok(BootstrapBuild {
            arch,
            zip_path,
            paths: ledger.len(),
            symlinks: ledger.symlink_count(),
            published: false,
        })
    }

    /// Build and, if configured, publish the bootstrap for an architecture.
    ///
    /// An archive is only published once it was built successfully.
    pub fn build(&self, arch: Architecture) -> Result<BootstrapBuild> {
        let mut build = self.build_archive(arch)?;

        if let Some((runner, publish)) = self.publisher {
            publish_bootstrap(runner, publish, &self.config.arch_build_dir(arch), arch)?;
            build.published = true;
        }

        Ok(build)
    }

    /// Build all configured architectures in order.
    ///
    /// Without `keep_going`, the first failure is returned. Otherwise failures
    /// are logged and reported together once all architectures were attempted.
    pub fn build_all(&self) -> Result<Vec<BootstrapBuild>> {
        let mut builds = vec![];
        let mut failed = vec![];

        for arch in &self.config.architectures {
            match self.build(*arch) {
                Ok(build) => {
                    info!(
                        "{}: {} ({} paths, {} symlinks)",
                        arch,
                        build.zip_path.display(),
                        build.paths,
                        build.symlinks
                    );
                    builds.push(build);
                }
                Err(e) if self.keep_going => {
                    error!("{}: {}", arch, e);
                    failed.push(arch.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        if failed.is_empty() {
            Ok(builds)
        } else {
            Err(BootstrapError::BuildsFailed(failed))
        }
    }
}
