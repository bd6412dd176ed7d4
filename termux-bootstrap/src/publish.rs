// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Packaging and publishing of bootstrap archives.

The prefix directory is archived as `new-bootstrap-<arch>.zip` in the build
directory. Publishing uploads it next to the published `bootstrap-<arch>.zip`,
backs up the published archive and then renames the upload over it, so clients
never observe a partially uploaded archive.
*/

use {
    crate::{
        config::{Architecture, PublishConfig},
        error::{BootstrapError, Result},
    },
    duct::cmd,
    log::{info, warn},
    std::{
        fs::File,
        io::{BufRead, BufReader},
        path::{Path, PathBuf},
    },
};

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(windows)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else {
        0o644
    }
}

/// Write a zip archive of a directory tree.
///
/// Entry names are relative to `source_dir` and use `/` separators. Entries are
/// written in sorted order, directories included, with their unix permissions.
/// Returns the number of entries written.
pub fn write_directory_zip(source_dir: &Path, dest_path: &Path) -> Result<usize> {
    let fh = File::create(dest_path)
        .map_err(|e| BootstrapError::IoPath(format!("{}", dest_path.display()), e))?;
    let mut zf = zip::ZipWriter::new(fh);
    let mut count = 0;

    for entry in walkdir::WalkDir::new(source_dir)
        .min_depth(1)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = entry?;
        let metadata = entry.metadata()?;

        let name = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|_| {
                BootstrapError::IoPath(
                    format!("{}", entry.path().display()),
                    std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "path not under archived directory",
                    ),
                )
            })?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(file_mode(&metadata));

        if metadata.is_dir() {
            zf.add_directory(name, options)?;
        } else {
            zf.start_file(name, options)?;
            let mut source = File::open(entry.path())
                .map_err(|e| BootstrapError::IoPath(format!("{}", entry.path().display()), e))?;
            std::io::copy(&mut source, &mut zf)?;
        }

        count += 1;
    }

    zf.finish()?;

    Ok(count)
}

/// Archive the prefix directory of a build as `new-bootstrap-<arch>.zip`.
///
/// Returns the path of the archive, which lives in the build directory.
pub fn package_bootstrap(
    build_dir: &Path,
    prefix_dir: &Path,
    arch: Architecture,
) -> Result<PathBuf> {
    let dest_path = build_dir.join(arch.staging_zip_name());

    info!("creating {}", dest_path.display());
    let count = write_directory_zip(prefix_dir, &dest_path)?;
    info!("wrote {} entries to {}", count, dest_path.display());

    Ok(dest_path)
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(|s| s.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs external programs.
pub trait CommandRunner {
    /// Run a program to completion, failing if it does not exit successfully.
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<()>;
}

/// A [CommandRunner] spawning processes via [duct].
///
/// Process output is forwarded to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct DuctCommandRunner;

impl CommandRunner for DuctCommandRunner {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<()> {
        let command_line = command_line(program, args);
        let command_error = |message: String| BootstrapError::Command {
            command: command_line.clone(),
            message,
        };

        warn!("running {}", command_line);

        let command = cmd(program, args)
            .dir(cwd)
            .stderr_to_stdout()
            .unchecked()
            .reader()
            .map_err(|e| command_error(format!("{}", e)))?;
        {
            let reader = BufReader::new(&command);
            for line in reader.lines() {
                warn!("{}", line.map_err(|e| command_error(format!("{}", e)))?);
            }
        }

        let output = command
            .try_wait()
            .map_err(|e| command_error(format!("{}", e)))?
            .ok_or_else(|| command_error("unable to wait on command".to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(command_error(format!("exited with {}", output.status)))
        }
    }
}

/// A single step of publishing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublishCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl PublishCommand {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The commands publishing an architecture's archive, in execution order.
pub fn publish_commands(config: &PublishConfig, arch: Architecture) -> Vec<PublishCommand> {
    let directory = if config.directory.ends_with('/') {
        config.directory.clone()
    } else {
        format!("{}/", config.directory)
    };

    let staging = arch.staging_zip_name();
    let published = format!("{}{}", directory, arch.bootstrap_zip_name());

    let mut commands = vec![
        PublishCommand::new(
            "scp",
            &[&staging, &format!("{}:{}", config.host, directory)],
        ),
        PublishCommand::new(
            "ssh",
            &[
                &config.host,
                "cp",
                &published,
                &format!("{}.bak", published),
            ],
        ),
        PublishCommand::new(
            "ssh",
            &[
                &config.host,
                "mv",
                &format!("{}{}", directory, staging),
                &published,
            ],
        ),
    ];

    if let Some((program, args)) = config
        .purge_command
        .as_ref()
        .and_then(|command| command.split_first())
    {
        commands.push(PublishCommand {
            program: program.clone(),
            args: args.to_vec(),
        });
    }

    commands
}

/// Publish the archive built for an architecture.
///
/// Commands run in `build_dir`, which must hold the archive written by
/// [package_bootstrap()]. The first failing command aborts publishing.
pub fn publish_bootstrap(
    runner: &dyn CommandRunner,
    config: &PublishConfig,
    build_dir: &Path,
    arch: Architecture,
) -> Result<()> {
    for command in publish_commands(config, arch) {
        runner.run(&command.program, &command.args, build_dir)?;
    }

    info!("published {} to {}", arch.bootstrap_zip_name(), config.host);

    Ok(())
}
