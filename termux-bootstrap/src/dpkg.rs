// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Synthesis of the dpkg database.

Packages in a bootstrap are never installed by dpkg. For dpkg and apt to treat
them as installed, the bootstrap ships the files dpkg would have written:

* `var/lib/dpkg/status` with a paragraph per package.
* `var/lib/dpkg/available`, empty.
* `var/lib/dpkg/info/<package>.list` listing installed paths and their parent
  directories.
* `var/lib/dpkg/info/<package>.md5sums` with the MD5 of every installed file.
*/

use {
    crate::{
        config::prefix_dir,
        error::{BootstrapError, Result},
        io::md5_file_hex,
        ledger::ContentLedger,
        repository::PackageIndex,
    },
    log::info,
    std::{
        collections::HashSet,
        fs::File,
        io::{BufWriter, Write},
        path::Path,
    },
};

/// Directories apt and dpkg expect to exist, relative to the prefix.
pub const DIRECTORY_LAYOUT: &[&str] = &[
    "etc/apt/preferences.d",
    "etc/apt/apt.conf.d",
    "var/cache/apt/archives/partial",
    "var/log/apt",
    "tmp",
    "var/lib/dpkg/info",
    "var/lib/dpkg/triggers",
    "var/lib/dpkg/updates",
    "var/lib/apt/lists/partial",
];

/// Create [DIRECTORY_LAYOUT] under a prefix directory.
pub fn create_directory_layout(prefix_dir: &Path) -> Result<()> {
    for dir in DIRECTORY_LAYOUT {
        let path = prefix_dir.join(dir);
        std::fs::create_dir_all(&path)
            .map_err(|e| BootstrapError::IoPath(format!("{}", path.display()), e))?;
    }

    Ok(())
}

fn create_file(path: &Path) -> Result<BufWriter<File>> {
    let fh = File::create(path)
        .map_err(|e| BootstrapError::IoPath(format!("{}", path.display()), e))?;

    Ok(BufWriter::new(fh))
}

/// Write the `status` database for packages in the given order.
pub fn write_status<W: Write>(
    writer: &mut W,
    index: &PackageIndex,
    packages: &[String],
) -> Result<()> {
    for package in packages {
        index
            .require(package)?
            .to_installed_paragraph()
            .write(writer)?;
        writer.write_all(b"\n")?;
    }

    Ok(())
}

/// Lines of a `.list` file.
///
/// Installed paths come first, followed by every ancestor directory of them in
/// the order they are discovered. No path appears twice and `/` is omitted.
pub fn file_list<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<String> {
    let paths = paths.collect::<Vec<_>>();

    let mut seen = paths.iter().copied().collect::<HashSet<_>>();
    let mut lines = paths.iter().map(|p| p.to_string()).collect::<Vec<_>>();

    for path in &paths {
        for (i, c) in path.char_indices().skip(1) {
            if c == '/' {
                let dir = &path[0..i];
                if seen.insert(dir) {
                    lines.push(dir.to_string());
                }
            }
        }
    }

    lines
}

/// Write the `.md5sums` content for a package.
///
/// Digests are computed from the files in the build tree. Symlinks are skipped.
pub fn write_md5sums<W: Write>(
    writer: &mut W,
    build_dir: &Path,
    ledger: &ContentLedger,
    package: &str,
) -> Result<()> {
    for path in ledger.paths(package) {
        if ledger.is_symlink(path) {
            continue;
        }

        let relative = path.trim_start_matches('/');
        let digest = md5_file_hex(&build_dir.join(relative))?;

        writeln!(writer, "{}  {}", digest, relative)?;
    }

    Ok(())
}

/// Write the complete dpkg database into the prefix directory.
pub fn write_package_database(
    build_dir: &Path,
    prefix: &str,
    index: &PackageIndex,
    packages: &[String],
    ledger: &ContentLedger,
) -> Result<()> {
    let prefix_dir = prefix_dir(build_dir, prefix);
    let dpkg_dir = prefix_dir.join("var/lib/dpkg");
    let info_dir = dpkg_dir.join("info");

    create_directory_layout(&prefix_dir)?;

    info!("writing dpkg database to {}", dpkg_dir.display());

    let mut writer = create_file(&dpkg_dir.join("status"))?;
    write_status(&mut writer, index, packages)?;
    writer.into_inner()?;

    create_file(&dpkg_dir.join("available"))?.into_inner()?;

    for package in packages {
        let mut writer = create_file(&info_dir.join(format!("{}.list", package)))?;
        for line in file_list(ledger.paths(package)) {
            writeln!(writer, "{}", line)?;
        }
        writer.into_inner()?;

        let mut writer = create_file(&info_dir.join(format!("{}.md5sums", package)))?;
        write_md5sums(&mut writer, build_dir, ledger, package)?;
        writer.into_inner()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc, std::io::Cursor};

    const INDEX: &str = indoc! {"
        Package: readline
        Version: 8.0
        Filename: dists/stable/main/binary-arm/readline.deb
        SHA256: e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        Size: 0

        Package: bash
        Version: 5.0.0
        Depends: readline
        Description: GNU Bourne Again shell
         A sh-compatible command language interpreter.
        Filename: dists/stable/main/binary-arm/bash.deb
        MD5Sum: d41d8cd98f00b204e9800998ecf8427e
    "};

    #[test]
    fn status_paragraphs() -> Result<()> {
        let index = PackageIndex::from_reader(Cursor::new(INDEX))?;

        let mut buf = vec![];
        write_status(
            &mut buf,
            &index,
            &["bash".to_string(), "readline".to_string()],
        )?;

        assert_eq!(
            String::from_utf8_lossy(&buf),
            indoc! {"
                Package: bash
                Version: 5.0.0
                Depends: readline
                Description: GNU Bourne Again shell
                 A sh-compatible command language interpreter.
                Status: install ok installed

                Package: readline
                Version: 8.0
                Status: install ok installed

            "}
        );

        assert!(matches!(
            write_status(&mut vec![], &index, &["dash".to_string()]),
            Err(BootstrapError::MissingPackage { .. })
        ));

        Ok(())
    }

    #[test]
    fn list_includes_ancestors_once() {
        let lines = file_list(["/a/b/c", "/a/b/d", "/a/e"].into_iter());

        assert_eq!(lines, vec!["/a/b/c", "/a/b/d", "/a/e", "/a", "/a/b"]);
    }

    #[test]
    fn list_does_not_repeat_installed_paths() {
        let lines = file_list(["/usr/lib", "/usr/lib/libfoo.so"].into_iter());

        assert_eq!(lines, vec!["/usr/lib", "/usr/lib/libfoo.so", "/usr"]);
    }

    #[test]
    fn md5sums_skip_symlinks() -> Result<()> {
        let td = tempfile::tempdir()?;
        std::fs::create_dir_all(td.path().join("usr/bin"))?;
        std::fs::write(td.path().join("usr/bin/empty"), b"")?;

        let mut ledger = ContentLedger::default();
        ledger.record("pkg", "/usr/bin/empty");
        ledger.record_symlink("pkg", "/usr/bin/link");

        let mut buf = vec![];
        write_md5sums(&mut buf, td.path(), &ledger, "pkg")?;

        assert_eq!(
            String::from_utf8_lossy(&buf),
            "d41d8cd98f00b204e9800998ecf8427e  usr/bin/empty\n"
        );

        Ok(())
    }

    #[test]
    fn database_layout() -> Result<()> {
        let td = tempfile::tempdir()?;
        let prefix = "/data/data/com.termux/files/usr/";
        let index = PackageIndex::from_reader(Cursor::new(INDEX))?;
        let packages = vec!["readline".to_string()];

        write_package_database(
            td.path(),
            prefix,
            &index,
            &packages,
            &ContentLedger::default(),
        )?;

        let prefix_dir = prefix_dir(td.path(), prefix);
        for dir in DIRECTORY_LAYOUT {
            assert!(prefix_dir.join(dir).is_dir(), "{} should exist", dir);
        }

        let dpkg_dir = prefix_dir.join("var/lib/dpkg");
        assert_eq!(std::fs::read(dpkg_dir.join("available"))?.len(), 0);
        assert_eq!(std::fs::read(dpkg_dir.join("info/readline.list"))?.len(), 0);
        assert_eq!(std::fs::read(dpkg_dir.join("info/readline.md5sums"))?.len(), 0);
        assert!(std::fs::read_to_string(dpkg_dir.join("status"))?
            .ends_with("Status: install ok installed\n\n"));

        Ok(())
    }
}
