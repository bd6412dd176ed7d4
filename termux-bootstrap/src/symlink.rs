// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Symbolic link handling.

Android apps cannot ship symlinks inside their bootstrap archive. Instead, every
symlink found in a package is written as a line of `SYMLINKS.txt`, and the app
creates the links when extracting the bootstrap. Each line is
`<target>←<link>`, where `<link>` is relative to the installation prefix and
`<target>` is relative to the directory containing the link, so the line can be
replayed as `ln -s <target> <link>` from the prefix directory.
*/

use {
    crate::error::{BootstrapError, Result},
    path_dedot::ParseDot,
    std::{
        io::Write,
        path::{Path, PathBuf},
    },
};

/// Name of the symlink manifest in the prefix directory.
pub const SYMLINKS_FILENAME: &str = "SYMLINKS.txt";

/// Separator between target and link in [SYMLINKS_FILENAME] lines.
pub const SYMLINK_SEPARATOR: char = '←';

/// A symlink ready to be written to the symlink manifest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SymlinkEntry {
    /// Target relative to the directory holding the link.
    pub relative_target: String,

    /// Link path relative to the installation prefix.
    pub link_path: String,
}

/// Resolve a raw link target against the directory holding the link.
///
/// Absolute targets replace the directory. `.` and `..` are collapsed
/// lexically; `..` never climbs above `/`.
pub fn resolve_link_target(link_path: &str, raw_target: &str) -> Result<String> {
    let joined = if raw_target.starts_with('/') {
        PathBuf::from(raw_target)
    } else {
        Path::new(link_path)
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .join(raw_target)
    };

    let resolved = joined
        .parse_dot()
        .map_err(|e| BootstrapError::IoPath(format!("{}", joined.display()), e))?;

    Ok(resolved.to_string_lossy().to_string())
}

/// Express `target` relative to `base`.
///
/// Both are `/` separated paths relative to the same root. Shared leading
/// segments are dropped, each remaining `base` segment becomes `..` and the
/// remaining `target` segments are appended.
pub fn relativize(base: &str, target: &str) -> String {
    let base = base.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>();
    let target = target.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    std::iter::repeat("..")
        .take(base.len() - common)
        .chain(target[common..].iter().copied())
        .collect::<Vec<_>>()
        .join("/")
}

/// Remove the level [relativize()] adds for the link itself.
///
/// Relativizing from the link path treats the link as a directory. The result
/// is relative to the directory holding the link once the first `..` is removed.
pub fn strip_link_component(relative: &str, link: &str, target: &str) -> Result<String> {
    if relative == ".." {
        Ok(".".to_string())
    } else if let Some(stripped) = relative.strip_prefix("../") {
        Ok(stripped.to_string())
    } else {
        Err(BootstrapError::SymlinkSelfReference {
            link: link.to_string(),
            target: target.to_string(),
        })
    }
}

fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if path == prefix.trim_end_matches('/') {
        Some("")
    } else {
        path.strip_prefix(prefix)
    }
}

/// Turn a symlink found in a package into its manifest entry.
///
/// `link_path` and `raw_target` are as stored in the package. `prefix` is the
/// installation prefix and must end with `/`. Both the link and the resolved
/// target must be inside the prefix. An empty target is malformed.
pub fn resolve_symlink(prefix: &str, link_path: &str, raw_target: &str) -> Result<SymlinkEntry> {
    if raw_target.is_empty() {
        return Err(BootstrapError::EmptySymlinkTarget {
            link: link_path.to_string(),
        });
    }

    let target = resolve_link_target(link_path, raw_target)?;

    let outside = |path: &str| BootstrapError::SymlinkOutsidePrefix {
        link: link_path.to_string(),
        target: path.to_string(),
        prefix: prefix.to_string(),
    };

    let relative_link = strip_prefix(link_path, prefix).ok_or_else(|| outside(link_path))?;
    let relative_target = strip_prefix(&target, prefix).ok_or_else(|| outside(&target))?;

    let relative = relativize(relative_link, relative_target);

    Ok(SymlinkEntry {
        relative_target: strip_link_component(&relative, link_path, &target)?,
        link_path: relative_link.to_string(),
    })
}

/// Writes [SYMLINKS_FILENAME] incrementally.
pub struct SymlinkManifestWriter<W: Write> {
    writer: W,
    count: usize,
}

impl<W: Write> SymlinkManifestWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, count: 0 }
    }

    /// Append a line for a symlink.
    pub fn write_entry(&mut self, entry: &SymlinkEntry) -> Result<()> {
        writeln!(
            self.writer,
            "{}{}{}",
            entry.relative_target, SYMLINK_SEPARATOR, entry.link_path
        )?;
        self.count += 1;

        Ok(())
    }

    /// Number of lines written so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;

        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/data/data/com.termux/files/usr/";

    fn resolve(link: &str, target: &str) -> Result<SymlinkEntry> {
        resolve_symlink(PREFIX, &format!("{}{}", PREFIX, link), target)
    }

    #[test]
    fn relativize_paths() {
        assert_eq!(relativize("lib/libfoo.so", "lib/libfoo.so.1"), "../libfoo.so.1");
        assert_eq!(relativize("bin/sh", "bin/dash"), "../dash");
        assert_eq!(relativize("bin/sh", "bin/sh"), "");
        assert_eq!(relativize("a/b/c", "x/y"), "../../../x/y");
        assert_eq!(relativize("bin/foo", ""), "../..");
    }

    #[test]
    fn strip_component() -> Result<()> {
        assert_eq!(strip_link_component("../libfoo.so.1", "l", "t")?, "libfoo.so.1");
        assert_eq!(strip_link_component("../../x/y", "l", "t")?, "../x/y");
        assert_eq!(strip_link_component("..", "l", "t")?, ".");
        assert!(matches!(
            strip_link_component("x", "l", "t"),
            Err(BootstrapError::SymlinkSelfReference { .. })
        ));

        Ok(())
    }

    #[test]
    fn absolute_target_in_same_directory() -> Result<()> {
        let entry = resolve("lib/libfoo.so", "/data/data/com.termux/files/usr/lib/libfoo.so.1")?;

        assert_eq!(entry.relative_target, "libfoo.so.1");
        assert_eq!(entry.link_path, "lib/libfoo.so");

        // Replaying the line reproduces the target.
        assert_eq!(
            resolve_link_target(
                &format!("{}{}", PREFIX, entry.link_path),
                &entry.relative_target
            )?,
            format!("{}lib/libfoo.so.1", PREFIX)
        );

        Ok(())
    }

    #[test]
    fn relative_targets() -> Result<()> {
        assert_eq!(resolve("bin/sh", "dash")?.relative_target, "dash");
        assert_eq!(
            resolve("share/man/man1/sh.1", "../../../share/doc/dash/sh.1")?.relative_target,
            "../../doc/dash/sh.1"
        );
        assert_eq!(
            resolve("bin/awk", "./applets/../busybox")?.relative_target,
            "busybox"
        );
        assert_eq!(resolve("lib/terminfo", "../share/terminfo")?.relative_target, "../share/terminfo");

        Ok(())
    }

    #[test]
    fn target_is_prefix_root() -> Result<()> {
        let entry = resolve("bin/root", "..")?;
        assert_eq!(entry.relative_target, "..");

        let entry = resolve("bin/here", ".")?;
        assert_eq!(entry.relative_target, ".");

        Ok(())
    }

    #[test]
    fn outside_prefix() {
        assert!(matches!(
            resolve("bin/sh", "/system/bin/sh"),
            Err(BootstrapError::SymlinkOutsidePrefix { target, .. }) if target == "/system/bin/sh"
        ));
        assert!(matches!(
            resolve_symlink(PREFIX, "/system/bin/sh", "/data/data/com.termux/files/usr/bin/dash"),
            Err(BootstrapError::SymlinkOutsidePrefix { link, .. }) if link == "/system/bin/sh"
        ));
        assert!(matches!(
            resolve("bin/sh", "../../../../../../etc/passwd"),
            Err(BootstrapError::SymlinkOutsidePrefix { .. })
        ));
    }

    #[test]
    fn self_reference() {
        assert!(matches!(
            resolve("bin/sh", "sh"),
            Err(BootstrapError::SymlinkSelfReference { .. })
        ));
        assert!(matches!(
            resolve("bin/sh", "sh/nested"),
            Err(BootstrapError::SymlinkSelfReference { .. })
        ));
    }

    #[test]
    fn empty_target() {
        assert!(matches!(
            resolve("bin/x", ""),
            Err(BootstrapError::EmptySymlinkTarget { link })
                if link == "/data/data/com.termux/files/usr/bin/x"
        ));
    }

    #[test]
    fn manifest_lines() -> Result<()> {
        let mut writer = SymlinkManifestWriter::new(vec![]);
        writer.write_entry(&resolve("lib/libfoo.so", "libfoo.so.1")?)?;
        writer.write_entry(&resolve("bin/sh", "dash")?)?;
        assert_eq!(writer.count(), 2);

        assert_eq!(
            String::from_utf8_lossy(&writer.finish()?),
            "libfoo.so.1←lib/libfoo.so\ndash←bin/sh\n"
        );

        Ok(())
    }
}
