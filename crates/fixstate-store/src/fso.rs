//! Filesystem primitives: copy, move, delete and clear.

use crate::StoreError;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Copy `from` to `to`.
///
/// A deep copy recreates directories, copies files with their permissions
/// and recreates symlinks as symlinks. A shallow copy links `to` to `from`
/// and falls back to a deep copy when the link cannot be created.
pub fn copy(from: &Path, to: &Path, deep: bool) -> Result<(), StoreError> {
    if fs::symlink_metadata(from).is_err() {
        return Err(StoreError::invalid_input(from, "no such file or directory"));
    }
    if !deep {
        match link(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => debug!(
                "symlink {} -> {} failed ({e}), copying instead",
                to.display(),
                from.display()
            ),
        }
    }
    copy_deep(from, to)
}

#[cfg(unix)]
fn link(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(from, to)
}

#[cfg(not(unix))]
fn link(_from: &Path, _to: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

fn copy_deep(from: &Path, to: &Path) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        if fs::symlink_metadata(from)?.file_type().is_symlink() {
            let target = fs::read_link(from)?;
            std::os::unix::fs::symlink(target, to)?;
            return Ok(());
        }
    }

    let meta = fs::metadata(from)?;
    if meta.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_deep(&entry.path(), &to.join(entry.file_name()))?;
        }
        fs::set_permissions(to, meta.permissions())?;
    } else {
        fs::copy(from, to)?;
    }
    Ok(())
}

/// Move `from` to `to`, copying across filesystems when a rename cannot.
pub fn move_path(from: &Path, to: &Path) -> Result<(), StoreError> {
    if fs::symlink_metadata(from).is_err() {
        return Err(StoreError::invalid_input(from, "no such file or directory"));
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(
                "{} and {} are on different filesystems, copying",
                from.display(),
                to.display()
            );
            copy_deep(from, to)?;
            delete(from)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}

/// Remove a file, symlink or directory tree.
///
/// Symlinks are unlinked without touching what they point at, including
/// symlinks to directories.
pub fn delete(path: &Path) -> Result<(), StoreError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::invalid_input(path, "no such file or directory"));
        }
        Err(e) => return Err(e.into()),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Delete every child of `dir`, leaving `dir` itself in place.
pub fn clear_dir(dir: &Path) -> Result<(), StoreError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| StoreError::invalid_input(dir, format!("cannot read directory: {e}")))?;
    let mut first_error = None;
    for entry in entries {
        let path = entry?.path();
        if let Err(e) = delete(&path) {
            warn!("failed to remove {}: {e}", path.display());
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_copy_tree() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::create_dir_all(src.join("empty")).unwrap();
        fs::write(src.join("a/b/f.txt"), "hello").unwrap();

        let dst = dir.path().join("dst");
        copy(&src, &dst, true).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a/b/f.txt")).unwrap(), "hello");
        assert!(dst.join("empty").is_dir());
        assert!(!fs::symlink_metadata(&dst).unwrap().file_type().is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn shallow_copy_links_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("config.xml");
        fs::write(&src, "<config/>").unwrap();
        let dst = dir.path().join("linked.xml");
        copy(&src, &dst, false).unwrap();
        assert!(fs::symlink_metadata(&dst).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&dst).unwrap(), src);
    }

    #[cfg(unix)]
    #[test]
    fn deep_copy_keeps_permissions_and_symlinks() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("run.sh"), "#!/bin/sh\n").unwrap();
        fs::set_permissions(src.join("run.sh"), fs::Permissions::from_mode(0o750)).unwrap();
        std::os::unix::fs::symlink("run.sh", src.join("alias")).unwrap();

        let dst = dir.path().join("dst");
        copy(&src, &dst, true).unwrap();
        let mode = fs::metadata(dst.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
        assert_eq!(
            fs::read_link(dst.join("alias")).unwrap(),
            Path::new("run.sh")
        );
    }

    #[test]
    fn copy_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy(&dir.path().join("nope"), &dir.path().join("x"), true).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }

    #[test]
    fn move_renames_tree() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("staged");
        fs::create_dir_all(src.join("cache")).unwrap();
        fs::write(src.join("cache/my.cache"), "my_cache").unwrap();
        let dst = dir.path().join("var");
        move_path(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(
            fs::read_to_string(dst.join("cache/my.cache")).unwrap(),
            "my_cache"
        );
    }

    #[test]
    fn delete_missing_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let err = delete(&missing).unwrap_err();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn delete_file_and_tree() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, "x").unwrap();
        delete(&file).unwrap();
        assert!(!file.exists());

        let tree = dir.path().join("t");
        fs::create_dir_all(tree.join("a/b")).unwrap();
        fs::write(tree.join("a/b/c"), "x").unwrap();
        delete(&tree).unwrap();
        assert!(!tree.exists());
    }

    #[cfg(unix)]
    #[test]
    fn delete_symlink_to_dir_keeps_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        delete(&link).unwrap();
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(target.join("keep").exists());
    }

    #[test]
    fn clear_dir_removes_every_child() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".htaccess"), "x").unwrap();
        fs::write(dir.path().join("index.php"), "x").unwrap();
        fs::create_dir_all(dir.path().join("var/cache")).unwrap();

        clear_dir(dir.path()).unwrap();
        assert!(dir.path().is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
