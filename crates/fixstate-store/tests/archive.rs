use fixstate_schema::ErrorKind;
use fixstate_store::{Partition, StateArchive, StoreError, IDENTITY_TAG};
use std::fs;
use std::io::Write;
use std::path::Path;

fn make_tree(root: &Path) {
    fs::create_dir_all(root.join("cache/deep/er")).unwrap();
    fs::create_dir_all(root.join("empty")).unwrap();
    fs::create_dir_all(root.join("log")).unwrap();
    fs::write(root.join("cache/my.cache"), "my_cache").unwrap();
    fs::write(root.join("cache/deep/er/blob.bin"), [0u8, 159, 146, 150, 255]).unwrap();
    fs::write(root.join("log/system.log"), "").unwrap();
}

fn listing(root: &Path) -> Vec<String> {
    let mut out: Vec<String> = walk(root, root);
    out.sort();
    out
}

fn walk(root: &Path, dir: &Path) -> Vec<String> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        let rel = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
        if path.is_dir() {
            out.push(format!("{rel}/"));
            out.extend(walk(root, &path));
        } else {
            out.push(format!("{rel}={:?}", fs::read(&path).unwrap()));
        }
    }
    out
}

#[test]
fn var_tree_roundtrip_through_saved_archive() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    make_tree(&src);
    let path = dir.path().join("one.state");

    StateArchive::open(&path)
        .unwrap()
        .set_var(&src)
        .unwrap()
        .save()
        .unwrap();

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let mut reopened = StateArchive::open(&path).unwrap();
    assert!(!reopened.is_dirty());
    reopened.extract_var(&out).unwrap();

    assert_eq!(listing(&src), listing(&out.join("var")));
    assert!(out.join("var/empty").is_dir());
}

#[test]
fn entry_names_follow_partition_layout() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("media");
    fs::create_dir_all(src.join("upload")).unwrap();
    fs::write(src.join("upload/image.jpg"), "my_image").unwrap();
    let dump = dir.path().join("dump.sql");
    fs::write(&dump, "-- dump").unwrap();

    let mut archive = StateArchive::open(dir.path().join("s.state")).unwrap();
    archive.set_dump(&dump).unwrap().set_media(&src).unwrap();
    assert_eq!(
        archive.entries(),
        vec!["dump", "media/", "media/upload/", "media/upload/image.jpg"]
    );
    archive.save().unwrap();
    assert_eq!(
        archive.entries(),
        vec!["dump", "media/", "media/upload/", "media/upload/image.jpg"]
    );
    assert!(archive.contains(Partition::Dump));
    assert!(archive.contains(Partition::Media));
    assert!(!archive.contains(Partition::Var));
}

#[test]
fn replacing_var_leaves_other_partitions_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s.state");
    let dump = dir.path().join("dump.sql");
    fs::write(&dump, "CREATE TABLE t;").unwrap();
    let var_a = dir.path().join("var_a");
    fs::create_dir_all(&var_a).unwrap();
    fs::write(var_a.join("old.txt"), "old").unwrap();
    let media = dir.path().join("media");
    fs::create_dir_all(&media).unwrap();
    fs::write(media.join("logo.png"), "png").unwrap();

    StateArchive::open(&path)
        .unwrap()
        .set_dump(&dump)
        .unwrap()
        .set_var(&var_a)
        .unwrap()
        .set_media(&media)
        .unwrap()
        .save()
        .unwrap();

    let var_b = dir.path().join("var_b");
    fs::create_dir_all(&var_b).unwrap();
    fs::write(var_b.join("new.txt"), "new").unwrap();
    let mut archive = StateArchive::open(&path).unwrap();
    archive.set_var(&var_b).unwrap().save().unwrap();

    assert_eq!(
        archive.entries(),
        vec!["dump", "media/", "media/logo.png", "var/", "var/new.txt"]
    );

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    archive
        .extract_dump(&out)
        .unwrap()
        .extract_var(&out)
        .unwrap()
        .extract_media(&out)
        .unwrap();
    assert_eq!(fs::read_to_string(out.join("dump")).unwrap(), "CREATE TABLE t;");
    assert_eq!(fs::read_to_string(out.join("media/logo.png")).unwrap(), "png");
    assert_eq!(fs::read_to_string(out.join("var/new.txt")).unwrap(), "new");
    assert!(!out.join("var/old.txt").exists());
}

#[test]
fn saved_archive_carries_identity_tag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.state");
    StateArchive::open(&path).unwrap().save().unwrap();

    let zip = zip::ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(zip.comment(), IDENTITY_TAG.as_bytes());
    assert_eq!(zip.len(), 0);
}

#[test]
fn non_zip_file_is_invalid_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.state");
    fs::write(&path, "definitely not a zip archive").unwrap();
    let err = StateArchive::open(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
}

#[test]
fn zip_with_foreign_comment_is_invalid_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.zip");
    let mut writer = zip::ZipWriter::new(fs::File::create(&path).unwrap());
    writer
        .start_file("dump", zip::write::FileOptions::default())
        .unwrap();
    writer.write_all(b"x").unwrap();
    writer.set_comment("some other tool");
    writer.finish().unwrap();

    let err = StateArchive::open(&path).unwrap_err();
    assert!(matches!(err, StoreError::InvalidFormat { .. }));
    assert!(err.to_string().contains("identity tag"));
}

fn tagged_zip(path: &Path, names: &[&str]) {
    let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
    for name in names {
        writer
            .start_file(*name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(b"payload").unwrap();
    }
    writer.set_comment(IDENTITY_TAG);
    writer.finish().unwrap();
}

#[test]
fn unknown_partition_entry_is_invalid_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s.state");
    tagged_zip(&path, &["dump", "etc/local.xml"]);
    let err = StateArchive::open(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    assert!(err.to_string().contains("etc/local.xml"));
}

#[test]
fn file_and_directory_with_same_path_is_invalid_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s.state");
    let mut writer = zip::ZipWriter::new(fs::File::create(&path).unwrap());
    writer
        .add_directory("var/a/", zip::write::FileOptions::default())
        .unwrap();
    writer
        .start_file("var/a", zip::write::FileOptions::default())
        .unwrap();
    writer.write_all(b"payload").unwrap();
    writer.set_comment(IDENTITY_TAG);
    writer.finish().unwrap();

    let err = StateArchive::open(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    assert!(err.to_string().contains("duplicate entry"), "{err}");
}

#[cfg(unix)]
#[test]
fn unreadable_items_in_tree_name_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("var");
    fs::create_dir_all(src.join("cache")).unwrap();
    let looped = src.join("cache/loop");
    std::os::unix::fs::symlink(&src, &looped).unwrap();

    let mut archive = StateArchive::open(dir.path().join("s.state")).unwrap();
    let err = archive.set_var(&src).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(err.to_string().contains(&*looped.to_string_lossy()), "{err}");

    fs::remove_file(&looped).unwrap();
    let dangling = src.join("cache/dangling");
    std::os::unix::fs::symlink(dir.path().join("gone"), &dangling).unwrap();
    let err = archive.set_media(&src).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(err.to_string().contains(&*dangling.to_string_lossy()), "{err}");
}

#[test]
fn escaping_entry_is_rejected_on_extract() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s.state");
    tagged_zip(&path, &["var/../../evil"]);
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();

    let mut archive = StateArchive::open(&path).unwrap();
    let err = archive.extract_var(&out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    assert!(!dir.path().join("evil").exists());
}

#[test]
fn pending_entries_can_be_extracted_before_save() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    make_tree(&src);
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();

    let mut archive = StateArchive::open(dir.path().join("s.state")).unwrap();
    archive.set_var(&src).unwrap().extract_var(&out).unwrap();
    assert!(archive.is_dirty());
    assert_eq!(listing(&src), listing(&out.join("var")));
    assert!(!dir.path().join("s.state").exists());
}

#[test]
fn set_dump_requires_regular_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut archive = StateArchive::open(dir.path().join("s.state")).unwrap();
    assert!(matches!(
        archive.set_dump(&dir.path().join("missing.sql")),
        Err(StoreError::InvalidInput { .. })
    ));
    assert!(matches!(
        archive.set_dump(dir.path()),
        Err(StoreError::InvalidInput { .. })
    ));
}

#[test]
fn set_var_requires_directory() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("file");
    fs::write(&file, "x").unwrap();
    let mut archive = StateArchive::open(dir.path().join("s.state")).unwrap();
    let err = archive.set_var(&file).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(archive.set_media(&dir.path().join("nope")).is_err());
}

#[test]
fn extract_requires_existing_destination() {
    let dir = tempfile::tempdir().unwrap();
    let mut archive = StateArchive::open(dir.path().join("s.state")).unwrap();
    let err = archive.extract_var(&dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput { .. }));
}

#[test]
fn save_leaves_only_the_archive() {
    let dir = tempfile::tempdir().unwrap();
    let states = dir.path().join("states");
    fs::create_dir(&states).unwrap();
    let src = dir.path().join("src");
    make_tree(&src);

    let mut archive = StateArchive::open(states.join("a.state")).unwrap();
    archive.set_var(&src).unwrap().save().unwrap();
    archive.set_media(&src).unwrap().save().unwrap();

    let names: Vec<_> = fs::read_dir(&states)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["a.state".to_owned()]);
}

#[cfg(unix)]
#[test]
fn permissions_roundtrip() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("locked")).unwrap();
    fs::write(src.join("locked/secret"), "s").unwrap();
    fs::write(src.join("run.sh"), "#!/bin/sh").unwrap();
    fs::set_permissions(src.join("run.sh"), fs::Permissions::from_mode(0o750)).unwrap();
    fs::set_permissions(src.join("locked/secret"), fs::Permissions::from_mode(0o600)).unwrap();
    fs::set_permissions(src.join("locked"), fs::Permissions::from_mode(0o500)).unwrap();

    let path = dir.path().join("p.state");
    StateArchive::open(&path)
        .unwrap()
        .set_var(&src)
        .unwrap()
        .save()
        .unwrap();
    fs::set_permissions(src.join("locked"), fs::Permissions::from_mode(0o700)).unwrap();

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    StateArchive::open(&path).unwrap().extract_var(&out).unwrap();

    let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode(&out.join("var/run.sh")), 0o750);
    assert_eq!(mode(&out.join("var/locked/secret")), 0o600);
    assert_eq!(mode(&out.join("var/locked")), 0o500);
    assert_eq!(fs::read_to_string(out.join("var/locked/secret")).unwrap(), "s");

    fs::set_permissions(out.join("var/locked"), fs::Permissions::from_mode(0o700)).unwrap();
}
