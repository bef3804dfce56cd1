use super::*;
use anyhow::Result;
use std::io::{Read, Write};
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn read_all(file: &AtomicFile) -> Result<String> {
    let mut s = String::new();
    file.open_read()?.read_to_string(&mut s)?;
    Ok(s)
}

fn commit_bytes(file: &AtomicFile, data: &[u8]) -> Result<()> {
    let mut w = file.open_write()?;
    w.write_all(data)?;
    w.commit()?;
    Ok(())
}

// -------------------- Naming --------------------

#[test]
fn sibling_names_strip_extension() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), false)?;
    assert_eq!(file.tmp_path(), dir.path().join("config.tmp"));
    assert_eq!(file.backup_path(), dir.path().join("config.old"));

    let file = AtomicFile::new(dir.path().join("deleted"), false)?;
    assert_eq!(file.tmp_path(), dir.path().join("deleted.tmp"));
    assert_eq!(file.backup_path(), dir.path().join("deleted.old"));
    Ok(())
}

#[test]
fn dotfile_keeps_full_name() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join(".settings"), false)?;
    assert_eq!(file.tmp_path(), dir.path().join(".settings.tmp"));
    Ok(())
}

// -------------------- Read / write --------------------

#[test]
fn missing_file_reports_not_found() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), false)?;

    assert!(!file.exists());
    assert!(matches!(
        file.open_read(),
        Err(AtomicFileError::NotFound(ref p)) if p == file.path()
    ));
    Ok(())
}

#[test]
fn first_commit_creates_main_without_backup() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), true)?;

    commit_bytes(&file, b"v1")?;

    assert!(file.exists());
    assert!(!file.tmp_path().exists());
    assert!(!file.backup_path().exists());
    assert_eq!(read_all(&file)?, "v1");
    Ok(())
}

#[test]
fn second_commit_keeps_previous_version_as_backup() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), true)?;

    commit_bytes(&file, b"v1")?;
    commit_bytes(&file, b"v2")?;
    commit_bytes(&file, b"v3")?;

    assert_eq!(read_all(&file)?, "v3");
    assert_eq!(fs::read_to_string(file.backup_path())?, "v2");
    assert!(!file.tmp_path().exists());
    Ok(())
}

#[test]
fn staged_content_is_invisible_until_commit() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), false)?;
    commit_bytes(&file, b"old")?;

    let mut w = file.open_write()?;
    w.write_all(b"new")?;
    w.flush()?;
    assert_eq!(read_all(&file)?, "old");

    w.commit()?;
    assert_eq!(read_all(&file)?, "new");
    Ok(())
}

#[test]
fn dropped_writer_leaves_main_untouched() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), false)?;
    commit_bytes(&file, b"committed")?;

    {
        let mut w = file.open_write()?;
        w.write_all(b"half-writ")?;
        // dropped without commit
    }

    assert_eq!(read_all(&file)?, "committed");
    assert!(!file.tmp_path().exists(), "staging file should be removed");
    assert!(!file.backup_path().exists());
    Ok(())
}

#[test]
fn replace_with_error_discards_staging() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), false)?;
    commit_bytes(&file, b"keep")?;

    let res = file.replace_with(|w| -> Result<(), AtomicFileError> {
        w.write_all(b"partial")?;
        Err(io::Error::new(io::ErrorKind::Other, "serializer blew up").into())
    });

    assert!(res.is_err());
    assert_eq!(read_all(&file)?, "keep");
    assert!(!file.tmp_path().exists());
    Ok(())
}

#[test]
fn replace_with_success_commits() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), false)?;

    file.replace_with(|w| -> Result<(), AtomicFileError> {
        w.write_all(b"line 1\n")?;
        w.write_all(b"line 2\n")?;
        Ok(())
    })?;

    assert_eq!(read_all(&file)?, "line 1\nline 2\n");
    Ok(())
}

#[test]
fn stale_staging_file_is_truncated() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), false)?;
    fs::write(file.tmp_path(), b"garbage from a crashed writer, quite long")?;

    commit_bytes(&file, b"short")?;
    assert_eq!(read_all(&file)?, "short");
    Ok(())
}

#[cfg(unix)]
#[test]
fn open_reader_sees_old_content_across_commit() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), false)?;
    commit_bytes(&file, b"before")?;

    let mut reader = file.open_read()?;
    commit_bytes(&file, b"after")?;

    let mut s = String::new();
    reader.read_to_string(&mut s)?;
    assert_eq!(s, "before");
    assert_eq!(read_all(&file)?, "after");
    Ok(())
}

// -------------------- Recovery --------------------

#[test]
fn recovery_restores_backup_when_main_missing() -> Result<()> {
    let dir = tempdir()?;
    let main = dir.path().join("config.json");
    // Simulate a crash between main -> backup and staging -> main.
    fs::write(dir.path().join("config.old"), b"last good")?;
    fs::write(dir.path().join("config.tmp"), b"never committed")?;

    let file = AtomicFile::new(&main, false)?;

    assert!(file.exists());
    assert!(!file.backup_path().exists());
    assert_eq!(read_all(&file)?, "last good");
    Ok(())
}

#[test]
fn recovery_ignores_backup_when_main_present() -> Result<()> {
    let dir = tempdir()?;
    let main = dir.path().join("config.json");
    fs::write(&main, b"current")?;
    fs::write(dir.path().join("config.old"), b"previous")?;

    let file = AtomicFile::new(&main, false)?;

    assert_eq!(read_all(&file)?, "current");
    assert_eq!(fs::read_to_string(file.backup_path())?, "previous");
    Ok(())
}

#[test]
fn recovery_with_nothing_on_disk_is_noop() -> Result<()> {
    let dir = tempdir()?;
    let file = AtomicFile::new(dir.path().join("config.json"), false)?;
    assert!(!file.exists());
    assert!(!file.backup_path().exists());
    Ok(())
}

#[test]
fn set_sync_toggles_flag() -> Result<()> {
    let dir = tempdir()?;
    let mut file = AtomicFile::new(dir.path().join("config.json"), true)?;
    assert!(file.sync());
    file.set_sync(false);
    assert!(!file.sync());
    commit_bytes(&file, b"unsynced")?;
    assert_eq!(read_all(&file)?, "unsynced");
    Ok(())
}
