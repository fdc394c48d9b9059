use parley::core::command::WriteMode;
use parley::core::error::CapabilityError;
use parley::plugins::fs::{FileSystemAccess, LocalFileSystem};
use std::fs;
use tempfile::tempdir;

fn workspace() -> (tempfile::TempDir, LocalFileSystem) {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("src/core")).unwrap();
    fs::create_dir_all(root.join("config/secrets")).unwrap();
    fs::write(root.join("README.md"), "hello\n").unwrap();
    fs::write(root.join("src/lib.rs"), "pub mod core;\n").unwrap();
    fs::write(root.join("src/core/mod.rs"), "// core\n").unwrap();
    fs::write(root.join(".env"), "TOKEN=abc\n").unwrap();
    fs::write(root.join("config/secrets/key.pem"), "-----\n").unwrap();
    let lfs = LocalFileSystem::new(root).unwrap();
    (tmp, lfs)
}

#[test]
fn test_read_is_root_relative() {
    let (_tmp, lfs) = workspace();
    assert_eq!(lfs.read("README.md").unwrap().text, "hello\n");
    assert_eq!(lfs.read("/src/lib.rs").unwrap().text, "pub mod core;\n");
    assert_eq!(lfs.read("src/core/../lib.rs").unwrap().text, "pub mod core;\n");
}

#[test]
fn test_parent_escape_is_denied() {
    let (_tmp, lfs) = workspace();
    assert!(matches!(lfs.read("../etc/passwd"), Err(CapabilityError::PathDenied(_))));
    assert!(matches!(lfs.list("src/../.."), Err(CapabilityError::PathDenied(_))));
    assert!(matches!(
        lfs.write("../outside.txt", "x", WriteMode::Create),
        Err(CapabilityError::PathDenied(_))
    ));
}

#[cfg(unix)]
#[test]
fn test_symlink_out_of_root_is_denied() {
    let (tmp, lfs) = workspace();
    let outside = tempdir().unwrap();
    fs::write(outside.path().join("secret.txt"), "nope").unwrap();
    std::os::unix::fs::symlink(outside.path().join("secret.txt"), tmp.path().join("link")).unwrap();
    assert!(matches!(lfs.read("link"), Err(CapabilityError::PathDenied(_))));
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_cannot_be_used_to_leave_root() {
    let (tmp, lfs) = workspace();
    let outside = tempdir().unwrap();
    fs::write(outside.path().join("existing.txt"), "keep").unwrap();
    std::os::unix::fs::symlink(outside.path(), tmp.path().join("linkdir")).unwrap();

    assert!(matches!(
        lfs.write("linkdir/new.txt", "x", WriteMode::Create),
        Err(CapabilityError::PathDenied(_))
    ));
    assert!(matches!(
        lfs.write("linkdir/nested/deeper.txt", "x", WriteMode::Append),
        Err(CapabilityError::PathDenied(_))
    ));
    assert!(!outside.path().join("new.txt").exists());
    assert!(!outside.path().join("nested").exists());

    assert!(matches!(lfs.list("linkdir"), Err(CapabilityError::PathDenied(_))));
    assert!(matches!(lfs.read("linkdir/existing.txt"), Err(CapabilityError::PathDenied(_))));
    assert!(matches!(lfs.delete("linkdir/existing.txt"), Err(CapabilityError::PathDenied(_))));
    assert!(outside.path().join("existing.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_dangling_link_is_not_followed_on_write() {
    let (tmp, lfs) = workspace();
    let outside = tempdir().unwrap();
    let target = outside.path().join("planted.txt");
    std::os::unix::fs::symlink(&target, tmp.path().join("trap.txt")).unwrap();

    assert!(matches!(
        lfs.write("trap.txt", "x", WriteMode::Append),
        Err(CapabilityError::PathDenied(_))
    ));
    assert!(!target.exists());
}

#[cfg(unix)]
#[test]
fn test_alias_of_blocked_path_is_refused() {
    let (tmp, lfs) = workspace();
    std::os::unix::fs::symlink(tmp.path().join(".env"), tmp.path().join("settings.txt")).unwrap();
    std::os::unix::fs::symlink(tmp.path().join("config/secrets"), tmp.path().join("keys")).unwrap();

    assert!(matches!(lfs.read("settings.txt"), Err(CapabilityError::PathDenied(_))));
    assert!(matches!(lfs.read("keys/key.pem"), Err(CapabilityError::PathDenied(_))));
    assert!(matches!(lfs.list("keys"), Err(CapabilityError::PathDenied(_))));
    assert!(matches!(
        lfs.write("keys/new.pem", "x", WriteMode::Create),
        Err(CapabilityError::PathDenied(_))
    ));
    assert!(!tmp.path().join("config/secrets/new.pem").exists());

    // in-root links to ordinary files still work
    std::os::unix::fs::symlink(tmp.path().join("README.md"), tmp.path().join("intro.md")).unwrap();
    assert_eq!(lfs.read("intro.md").unwrap().text, "hello\n");
}

#[test]
fn test_blocked_paths_are_invisible_and_refused() {
    let (_tmp, lfs) = workspace();
    assert!(matches!(lfs.read(".env"), Err(CapabilityError::PathDenied(_))));
    assert!(matches!(
        lfs.read("config/secrets/key.pem"),
        Err(CapabilityError::PathDenied(_))
    ));

    let names: Vec<String> = lfs.list("/").unwrap().into_iter().map(|e| e.name).collect();
    assert!(!names.contains(&".env".to_string()));

    let config: Vec<String> = lfs.list("config").unwrap().into_iter().map(|e| e.name).collect();
    assert!(config.is_empty(), "{config:?}");

    let hits = lfs.search("*.pem").unwrap();
    assert!(hits.paths.is_empty());
}

#[test]
fn test_custom_blocked_paths_replace_defaults() {
    let (tmp, _) = workspace();
    let lfs = LocalFileSystem::new(tmp.path())
        .unwrap()
        .with_blocked_paths(&["src/**".to_string()])
        .unwrap();
    assert_eq!(lfs.read(".env").unwrap().text, "TOKEN=abc\n");
    assert!(matches!(lfs.read("src/lib.rs"), Err(CapabilityError::PathDenied(_))));
}

#[test]
fn test_list_is_sorted_and_flags_directories() {
    let (_tmp, lfs) = workspace();
    let entries = lfs.list(".").unwrap();
    let names: Vec<(&str, bool)> = entries.iter().map(|e| (e.name.as_str(), e.is_dir)).collect();
    assert_eq!(names, vec![("README.md", false), ("config", true), ("src", true)]);
    assert!(matches!(lfs.list("missing"), Err(CapabilityError::NotFound(_))));
}

#[test]
fn test_search_by_name_and_by_path() {
    let (_tmp, lfs) = workspace();
    let by_name = lfs.search("*.rs").unwrap();
    assert_eq!(by_name.paths, vec!["src/core/mod.rs", "src/lib.rs"]);
    assert!(!by_name.truncated);

    let by_path = lfs.search("src/*.rs").unwrap();
    assert_eq!(by_path.paths, vec!["src/lib.rs"]);

    let capped = LocalFileSystem::new(lfs.root()).unwrap().with_limits(1024, 1);
    let hits = capped.search("**/*.rs").unwrap();
    assert_eq!(hits.paths.len(), 1);
    assert!(hits.truncated);
}

#[test]
fn test_read_cap_truncates() {
    let (tmp, _) = workspace();
    fs::write(tmp.path().join("big.txt"), "abcdefghij").unwrap();
    let lfs = LocalFileSystem::new(tmp.path()).unwrap().with_limits(4, 10);
    let content = lfs.read("big.txt").unwrap();
    assert_eq!(content.text, "abcd");
    assert_eq!(content.size, 10);
    assert!(content.truncated);
}

#[test]
fn test_write_modes() {
    let (tmp, lfs) = workspace();

    let receipt = lfs.write("notes/today.md", "one\n", WriteMode::Create).unwrap();
    assert_eq!(receipt.path, "notes/today.md");
    assert_eq!(receipt.bytes, 4);
    assert!(matches!(
        lfs.write("notes/today.md", "again", WriteMode::Create),
        Err(CapabilityError::AlreadyExists(_))
    ));

    lfs.write("notes/today.md", "two\n", WriteMode::Append).unwrap();
    assert_eq!(
        fs::read_to_string(tmp.path().join("notes/today.md")).unwrap(),
        "one\ntwo\n"
    );

    lfs.write("notes/today.md", "fresh\n", WriteMode::Replace).unwrap();
    assert_eq!(
        fs::read_to_string(tmp.path().join("notes/today.md")).unwrap(),
        "fresh\n"
    );

    assert!(matches!(
        lfs.write("notes/missing.md", "x", WriteMode::Replace),
        Err(CapabilityError::NotFound(_))
    ));
    assert!(!tmp.path().join("notes/missing.md").exists());

    lfs.write("log.txt", "first\n", WriteMode::Append).unwrap();
    assert_eq!(fs::read_to_string(tmp.path().join("log.txt")).unwrap(), "first\n");

    assert!(matches!(
        lfs.write("src", "x", WriteMode::Replace),
        Err(CapabilityError::InvalidArgument(_))
    ));
}

#[test]
fn test_delete() {
    let (tmp, lfs) = workspace();
    lfs.delete("README.md").unwrap();
    assert!(!tmp.path().join("README.md").exists());
    assert!(matches!(lfs.delete("README.md"), Err(CapabilityError::NotFound(_))));
    assert!(matches!(lfs.delete("src"), Err(CapabilityError::InvalidArgument(_))));
    assert!(matches!(lfs.delete(".env"), Err(CapabilityError::PathDenied(_))));
}
