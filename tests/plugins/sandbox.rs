#![cfg(unix)]

use parley::core::error::CapabilityError;
use parley::plugins::sandbox::{ProcessSandbox, SandboxExec, SandboxTarget, render_captured};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn sandbox_at(workdir: &Path, launcher: Vec<String>) -> ProcessSandbox {
    let mut targets = BTreeMap::new();
    targets.insert(
        "local".to_string(),
        SandboxTarget {
            workdir: workdir.to_path_buf(),
            launcher,
        },
    );
    ProcessSandbox::new(targets)
}

#[test]
fn test_captures_stdout_in_workdir() {
    let tmp = tempdir().unwrap();
    std::fs::write(tmp.path().join("marker.txt"), "here").unwrap();
    let sandbox = sandbox_at(tmp.path(), Vec::new());
    let out = sandbox.run("local", "cat marker.txt && echo ' ok'").unwrap();
    assert_eq!(out.exit_code, Some(0));
    assert_eq!(out.stdout, "here ok\n");
    assert!(out.stderr.is_empty());
    assert!(!out.truncated);
}

#[test]
fn test_nonzero_exit_is_reported_not_raised() {
    let tmp = tempdir().unwrap();
    let sandbox = sandbox_at(tmp.path(), Vec::new());
    let out = sandbox.run("local", "echo oops >&2; exit 3").unwrap();
    assert_eq!(out.exit_code, Some(3));
    assert_eq!(out.stderr, "oops\n");
    let text = render_captured(&out);
    assert!(text.starts_with("exit status: 3\n"), "{text}");
    assert!(text.contains("oops"));
}

#[test]
fn test_timeout_kills_child() {
    let tmp = tempdir().unwrap();
    let sandbox = sandbox_at(tmp.path(), Vec::new()).with_timeout(Duration::from_millis(200));
    let start = Instant::now();
    let err = sandbox.run("local", "sleep 5").unwrap_err();
    assert!(matches!(err, CapabilityError::TimedOut(200)), "{err}");
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[test]
fn test_output_is_capped() {
    let tmp = tempdir().unwrap();
    let sandbox = sandbox_at(tmp.path(), Vec::new()).with_output_limit(100);
    let out = sandbox
        .run("local", "i=0; while [ $i -lt 500 ]; do echo line-$i; i=$((i+1)); done")
        .unwrap();
    assert_eq!(out.stdout.len(), 100);
    assert!(out.truncated);
    assert_eq!(out.exit_code, Some(0));
}

#[test]
fn test_launcher_prefixes_shell() {
    let tmp = tempdir().unwrap();
    let sandbox = sandbox_at(
        tmp.path(),
        vec!["env".to_string(), "PARLEY_SANDBOX_PROBE=inside".to_string()],
    );
    let out = sandbox.run("local", "echo $PARLEY_SANDBOX_PROBE").unwrap();
    assert_eq!(out.stdout, "inside\n");
}

#[test]
fn test_target_errors() {
    let tmp = tempdir().unwrap();
    let sandbox = sandbox_at(&tmp.path().join("gone"), Vec::new());
    assert!(matches!(
        sandbox.run("local", "true"),
        Err(CapabilityError::Unavailable(_))
    ));
    assert!(matches!(
        sandbox.run("remote", "true"),
        Err(CapabilityError::UnknownTarget(_))
    ));
    assert_eq!(sandbox.target_names().collect::<Vec<_>>(), vec!["local"]);
}
