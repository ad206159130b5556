//! CLI arg tests for cgtop_agent (server)
use std::process::Command;

#[test]
fn test_help_lists_flags() {
    let output = Command::new(env!("CARGO_BIN_EXE_cgtop_agent"))
        .arg("--help")
        .output()
        .expect("run agent --help");
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    for flag in ["--port", "-p", "--root", "--tick-ms", "--scan-mode", "--enableSSL"] {
        assert!(text.contains(flag), "help missing {flag}\n{text}");
    }
}

#[test]
fn test_bad_flag_is_rejected() {
    let output = Command::new(env!("CARGO_BIN_EXE_cgtop_agent"))
        .args(["--tick-ms", "zero"])
        .output()
        .expect("run agent");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--tick-ms"));
}

#[test]
fn test_port_short_long() {
    // We verify port flags are accepted by ensuring the process starts (then we kill quickly).
    let exe = env!("CARGO_BIN_EXE_cgtop_agent");
    let td = tempfile::tempdir().expect("tempdir");
    let root = td.path().to_str().expect("utf8 path");

    let mut child = Command::new(exe)
        .args(["--root", root, "--port", "0"])
        .spawn()
        .expect("spawn agent");
    std::thread::sleep(std::time::Duration::from_millis(150));
    // Still running means the arguments were accepted and the listener bound.
    assert!(child.try_wait().expect("poll agent").is_none());
    let _ = child.kill();
    let _ = child.wait();

    let mut child2 = Command::new(exe)
        .args(["-r", root, "-p", "0"])
        .spawn()
        .expect("spawn agent");
    std::thread::sleep(std::time::Duration::from_millis(150));
    assert!(child2.try_wait().expect("poll agent").is_none());
    let _ = child2.kill();
    let _ = child2.wait();
}
