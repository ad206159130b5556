//! CLI arg handling for the cgtop client binary.
use assert_cmd::Command;

#[test]
fn help_mentions_short_and_long_flags() {
    let out = Command::cargo_bin("cgtop")
        .unwrap()
        .arg("--help")
        .output()
        .expect("run cgtop --help");
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("Usage:"), "{text}");
    assert!(text.contains("--tls-ca") && text.contains("-t"), "help text missing --tls-ca/-t\n{text}");
}

#[test]
fn help_wins_over_other_flags() {
    for args in [["--tls-ca", "/tmp/cert.pem", "--help"], ["-t", "/tmp/cert.pem", "-h"]] {
        let out = Command::cargo_bin("cgtop").unwrap().args(args).output().unwrap();
        assert!(out.status.success(), "{args:?} did not succeed");
        assert!(String::from_utf8_lossy(&out.stdout).contains("Usage:"));
    }
}

#[test]
fn non_websocket_url_is_rejected() {
    Command::cargo_bin("cgtop")
        .unwrap()
        .arg("http://127.0.0.1:3000/ws")
        .assert()
        .failure()
        .code(2);
}
