use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn help_lists_the_documented_flags() {
    let mut cmd = Command::cargo_bin("airyra-server").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(contains("--listen-addr"))
        .stdout(contains("--projects-dir"))
        .stdout(contains("--log-format"));
}

#[test]
fn rejects_an_unknown_log_format() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("airyra-server").unwrap();
    cmd.arg("--projects-dir")
        .arg(temp_dir.path())
        .arg("--log-format")
        .arg("verbose")
        .arg("--port")
        .arg("0");
    cmd.assert().failure();
}
