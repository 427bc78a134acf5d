use std::process::Command;

#[test]
fn cli_smoke_help() {
    let exe = env!("CARGO_BIN_EXE_taskmgr");
    let output = Command::new(exe)
        .arg("--help")
        .output()
        .expect("failed to run taskmgr --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("setup"));
    assert!(stdout.contains("menu"));
    assert!(stdout.contains("--config-override"));
}

#[test]
fn cli_smoke_setup_help() {
    let exe = env!("CARGO_BIN_EXE_taskmgr");
    let output = Command::new(exe)
        .args(["setup", "--help"])
        .output()
        .expect("failed to run taskmgr setup --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("indexes"));
}

#[test]
fn cli_rejects_unknown_subcommand() {
    let exe = env!("CARGO_BIN_EXE_taskmgr");
    let output = Command::new(exe)
        .arg("frobnicate")
        .output()
        .expect("failed to run taskmgr frobnicate");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: validation"));
}
