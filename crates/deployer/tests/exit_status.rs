use std::process::{Command, Output};

/// Runs the `deploy` binary without picking up configuration from the
/// environment of the test process.
fn deploy(args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_deploy"));
    for var in [
        "LOG_FILTER",
        "LOG_STDERR_THRESHOLD",
        "NODE_URL",
        "PRIVATE_KEY",
        "ARTIFACTS_DIR",
        "CONTRACT",
        "CONSTRUCTOR_ARGS",
        "QUERY_FUNCTION",
        "CONFIRMATIONS",
        "CONFIRMATION_TIMEOUT",
    ] {
        command.env_remove(var);
    }
    command.args(args).output().unwrap()
}

#[test]
fn invalid_private_key_exits_with_failure() {
    let output = deploy(&["--private-key", "0x1234"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid private key"));
}
