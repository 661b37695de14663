use crate::common::*;
use std::time::Duration;
use tokio::process::Command;

#[cfg(unix)]
#[tokio::test]
async fn second_instance_is_refused_without_side_effects() {
    let port = free_port();
    let project = TestProject::new(&format!(
        r#"
[[service]]
name = "backend"
command = "python3 -m http.server {port}"
port = {port}
"#
    ));

    let mut first = Command::new(env!("CARGO_BIN_EXE_studiod"))
        .args(["start", "-f", project.config_path.to_str().unwrap()])
        .kill_on_drop(true)
        .spawn()
        .expect("failed to start first instance");
    assert!(
        wait_for_port(port, Duration::from_secs(10)).await,
        "first instance never came up"
    );
    let lock_before = std::fs::read_to_string(project.lock_file()).unwrap();

    // Same config, so same lock file. The second start must refuse and the
    // refusal is not an error exit.
    let output = Command::new(env!("CARGO_BIN_EXE_studiod"))
        .args(["start", "-f", project.config_path.to_str().unwrap()])
        .output()
        .await
        .expect("failed to run second instance");
    assert!(output.status.success(), "already-running should exit 0");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("already running"),
        "unexpected stderr: {stderr}"
    );

    // The first instance and its lock are untouched.
    assert_eq!(
        std::fs::read_to_string(project.lock_file()).unwrap(),
        lock_before
    );
    assert!(
        std::net::TcpStream::connect(("127.0.0.1", port)).is_ok(),
        "first instance's backend was disturbed"
    );

    let pid = first.id().unwrap();
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGINT,
    )
    .ok();
    tokio::time::timeout(Duration::from_secs(15), first.wait())
        .await
        .expect("first instance did not exit")
        .expect("failed to wait on first instance");
    assert!(
        wait_for_file_gone(&project.lock_file(), Duration::from_secs(5)).await,
        "lock file left behind"
    );
}
