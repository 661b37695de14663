use crate::common::*;
use std::time::Duration;
use tokio::process::Command;

#[cfg(unix)]
#[tokio::test]
async fn mandatory_readiness_timeout_is_fatal() {
    // The command never listens on its port, so readiness must time out.
    let port = free_port();
    let project = TestProject::new(&format!(
        r#"
[[service]]
name = "backend"
command = "sleep 60"
port = {port}
startup_timeout_secs = 2
"#
    ));

    let output = Command::new(env!("CARGO_BIN_EXE_studiod"))
        .args(["start", "-f", project.config_path.to_str().unwrap()])
        .output()
        .await
        .expect("failed to run studiod");
    assert!(!output.status.success(), "startup failure should exit non-zero");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("did not become ready"),
        "unexpected stderr: {stderr}"
    );
    assert!(!project.lock_file().exists(), "lock file left behind");
}

#[cfg(unix)]
#[tokio::test]
async fn optional_readiness_timeout_degrades() {
    let engine_port = free_port();
    let backend_port = free_port();
    let project = TestProject::new(&format!(
        r#"
[[service]]
name = "engine"
command = "sleep 60"
port = {engine_port}
optional = true
startup_timeout_secs = 2

[[service]]
name = "backend"
command = "python3 -m http.server {backend_port}"
port = {backend_port}
"#
    ));

    let mut child = Command::new(env!("CARGO_BIN_EXE_studiod"))
        .args(["start", "-f", project.config_path.to_str().unwrap()])
        .kill_on_drop(true)
        .spawn()
        .expect("failed to start studiod");

    // The optional engine never becomes ready, but the mandatory backend
    // still has to come up and the supervisor has to keep running.
    assert!(
        wait_for_port(backend_port, Duration::from_secs(15)).await,
        "backend never came up despite degraded engine"
    );

    let pid = child.id().unwrap();
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGINT,
    )
    .ok();
    let status = tokio::time::timeout(Duration::from_secs(15), child.wait())
        .await
        .expect("studiod did not exit")
        .expect("failed to wait on studiod");
    assert!(status.success());
    assert!(
        wait_for_port_release(backend_port, Duration::from_secs(5)).await,
        "backend port was not released"
    );
}
