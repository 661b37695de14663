use crate::common::*;
use std::time::Duration;
use tokio::process::Command;

#[cfg(unix)]
#[tokio::test]
async fn start_interrupt_lifecycle() {
    let port = free_port();
    let project = TestProject::new(&format!(
        r#"
[[service]]
name = "backend"
command = "python3 -m http.server {port}"
port = {port}
"#
    ));

    let mut child = Command::new(env!("CARGO_BIN_EXE_studiod"))
        .args(["start", "-f", project.config_path.to_str().unwrap()])
        .kill_on_drop(true)
        .spawn()
        .expect("failed to start studiod");

    assert!(
        wait_for_port(port, Duration::from_secs(10)).await,
        "backend did not become reachable on port {port}"
    );
    assert!(
        wait_for_file(&project.lock_file(), Duration::from_secs(5)).await,
        "lock file was never created"
    );

    // SIGINT triggers the ctrl_c handler and the graceful teardown
    let pid = child.id().unwrap();
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGINT,
    )
    .ok();

    let status = tokio::time::timeout(Duration::from_secs(15), child.wait())
        .await
        .expect("studiod did not exit in time")
        .expect("failed to wait on studiod");
    assert!(status.success(), "interrupted shutdown should exit 0");

    assert!(
        wait_for_port_release(port, Duration::from_secs(5)).await,
        "port {port} was not released after stop"
    );
    assert!(!project.lock_file().exists(), "lock file left behind");
}

#[cfg(unix)]
#[tokio::test]
async fn mandatory_service_death_ends_supervisor() {
    let project = TestProject::new(
        r#"
[supervisor]
health_interval_secs = 1

[[service]]
name = "backend"
command = "sleep 2"
"#,
    );

    let mut child = Command::new(env!("CARGO_BIN_EXE_studiod"))
        .args(["start", "-f", project.config_path.to_str().unwrap()])
        .kill_on_drop(true)
        .spawn()
        .expect("failed to start studiod");

    // The backend exits after ~2s; the health monitor should notice and the
    // supervisor should shut itself down cleanly.
    let status = tokio::time::timeout(Duration::from_secs(20), child.wait())
        .await
        .expect("studiod did not exit after mandatory service death")
        .expect("failed to wait on studiod");
    assert!(status.success());
    assert!(
        wait_for_file_gone(&project.lock_file(), Duration::from_secs(5)).await,
        "lock file left behind"
    );
}
