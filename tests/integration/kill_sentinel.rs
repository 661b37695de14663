use crate::common::*;
use std::time::Duration;
use tokio::process::Command;

#[cfg(unix)]
#[tokio::test]
async fn sentinel_file_force_stops_everything() {
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
        "backend never came up"
    );

    std::fs::write(project.kill_file(), b"").unwrap();

    // The sentinel is polled every second; the forced path has no grace
    // waits, so exit should be quick and non-zero.
    let status = tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("studiod did not react to the kill sentinel")
        .expect("failed to wait on studiod");
    assert!(!status.success(), "forced shutdown should be a non-zero exit");

    assert!(
        wait_for_file_gone(&project.kill_file(), Duration::from_secs(5)).await,
        "kill sentinel was not consumed"
    );
    assert!(
        wait_for_file_gone(&project.lock_file(), Duration::from_secs(5)).await,
        "lock file left behind"
    );
    assert!(
        wait_for_port_release(port, Duration::from_secs(10)).await,
        "port {port} was not released"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn kill_command_creates_the_sentinel() {
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
        "backend never came up"
    );

    let output = Command::new(env!("CARGO_BIN_EXE_studiod"))
        .args(["kill", "-f", project.config_path.to_str().unwrap()])
        .output()
        .await
        .expect("failed to run studiod kill");
    assert!(output.status.success());

    let status = tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("studiod did not react to studiod kill")
        .expect("failed to wait on studiod");
    assert!(!status.success());
}
