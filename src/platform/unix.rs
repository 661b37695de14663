use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

/// No-op handle on Unix — process group cleanup uses killpg with the child PID.
pub struct ProcessGroupHandle;

/// Return the user's default shell from `$SHELL`, falling back to `sh`.
fn user_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "sh".to_string())
}

/// Human-readable description of the shell for log messages.
pub fn shell_name() -> String {
    let shell = user_shell();
    format!("{} -lc", shell)
}

pub fn shell_command(command: &str) -> Command {
    let shell = user_shell();
    let mut cmd = Command::new(&shell);
    // Login shell (-l) sources the user's profile/rc files so that
    // PATH and other environment customisations are available.
    cmd.arg("-l").arg("-c").arg(command);
    cmd
}

pub fn configure_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

pub fn post_spawn_setup(_child_pid: Option<u32>) -> Option<ProcessGroupHandle> {
    // On Unix, process group is configured before spawn via process_group(0).
    None
}

pub async fn terminate_child(
    child: &mut tokio::process::Child,
    child_pid: Option<u32>,
    grace: Duration,
    _group_handle: Option<&ProcessGroupHandle>,
) {
    if let Some(pid) = child_pid {
        let pgid = Pid::from_raw(pid as i32);
        match killpg(pgid, Signal::SIGTERM) {
            Ok(()) => {
                debug!(pid, "sent SIGTERM to process group");
            }
            Err(nix::errno::Errno::ESRCH) => {
                debug!(pid, "process group already exited");
                return;
            }
            Err(e) => {
                warn!(pid, error = %e, "killpg(SIGTERM) failed, falling back to kill");
                let _ = child.kill().await;
                return;
            }
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(_status)) => {
                debug!(pid, "child exited after SIGTERM");
            }
            _ => {
                warn!(pid, "child did not exit within {:?}, sending SIGKILL", grace);
                let _ = child.kill().await;
                let _ = child.wait().await;
            }
        }
    } else {
        let _ = child.kill().await;
    }
}

pub async fn force_kill_child(
    child: &mut tokio::process::Child,
    child_pid: Option<u32>,
    _group_handle: Option<&ProcessGroupHandle>,
) {
    // Kill the whole group so descendants of a compound command die with
    // the shell; ESRCH just means everything is already gone.
    if let Some(pid) = child_pid {
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
    let _ = child.kill().await;
    let _ = child.wait().await;
}

pub fn is_process_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

pub fn terminate_process(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
}

pub fn kill_process(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), Signal::SIGKILL).is_ok()
}

#[cfg(target_os = "linux")]
pub fn pids_listening_on(port: u16) -> Vec<u32> {
    let mut inodes = Vec::new();
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        let Ok(content) = std::fs::read_to_string(table) else {
            continue;
        };
        let port_hex = format!("{:04X}", port);
        for line in content.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 {
                continue;
            }
            // Listening sockets have state 0A.
            if fields[3] != "0A" {
                continue;
            }
            if let Some(addr_port) = fields[1].split(':').next_back() {
                if addr_port == port_hex && fields[9] != "0" {
                    inodes.push(fields[9].to_string());
                }
            }
        }
    }

    if inodes.is_empty() {
        return Vec::new();
    }

    let mut pids = Vec::new();
    let Ok(proc_dir) = std::fs::read_dir("/proc") else {
        return pids;
    };
    for entry in proc_dir.flatten() {
        let pid_str = entry.file_name().to_string_lossy().to_string();
        let Ok(pid) = pid_str.parse::<u32>() else {
            continue;
        };
        let fd_dir = format!("/proc/{}/fd", pid_str);
        let Ok(fds) = std::fs::read_dir(&fd_dir) else {
            continue;
        };
        for fd_entry in fds.flatten() {
            if let Ok(link) = std::fs::read_link(fd_entry.path()) {
                let link_str = link.to_string_lossy();
                if inodes
                    .iter()
                    .any(|inode| link_str.contains(&format!("socket:[{}]", inode)))
                {
                    pids.push(pid);
                    break;
                }
            }
        }
    }
    pids
}

#[cfg(not(target_os = "linux"))]
pub fn pids_listening_on(_port: u16) -> Vec<u32> {
    Vec::new()
}

#[cfg(target_os = "linux")]
pub fn describe_process(pid: u32) -> Option<String> {
    let cmdline = std::fs::read_to_string(format!("/proc/{}/cmdline", pid)).ok()?;
    let cmd = cmdline.replace('\0', " ").trim().to_string();
    if cmd.is_empty() {
        return Some(format!("PID {}", pid));
    }
    if cmd.len() > 60 {
        return Some(format!("{}... (PID {})", truncate_at_boundary(&cmd, 57), pid));
    }
    Some(format!("{} (PID {})", cmd, pid))
}

/// Longest prefix of at most `max` bytes that ends on a char boundary, so
/// slicing a cmdline containing multibyte characters cannot panic.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(not(target_os = "linux"))]
pub fn describe_process(_pid: u32) -> Option<String> {
    None
}
