use std::time::Duration;
use tokio::process::Command;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
use unix as imp;
#[cfg(windows)]
use windows as imp;

pub use imp::ProcessGroupHandle;

/// Create a platform-appropriate shell command.
/// Unix: `$SHELL -l -c <command>`, Windows: `cmd.exe /C <command>`
pub fn shell_command(command: &str) -> Command {
    imp::shell_command(command)
}

/// Configure the command to run in a new process group.
/// Unix: `process_group(0)`, Windows: `CREATE_NEW_PROCESS_GROUP`
pub fn configure_process_group(cmd: &mut Command) {
    imp::configure_process_group(cmd)
}

/// Perform any post-spawn setup (e.g., Job Object on Windows).
/// Returns a handle that must be kept alive for the process lifetime.
pub fn post_spawn_setup(child_pid: Option<u32>) -> Option<ProcessGroupHandle> {
    imp::post_spawn_setup(child_pid)
}

/// Gracefully terminate a child process and its descendants.
/// Sends the graceful signal first, then forcefully kills after `grace`.
pub async fn terminate_child(
    child: &mut tokio::process::Child,
    child_pid: Option<u32>,
    grace: Duration,
    group_handle: Option<&ProcessGroupHandle>,
) {
    imp::terminate_child(child, child_pid, grace, group_handle).await
}

/// Immediately kill a child process and its descendants, no grace.
/// Unix: SIGKILL to the process group, Windows: TerminateJobObject.
pub async fn force_kill_child(
    child: &mut tokio::process::Child,
    child_pid: Option<u32>,
    group_handle: Option<&ProcessGroupHandle>,
) {
    imp::force_kill_child(child, child_pid, group_handle).await
}

/// Check if a process with the given PID is still alive.
pub fn is_process_alive(pid: u32) -> bool {
    imp::is_process_alive(pid)
}

/// Send a graceful termination request to an arbitrary host process.
/// Returns false when the process is already gone.
pub fn terminate_process(pid: u32) -> bool {
    imp::terminate_process(pid)
}

/// Forcefully kill an arbitrary host process.
pub fn kill_process(pid: u32) -> bool {
    imp::kill_process(pid)
}

/// PIDs of processes holding a listening TCP socket on `port`.
pub fn pids_listening_on(port: u16) -> Vec<u32> {
    imp::pids_listening_on(port)
}

/// Human-readable description (command line) of a host process, for logs.
pub fn describe_process(pid: u32) -> Option<String> {
    imp::describe_process(pid)
}

/// Shell name for log messages.
pub fn shell_name() -> String {
    imp::shell_name()
}

#[cfg(test)]
pub mod test_commands {
    #[cfg(unix)]
    pub fn sleep_long() -> &'static str {
        "sleep 60"
    }
    #[cfg(windows)]
    pub fn sleep_long() -> &'static str {
        // `timeout` exits immediately when stdout is piped (non-interactive).
        // `ping` with 61 attempts (~1s each) reliably blocks for ~60s.
        "ping -n 61 127.0.0.1 > nul"
    }

    #[cfg(unix)]
    pub fn sleep_brief() -> &'static str {
        "sleep 1"
    }
    #[cfg(windows)]
    pub fn sleep_brief() -> &'static str {
        "ping -n 2 127.0.0.1 > nul"
    }

    #[cfg(unix)]
    pub fn exit_success() -> &'static str {
        "exit 0"
    }
    #[cfg(windows)]
    pub fn exit_success() -> &'static str {
        "exit /b 0"
    }

    #[cfg(unix)]
    pub fn exit_failure() -> &'static str {
        "exit 1"
    }
    #[cfg(windows)]
    pub fn exit_failure() -> &'static str {
        "exit /b 1"
    }
}
