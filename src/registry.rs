use crate::platform;

/// Host process capability used by port reclaim, lock staleness checks, and
/// forced shutdown. Behind a trait so the supervisor logic stays
/// platform-agnostic and can run against a fake in tests.
pub trait ProcessRegistry: Send + Sync {
    /// PIDs holding a listening TCP socket on `port`. Processes may exit
    /// between enumeration and any signal sent to them; callers must
    /// tolerate that race.
    fn pids_listening_on(&self, port: u16) -> Vec<u32>;

    fn is_alive(&self, pid: u32) -> bool;

    /// Graceful termination request. Returns false when the process is
    /// already gone.
    fn terminate(&self, pid: u32) -> bool;

    /// Forceful kill, no grace.
    fn force_kill(&self, pid: u32) -> bool;

    /// Command line of the process, for log messages.
    fn describe(&self, pid: u32) -> Option<String>;
}

/// The real host: signals and /proc (or Win32) via the platform module.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRegistry;

impl ProcessRegistry for SystemRegistry {
    fn pids_listening_on(&self, port: u16) -> Vec<u32> {
        platform::pids_listening_on(port)
    }

    fn is_alive(&self, pid: u32) -> bool {
        platform::is_process_alive(pid)
    }

    fn terminate(&self, pid: u32) -> bool {
        platform::terminate_process(pid)
    }

    fn force_kill(&self, pid: u32) -> bool {
        platform::kill_process(pid)
    }

    fn describe(&self, pid: u32) -> Option<String> {
        platform::describe_process(pid)
    }
}
