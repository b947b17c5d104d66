//! Process liveness queries used by registry reclamation.

use sysinfo::{Pid as SysinfoPid, ProcessesToUpdate, System};

/// The calling process id, in the signed form stored in registry records.
pub fn current_pid() -> i32 {
    std::process::id() as i32
}

/// Check if a process with the given PID is currently running.
///
/// Non-positive pids never refer to a live peer and always return false.
pub fn is_process_running(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    let mut system = System::new();
    let pid_obj = SysinfoPid::from_u32(pid as u32);
    system.refresh_processes(ProcessesToUpdate::Some(&[pid_obj]), true);
    system.process(pid_obj).is_some()
}
