// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! POSIX process helpers.
//!
//! Signals are always aimed at the process group first so grandchildren
//! spawned by the agent tool die with it; the bare pid is the fallback
//! for processes that did not get their own group.

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

/// Probe liveness with signal 0. EPERM means the process exists but is
/// owned by someone else, which still counts as alive.
pub fn pid_alive(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Deliver `signal` to the process group of `pid`, falling back to the
/// process itself.
pub fn signal_group_or_pid(pid: i32, signal: Signal) -> Result<(), Errno> {
    match killpg(Pid::from_raw(pid), signal) {
        Ok(()) => Ok(()),
        Err(_) => kill(Pid::from_raw(pid), signal),
    }
}

/// Best-effort SIGKILL of a possibly-stale pid. Errors are swallowed:
/// "already gone" is the expected case.
pub fn kill_if_alive(pid: i32) {
    let _ = signal_group_or_pid(pid, Signal::SIGKILL);
}
