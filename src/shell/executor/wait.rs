use std::fmt;

use log::{debug, error};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus as WS};
use nix::unistd::Pid;

/// 一个子进程的结束状态：正常退出的退出码，或被信号终止（对外表现为 128+信号）。
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match *self {
            ExitStatus::Exited(code) => code,
            ExitStatus::Signaled(sig) => 128 + sig,
        }
    }
}

impl fmt::Debug for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "Exited({})", code),
            ExitStatus::Signaled(sig) => write!(f, "Signaled({})", sig),
        }
    }
}

/// 等待 `pids` 中的每个子进程结束（顺序不限），返回各自的状态，顺序与 `pids` 一致。
///
/// 调用前管道里所有阶段都必须已经启动，否则上游写满管道缓冲区后会永远阻塞。
pub fn wait_all(pids: &[Pid]) -> Vec<(Pid, ExitStatus)> {
    let mut reaped: Vec<Option<ExitStatus>> = vec![None; pids.len()];
    let mut count_waited = 0;

    while count_waited < pids.len() {
        let ws = match waitpid(Pid::from_raw(-1), None) {
            Ok(ws) => ws,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => break,
            Err(e) => {
                error!("waitpid 出现意外错误: {}", e);
                break;
            }
        };

        let (pid, status) = match ws {
            WS::Exited(pid, code) => (pid, ExitStatus::Exited(code)),
            WS::Signaled(pid, sig, _core_dumped) => (pid, ExitStatus::Signaled(sig as i32)),
            other => {
                debug!("忽略等待状态: {:?}", other);
                continue;
            }
        };

        match pids.iter().position(|p| *p == pid) {
            Some(idx) if reaped[idx].is_none() => {
                debug!("回收子进程 {} {:?}", pid, status);
                reaped[idx] = Some(status);
                count_waited += 1;
            }
            _ => debug!("回收了不属于当前管道的子进程 {}", pid),
        }
    }

    pids.iter()
        .zip(reaped)
        .filter_map(|(pid, status)| status.map(|s| (*pid, s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_code() {
        assert_eq!(ExitStatus::Exited(0).code(), 0);
        assert_eq!(ExitStatus::Exited(3).code(), 3);
        assert_eq!(ExitStatus::Signaled(libc::SIGPIPE).code(), 128 + libc::SIGPIPE);
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", ExitStatus::Exited(2)), "Exited(2)");
        assert_eq!(format!("{:?}", ExitStatus::Signaled(9)), "Signaled(9)");
    }

    #[test]
    fn test_wait_nothing() {
        assert!(wait_all(&[]).is_empty());
    }
}
