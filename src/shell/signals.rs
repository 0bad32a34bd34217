use log::{debug, warn};
use nix::sys::signal::{signal, SigHandler, Signal};

/// 解释器自身忽略这些信号；子进程在 exec 前恢复默认处理。
const SHELL_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGTERM];

fn set_all(handler: SigHandler) {
    for sig in SHELL_SIGNALS {
        // SAFETY: 只设置 SIG_IGN / SIG_DFL，不安装任何自定义处理函数
        if let Err(e) = unsafe { signal(sig, handler) } {
            warn!("设置信号 {:?} 处理方式失败: {}", sig, e);
        }
    }
}

pub fn ignore_shell_signals() {
    debug!("忽略 SIGINT/SIGQUIT/SIGTERM");
    set_all(SigHandler::SigIgn);
}

/// 在 fork 出的子进程里调用：被忽略的信号处理方式会跨 exec 继承，必须恢复默认。
///
/// Rust 运行时在进程启动时忽略了 SIGPIPE，解释器保持这一设置，
/// 子进程则恢复默认，让管道下游退出后上游随之结束。
pub fn restore_default_signals() {
    set_all(SigHandler::SigDfl);
    // SAFETY: 只恢复默认处理方式
    if let Err(e) = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) } {
        warn!("恢复 SIGPIPE 失败: {}", e);
    }
}
