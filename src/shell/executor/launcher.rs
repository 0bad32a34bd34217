use std::ffi::CString;
use std::io::{self, Write};

use log::{debug, error};
use nix::unistd::{chdir, execve, fork, ForkResult, Pid};

use super::builtins::Builtin;
use super::redirect::StageStreams;
use crate::shell::error::ShellResult;
use crate::shell::parser::ast::CommandNode;
use crate::shell::session::Session;
use crate::shell::signals;

/// 子进程里要执行的内容。
pub enum Runnable {
    Builtin(Builtin),
    External { path: CString, argv: Vec<CString> },
}

/// fork 出一个子进程运行一个阶段，`streams` 在子进程里装到 0/1/2 上。
///
/// 父进程一侧 `streams` 随函数返回而关闭，这样管道的写端只留在子进程里。
pub fn spawn(
    node: &CommandNode,
    runnable: &Runnable,
    streams: StageStreams,
    session: &Session,
) -> ShellResult<Pid> {
    // 避免缓冲区里的内容在子进程里再被输出一次
    io::stdout().flush().ok();
    io::stderr().flush().ok();
    let envp = session.envp();

    // SAFETY: 解释器是单线程的，子进程只做描述符操作后 exec 或运行内建命令并退出
    match unsafe { fork() }? {
        ForkResult::Parent { child } => {
            debug!("启动子进程 {} -> {:?}", child, node.arguments);
            drop(streams);
            Ok(child)
        }
        ForkResult::Child => run_child(node, runnable, streams, session, &envp),
    }
}

fn run_child(
    node: &CommandNode,
    runnable: &Runnable,
    streams: StageStreams,
    session: &Session,
    envp: &[CString],
) -> ! {
    signals::restore_default_signals();

    if let Err(e) = streams.install() {
        eprintln!("{}", e);
        exit_child(1);
    }
    if let Err(e) = chdir(session.cwd()) {
        error!("子进程切换目录失败 {}: {}", session.cwd().display(), e);
    }

    match runnable {
        Runnable::Builtin(builtin) => {
            // 子进程里的内建命令只影响这份会话副本
            let mut session = session.clone();
            let status = builtin.run(
                &node.arguments,
                &mut session,
                &mut io::stdout(),
                &mut io::stderr(),
            );
            match status {
                Ok(status) => exit_child(status.code()),
                Err(e) => {
                    debug!("内建命令输出失败: {}", e);
                    exit_child(1)
                }
            }
        }
        Runnable::External { path, argv } => {
            if let Err(e) = execve(path, argv, envp) {
                eprintln!("ush: {}: exec failed: {}", node.name(), e.desc());
            }
            exit_child(127)
        }
    }
}

fn exit_child(code: i32) -> ! {
    io::stdout().flush().ok();
    io::stderr().flush().ok();
    // SAFETY: 只结束当前子进程，不运行父进程注册的退出处理
    unsafe { libc::_exit(code) }
}
