use std::ffi::CString;
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStrExt;

use log::{debug, error, warn};
use nix::unistd::Pid;

use super::builtins::{Builtin, BuiltinStatus};
use super::launcher::{self, Runnable};
use super::redirect::{self, ScopedRedirect, StageStreams};
use super::resolver;
use super::wait::{self, ExitStatus};
use crate::shell::error::ShellResult;
use crate::shell::parser::ast::{CommandNode, Pipeline};
use crate::shell::session::Session;

/// 阶段在管道中的位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    /// 唯一的阶段
    Sole,
    First,
    Middle,
    Last,
}

impl StageRole {
    pub fn of(index: usize, len: usize) -> Self {
        match (index, len) {
            (_, 1) => StageRole::Sole,
            (0, _) => StageRole::First,
            (i, n) if i + 1 == n => StageRole::Last,
            _ => StageRole::Middle,
        }
    }

    /// 内建命令只有处在管道末端时才在解释器进程内执行，
    /// 其余位置要 fork，才能把输出接进管道。
    pub fn runs_builtin_in_process(self) -> bool {
        matches!(self, StageRole::Sole | StageRole::Last)
    }
}

/// 一次管道执行的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStatus {
    /// 最后一个阶段的状态码
    pub code: i32,
    /// 被 fork 出来并回收的子进程个数
    pub spawned: usize,
}

struct Stage<'p> {
    node: &'p CommandNode,
    runnable: Runnable,
}

/// 在创建任何进程之前解析所有阶段；任何一个外部命令无法解析都放弃整条管道。
fn prepare<'p>(pipeline: &'p Pipeline, session: &Session) -> ShellResult<Vec<Stage<'p>>> {
    pipeline
        .stages()
        .iter()
        .map(|node| -> ShellResult<Stage<'p>> {
            let runnable = match Builtin::from_name(node.name()) {
                Some(builtin) => Runnable::Builtin(builtin),
                None => {
                    let path = resolver::resolve(node.name(), session)?;
                    Runnable::External {
                        path: CString::new(path.as_os_str().as_bytes())?,
                        argv: node.argv()?,
                    }
                }
            };
            Ok(Stage { node, runnable })
        })
        .collect()
}

/// 执行一条管道：先启动所有阶段，途中关闭不再需要的描述符，最后统一等待所有子进程。
pub fn execute(pipeline: &Pipeline, session: &mut Session) -> ShellResult<PipelineStatus> {
    let stages = prepare(pipeline, session)?;
    let len = stages.len();

    let mut pids: Vec<Pid> = Vec::with_capacity(len);
    let mut upstream: Option<OwnedFd> = None;
    let mut last_code = 0;
    let mut last_pid = None;

    for (index, stage) in stages.iter().enumerate() {
        let role = StageRole::of(index, len);
        debug!("阶段 {} ({:?}): {:?}", index, role, stage.node.arguments);

        let (streams, downstream) =
            match redirect::resolve(stage.node, session.cwd(), upstream.take()) {
                Ok(resolved) => resolved,
                Err(e) => {
                    // 只放弃这一阶段；下游拿到一个已关闭写端的管道，读到 EOF
                    eprintln!("{}", e);
                    warn!("阶段 {} 重定向失败: {}", index, e);
                    upstream = if stage.node.output.is_pipe() {
                        redirect::cloexec_pipe().ok().map(|(read, _)| read)
                    } else {
                        None
                    };
                    last_code = 1;
                    last_pid = None;
                    continue;
                }
            };

        match &stage.runnable {
            Runnable::Builtin(builtin) if role.runs_builtin_in_process() => {
                last_code = run_builtin_in_process(*builtin, stage.node, streams, session);
                last_pid = None;
            }
            runnable => match launcher::spawn(stage.node, runnable, streams, session) {
                Ok(pid) => {
                    pids.push(pid);
                    last_pid = Some(pid);
                }
                Err(e) => {
                    // fork 失败：不再启动后面的阶段，但已经启动的仍要回收
                    eprintln!("{}", e);
                    error!("启动阶段 {} 失败: {}", index, e);
                    last_code = 1;
                    last_pid = None;
                    break;
                }
            },
        }

        upstream = downstream;
    }
    drop(upstream);

    let reaped = wait::wait_all(&pids);
    if let Some(pid) = last_pid {
        last_code = reaped
            .iter()
            .find(|(p, _)| *p == pid)
            .map(|(_, status)| status.code())
            .unwrap_or(ExitStatus::Exited(1).code());
    }

    Ok(PipelineStatus {
        code: last_code,
        spawned: reaped.len(),
    })
}

/// 在解释器进程内运行内建命令，重定向在返回前恢复。
fn run_builtin_in_process(
    builtin: Builtin,
    node: &CommandNode,
    streams: StageStreams,
    session: &mut Session,
) -> i32 {
    let status = {
        let _guard = match ScopedRedirect::apply(streams) {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("{}", e);
                return 1;
            }
        };
        builtin.run(
            &node.arguments,
            session,
            &mut io::stdout(),
            &mut io::stderr(),
        )
    };

    match status {
        Ok(BuiltinStatus::Logout) => {
            debug!("logout，退出解释器");
            std::process::exit(0);
        }
        Ok(status) => status.code(),
        Err(e) => {
            warn!("内建命令 {} 输出失败: {}", node.name(), e);
            1
        }
    }
}
