use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::path::Path;

use log::{error, trace};
use nix::fcntl::{fcntl, open, FcntlArg, FdFlag, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{dup2, pipe};

use crate::shell::error::{ShellError, ShellResult};
use crate::shell::parser::ast::{CommandNode, InputMode, OutputMode};
use crate::utils::path::absolutize;

const STDIN_FILENO: RawFd = libc::STDIN_FILENO;
const STDOUT_FILENO: RawFd = libc::STDOUT_FILENO;
const STDERR_FILENO: RawFd = libc::STDERR_FILENO;

/// 一个阶段运行前要接到 0/1/2 上的描述符。为空的一项沿用解释器原来的流。
#[derive(Debug, Default)]
pub struct StageStreams {
    pub stdin: Option<OwnedFd>,
    pub stdout: Option<OwnedFd>,
    pub stderr_follows_stdout: bool,
}

impl StageStreams {
    /// 在子进程里把描述符装到标准流上，装完后关闭原描述符。
    /// 子进程的描述符表是一次性的，不需要恢复。
    pub fn install(self) -> ShellResult<()> {
        if let Some(fd) = self.stdin {
            install_fd(fd, STDIN_FILENO)?;
        }
        if let Some(fd) = self.stdout {
            if self.stderr_follows_stdout {
                dup2(fd.as_raw_fd(), STDERR_FILENO)?;
            }
            install_fd(fd, STDOUT_FILENO)?;
        }
        Ok(())
    }
}

fn install_fd(fd: OwnedFd, target: RawFd) -> ShellResult<()> {
    if fd.as_raw_fd() == target {
        // 已经在目标位置上，只需去掉 close-on-exec，并且不能关闭它
        fcntl(target, FcntlArg::F_SETFD(FdFlag::empty()))?;
        let _ = fd.into_raw_fd();
        return Ok(());
    }
    dup2(fd.as_raw_fd(), target)?;
    Ok(())
}

fn creation_mode() -> Mode {
    Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IWGRP | Mode::S_IROTH | Mode::S_IWOTH
}

pub fn open_input(path: &Path, cwd: &Path) -> ShellResult<OwnedFd> {
    let full = absolutize(path, cwd);
    let fd = open(&full, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty()).map_err(|source| {
        ShellError::InputFile {
            path: path.to_path_buf(),
            source,
        }
    })?;
    trace!("打开输入文件 {} -> fd {}", full.display(), fd);
    // SAFETY: fd 刚由 open 返回，由这里独占
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

pub fn open_output(path: &Path, append: bool, cwd: &Path) -> ShellResult<OwnedFd> {
    let full = absolutize(path, cwd);
    let flags = OFlag::O_WRONLY
        | OFlag::O_CREAT
        | OFlag::O_CLOEXEC
        | if append { OFlag::O_APPEND } else { OFlag::O_TRUNC };
    let fd = open(&full, flags, creation_mode()).map_err(|source| ShellError::OutputFile {
        path: path.to_path_buf(),
        source,
    })?;
    trace!("打开输出文件 {} -> fd {} (append={})", full.display(), fd, append);
    // SAFETY: 同上
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// 创建管道，两端都设置 close-on-exec，避免泄漏到无关的子进程。
/// 返回 (读端, 写端)。
pub fn cloexec_pipe() -> ShellResult<(OwnedFd, OwnedFd)> {
    let (read, write) = pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read, write))
}

/// 把一个阶段的重定向意图落实为具体的描述符。
///
/// `upstream` 是上一阶段管道的读端。返回本阶段的流，以及（输出为管道时）
/// 留给下一阶段的读端。
pub fn resolve(
    node: &CommandNode,
    cwd: &Path,
    upstream: Option<OwnedFd>,
) -> ShellResult<(StageStreams, Option<OwnedFd>)> {
    let stdin = match &node.input {
        InputMode::FromFile(path) => Some(open_input(path, cwd)?),
        InputMode::None => upstream,
    };

    let (stdout, downstream) = match &node.output {
        OutputMode::None => (None, None),
        OutputMode::ToPipe | OutputMode::ToPipeWithStderr => {
            let (read, write) = cloexec_pipe()?;
            (Some(write), Some(read))
        }
        OutputMode::ToFile(path)
        | OutputMode::ToFileAppend(path)
        | OutputMode::ToFileWithStderr(path)
        | OutputMode::ToFileAppendWithStderr(path) => {
            (Some(open_output(path, node.output.is_append(), cwd)?), None)
        }
    };

    let streams = StageStreams {
        stdin,
        stdout,
        stderr_follows_stdout: node.output.with_stderr(),
    };
    Ok((streams, downstream))
}

fn flush_std() {
    io::stdout().flush().ok();
    io::stderr().flush().ok();
}

/// 在解释器自身进程里运行内建命令时使用的重定向：
/// 先把要改动的标准描述符复制保存，再改指向；无论怎样退出，drop 时都会恢复。
pub struct ScopedRedirect {
    saved: Vec<(RawFd, OwnedFd)>,
}

impl ScopedRedirect {
    pub fn apply(streams: StageStreams) -> ShellResult<Self> {
        flush_std();
        let mut guard = ScopedRedirect { saved: Vec::new() };
        if let Some(fd) = &streams.stdin {
            guard.retarget(fd.as_raw_fd(), STDIN_FILENO)?;
        }
        if let Some(fd) = &streams.stdout {
            guard.retarget(fd.as_raw_fd(), STDOUT_FILENO)?;
            if streams.stderr_follows_stdout {
                guard.retarget(fd.as_raw_fd(), STDERR_FILENO)?;
            }
        }
        Ok(guard)
    }

    fn retarget(&mut self, source: RawFd, target: RawFd) -> ShellResult<()> {
        let saved = fcntl(target, FcntlArg::F_DUPFD_CLOEXEC(10))?;
        // SAFETY: saved 是 fcntl 刚复制出的新描述符
        let saved = unsafe { OwnedFd::from_raw_fd(saved) };
        dup2(source, target)?;
        self.saved.push((target, saved));
        Ok(())
    }
}

impl Drop for ScopedRedirect {
    fn drop(&mut self) {
        flush_std();
        while let Some((target, saved)) = self.saved.pop() {
            if let Err(e) = dup2(saved.as_raw_fd(), target) {
                error!("恢复描述符 {} 失败: {}", target, e);
            }
        }
    }
}
