use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use nix::errno::Errno;
use nix::unistd::{access, AccessFlags};

use crate::shell::session::Session;
use crate::utils::path::{absolutize, find_file_in_dirs};

/// 在解释器进程内执行的命令，按 `arguments[0]` 精确匹配。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Echo,
    Logout,
    Nice,
    Pwd,
    Setenv,
    Unsetenv,
    Where,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinStatus {
    Success,
    Failure,
    /// `logout`：调用方应立即以成功状态结束当前进程
    Logout,
}

impl BuiltinStatus {
    pub fn code(self) -> i32 {
        match self {
            BuiltinStatus::Success | BuiltinStatus::Logout => 0,
            BuiltinStatus::Failure => 1,
        }
    }
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "echo" => Some(Builtin::Echo),
            "logout" => Some(Builtin::Logout),
            "nice" => Some(Builtin::Nice),
            "pwd" => Some(Builtin::Pwd),
            "setenv" => Some(Builtin::Setenv),
            "unsetenv" => Some(Builtin::Unsetenv),
            "where" => Some(Builtin::Where),
            _ => None,
        }
    }

    pub fn is_builtin(name: &str) -> bool {
        Self::from_name(name).is_some()
    }

    pub fn run(
        self,
        args: &[String],
        session: &mut Session,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<BuiltinStatus> {
        debug!("执行内建命令: {:?}", args);
        let rest = args.get(1..).unwrap_or_default();
        match self {
            Builtin::Cd => builtin_cd(rest, session, err),
            Builtin::Echo => builtin_echo(rest, out),
            Builtin::Logout => Ok(BuiltinStatus::Logout),
            Builtin::Nice => Ok(BuiltinStatus::Success),
            Builtin::Pwd => builtin_pwd(session, out),
            Builtin::Setenv => builtin_setenv(rest, session, out),
            Builtin::Unsetenv => {
                if let Some(name) = rest.first() {
                    session.unset(name);
                }
                Ok(BuiltinStatus::Success)
            }
            Builtin::Where => builtin_where(rest, session, out, err),
        }
    }
}

fn builtin_cd(
    args: &[String],
    session: &mut Session,
    err: &mut dyn Write,
) -> io::Result<BuiltinStatus> {
    let (shown, target) = match args.first() {
        Some(dir) => (dir.clone(), absolutize(Path::new(dir), session.cwd())),
        None => {
            let home = session.home().to_path_buf();
            (home.to_string_lossy().into_owned(), home)
        }
    };

    match change_dir(&target) {
        Ok(dir) => {
            debug!("切换目录: {}", dir.display());
            session.set_cwd(dir);
            Ok(BuiltinStatus::Success)
        }
        Err(errno) => {
            writeln!(err, "cd: {}: {} ({})", shown, errno.desc(), errno as i32)?;
            Ok(BuiltinStatus::Failure)
        }
    }
}

/// 按 chdir(2) 的规则检查目标目录，返回规范化后的路径。
fn change_dir(target: &Path) -> Result<PathBuf, Errno> {
    let to_errno = |e: io::Error| Errno::from_raw(e.raw_os_error().unwrap_or(libc::EIO));
    let meta = fs::metadata(target).map_err(to_errno)?;
    if !meta.is_dir() {
        return Err(Errno::ENOTDIR);
    }
    access(target, AccessFlags::X_OK)?;
    fs::canonicalize(target).map_err(to_errno)
}

fn builtin_echo(args: &[String], out: &mut dyn Write) -> io::Result<BuiltinStatus> {
    writeln!(out, "{}", args.join(" "))?;
    Ok(BuiltinStatus::Success)
}

fn builtin_pwd(session: &Session, out: &mut dyn Write) -> io::Result<BuiltinStatus> {
    // 工作目录已被删除时什么也不输出
    if session.cwd().is_dir() {
        writeln!(out, "{}", session.cwd().display())?;
    }
    Ok(BuiltinStatus::Success)
}

fn builtin_setenv(
    args: &[String],
    session: &mut Session,
    out: &mut dyn Write,
) -> io::Result<BuiltinStatus> {
    match args {
        [] => {
            for entry in session.envp() {
                out.write_all(entry.as_bytes())?;
                out.write_all(b"\n")?;
            }
        }
        [name] => session.set(name.as_str(), ""),
        [name, value, ..] => session.set(name.as_str(), value.as_str()),
    }
    Ok(BuiltinStatus::Success)
}

fn builtin_where(
    args: &[String],
    session: &Session,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<BuiltinStatus> {
    let Some(name) = args.first() else {
        return Ok(BuiltinStatus::Success);
    };

    if Builtin::is_builtin(name) {
        writeln!(out, "{}: shell built-in command", name)?;
        return Ok(BuiltinStatus::Success);
    }

    let found = find_file_in_dirs(name, &session.search_path(), false);
    if found.is_empty() {
        writeln!(err, "{}: command not found", name)?;
        return Ok(BuiltinStatus::Failure);
    }

    let joined = found
        .iter()
        .map(|path| path.to_string_lossy())
        .collect::<Vec<_>>()
        .join(";");
    writeln!(out, "{}", joined)?;
    Ok(BuiltinStatus::Success)
}
