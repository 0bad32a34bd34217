use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use nix::unistd::{access, AccessFlags};

use crate::shell::error::{ShellError, ShellResult};
use crate::shell::session::Session;
use crate::utils::path::{absolutize, find_file_in_dirs};

/// 在创建任何进程之前判断命令能否运行，成功时返回可执行文件的路径。
///
/// 含 `/` 的名字按路径解析（相对路径以会话工作目录为基准），并检查
/// 文件类型与执行权限；不含 `/` 的名字在搜索路径中查找第一个可执行的普通文件。
pub fn resolve(name: &str, session: &Session) -> ShellResult<PathBuf> {
    if name.contains('/') {
        resolve_path(name, session)
    } else {
        resolve_bare(name, session)
    }
}

fn resolve_path(name: &str, session: &Session) -> ShellResult<PathBuf> {
    let path = absolutize(Path::new(name), session.cwd());
    let real = fs::canonicalize(&path).map_err(|_| ShellError::NotFound(name.to_string()))?;
    let meta = fs::metadata(&real).map_err(|_| ShellError::NotFound(name.to_string()))?;

    if meta.is_dir() {
        return Err(ShellError::IsDirectory(name.to_string()));
    }
    if access(&real, AccessFlags::X_OK).is_err() {
        return Err(ShellError::PermissionDenied(name.to_string()));
    }
    debug!("解析命令 {} -> {}", name, real.display());
    Ok(real)
}

fn resolve_bare(name: &str, session: &Session) -> ShellResult<PathBuf> {
    let dirs = session.search_path();
    if let Some(path) = find_file_in_dirs(name, &dirs, true).into_iter().next() {
        debug!("解析命令 {} -> {}", name, path.display());
        return Ok(path);
    }
    // 搜索路径里有同名文件但都不可执行
    if !find_file_in_dirs(name, &dirs, false).is_empty() {
        return Err(ShellError::PermissionDenied(name.to_string()));
    }
    Err(ShellError::CommandNotFound(name.to_string()))
}
