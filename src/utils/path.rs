use std::env;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::trace;

/// 把搜索路径（如 `$PATH`）拆成目录列表，跳过空项，相对目录以 `cwd` 为基准。
pub fn search_dirs(path_var: impl AsRef<OsStr>, cwd: &Path) -> Vec<PathBuf> {
    env::split_paths(path_var.as_ref())
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| absolutize(&dir, cwd))
        .collect()
}

pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

pub fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// 在每个目录下查找 `filename`，返回所有命中的完整路径（按目录顺序）。
/// `exec` 为真时只保留可执行的普通文件。
pub fn find_file_in_dirs(filename: &str, dirs: &[PathBuf], exec: bool) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in dirs {
        let candidate = dir.join(filename);
        // 跟随符号链接，悬空的链接不算命中
        if fs::metadata(&candidate).is_err() {
            continue;
        }
        if exec && !is_executable(&candidate) {
            trace!("跳过不可执行文件: {}", candidate.display());
            continue;
        }
        found.push(candidate);
    }
    found
}
