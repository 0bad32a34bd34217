use std::ffi::NulError;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{0}: command not found")]
    CommandNotFound(String),
    #[error("ush: {0}: No such file or directory")]
    NotFound(String),
    #[error("ush: {0}: Is a directory")]
    IsDirectory(String),
    #[error("ush: {0}: Permission denied")]
    PermissionDenied(String),
    #[error("ush: {}: {}", path.display(), source.desc())]
    InputFile { path: PathBuf, source: Errno },
    #[error("ush: {}: {}", path.display(), source.desc())]
    OutputFile { path: PathBuf, source: Errno },
    #[error("ush: {0}")]
    Sys(#[from] Errno),
    #[error("ush: argument contains a NUL byte: {0}")]
    Nul(#[from] NulError),
    #[error("ush: syntax error: {0}")]
    Syntax(String),
}

pub type ShellResult<T> = Result<T, ShellError>;
