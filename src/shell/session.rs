use std::collections::BTreeMap;
use std::env;
use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use nix::unistd::{Uid, User};

use crate::utils::path::search_dirs;

/// 解释器会话：环境变量表、工作目录和用户主目录。
///
/// 内建命令修改的是这里的状态，启动子进程时再把它导出给子进程
/// （`chdir` 到 `cwd`，并以 `vars` 作为子进程环境）。
#[derive(Debug, Clone)]
pub struct Session {
    vars: BTreeMap<String, String>,
    /// 名字或值不是 UTF-8 的变量，不参与替换，但原样导出给子进程
    foreign: BTreeMap<OsString, OsString>,
    cwd: PathBuf,
    home: PathBuf,
}

impl Session {
    pub fn new(vars: BTreeMap<String, String>, cwd: PathBuf, home: PathBuf) -> Self {
        Self {
            vars,
            foreign: BTreeMap::new(),
            cwd,
            home,
        }
    }

    /// 从当前进程的环境构造会话。
    pub fn from_process() -> Self {
        Self::from_env(env::vars_os())
    }

    fn from_env(entries: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        let mut vars = BTreeMap::new();
        let mut foreign = BTreeMap::new();
        for (name, value) in entries {
            match (name.to_str(), value.to_str()) {
                (Some(n), Some(v)) => {
                    vars.insert(n.to_string(), v.to_string());
                }
                _ => {
                    debug!("非 UTF-8 环境变量: {:?}", name);
                    foreign.insert(name, value);
                }
            }
        }
        let cwd = env::current_dir().unwrap_or_else(|e| {
            warn!("无法获取当前目录: {}", e);
            PathBuf::from("/")
        });
        let home = Self::user_home(&vars);
        debug!("会话初始化: cwd={} home={}", cwd.display(), home.display());
        Self {
            vars,
            foreign,
            cwd,
            home,
        }
    }

    fn user_home(vars: &BTreeMap<String, String>) -> PathBuf {
        match User::from_uid(Uid::current()) {
            Ok(Some(user)) => user.dir,
            _ => vars
                .get("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/")),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// 按原始字节取值，非 UTF-8 的变量也能取到。
    fn get_os(&self, name: &str) -> Option<&OsStr> {
        self.vars
            .get(name)
            .map(OsStr::new)
            .or_else(|| self.foreign.get(OsStr::new(name)).map(OsString::as_os_str))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.foreign.remove(OsStr::new(&name));
        self.vars.insert(name, value.into());
    }

    pub fn unset(&mut self, name: &str) {
        self.vars.remove(name);
        self.foreign.remove(OsStr::new(name));
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn set_cwd(&mut self, cwd: PathBuf) {
        self.set("PWD", cwd.to_string_lossy().into_owned());
        self.cwd = cwd;
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn search_path(&self) -> Vec<PathBuf> {
        search_dirs(self.get_os("PATH").unwrap_or_default(), &self.cwd)
    }

    /// 子进程环境，`NAME=VALUE` 形式，按字节排序；含 NUL 字节的条目无法导出，直接跳过。
    pub fn envp(&self) -> Vec<CString> {
        let utf8 = self
            .vars
            .iter()
            .map(|(k, v)| format!("{}={}", k, v).into_bytes());
        let raw = self.foreign.iter().map(|(k, v)| {
            let mut entry = k.clone().into_vec();
            entry.push(b'=');
            entry.extend_from_slice(v.as_bytes());
            entry
        });
        let mut entries: Vec<Vec<u8>> = utf8.chain(raw).collect();
        entries.sort();
        entries
            .into_iter()
            .filter_map(|entry| CString::new(entry).ok())
            .collect()
    }
}
