use log::{debug, error, info, warn};
use std::error::Error;
use std::fs;
use std::io::{self, BufRead, IsTerminal};

use crate::shell::executor::{Executor, Flow};
use crate::shell::parser::Parser;
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::session::Session;
use crate::shell::signals;
use crate::utils::config::Config;

/// 输入来源，决定 `end` 的含义。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputSource {
    Terminal,
    Script,
    StartupFile,
}

impl InputSource {
    /// `end` 只结束非终端输入；在终端上它只跳过这一行余下的管道。
    fn stops_on(self, flow: Flow) -> bool {
        flow == Flow::End && self != InputSource::Terminal
    }
}

pub struct Shell<'a> {
    config: &'a Config,
    host: String,
    executor: Executor,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Self {
        let host = match nix::unistd::gethostname() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                warn!("无法获取主机名: {}", e);
                String::from("localhost")
            }
        };

        Self {
            config,
            host,
            executor: Executor::new(Session::from_process()),
        }
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("初始化 ush...");

        // 解释器自身不响应 Ctrl-C 等信号，子进程会恢复默认处理
        signals::ignore_shell_signals();

        self.run_startup_file();

        if io::stdin().is_terminal() {
            self.run_interactive()?;
        } else {
            self.run_script()?;
        }

        debug!("退出 ush...");
        Ok(())
    }

    fn run_interactive(&mut self) -> Result<(), Box<dyn Error>> {
        let mut readline = ReadlineManager::new(self.config)?;
        readline.load_history();
        let prompt = format!("{}% ", self.host);
        debug!("ush 准备就绪 (交互模式)");

        loop {
            match readline.readline(&prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    readline.add_history(&line)?;
                    // logout 会直接结束进程，所以每行之后都保存
                    readline.save_history();
                    let flow = self.handle_input(&line);
                    if InputSource::Terminal.stops_on(flow) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("接收到中断信号，丢弃当前行");
                }
                Err(ReadlineError::Eof) => {
                    info!("接收到 EOF，退出 ush");
                    break;
                }
                Err(err) => {
                    error!("读取输入失败: {}", err);
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    /// 非终端输入：逐行读取，不显示提示符，遇到 `end` 或输入结束时退出。
    fn run_script(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("ush 准备就绪 (脚本模式)");
        let stdin = io::stdin();
        let mut line = String::new();

        loop {
            line.clear();
            if stdin.lock().read_line(&mut line)? == 0 {
                info!("输入结束，退出 ush");
                break;
            }
            if InputSource::Script.stops_on(self.handle_input(&line)) {
                break;
            }
        }
        Ok(())
    }

    /// 在进入主循环前逐行执行启动文件，每行前输出一次 `<host>%`。
    /// 文件不存在时什么也不做；其中的 `end` 只结束启动文件本身。
    fn run_startup_file(&mut self) {
        let path = match &self.config.rc_file {
            Some(path) => path.clone(),
            None => self.executor.session().home().join(".ushrc"),
        };
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("没有启动文件 {}", path.display());
                return;
            }
            Err(e) => {
                warn!("无法读取启动文件 {}: {}", path.display(), e);
                return;
            }
        };

        info!("执行启动文件 {}", path.display());
        for line in contents.lines() {
            println!("{}%", self.host);
            if InputSource::StartupFile.stops_on(self.handle_input(line)) {
                break;
            }
        }
    }

    fn handle_input(&mut self, line: &str) -> Flow {
        let program = match Parser::new(line, self.executor.session()).parse_program() {
            Ok(program) => program,
            Err(e) => {
                eprintln!("{}", e);
                warn!("解析失败: {}", e);
                return Flow::Continue;
            }
        };
        self.executor.execute(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_only_stops_non_terminal_input() {
        assert!(!InputSource::Terminal.stops_on(Flow::End));
        assert!(InputSource::Script.stops_on(Flow::End));
        assert!(InputSource::StartupFile.stops_on(Flow::End));
        for source in [InputSource::Terminal, InputSource::Script, InputSource::StartupFile] {
            assert!(!source.stops_on(Flow::Continue));
        }
    }
}
