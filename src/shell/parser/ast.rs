use std::ffi::CString;
use std::path::PathBuf;

use crate::shell::error::{ShellError, ShellResult};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    None,
    FromFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    None,
    ToFile(PathBuf),
    ToFileAppend(PathBuf),
    ToFileWithStderr(PathBuf),
    ToFileAppendWithStderr(PathBuf),
    ToPipe,
    ToPipeWithStderr,
}

impl OutputMode {
    pub fn is_pipe(&self) -> bool {
        matches!(self, OutputMode::ToPipe | OutputMode::ToPipeWithStderr)
    }

    pub fn is_append(&self) -> bool {
        matches!(
            self,
            OutputMode::ToFileAppend(_) | OutputMode::ToFileAppendWithStderr(_)
        )
    }

    pub fn with_stderr(&self) -> bool {
        matches!(
            self,
            OutputMode::ToFileWithStderr(_)
                | OutputMode::ToFileAppendWithStderr(_)
                | OutputMode::ToPipeWithStderr
        )
    }
}

/// 管道中的一个阶段。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandNode {
    pub arguments: Vec<String>,
    pub input: InputMode,
    pub output: OutputMode,
}

impl CommandNode {
    pub fn new<S: Into<String>>(arguments: impl IntoIterator<Item = S>) -> Self {
        Self {
            arguments: arguments.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn with_input(mut self, input: InputMode) -> Self {
        self.input = input;
        self
    }

    #[cfg(test)]
    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn name(&self) -> &str {
        self.arguments.first().map(String::as_str).unwrap_or_default()
    }

    /// 以 exec 系列调用需要的形式给出参数向量。
    pub fn argv(&self) -> ShellResult<Vec<CString>> {
        self.arguments
            .iter()
            .map(|arg| CString::new(arg.as_str()).map_err(ShellError::from))
            .collect()
    }
}

/// 由管道符连接的一串命令，构造时校验各阶段的重定向是否合法。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<CommandNode>,
}

impl Pipeline {
    pub fn new(stages: Vec<CommandNode>) -> ShellResult<Self> {
        if stages.is_empty() {
            return Err(ShellError::Syntax("empty pipeline".into()));
        }
        let last = stages.len() - 1;
        for (idx, stage) in stages.iter().enumerate() {
            if stage.arguments.is_empty() {
                return Err(ShellError::Syntax("invalid null command".into()));
            }
            if idx != last && !stage.output.is_pipe() {
                return Err(ShellError::Syntax(format!(
                    "{}: ambiguous output redirect",
                    stage.name()
                )));
            }
            if idx == last && stage.output.is_pipe() {
                return Err(ShellError::Syntax(format!(
                    "{}: pipe without a following command",
                    stage.name()
                )));
            }
            if idx != 0 && stage.input != InputMode::None {
                return Err(ShellError::Syntax(format!(
                    "{}: ambiguous input redirect",
                    stage.name()
                )));
            }
        }
        Ok(Self { stages })
    }

    pub fn head(&self) -> &CommandNode {
        &self.stages[0]
    }

    pub fn stages(&self) -> &[CommandNode] {
        &self.stages
    }
}

/// 一次输入产生的全部管道，按顺序执行。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub pipelines: Vec<Pipeline>,
}
