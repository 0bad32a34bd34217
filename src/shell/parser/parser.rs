use std::path::PathBuf;

use super::ast::{CommandNode, InputMode, OutputMode, Pipeline, Program};
use super::lexer::{Lexer, RedirectOp, Token};
use crate::shell::error::{ShellError, ShellResult};
use crate::shell::session::Session;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
    session: &'a Session,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, session: &'a Session) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
            session,
        }
    }

    fn next_token(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// 解析整段输入：以 `;` 或换行分隔的若干管道，空语句被忽略。
    pub fn parse_program(&mut self) -> ShellResult<Program> {
        let mut program = Program::default();

        while self.current_token != Token::EOF {
            if self.current_token == Token::Semi {
                self.next_token();
                continue;
            }
            program.pipelines.push(self.parse_pipeline()?);
        }

        Ok(program)
    }

    fn parse_pipeline(&mut self) -> ShellResult<Pipeline> {
        let mut stages = Vec::new();

        loop {
            let mut command = self.parse_simple_command()?;

            let piped = match self.current_token {
                Token::Pipe => Some(OutputMode::ToPipe),
                Token::PipeErr => Some(OutputMode::ToPipeWithStderr),
                _ => None,
            };

            match piped {
                Some(mode) => {
                    if command.output != OutputMode::None {
                        return Err(ShellError::Syntax(format!(
                            "{}: ambiguous output redirect",
                            command.name()
                        )));
                    }
                    command.output = mode;
                    stages.push(command);
                    self.next_token();
                }
                None => {
                    stages.push(command);
                    break;
                }
            }
        }

        Pipeline::new(stages)
    }

    fn parse_simple_command(&mut self) -> ShellResult<CommandNode> {
        let mut command = CommandNode::default();

        loop {
            match &self.current_token {
                Token::EOF | Token::Pipe | Token::PipeErr | Token::Semi => break,
                Token::Redirect(op) => {
                    let op = op.clone();
                    self.parse_redirection(op, &mut command)?;
                }
                Token::Word(_) | Token::Literal(_) => {
                    let word = self.expand_current();
                    command.arguments.push(word);
                    self.next_token();
                }
            }
        }

        if command.arguments.is_empty() {
            return Err(ShellError::Syntax("invalid null command".to_string()));
        }
        Ok(command)
    }

    fn parse_redirection(&mut self, operator: RedirectOp, command: &mut CommandNode) -> ShellResult<()> {
        self.next_token(); // 跳过重定向操作符

        let target = match &self.current_token {
            Token::Word(_) | Token::Literal(_) => PathBuf::from(self.expand_current()),
            _ => {
                return Err(ShellError::Syntax(
                    "missing name for redirect".to_string(),
                ))
            }
        };
        self.next_token();

        if operator == RedirectOp::Input {
            if command.input != InputMode::None {
                return Err(ShellError::Syntax("ambiguous input redirect".to_string()));
            }
            command.input = InputMode::FromFile(target);
            return Ok(());
        }

        if command.output != OutputMode::None {
            return Err(ShellError::Syntax("ambiguous output redirect".to_string()));
        }
        command.output = match operator {
            RedirectOp::Output => OutputMode::ToFile(target),
            RedirectOp::OutputErr => OutputMode::ToFileWithStderr(target),
            RedirectOp::Append => OutputMode::ToFileAppend(target),
            RedirectOp::AppendErr => OutputMode::ToFileAppendWithStderr(target),
            RedirectOp::Input => unreachable!("input redirection handled above"),
        };
        Ok(())
    }

    /// 对当前单词做简单替换：`$NAME`、`${NAME}` 和开头的 `~`。未定义的变量替换为空串。
    fn expand_current(&self) -> String {
        match &self.current_token {
            Token::Word(word) => shellexpand::full_with_context_no_errors(
                word,
                || Some(self.session.home().to_string_lossy().into_owned()),
                |name| Some(self.session.get(name).unwrap_or_default().to_string()),
            )
            .into_owned(),
            Token::Literal(word) => word.clone(),
            _ => String::new(),
        }
    }
}
