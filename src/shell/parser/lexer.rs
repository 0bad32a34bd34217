use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    /// 普通单词或双引号字符串，需要做变量替换
    Word(String),
    /// 单引号字符串，原样保留
    Literal(String),
    Pipe,
    PipeErr,
    Redirect(RedirectOp),
    Semi,
    EOF,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RedirectOp {
    Input,     // <
    Output,    // >
    OutputErr, // >&
    Append,    // >>
    AppendErr, // >>&
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        match self.peek_char() {
            None => Token::EOF,
            Some(c) => match c {
                '|' => {
                    self.read_char();
                    if self.eat('&') {
                        Token::PipeErr
                    } else {
                        Token::Pipe
                    }
                }
                ';' | '\n' => {
                    self.read_char();
                    Token::Semi
                }
                '<' => {
                    self.read_char();
                    Token::Redirect(RedirectOp::Input)
                }
                '>' => {
                    self.read_char();
                    let append = self.eat('>');
                    let with_err = self.eat('&');
                    Token::Redirect(match (append, with_err) {
                        (false, false) => RedirectOp::Output,
                        (false, true) => RedirectOp::OutputErr,
                        (true, false) => RedirectOp::Append,
                        (true, true) => RedirectOp::AppendErr,
                    })
                }
                '"' => Token::Word(self.read_quoted_string()),
                '\'' => Token::Literal(self.read_quoted_string()),
                _ => self.read_word(),
            },
        }
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.read_char();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' || !c.is_whitespace() {
                break;
            }
            self.read_char();
        }
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || ";<>|".contains(c) {
                break;
            }
            self.read_char();
            word.push(c);
        }

        Token::Word(word)
    }

    fn read_quoted_string(&mut self) -> String {
        let quote = self.read_char().unwrap_or_default();
        let mut string = String::new();
        let mut escaped = false;

        while let Some(c) = self.read_char() {
            match (escaped, c) {
                (true, _) => {
                    string.push(c);
                    escaped = false;
                }
                (false, '\\') => escaped = true,
                (false, c) if c == quote => break,
                (false, c) => string.push(c),
            }
        }

        string
    }
}
