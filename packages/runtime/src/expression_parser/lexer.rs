/*
 * Binding Expression Lexer
 *
 * Tokenizes binding expressions into tokens for the recursive-descent parser.
 */

use serde::{Deserialize, Serialize};

use crate::chars;

/// Token types in binding expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenType {
    Character = 0,
    Identifier = 1,
    Keyword = 2,
    String = 3,
    Operator = 4,
    Number = 5,
    Error = 6,
}

/// Token representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub index: usize,
    pub end: usize,
    pub token_type: TokenType,
    pub num_value: f64,
    pub str_value: String,
}

impl Token {
    pub fn new(
        index: usize,
        end: usize,
        token_type: TokenType,
        num_value: f64,
        str_value: String,
    ) -> Self {
        Token {
            index,
            end,
            token_type,
            num_value,
            str_value,
        }
    }

    pub fn is_character(&self, code: char) -> bool {
        self.token_type == TokenType::Character && self.str_value.chars().next() == Some(code)
    }

    pub fn is_number(&self) -> bool {
        self.token_type == TokenType::Number
    }

    pub fn is_string(&self) -> bool {
        self.token_type == TokenType::String
    }

    pub fn is_identifier(&self) -> bool {
        self.token_type == TokenType::Identifier
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.token_type == TokenType::Keyword && self.str_value == keyword
    }

    pub fn is_operator(&self, operator: &str) -> bool {
        self.token_type == TokenType::Operator && self.str_value == operator
    }

    pub fn is_error(&self) -> bool {
        self.token_type == TokenType::Error
    }

    pub fn is_end(&self) -> bool {
        self.index == usize::MAX
    }
}

/// EOF token constant
pub const EOF: Token = Token {
    index: usize::MAX,
    end: usize::MAX,
    token_type: TokenType::Character,
    num_value: 0.0,
    str_value: String::new(),
};

pub fn new_character_token(index: usize, end: usize, code: char) -> Token {
    Token::new(
        index,
        end,
        TokenType::Character,
        code as u32 as f64,
        code.to_string(),
    )
}

pub fn new_identifier_token(index: usize, end: usize, text: String) -> Token {
    Token::new(index, end, TokenType::Identifier, 0.0, text)
}

pub fn new_keyword_token(index: usize, end: usize, text: String) -> Token {
    Token::new(index, end, TokenType::Keyword, 0.0, text)
}

pub fn new_operator_token(index: usize, end: usize, text: String) -> Token {
    Token::new(index, end, TokenType::Operator, 0.0, text)
}

pub fn new_string_token(index: usize, end: usize, text: String) -> Token {
    Token::new(index, end, TokenType::String, 0.0, text)
}

pub fn new_number_token(index: usize, end: usize, n: f64) -> Token {
    Token::new(index, end, TokenType::Number, n, String::new())
}

pub fn new_error_token(index: usize, end: usize, message: String) -> Token {
    Token::new(index, end, TokenType::Error, 0.0, message)
}

/// Binding expression lexer
#[derive(Default)]
pub struct Lexer;

impl Lexer {
    pub fn new() -> Self {
        Lexer
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        Scanner::new(text).scan()
    }
}

// Reserved words of the binding language
const KEYWORDS: &[&str] = &["true", "false", "null", "undefined", "$this", "$parent"];

/// Scanner for tokenizing input
struct Scanner {
    input: String,
    length: usize,
    index: usize,
    peek: char,
    tokens: Vec<Token>,
}

impl Scanner {
    fn new(input: &str) -> Self {
        let peek = input.chars().next().unwrap_or(chars::EOF);
        Scanner {
            input: input.to_string(),
            length: input.len(),
            index: 0,
            peek,
            tokens: Vec::new(),
        }
    }

    fn scan(mut self) -> Vec<Token> {
        while let Some(token) = self.scan_token() {
            let stop = token.is_error();
            self.tokens.push(token);
            if stop {
                break;
            }
        }
        self.tokens
    }

    fn advance(&mut self) {
        self.index += self.peek.len_utf8();
        self.peek = if self.index < self.length {
            self.input[self.index..].chars().next().unwrap_or(chars::EOF)
        } else {
            chars::EOF
        };
    }

    fn scan_token(&mut self) -> Option<Token> {
        while self.index < self.length && chars::is_whitespace(self.peek) {
            self.advance();
        }
        if self.index >= self.length {
            return None;
        }

        let start = self.index;
        let ch = self.peek;

        if chars::is_identifier_start(ch) {
            return Some(self.scan_identifier(start));
        }
        if chars::is_digit(ch) {
            return Some(self.scan_number(start));
        }
        if ch == chars::PERIOD {
            self.advance();
            if chars::is_digit(self.peek) {
                return Some(self.scan_number(start));
            }
            return Some(new_character_token(start, self.index, chars::PERIOD));
        }
        if ch == chars::SQ || ch == chars::DQ {
            return Some(self.scan_string(start, ch));
        }
        if chars::is_operator_start(ch) {
            return Some(self.scan_operator(start));
        }
        if matches!(
            ch,
            chars::LPAREN
                | chars::RPAREN
                | chars::LBRACKET
                | chars::RBRACKET
                | chars::LBRACE
                | chars::RBRACE
                | chars::COMMA
                | chars::COLON
                | chars::QUESTION
        ) {
            self.advance();
            return Some(new_character_token(start, self.index, ch));
        }

        self.advance();
        Some(new_error_token(
            start,
            self.index,
            format!("unexpected character '{}'", ch),
        ))
    }

    fn scan_identifier(&mut self, start: usize) -> Token {
        self.advance();
        while chars::is_identifier_part(self.peek) {
            self.advance();
        }
        let text = self.input[start..self.index].to_string();
        if KEYWORDS.contains(&text.as_str()) {
            new_keyword_token(start, self.index, text)
        } else {
            new_identifier_token(start, self.index, text)
        }
    }

    fn scan_number(&mut self, start: usize) -> Token {
        // `start` may already cover a leading '.', in which case the token
        // cannot be a simple integer.
        let mut simple = self.index == start;
        self.advance();
        loop {
            if chars::is_digit(self.peek) {
                self.advance();
            } else if self.peek == chars::PERIOD {
                simple = false;
                self.advance();
            } else if self.peek == 'e' || self.peek == 'E' {
                simple = false;
                self.advance();
                if self.peek == chars::PLUS || self.peek == chars::MINUS {
                    self.advance();
                }
                if !chars::is_digit(self.peek) {
                    return new_error_token(start, self.index, "invalid exponent".to_string());
                }
            } else {
                break;
            }
        }
        let text = &self.input[start..self.index];
        let value = if simple {
            text.parse::<u64>().map(|n| n as f64).unwrap_or(f64::NAN)
        } else {
            text.parse::<f64>().unwrap_or(f64::NAN)
        };
        new_number_token(start, self.index, value)
    }

    fn scan_string(&mut self, start: usize, quote: char) -> Token {
        self.advance();
        let mut buffer = String::new();
        loop {
            if self.index >= self.length {
                return new_error_token(start, self.index, "unterminated string".to_string());
            }
            let ch = self.peek;
            if ch == quote {
                self.advance();
                return new_string_token(start, self.index, buffer);
            }
            if ch == chars::BACKSLASH {
                self.advance();
                match self.peek {
                    'n' => buffer.push('\n'),
                    't' => buffer.push('\t'),
                    'r' => buffer.push('\r'),
                    'u' => {
                        self.advance();
                        let hex_start = self.index;
                        for _ in 0..4 {
                            if !chars::is_ascii_hex_digit(self.peek) {
                                return new_error_token(
                                    start,
                                    self.index,
                                    "invalid unicode escape".to_string(),
                                );
                            }
                            self.advance();
                        }
                        let code = u32::from_str_radix(&self.input[hex_start..self.index], 16)
                            .ok()
                            .and_then(char::from_u32);
                        match code {
                            Some(c) => buffer.push(c),
                            None => {
                                return new_error_token(
                                    start,
                                    self.index,
                                    "invalid unicode escape".to_string(),
                                )
                            }
                        }
                        continue;
                    }
                    other => buffer.push(other),
                }
                self.advance();
                continue;
            }
            buffer.push(ch);
            self.advance();
        }
    }

    fn scan_operator(&mut self, start: usize) -> Token {
        let one = self.peek;
        self.advance();
        match one {
            '=' | '!' => {
                // =, ==, ===, !, !=, !==
                if self.peek == chars::EQ {
                    self.advance();
                    if self.peek == chars::EQ {
                        self.advance();
                    }
                }
            }
            '<' | '>' => {
                if self.peek == chars::EQ {
                    self.advance();
                }
            }
            '&' => {
                if self.peek == chars::AMPERSAND {
                    self.advance();
                } else {
                    return new_error_token(start, self.index, "expected '&&'".to_string());
                }
            }
            '|' => {
                if self.peek == chars::BAR {
                    self.advance();
                } else {
                    return new_error_token(start, self.index, "expected '||'".to_string());
                }
            }
            _ => {}
        }
        let text = self.input[start..self.index].to_string();
        new_operator_token(start, self.index, text)
    }
}
