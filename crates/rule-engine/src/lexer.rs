//! 规则文本分词
//!
//! 以空白分隔词元，括号总是独立成词。以单引号开头的词元一直延伸到下一个
//! 单引号，因此引号字符串内可以包含空格和括号。

use crate::error::ParseError;
use crate::operators::{Comparator, LogicalOperator};
use std::fmt;

/// 词元种类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    Connective(LogicalOperator),
    Comparator(Comparator),
    /// 未加引号的标识符或字面量
    Word(String),
    /// 单引号字符串，已去掉引号
    Quoted(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Connective(op) => write!(f, "{}", op),
            Self::Comparator(cmp) => write!(f, "{}", cmp),
            Self::Word(word) => f.write_str(word),
            Self::Quoted(content) => write!(f, "'{}'", content),
        }
    }
}

/// 词元，附带其在原文中的字节偏移
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// 将规则文本切分为词元序列
///
/// 全空白输入返回空序列，由调用方决定如何处理。
pub fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        match c {
            '(' => {
                chars.next();
                tokens.push(Token::new(TokenKind::LParen, offset));
            }
            ')' => {
                chars.next();
                tokens.push(Token::new(TokenKind::RParen, offset));
            }
            '\'' => {
                chars.next();
                let start = offset + c.len_utf8();
                let end = loop {
                    match chars.next() {
                        Some((i, '\'')) => break i,
                        Some(_) => {}
                        None => return Err(ParseError::UnterminatedString { offset }),
                    }
                };
                tokens.push(Token::new(
                    TokenKind::Quoted(text[start..end].to_string()),
                    offset,
                ));
            }
            _ => {
                let mut end = text.len();
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_whitespace() || ch == '(' || ch == ')' {
                        end = i;
                        break;
                    }
                    chars.next();
                }
                tokens.push(Token::new(classify(&text[offset..end]), offset));
            }
        }
    }

    Ok(tokens)
}

fn classify(word: &str) -> TokenKind {
    if let Some(op) = LogicalOperator::from_keyword(word) {
        TokenKind::Connective(op)
    } else if let Some(cmp) = Comparator::from_symbol(word) {
        TokenKind::Comparator(cmp)
    } else {
        TokenKind::Word(word.to_string())
    }
}

/// 文本是否会被分词为单个裸词（非空，不含空白与括号，不以单引号开头，且不是连接词或比较操作符）
pub fn is_word(text: &str) -> bool {
    !text.is_empty()
        && !text.starts_with('\'')
        && !text
            .chars()
            .any(|c| c.is_whitespace() || c == '(' || c == ')')
        && matches!(classify(text), TokenKind::Word(_))
}

/// 计算最大括号嵌套深度（不检查配对）
pub fn nesting_depth(tokens: &[Token]) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    for token in tokens {
        match token.kind {
            TokenKind::LParen => {
                depth += 1;
                max = max.max(depth);
            }
            TokenKind::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}
