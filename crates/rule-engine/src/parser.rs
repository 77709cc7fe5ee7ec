//! 规则解析器
//!
//! 基于调度场算法（shunting-yard）从词元序列构建规则树：
//! - 输出栈保存已构建的子树，操作符栈保存待归约的连接词
//! - AND 优先级高于 OR，同级连接词左结合
//! - 括号组递归解析为独立子树
//!
//! 解析器通过显式游标消费词元，递归调用之间不共享可变队列。

use crate::error::ParseError;
use crate::lexer::{Token, TokenKind, tokenize};
use crate::models::{Condition, Literal, RuleNode};
use crate::operators::LogicalOperator;

/// 将规则文本编译为规则树
pub fn compile(text: &str) -> Result<RuleNode, ParseError> {
    let tokens = tokenize(text)?;
    parse(&tokens)
}

/// 从词元序列构建规则树
pub fn parse(tokens: &[Token]) -> Result<RuleNode, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = Parser::new(tokens);
    parser.parse_expression(None)
}

/// 解析单个条件文本，如 `age > 30` 或 `city = 'New York'`
///
/// 必须恰好由字段、比较操作符、字面量三个词元组成。
pub fn parse_condition(text: &str) -> Result<Condition, ParseError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser::new(&tokens);

    let first = parser.next().ok_or(ParseError::Empty)?;
    let TokenKind::Word(field) = &first.kind else {
        return Err(unexpected(first));
    };
    let condition = parser.parse_condition(field)?;

    match parser.next() {
        Some(extra) => Err(unexpected(extra)),
        None => Ok(condition),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    /// 输入末尾的偏移，用于报告缺失的词元
    fn end_offset(&self) -> usize {
        self.tokens
            .last()
            .map(|t| t.offset + t.kind.to_string().len())
            .unwrap_or(0)
    }

    /// 解析一个表达式
    ///
    /// `open` 为所在括号组左括号的偏移；顶层为 `None`。
    /// 括号组在遇到匹配的右括号后返回，顶层在输入结束时返回。
    fn parse_expression(&mut self, open: Option<usize>) -> Result<RuleNode, ParseError> {
        let mut output: Vec<RuleNode> = Vec::new();
        let mut operators: Vec<(LogicalOperator, usize)> = Vec::new();
        // 期望下一个词元是操作数（条件或括号组）
        let mut expect_operand = true;

        while let Some(token) = self.next() {
            match &token.kind {
                TokenKind::LParen => {
                    if !expect_operand {
                        return Err(unexpected(token));
                    }
                    let group = self.parse_expression(Some(token.offset))?;
                    output.push(group);
                    expect_operand = false;
                }
                TokenKind::RParen => {
                    if open.is_none() {
                        return Err(ParseError::UnmatchedCloseParen {
                            offset: token.offset,
                        });
                    }
                    if expect_operand {
                        return Err(ParseError::MissingOperand {
                            offset: token.offset,
                        });
                    }
                    return finish(output, operators);
                }
                TokenKind::Connective(op) => {
                    if expect_operand {
                        return Err(ParseError::MissingOperand {
                            offset: token.offset,
                        });
                    }
                    while let Some(&(top, offset)) = operators.last() {
                        if top.precedence() < op.precedence() {
                            break;
                        }
                        operators.pop();
                        reduce(&mut output, top, offset)?;
                    }
                    operators.push((*op, token.offset));
                    expect_operand = true;
                }
                TokenKind::Word(field) => {
                    if !expect_operand {
                        return Err(unexpected(token));
                    }
                    let condition = self.parse_condition(field)?;
                    output.push(RuleNode::Operand(condition));
                    expect_operand = false;
                }
                TokenKind::Comparator(_) | TokenKind::Quoted(_) => {
                    return Err(unexpected(token));
                }
            }
        }

        if let Some(offset) = open {
            return Err(ParseError::UnclosedParen { offset });
        }
        if expect_operand {
            return Err(ParseError::MissingOperand {
                offset: self.end_offset(),
            });
        }
        finish(output, operators)
    }

    /// 消费字段之后的比较操作符与字面量
    fn parse_condition(&mut self, field: &str) -> Result<Condition, ParseError> {
        let incomplete = |expected: &'static str, offset: usize| ParseError::IncompleteCondition {
            field: field.to_string(),
            expected,
            offset,
        };

        let comparator = match self.next() {
            Some(Token {
                kind: TokenKind::Comparator(cmp),
                ..
            }) => *cmp,
            Some(token) => return Err(incomplete("比较操作符", token.offset)),
            None => return Err(incomplete("比较操作符", self.end_offset())),
        };

        let literal = match self.next() {
            Some(Token {
                kind: TokenKind::Word(text),
                ..
            }) => Literal::from_word_token(text.clone()),
            Some(Token {
                kind: TokenKind::Quoted(content),
                ..
            }) => Literal::from_quoted_token(content.clone()),
            Some(token) => return Err(incomplete("字面量", token.offset)),
            None => return Err(incomplete("字面量", self.end_offset())),
        };

        Ok(Condition::from_tokens(field.to_string(), comparator, literal))
    }
}

/// 弹出 right、left 两个子树并压入新的连接节点
fn reduce(
    output: &mut Vec<RuleNode>,
    operator: LogicalOperator,
    offset: usize,
) -> Result<(), ParseError> {
    let right = output.pop().ok_or(ParseError::MissingOperand { offset })?;
    let left = output.pop().ok_or(ParseError::MissingOperand { offset })?;
    output.push(RuleNode::connective(operator, left, right));
    Ok(())
}

/// 归约剩余连接词并取出唯一的结果树
///
/// 操作符栈自底向上优先级严格递增，因此从栈顶开始归约。
fn finish(
    mut output: Vec<RuleNode>,
    mut operators: Vec<(LogicalOperator, usize)>,
) -> Result<RuleNode, ParseError> {
    while let Some((operator, offset)) = operators.pop() {
        reduce(&mut output, operator, offset)?;
    }

    let root = output.pop().ok_or(ParseError::Empty)?;
    debug_assert!(output.is_empty());
    Ok(root)
}

fn unexpected(token: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        token: token.kind.to_string(),
        offset: token.offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Comparator;

    fn gt(field: &str, value: &str) -> RuleNode {
        let literal = Literal::bare(value).unwrap();
        RuleNode::operand(Condition::new(field, Comparator::Gt, literal).unwrap())
    }

    #[test]
    fn test_single_condition() {
        assert_eq!(compile("age > 30").unwrap(), gt("age", "30"));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let tree = compile("a > 1 OR b > 2 AND c > 3").unwrap();
        assert_eq!(tree, RuleNode::or(gt("a", "1"), RuleNode::and(gt("b", "2"), gt("c", "3"))));

        let tree = compile("a > 1 AND b > 2 OR c > 3").unwrap();
        assert_eq!(tree, RuleNode::or(RuleNode::and(gt("a", "1"), gt("b", "2")), gt("c", "3")));
    }

    #[test]
    fn test_left_associative() {
        let tree = compile("a > 1 OR b > 2 OR c > 3").unwrap();
        assert_eq!(tree, RuleNode::or(RuleNode::or(gt("a", "1"), gt("b", "2")), gt("c", "3")));

        let tree = compile("a > 1 AND b > 2 AND c > 3").unwrap();
        assert_eq!(tree, RuleNode::and(RuleNode::and(gt("a", "1"), gt("b", "2")), gt("c", "3")));
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let tree = compile("(a > 1 OR b > 2) AND c > 3").unwrap();
        assert_eq!(tree, RuleNode::and(RuleNode::or(gt("a", "1"), gt("b", "2")), gt("c", "3")));

        let tree = compile("a > 1 AND (b > 2 OR c > 3)").unwrap();
        assert_eq!(tree, RuleNode::and(gt("a", "1"), RuleNode::or(gt("b", "2"), gt("c", "3"))));
    }

    #[test]
    fn test_redundant_parentheses() {
        assert_eq!(compile("((age > 30))").unwrap(), gt("age", "30"));
    }

    #[test]
    fn test_mixed_nesting() {
        let tree = compile(
            "((age > 30 AND department = 'Sales') OR (age < 25 AND department = 'Marketing')) AND (salary > 50000 OR experience > 5)",
        )
        .unwrap();
        assert_eq!(tree.condition_count(), 6);
        assert_eq!(tree.depth(), 4);
        match tree {
            RuleNode::Connective { operator, .. } => assert_eq!(operator, LogicalOperator::And),
            RuleNode::Operand(_) => panic!("expected connective at root"),
        }
    }

    #[test]
    fn test_quoted_literal() {
        let tree = compile("city = 'New York'").unwrap();
        assert_eq!(
            tree,
            RuleNode::operand(
                Condition::new("city", Comparator::Eq, Literal::quoted("New York").unwrap())
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(compile(""), Err(ParseError::Empty));
        assert_eq!(compile("   "), Err(ParseError::Empty));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        assert_eq!(
            compile("age > 30 AND ("),
            Err(ParseError::UnclosedParen { offset: 13 })
        );
        assert_eq!(
            compile("age > 30)"),
            Err(ParseError::UnmatchedCloseParen { offset: 8 })
        );
        assert!(matches!(
            compile("(age > 30"),
            Err(ParseError::UnclosedParen { offset: 0 })
        ));
    }

    #[test]
    fn test_missing_operand() {
        assert!(matches!(compile("AND age > 30"), Err(ParseError::MissingOperand { .. })));
        assert!(matches!(compile("age > 30 AND"), Err(ParseError::MissingOperand { .. })));
        assert!(matches!(
            compile("age > 30 AND OR b > 1"),
            Err(ParseError::MissingOperand { .. })
        ));
        assert!(matches!(compile("()"), Err(ParseError::MissingOperand { .. })));
        assert!(matches!(
            compile("(age > 30 OR)"),
            Err(ParseError::MissingOperand { .. })
        ));
    }

    #[test]
    fn test_incomplete_condition() {
        assert!(matches!(
            compile("age"),
            Err(ParseError::IncompleteCondition { expected: "比较操作符", .. })
        ));
        assert!(matches!(
            compile("age >"),
            Err(ParseError::IncompleteCondition { expected: "字面量", .. })
        ));
        assert!(matches!(
            compile("age 30"),
            Err(ParseError::IncompleteCondition { expected: "比较操作符", .. })
        ));
        assert!(matches!(
            compile("age > AND b > 1"),
            Err(ParseError::IncompleteCondition { expected: "字面量", .. })
        ));
    }

    #[test]
    fn test_trailing_tokens() {
        assert!(matches!(
            compile("age > 30 salary > 10"),
            Err(ParseError::UnexpectedToken { ref token, .. }) if token == "salary"
        ));
        assert!(matches!(
            compile("age > 30 (b > 1)"),
            Err(ParseError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            compile("> 30"),
            Err(ParseError::UnexpectedToken { ref token, offset: 0 }) if token == ">"
        ));
    }

    #[test]
    fn test_parse_condition_text() {
        let cond = parse_condition("name = 'Ada Lovelace'").unwrap();
        assert_eq!(cond.field(), "name");
        assert_eq!(cond.literal(), &Literal::quoted("Ada Lovelace").unwrap());

        assert!(parse_condition("a > 1 AND b > 2").is_err());
        assert!(parse_condition("(a > 1)").is_err());
        assert_eq!(parse_condition(""), Err(ParseError::Empty));
    }
}
