//! Precedence-climbing parser producing [`Expr`] trees.

use serde_json::Value;

use super::lexer::{Token, tokenize};
use crate::ExpressionError;
use crate::expression::RESERVED_PREFIX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Coalesce,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Ident(String),
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Sequence(Vec<Expr>),
}

/// Binary operator table: precedence level, token and operator.
/// Higher levels bind tighter.
const BINARY: &[(u8, &str, BinaryOp)] = &[
    (1, "??", BinaryOp::Coalesce),
    (2, "||", BinaryOp::Or),
    (3, "&&", BinaryOp::And),
    (4, "==", BinaryOp::Eq),
    (4, "===", BinaryOp::Eq),
    (4, "!=", BinaryOp::Ne),
    (4, "!==", BinaryOp::Ne),
    (5, "<", BinaryOp::Lt),
    (5, "<=", BinaryOp::Le),
    (5, ">", BinaryOp::Gt),
    (5, ">=", BinaryOp::Ge),
    (6, "+", BinaryOp::Add),
    (6, "-", BinaryOp::Sub),
    (7, "*", BinaryOp::Mul),
    (7, "/", BinaryOp::Div),
    (7, "%", BinaryOp::Rem),
];

/// Parse an expression source string.
pub(crate) fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        end: source.len(),
    };
    let expr = parser.sequence()?;
    if let Some((token, offset)) = parser.tokens.get(parser.position) {
        return Err(ExpressionError::Syntax {
            offset: *offset,
            message: format!("unexpected token {token:?}"),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .map_or(self.end, |(_, offset)| *offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|(token, _)| token.clone());
        self.position += 1;
        token
    }

    fn at(&self, punct: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(p)) if *p == punct)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.at(punct) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), ExpressionError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected {punct:?}")))
        }
    }

    fn error(&self, message: String) -> ExpressionError {
        ExpressionError::Syntax {
            offset: self.offset(),
            message,
        }
    }

    fn sequence(&mut self) -> Result<Expr, ExpressionError> {
        let mut items = vec![self.assignment()?];
        while self.eat(";") {
            if self.peek().is_none() {
                break;
            }
            items.push(self.assignment()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Sequence(items)
        })
    }

    fn assignment(&mut self) -> Result<Expr, ExpressionError> {
        let target = self.conditional()?;
        let op = if self.eat("=") {
            AssignOp::Set
        } else if self.eat("+=") {
            AssignOp::Add
        } else if self.eat("-=") {
            AssignOp::Sub
        } else {
            return Ok(target);
        };
        if !matches!(target, Expr::Ident(_) | Expr::Member { .. }) {
            return Err(self.error("invalid assignment target".to_owned()));
        }
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr, ExpressionError> {
        let test = self.binary(1)?;
        if !self.eat("?") {
            return Ok(test);
        }
        let then = self.assignment()?;
        self.expect(":")?;
        let otherwise = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn binary(&mut self, min_level: u8) -> Result<Expr, ExpressionError> {
        let mut left = self.unary()?;
        loop {
            let Some(Token::Punct(punct)) = self.peek() else {
                break;
            };
            let Some(&(level, _, op)) = BINARY
                .iter()
                .find(|(level, token, _)| *level >= min_level && token == punct)
            else {
                break;
            };
            self.position += 1;
            let right = self.binary(level + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = if self.eat("!") {
            UnaryOp::Not
        } else if self.eat("-") {
            UnaryOp::Negate
        } else if self.eat("+") {
            UnaryOp::Plus
        } else {
            return self.postfix();
        };
        Ok(Expr::Unary {
            op,
            operand: Box::new(self.unary()?),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(".") {
                let property = match self.next() {
                    Some(Token::Ident(name)) => name,
                    _ => return Err(self.error("expected property name".to_owned())),
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(Expr::Literal(Value::String(property))),
                };
            } else if self.eat("[") {
                let property = self.assignment()?;
                self.expect("]")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(property),
                };
            } else if self.eat("(") {
                let args = self.list(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn list(&mut self, close: &str) -> Result<Vec<Expr>, ExpressionError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.assignment()?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Literal(crate::value::number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "undefined" => Ok(Expr::Literal(Value::Null)),
                _ if name.starts_with(RESERVED_PREFIX) => Err(ExpressionError::Reserved(name)),
                _ => Ok(Expr::Ident(name)),
            },
            Some(Token::Punct("(")) => {
                let inner = self.sequence()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some(Token::Punct("[")) => Ok(Expr::Array(self.list("]")?)),
            Some(Token::Punct("{")) => self.object(),
            Some(token) => Err(ExpressionError::Syntax {
                offset,
                message: format!("unexpected token {token:?}"),
            }),
            None => Err(ExpressionError::Syntax {
                offset,
                message: "unexpected end of expression".to_owned(),
            }),
        }
    }

    fn object(&mut self) -> Result<Expr, ExpressionError> {
        let mut entries = Vec::new();
        while !self.eat("}") {
            let key = match self.next() {
                Some(Token::Ident(key) | Token::Str(key)) => key,
                Some(Token::Number(n)) => crate::value::to_display(&crate::value::number(n)),
                _ => return Err(self.error("expected property key".to_owned())),
            };
            let value = if self.eat(":") {
                self.assignment()?
            } else {
                // Shorthand `{ name }`
                Expr::Ident(key.clone())
            };
            entries.push((key, value));
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_owned()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                left: ident("a"),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: ident("b"),
                    right: ident("c"),
                }),
            }
        );
    }

    #[test]
    fn test_left_associative() {
        let expr = parse("a - b - c").unwrap();
        let Expr::Binary { left, right, .. } = expr else {
            panic!("expected binary expression");
        };
        assert!(matches!(*left, Expr::Binary { .. }));
        assert_eq!(right, ident("c"));
    }

    #[test]
    fn test_member_chain_and_call() {
        let expr = parse("user.greet(name)[0]").unwrap();
        let Expr::Member { object, property } = expr else {
            panic!("expected member expression");
        };
        assert_eq!(*property, Expr::Literal(json!(0)));
        assert!(matches!(*object, Expr::Call { .. }));
    }

    #[test]
    fn test_assignment_and_sequence() {
        let expr = parse("count += 1; done = true;").unwrap();
        let Expr::Sequence(items) = expr else {
            panic!("expected sequence");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(
            items[0],
            Expr::Assign {
                op: AssignOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            parse("[1, 'a', null, { b: true, c }]").unwrap(),
            Expr::Array(vec![
                Expr::Literal(json!(1)),
                Expr::Literal(json!("a")),
                Expr::Literal(Value::Null),
                Expr::Object(vec![
                    ("b".to_owned(), Expr::Literal(json!(true))),
                    ("c".to_owned(), Expr::Ident("c".to_owned())),
                ]),
            ])
        );
    }

    #[test]
    fn test_ternary_is_right_associative() {
        let expr = parse("a ? b : c ? d : e").unwrap();
        let Expr::Conditional { otherwise, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*otherwise, Expr::Conditional { .. }));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse("a +"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("(a"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("1 = 2"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("a b"), Err(ExpressionError::Syntax { offset: 2, .. })));
    }

    #[test]
    fn test_reserved_identifier() {
        assert_eq!(
            parse("__state.x"),
            Err(ExpressionError::Reserved("__state".to_owned()))
        );
    }
}
