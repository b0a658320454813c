//! Arithmetic language of tie expressions.
//!
//! Tie expressions are ordinary infix arithmetic over numbers and parameter names:
//! `+ - * /`, exponentiation with `**` (or `^`), unary signs, parentheses and a
//! handful of functions (`abs`, `min`, `max`, `pow`, `sqrt`, `exp`, `log`).
//! Exponentiation is right-associative and binds tighter than a leading minus, so
//! `-2**2` is `-4`.

use logos::Logos;
use std::fmt;
use thiserror::Error;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum Token<'src> {
    #[regex(r"([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'src str),
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("**")]
    #[token("^")]
    Pow,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Pow => f.write_str("**"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("Expression is empty")]
    Empty,
    #[error("Invalid character sequence '{text}' at offset {offset}")]
    InvalidToken { text: String, offset: usize },
    #[error("Unexpected token '{found}' at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Function '{name}' expects {expected} argument(s), found {found}")]
    Arity {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Unknown name '{0}'")]
    UnknownName(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Expression produced a non-finite value")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Min,
    Max,
    Pow,
    Sqrt,
    Exp,
    Log,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "abs" => Some(Self::Abs),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "pow" => Some(Self::Pow),
            "sqrt" => Some(Self::Sqrt),
            "exp" => Some(Self::Exp),
            "log" => Some(Self::Log),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Pow => "pow",
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
            Self::Log => "log",
        }
    }

    /// `None` means variadic with at least one argument.
    fn arity(self) -> Option<usize> {
        match self {
            Self::Min | Self::Max => None,
            Self::Pow => Some(2),
            Self::Abs | Self::Sqrt | Self::Exp | Self::Log => Some(1),
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Self::Abs => args[0].abs(),
            Self::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Pow => args[0].powf(args[1]),
            Self::Sqrt => args[0].sqrt(),
            Self::Exp => args[0].exp(),
            Self::Log => args[0].ln(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Name(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let mut tokens = Vec::new();
        let mut lexer = Token::lexer(source);
        while let Some(token) = lexer.next() {
            match token {
                Ok(token) => tokens.push((token, lexer.span().start)),
                Err(()) => {
                    return Err(ExprError::InvalidToken {
                        text: lexer.slice().to_string(),
                        offset: lexer.span().start,
                    });
                }
            }
        }
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }

        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expression()?;
        if let Some((token, offset)) = parser.peek() {
            return Err(ExprError::UnexpectedToken {
                found: token.to_string(),
                offset,
            });
        }
        Ok(expr)
    }

    /// Names referenced by the expression, in order of first appearance.
    pub fn names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Name(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expr::Neg(inner) => inner.collect_names(names),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_names(names);
                rhs.collect_names(names);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_names(names);
                }
            }
        }
    }

    pub fn eval(&self, lookup: &impl Fn(&str) -> Option<f64>) -> Result<f64, ExprError> {
        let value = match self {
            Expr::Number(n) => *n,
            Expr::Name(name) => lookup(name).ok_or_else(|| ExprError::UnknownName(name.clone()))?,
            Expr::Neg(inner) => -inner.eval(lookup)?,
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(lookup)?;
                let r = rhs.eval(lookup)?;
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => {
                        if r == 0.0 {
                            return Err(ExprError::DivisionByZero);
                        }
                        l / r
                    }
                    BinaryOp::Pow => l.powf(r),
                }
            }
            Expr::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(lookup))
                    .collect::<Result<Vec<_>, _>>()?;
                function.apply(&values)
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ExprError::NonFinite)
        }
    }
}

struct Parser<'src> {
    tokens: Vec<(Token<'src>, usize)>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<(Token<'src>, usize)> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<(Token<'src>, usize)> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: Token<'src>) -> bool {
        if matches!(self.peek(), Some((token, _)) if token == expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token<'src>) -> Result<(), ExprError> {
        match self.advance() {
            Some((token, _)) if token == expected => Ok(()),
            Some((token, offset)) => Err(ExprError::UnexpectedToken {
                found: token.to_string(),
                offset,
            }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat(Token::Plus) {
                BinaryOp::Add
            } else if self.eat(Token::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(Token::Star) {
                BinaryOp::Mul
            } else if self.eat(Token::Slash) {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat(Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.atom()?;
        if self.eat(Token::Pow) {
            let exponent = self.unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some((Token::Number(n), _)) => Ok(Expr::Number(n)),
            Some((Token::Ident(name), _)) => {
                if self.eat(Token::LParen) {
                    self.call(name)
                } else {
                    Ok(Expr::Name(name.to_string()))
                }
            }
            Some((Token::LParen, _)) => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some((token, offset)) => Err(ExprError::UnexpectedToken {
                found: token.to_string(),
                offset,
            }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn call(&mut self, name: &str) -> Result<Expr, ExprError> {
        let function =
            Function::from_name(name).ok_or_else(|| ExprError::UnknownFunction(name.to_string()))?;

        let mut args = Vec::new();
        if !self.eat(Token::RParen) {
            loop {
                args.push(self.expression()?);
                if self.eat(Token::Comma) {
                    continue;
                }
                self.expect(Token::RParen)?;
                break;
            }
        }

        let arity_ok = match function.arity() {
            Some(n) => args.len() == n,
            None => !args.is_empty(),
        };
        if !arity_ok {
            return Err(ExprError::Arity {
                name: function.name(),
                expected: function.arity().unwrap_or(1),
                found: args.len(),
            });
        }
        Ok(Expr::Call { function, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_with(source: &str, vars: &[(&str, f64)]) -> Result<f64, ExprError> {
        let expr = Expr::parse(source)?;
        expr.eval(&|name| vars.iter().find(|(n, _)| *n == name).map(|(_, v)| *v))
    }

    fn eval(source: &str) -> f64 {
        eval_with(source, &[]).unwrap()
    }

    #[test]
    fn operator_precedence_follows_arithmetic_rules() {
        assert_eq!(eval("1 + 2 * 3"), 7.0);
        assert_eq!(eval("(1 + 2) * 3"), 9.0);
        assert_eq!(eval("10 - 4 - 3"), 3.0);
        assert_eq!(eval("8 / 4 / 2"), 1.0);
    }

    #[test]
    fn exponentiation_is_right_associative_and_binds_tighter_than_negation() {
        assert_eq!(eval("2 ** 3 ** 2"), 512.0);
        assert_eq!(eval("-2 ** 2"), -4.0);
        assert_eq!(eval("2 ^ -1"), 0.5);
    }

    #[test]
    fn scientific_notation_and_leading_dot_numbers_are_accepted() {
        assert_eq!(eval("1e-3 * 1000"), 1.0);
        assert_eq!(eval(".5 + 0.5"), 1.0);
        assert_eq!(eval("2.5E2"), 250.0);
    }

    #[test]
    fn names_are_resolved_through_lookup() {
        let value = eval_with("2*FF1", &[("FF1", 0.45)]).unwrap();
        assert!((value - 0.9).abs() < 1e-12);
        let value = eval_with("-FF1 + FF10", &[("FF1", 1.0), ("FF10", 3.0)]).unwrap();
        assert_eq!(value, 2.0);
    }

    #[test]
    fn functions_are_evaluated() {
        assert_eq!(eval("abs(-3)"), 3.0);
        assert_eq!(eval("min(4, 2, 8)"), 2.0);
        assert_eq!(eval("max(4, 2, 8)"), 8.0);
        assert_eq!(eval("pow(2, 10)"), 1024.0);
        assert_eq!(eval("sqrt(16)"), 4.0);
        assert!((eval("log(exp(1.5))") - 1.5).abs() < 1e-12);
    }

    #[test]
    fn names_lists_each_reference_once() {
        let expr = Expr::parse("FF1 * (FF2 + FF1) / max(FF3, 1)").unwrap();
        assert_eq!(expr.names(), vec!["FF1", "FF2", "FF3"]);
    }

    #[test]
    fn unknown_name_fails_evaluation() {
        assert_eq!(
            eval_with("2*FF9", &[("FF1", 1.0)]),
            Err(ExprError::UnknownName("FF9".to_string()))
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(eval_with("1 / (FF1 - FF1)", &[("FF1", 2.0)]), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn non_finite_results_are_errors() {
        assert_eq!(eval_with("sqrt(-1)", &[]), Err(ExprError::NonFinite));
        assert_eq!(eval_with("log(0)", &[]), Err(ExprError::NonFinite));
    }

    #[test]
    fn malformed_expressions_fail_to_parse() {
        assert_eq!(Expr::parse(""), Err(ExprError::Empty));
        assert_eq!(Expr::parse("2 *"), Err(ExprError::UnexpectedEnd));
        assert!(matches!(
            Expr::parse("2 3"),
            Err(ExprError::UnexpectedToken { offset: 2, .. })
        ));
        assert!(matches!(
            Expr::parse("(1 + 2"),
            Err(ExprError::UnexpectedEnd)
        ));
        assert!(matches!(
            Expr::parse("2 $ 3"),
            Err(ExprError::InvalidToken { offset: 2, .. })
        ));
    }

    #[test]
    fn function_calls_are_validated() {
        assert_eq!(
            Expr::parse("cosh(1)"),
            Err(ExprError::UnknownFunction("cosh".to_string()))
        );
        assert_eq!(
            Expr::parse("pow(1)"),
            Err(ExprError::Arity {
                name: "pow",
                expected: 2,
                found: 1
            })
        );
        assert!(matches!(Expr::parse("max()"), Err(ExprError::Arity { .. })));
    }
}
