use std::collections::BTreeMap;
use std::sync::Arc;

use num_bigint::BigInt;

use crate::result::{Error, Result};
use crate::value::{Record, Value};

pub type ContextFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub enum ContextEntry {
    Value(Value),
    Function(ContextFn),
}

impl std::fmt::Debug for ContextEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextEntry::Value(v) => f.debug_tuple("Value").field(v).finish(),
            ContextEntry::Function(_) => f.write_str("Function(..)"),
        }
    }
}

pub type Context = BTreeMap<String, ContextEntry>;

/// Evaluation scope of one decode or encode in progress. `frames[0]` is the
/// root object, the last frame is `self`; nested templates push and pop with
/// strict stack discipline.
#[derive(Debug)]
pub struct Scope<'a> {
    ctx: &'a Context,
    frames: Vec<Record>,
    choice_prefix: Option<u64>,
}

impl<'a> Scope<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            frames: vec![],
            choice_prefix: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, record: Record) {
        self.frames.push(record);
    }

    pub fn pop(&mut self) -> Record {
        self.frames.pop().expect("scope stack underflow")
    }

    pub fn current(&self) -> &Record {
        self.frames.last().expect("empty scope")
    }

    pub fn current_mut(&mut self) -> &mut Record {
        self.frames.last_mut().expect("empty scope")
    }

    pub fn root(&self) -> &Record {
        self.frames.first().expect("empty scope")
    }

    pub fn set_prefix(&mut self, prefix: u64) {
        self.choice_prefix = Some(prefix);
    }

    pub fn prefix(&self) -> Option<u64> {
        self.choice_prefix
    }

    pub fn context(&self) -> &'a Context {
        self.ctx
    }
}

/// Read-only expression language over the scope. Identifiers resolve against
/// the context map first, then `self` fields, then `root` fields, then the
/// well-known names `prefix`, `self` and `root`.
#[derive(Debug, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn eval_boolean(&self, expr: &str, scope: &Scope<'_>) -> Result<bool> {
        match self.eval_value(expr, scope)? {
            Value::Bool(v) => Ok(v),
            other => Err(Error::ExprType {
                reason: format!("`{expr}` evaluated to {}, expected bool", other.kind_name()),
            }),
        }
    }

    /// `offset` is the byte position reported when the size is negative.
    /// Callers never pass an empty expression here.
    pub fn eval_size(&self, expr: &str, scope: &Scope<'_>, offset: usize) -> Result<usize> {
        debug_assert!(!expr.trim().is_empty(), "empty size expression");
        let value = self.eval_value(expr, scope)?;
        let size = value.to_bigint().ok_or_else(|| Error::ExprType {
            reason: format!("`{expr}` evaluated to {}, expected integer", value.kind_name()),
        })?;
        usize::try_from(&size).map_err(|_| Error::OutOfRange {
            offset,
            reason: format!("`{expr}` evaluated to {size}"),
        })
    }

    pub fn eval_value(&self, expr: &str, scope: &Scope<'_>) -> Result<Value> {
        let tokens = lex(expr)?;
        let mut parser = Parser {
            expr,
            tokens,
            pos: 0,
        };
        let ast = parser.parse(0)?;
        parser.expect_end()?;
        eval(&ast, scope)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Bang,
    AndAnd,
    OrOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn syntax(expr: &str, reason: impl Into<String>) -> Error {
    Error::ExprSyntax {
        expr: expr.to_owned(),
        reason: reason.into(),
    }
}

fn lex(expr: &str) -> Result<Vec<Token>> {
    let bytes = expr.as_bytes();
    let mut tokens = vec![];
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            b']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b'.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            b'+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            b'*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            b'/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            b'%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            b'&' if bytes.get(i + 1) == Some(&b'&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            b'&' => {
                tokens.push(Token::Amp);
                i += 1;
            }
            b'|' if bytes.get(i + 1) == Some(&b'|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            b'=' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            b'!' => {
                tokens.push(Token::Bang);
                i += 1;
            }
            b'<' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            b'<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            b'>' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            b'>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            b'\'' | b'"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end] != quote {
                    end += 1;
                }
                if end == bytes.len() {
                    return Err(syntax(expr, "unterminated string literal"));
                }
                tokens.push(Token::Str(expr[start..end].to_owned()));
                i = end + 1;
            }
            b'0' if bytes.get(i + 1) == Some(&b'x') || bytes.get(i + 1) == Some(&b'X') => {
                let start = i + 2;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_hexdigit() {
                    end += 1;
                }
                if end == start {
                    return Err(syntax(expr, "empty hex literal"));
                }
                let value = i64::from_str_radix(&expr[start..end], 16)
                    .map_err(|e| syntax(expr, e.to_string()))?;
                tokens.push(Token::Int(value));
                i = end;
            }
            b'0'..=b'9' => {
                let start = i;
                let mut end = i;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                let value: i64 = expr[start..end]
                    .parse()
                    .map_err(|e: std::num::ParseIntError| syntax(expr, e.to_string()))?;
                tokens.push(Token::Int(value));
                i = end;
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = i;
                let mut end = i;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let word = &expr[start..end];
                tokens.push(match word {
                    "and" => Token::AndAnd,
                    "or" => Token::OrOr,
                    "not" => Token::Bang,
                    _ => Token::Ident(word.to_owned()),
                });
                i = end;
            }
            other => {
                return Err(syntax(expr, format!("unexpected character `{}`", other as char)));
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Int(i64),
    Str(String),
    Bool(bool),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Mask,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

fn binding_power(token: &Token) -> Option<(BinOp, u8)> {
    Some(match token {
        Token::OrOr => (BinOp::Or, 1),
        Token::AndAnd => (BinOp::And, 2),
        Token::Eq => (BinOp::Eq, 3),
        Token::Ne => (BinOp::Ne, 3),
        Token::Lt => (BinOp::Lt, 3),
        Token::Le => (BinOp::Le, 3),
        Token::Gt => (BinOp::Gt, 3),
        Token::Ge => (BinOp::Ge, 3),
        Token::Amp => (BinOp::Mask, 4),
        Token::Plus => (BinOp::Add, 5),
        Token::Minus => (BinOp::Sub, 5),
        Token::Star => (BinOp::Mul, 6),
        Token::Slash => (BinOp::Div, 6),
        Token::Percent => (BinOp::Rem, 6),
        _ => return None,
    })
}

struct Parser<'e> {
    expr: &'e str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'e> Parser<'e> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            Some(t) => Err(syntax(self.expr, format!("expected {token:?}, found {t:?}"))),
            None => Err(syntax(self.expr, format!("expected {token:?}, found end"))),
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(syntax(self.expr, format!("trailing {t:?}"))),
        }
    }

    fn parse(&mut self, min_bp: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while let Some((op, bp)) = self.peek().and_then(binding_power) {
            if bp < min_bp {
                break;
            }
            self.next();
            let right = self.parse(bp + 1)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Bang) => {
                self.next();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::Minus) => {
                self.next();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.next();
                    match self.next() {
                        Some(Token::Ident(name)) => {
                            expr = Expr::Member(Box::new(expr), name);
                        }
                        other => {
                            return Err(syntax(
                                self.expr,
                                format!("expected member name, found {other:?}"),
                            ));
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.next();
                    let index = self.parse(0)?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Int(v)) => Ok(Expr::Int(v)),
            Some(Token::Str(v)) => Ok(Expr::Str(v)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ => {
                    if self.peek() == Some(&Token::LParen) {
                        self.next();
                        let mut args = vec![];
                        if self.peek() != Some(&Token::RParen) {
                            loop {
                                args.push(self.parse(0)?);
                                match self.peek() {
                                    Some(Token::Comma) => {
                                        self.next();
                                    }
                                    _ => break,
                                }
                            }
                        }
                        self.expect(Token::RParen)?;
                        Ok(Expr::Call(name, args))
                    } else {
                        Ok(Expr::Ident(name))
                    }
                }
            },
            Some(Token::LParen) => {
                let inner = self.parse(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(syntax(self.expr, format!("expected operand, found {other:?}"))),
        }
    }
}

fn eval(expr: &Expr, scope: &Scope<'_>) -> Result<Value> {
    match expr {
        Expr::Int(v) => Ok(Value::Int(*v)),
        Expr::Str(v) => Ok(Value::Str(v.clone())),
        Expr::Bool(v) => Ok(Value::Bool(*v)),
        Expr::Ident(name) => resolve(name, scope),
        Expr::Member(base, name) => {
            let base = eval(base, scope)?;
            match base {
                Value::Record(record) => record
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::ExprResolve { name: name.clone() }),
                other => Err(Error::ExprType {
                    reason: format!("member `{name}` on {}", other.kind_name()),
                }),
            }
        }
        Expr::Index(base, index) => {
            let base = eval(base, scope)?;
            let index = eval(index, scope)?;
            let i = index.as_int().ok_or_else(|| Error::ExprType {
                reason: format!("index of kind {}", index.kind_name()),
            })?;
            let i = usize::try_from(i).map_err(|_| Error::ExprResolve {
                name: format!("index {i}"),
            })?;
            match base {
                Value::List(items) => items.get(i).cloned().ok_or(Error::ExprResolve {
                    name: format!("index {i}"),
                }),
                Value::Bits(set) if i < set.len() => Ok(Value::Bool(set.get(i))),
                Value::Bits(_) => Err(Error::ExprResolve {
                    name: format!("index {i}"),
                }),
                other => Err(Error::ExprType {
                    reason: format!("indexing into {}", other.kind_name()),
                }),
            }
        }
        Expr::Call(name, args) => match scope.context().get(name) {
            Some(ContextEntry::Function(f)) => {
                let args: Vec<Value> = args
                    .iter()
                    .map(|a| eval(a, scope))
                    .collect::<Result<_>>()?;
                f(&args)
            }
            Some(ContextEntry::Value(_)) => Err(Error::ExprType {
                reason: format!("`{name}` is not callable"),
            }),
            None => Err(Error::ExprResolve { name: name.clone() }),
        },
        Expr::Not(inner) => match eval(inner, scope)? {
            Value::Bool(v) => Ok(Value::Bool(!v)),
            other => Err(Error::ExprType {
                reason: format!("! applied to {}", other.kind_name()),
            }),
        },
        Expr::Neg(inner) => match eval(inner, scope)? {
            Value::Int(v) => match v.checked_neg() {
                Some(n) => Ok(Value::Int(n)),
                None => Ok(Value::from_bigint(-BigInt::from(v))),
            },
            Value::BigInt(v) => Ok(Value::from_bigint(-v)),
            Value::Float(v) => Ok(Value::Float(-v)),
            other => Err(Error::ExprType {
                reason: format!("- applied to {}", other.kind_name()),
            }),
        },
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, scope),
    }
}

fn resolve(name: &str, scope: &Scope<'_>) -> Result<Value> {
    if let Some(entry) = scope.context().get(name) {
        return match entry {
            ContextEntry::Value(v) => Ok(v.clone()),
            ContextEntry::Function(_) => Err(Error::ExprType {
                reason: format!("`{name}` is a function"),
            }),
        };
    }
    if let Some(value) = scope.current().get(name) {
        return Ok(value.clone());
    }
    if let Some(value) = scope.root().get(name) {
        return Ok(value.clone());
    }
    match name {
        "prefix" => scope
            .prefix()
            .map(|p| Value::from_bigint(BigInt::from(p)))
            .ok_or_else(|| Error::ExprResolve { name: name.into() }),
        "self" => Ok(Value::Record(scope.current().clone())),
        "root" => Ok(Value::Record(scope.root().clone())),
        _ => Err(Error::ExprResolve { name: name.into() }),
    }
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, scope: &Scope<'_>) -> Result<Value> {
    match op {
        BinOp::And => {
            let left = eval(lhs, scope)?;
            match left {
                Value::Bool(false) => Ok(Value::Bool(false)),
                Value::Bool(true) => match eval(rhs, scope)? {
                    Value::Bool(v) => Ok(Value::Bool(v)),
                    other => Err(Error::ExprType {
                        reason: format!("&& on {}", other.kind_name()),
                    }),
                },
                other => Err(Error::ExprType {
                    reason: format!("&& on {}", other.kind_name()),
                }),
            }
        }
        BinOp::Or => {
            let left = eval(lhs, scope)?;
            match left {
                Value::Bool(true) => Ok(Value::Bool(true)),
                Value::Bool(false) => match eval(rhs, scope)? {
                    Value::Bool(v) => Ok(Value::Bool(v)),
                    other => Err(Error::ExprType {
                        reason: format!("|| on {}", other.kind_name()),
                    }),
                },
                other => Err(Error::ExprType {
                    reason: format!("|| on {}", other.kind_name()),
                }),
            }
        }
        BinOp::Eq | BinOp::Ne => {
            let left = eval(lhs, scope)?;
            let right = eval(rhs, scope)?;
            let equal = values_equal(&left, &right);
            Ok(Value::Bool(if op == BinOp::Eq { equal } else { !equal }))
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let left = eval(lhs, scope)?;
            let right = eval(rhs, scope)?;
            let ordering = compare_values(&left, &right)?;
            Ok(Value::Bool(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                BinOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            }))
        }
        _ => {
            let left = eval(lhs, scope)?;
            let right = eval(rhs, scope)?;
            numeric_binop(op, left, right)
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.to_bigint(), right.to_bigint()) {
        (Some(a), Some(b)) => a == b,
        _ => match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => a == b,
            _ => left == right,
        },
    }
}

fn compare_values(left: &Value, right: &Value) -> Result<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (left.to_bigint(), right.to_bigint()) {
        return Ok(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
        return a.partial_cmp(&b).ok_or(Error::ExprType {
            reason: "NaN comparison".into(),
        });
    }
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    Err(Error::ExprType {
        reason: format!("ordering {} against {}", left.kind_name(), right.kind_name()),
    })
}

fn numeric_binop(op: BinOp, left: Value, right: Value) -> Result<Value> {
    if matches!(left, Value::Float(_)) || matches!(right, Value::Float(_)) {
        let (a, b) = match (left.as_float(), right.as_float()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(Error::ExprType {
                    reason: format!(
                        "{op:?} on {} and {}",
                        left.kind_name(),
                        right.kind_name()
                    ),
                });
            }
        };
        return match op {
            BinOp::Add => Ok(Value::Float(a + b)),
            BinOp::Sub => Ok(Value::Float(a - b)),
            BinOp::Mul => Ok(Value::Float(a * b)),
            BinOp::Div => Ok(Value::Float(a / b)),
            BinOp::Rem => Ok(Value::Float(a % b)),
            _ => Err(Error::ExprType {
                reason: format!("{op:?} on float"),
            }),
        };
    }
    let (a, b) = match (left.to_bigint(), right.to_bigint()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(Error::ExprType {
                reason: format!("{op:?} on {} and {}", left.kind_name(), right.kind_name()),
            });
        }
    };
    let zero = BigInt::from(0u8);
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div if b == zero => {
            return Err(Error::ExprType {
                reason: "division by zero".into(),
            });
        }
        BinOp::Div => a / b,
        BinOp::Rem if b == zero => {
            return Err(Error::ExprType {
                reason: "modulo by zero".into(),
            });
        }
        BinOp::Rem => a % b,
        BinOp::Mask => a & b,
        _ => unreachable!("handled above"),
    };
    Ok(Value::from_bigint(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_with(record: Record) -> (Context, Record) {
        (Context::new(), record)
    }

    fn eval_str(expr: &str, ctx: &Context, record: Record) -> Result<Value> {
        let mut scope = Scope::new(ctx);
        scope.push(record);
        Evaluator.eval_value(expr, &scope)
    }

    #[test]
    fn precedence() {
        let (ctx, rec) = scope_with(Record::new("t"));
        assert_eq!(
            eval_str("1 + 2 * 3", &ctx, rec.clone()).unwrap(),
            Value::Int(7)
        );
        assert_eq!(
            eval_str("0xFF & 0x0F == 15", &ctx, rec.clone()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_str("1 < 2 && 2 < 1 || true", &ctx, rec).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn resolution_order() {
        let mut ctx = Context::new();
        ctx.insert("len".into(), ContextEntry::Value(Value::Int(99)));
        let record = Record::new("t").with("len", 5).with("other", 1);
        // context shadows self
        assert_eq!(eval_str("len", &ctx, record.clone()).unwrap(), Value::Int(99));
        assert_eq!(eval_str("other", &ctx, record).unwrap(), Value::Int(1));
    }

    #[test]
    fn navigation_and_indexing() {
        let inner = Record::new("inner").with("x", 42);
        let record = Record::new("t")
            .with("nested", inner)
            .with("items", vec![Value::Int(10), Value::Int(20)]);
        let ctx = Context::new();
        assert_eq!(eval_str("nested.x", &ctx, record.clone()).unwrap(), Value::Int(42));
        assert_eq!(eval_str("items[1]", &ctx, record).unwrap(), Value::Int(20));
    }

    #[test]
    fn context_functions() {
        let mut ctx = Context::new();
        let double: ContextFn = Arc::new(|args| Ok(Value::Int(args[0].as_int().unwrap() * 2)));
        ctx.insert("double".into(), ContextEntry::Function(double));
        assert_eq!(
            eval_str("double(21)", &ctx, Record::new("t")).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn error_kinds() {
        let ctx = Context::new();
        assert!(matches!(
            eval_str("1 +", &ctx, Record::new("t")),
            Err(Error::ExprSyntax { .. })
        ));
        assert!(matches!(
            eval_str("missing", &ctx, Record::new("t")),
            Err(Error::ExprResolve { .. })
        ));
        assert!(matches!(
            eval_str("1 / 0", &ctx, Record::new("t")),
            Err(Error::ExprType { .. })
        ));
        let mut scope = Scope::new(&ctx);
        scope.push(Record::new("t"));
        assert!(matches!(
            Evaluator.eval_boolean("1 + 1", &scope),
            Err(Error::ExprType { .. })
        ));
    }

    #[test]
    fn negative_size_rejected() {
        let ctx = Context::new();
        let mut scope = Scope::new(&ctx);
        scope.push(Record::new("t"));
        assert!(matches!(
            Evaluator.eval_size("1 - 2", &scope, 7),
            Err(Error::OutOfRange { offset: 7, .. })
        ));
        assert_eq!(Evaluator.eval_size("2 * 4", &scope, 0).unwrap(), 8);
    }
}
