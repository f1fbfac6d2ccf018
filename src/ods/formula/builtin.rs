//! A small OpenFormula evaluator.
//!
//! Covers what spreadsheets commonly carry in data sheets: arithmetic,
//! comparison and concatenation operators, references to cells and ranges of
//! the same sheet, and a handful of aggregate, logical and text functions.
//!
//! # Formula Syntax
//!
//! - References: `[.A1]`, `[.A1:.B3]`, `A1`, `$A$1`, `A1:B3`
//! - Operators: `+ - * / ^ & = <> < <= > >=`, unary `-`/`+`, postfix `%`
//! - Separators: `;` (OpenFormula) or `,`
//!
//! References to other sheets are not supported and fail the evaluation.

use super::{CellAddress, CellSource, CellValue, Evaluation, ExpressionEvaluator};
use crate::common::FormulaError;
use crate::ods::datatype;
use phf::{Set, phf_set};

/// Functions understood by [`BuiltinEvaluator`].
static FUNCTIONS: Set<&'static str> = phf_set! {
    "SUM", "AVERAGE", "MIN", "MAX", "COUNT", "COUNTA",
    "ABS", "ROUND", "INT", "MOD", "SQRT",
    "IF", "AND", "OR", "NOT", "TRUE", "FALSE",
    "CONCATENATE", "LEN", "UPPER", "LOWER",
};

/// Largest magnitude returned as an integer (2^53).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Longest accepted column part of a reference (`XFD` is the widest sheet).
const MAX_COLUMN_LETTERS: usize = 3;

/// Deepest accepted nesting of parentheses, calls and prefix/postfix operators.
pub const MAX_FORMULA_NESTING: usize = 64;

// ============================================================================
// TOKENS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Ref(CellAddress),
    Range(CellAddress, CellAddress),
    Function(String),
    Name(String),
    Op(Op),
    LParen,
    RParen,
    Separator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Percent,
}

fn eval_error(message: impl Into<String>) -> FormulaError {
    FormulaError::Evaluation(message.into())
}

struct Tokenizer<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            position: 0,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, FormulaError> {
        // Skip leading '=' (ODF formulas start with it)
        if self.peek() == Some(b'=') {
            self.advance();
        }

        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(ch) = self.peek() else {
                break;
            };
            let token = match ch {
                b'(' => self.single(Token::LParen),
                b')' => self.single(Token::RParen),
                b';' | b',' => self.single(Token::Separator),
                b'+' => self.single(Token::Op(Op::Add)),
                b'-' => self.single(Token::Op(Op::Sub)),
                b'*' => self.single(Token::Op(Op::Mul)),
                b'/' => self.single(Token::Op(Op::Div)),
                b'^' => self.single(Token::Op(Op::Pow)),
                b'&' => self.single(Token::Op(Op::Concat)),
                b'%' => self.single(Token::Op(Op::Percent)),
                b'=' => self.single(Token::Op(Op::Eq)),
                b'<' => {
                    self.advance();
                    match self.peek() {
                        Some(b'>') => self.single(Token::Op(Op::Ne)),
                        Some(b'=') => self.single(Token::Op(Op::Le)),
                        _ => Token::Op(Op::Lt),
                    }
                },
                b'>' => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.single(Token::Op(Op::Ge))
                    } else {
                        Token::Op(Op::Gt)
                    }
                },
                b'"' => self.parse_string()?,
                b'0'..=b'9' | b'.' => self.parse_number()?,
                b'[' => self.parse_bracketed_ref()?,
                b'$' | b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.parse_identifier_or_ref()?,
                _ => {
                    return Err(eval_error(format!(
                        "unexpected character '{}' in formula",
                        ch as char
                    )));
                },
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    /// String literal; `""` is an escaped quote.
    fn parse_string(&mut self) -> Result<Token, FormulaError> {
        self.advance(); // opening quote
        let mut bytes = Vec::new();
        loop {
            let rest = &self.input[self.position..];
            let end = memchr::memchr(b'"', rest)
                .ok_or_else(|| eval_error("unterminated string literal"))?;
            bytes.extend_from_slice(&rest[..end]);
            self.position += end + 1;
            if self.peek() == Some(b'"') {
                bytes.push(b'"');
                self.advance();
            } else {
                break;
            }
        }
        String::from_utf8(bytes)
            .map(Token::Text)
            .map_err(|_| eval_error("invalid UTF-8 in string literal"))
    }

    fn parse_number(&mut self) -> Result<Token, FormulaError> {
        let start = self.position;
        self.skip_digits();
        if self.peek() == Some(b'.') {
            self.advance();
            self.skip_digits();
        }
        if let Some(b'e' | b'E') = self.peek() {
            self.advance();
            if let Some(b'+' | b'-') = self.peek() {
                self.advance();
            }
            self.skip_digits();
        }

        let text = std::str::from_utf8(&self.input[start..self.position])
            .map_err(|_| eval_error("invalid number"))?;
        datatype::parse_real(text)
            .map(Token::Number)
            .ok_or_else(|| eval_error(format!("invalid number: {}", text)))
    }

    /// `[.A1]`, `[.A1:.B2]`, `[$.A1]`; anything naming a sheet is rejected.
    fn parse_bracketed_ref(&mut self) -> Result<Token, FormulaError> {
        self.advance(); // '['
        let close = memchr::memchr(b']', &self.input[self.position..])
            .ok_or_else(|| eval_error("unterminated reference"))?;
        let body = &self.input[self.position..self.position + close];
        self.position += close + 1;

        let body = std::str::from_utf8(body).map_err(|_| eval_error("invalid reference"))?;
        let (first, last) = match body.split_once(':') {
            Some((first, last)) => (first, Some(last)),
            None => (body, None),
        };
        let first = Self::sheet_local(first)?;
        match last {
            Some(last) => Ok(Token::Range(first, Self::sheet_local(last)?)),
            None => Ok(Token::Ref(first)),
        }
    }

    fn sheet_local(part: &str) -> Result<CellAddress, FormulaError> {
        let part = part.strip_prefix('$').unwrap_or(part);
        let cell = part.strip_prefix('.').ok_or_else(|| {
            eval_error(format!("references to other sheets are not supported: {}", part))
        })?;
        parse_cell(cell).ok_or_else(|| eval_error(format!("invalid cell reference: {}", cell)))
    }

    /// Function name, `TRUE`/`FALSE`, or a bare `A1` / `A1:B2` reference.
    fn parse_identifier_or_ref(&mut self) -> Result<Token, FormulaError> {
        let start = self.position;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'$' || ch == b'.' {
                self.advance();
            } else {
                break;
            }
        }
        let ident = std::str::from_utf8(&self.input[start..self.position])
            .map_err(|_| eval_error("invalid identifier"))?;

        let save = self.position;
        self.skip_whitespace();
        if self.peek() == Some(b'(') {
            return Ok(Token::Function(ident.to_ascii_uppercase()));
        }
        self.position = save;

        if let Some(first) = parse_cell(ident) {
            if self.peek() == Some(b':') {
                self.advance();
                let start = self.position;
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_alphanumeric() || ch == b'$' {
                        self.advance();
                    } else {
                        break;
                    }
                }
                let last = std::str::from_utf8(&self.input[start..self.position])
                    .ok()
                    .and_then(parse_cell)
                    .ok_or_else(|| eval_error("invalid range reference"))?;
                return Ok(Token::Range(first, last));
            }
            return Ok(Token::Ref(first));
        }
        if ident.contains('.') {
            return Err(eval_error(format!(
                "references to other sheets are not supported: {}",
                ident
            )));
        }
        Ok(Token::Name(ident.to_ascii_uppercase()))
    }

    fn skip_digits(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }
}

/// Parse `A1` / `$A$1` into a zero-based address.
fn parse_cell(text: &str) -> Option<CellAddress> {
    let bytes = text.as_bytes();
    let mut i = 0;
    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }
    let letters_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters = &bytes[letters_start..i];
    if letters.is_empty() || letters.len() > MAX_COLUMN_LETTERS {
        return None;
    }
    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }
    let digits = &bytes[i..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let column = letters
        .iter()
        .fold(0usize, |acc, c| acc * 26 + usize::from(c.to_ascii_uppercase() - b'A' + 1))
        - 1;
    let row: usize = std::str::from_utf8(digits).ok()?.parse().ok()?;
    Some(CellAddress::new(row.checked_sub(1)?, column))
}

// ============================================================================
// SYNTAX TREE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Text(String),
    Ref(CellAddress),
    Range(CellAddress, CellAddress),
    Negate(Box<Expr>),
    Percent(Box<Expr>),
    /// Left-associative run of operators of one precedence level.
    Chain(Box<Expr>, Vec<(Op, Expr)>),
    Call(String, Vec<Expr>),
}

/// Recursive descent, lowest precedence first:
/// comparison, `&`, `+ -`, `* /`, `^`, unary, postfix `%`, primary.
struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn parse(tokens: Vec<Token>) -> Result<Expr, FormulaError> {
        if tokens.is_empty() {
            return Err(eval_error("empty formula"));
        }
        let mut parser = Parser {
            tokens,
            position: 0,
            depth: 0,
        };
        let expr = parser.comparison()?;
        if parser.position < parser.tokens.len() {
            return Err(eval_error(format!(
                "unexpected {:?} in formula",
                parser.tokens[parser.position]
            )));
        }
        Ok(expr)
    }

    fn peek_op(&self) -> Option<Op> {
        match self.tokens.get(self.position) {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    /// Enter one nesting level; errors once [`MAX_FORMULA_NESTING`] is reached.
    fn descend(&mut self) -> Result<(), FormulaError> {
        if self.depth >= MAX_FORMULA_NESTING {
            return Err(FormulaError::TooDeep(MAX_FORMULA_NESTING));
        }
        self.depth += 1;
        Ok(())
    }

    fn binary_level(
        &mut self,
        ops: &[Op],
        next: fn(&mut Self) -> Result<Expr, FormulaError>,
    ) -> Result<Expr, FormulaError> {
        let first = next(self)?;
        let mut rest = Vec::new();
        while let Some(op) = self.peek_op().filter(|op| ops.contains(op)) {
            self.position += 1;
            rest.push((op, next(self)?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Chain(Box::new(first), rest))
        }
    }

    fn comparison(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&[Op::Eq, Op::Ne, Op::Lt, Op::Le, Op::Gt, Op::Ge], Self::concat)
    }

    fn concat(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&[Op::Concat], Self::additive)
    }

    fn additive(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&[Op::Add, Op::Sub], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&[Op::Mul, Op::Div], Self::power)
    }

    fn power(&mut self) -> Result<Expr, FormulaError> {
        self.binary_level(&[Op::Pow], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        match self.peek_op() {
            Some(Op::Sub) => {
                self.position += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(Expr::Negate(Box::new(inner)))
            },
            Some(Op::Add) => {
                self.position += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(inner)
            },
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, FormulaError> {
        let mut expr = self.primary()?;
        let entered = self.depth;
        while self.peek_op() == Some(Op::Percent) {
            self.position += 1;
            self.descend()?;
            expr = Expr::Percent(Box::new(expr));
        }
        self.depth = entered;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or_else(|| eval_error("unexpected end of formula"))?;
        self.position += 1;
        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Text(s) => Ok(Expr::Text(s)),
            Token::Ref(a) => Ok(Expr::Ref(a)),
            Token::Range(a, b) => Ok(Expr::Range(a, b)),
            Token::Name(name) => match name.as_str() {
                "TRUE" => Ok(Expr::Number(1.0)),
                "FALSE" => Ok(Expr::Number(0.0)),
                _ => Err(eval_error(format!("unknown name {}", name))),
            },
            Token::Function(name) => self.call(name),
            Token::LParen => {
                self.descend()?;
                let expr = self.comparison()?;
                self.depth -= 1;
                self.expect(Token::RParen)?;
                Ok(expr)
            },
            other => Err(eval_error(format!("unexpected {:?} in formula", other))),
        }
    }

    fn call(&mut self, name: String) -> Result<Expr, FormulaError> {
        if !FUNCTIONS.contains(name.as_str()) {
            return Err(eval_error(format!("unsupported function {}", name)));
        }
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if self.tokens.get(self.position) == Some(&Token::RParen) {
            self.position += 1;
            return Ok(Expr::Call(name, args));
        }
        self.descend()?;
        loop {
            args.push(self.comparison()?);
            match self.tokens.get(self.position) {
                Some(Token::Separator) => self.position += 1,
                Some(Token::RParen) => {
                    self.position += 1;
                    break;
                },
                _ => return Err(eval_error(format!("expected ')' after arguments of {}", name))),
            }
        }
        self.depth -= 1;
        Ok(Expr::Call(name, args))
    }

    fn expect(&mut self, token: Token) -> Result<(), FormulaError> {
        if self.tokens.get(self.position) == Some(&token) {
            self.position += 1;
            Ok(())
        } else {
            Err(eval_error(format!("expected {:?}", token)))
        }
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Empty,
    Number(f64),
    Text(String),
    Range(Vec<Vec<CellValue>>),
}

impl From<CellValue> for Value {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => Value::Empty,
            CellValue::Number(n) => Value::Number(n),
            CellValue::Text(s) => Value::Text(s),
        }
    }
}

impl Value {
    /// A single-cell range reads as its cell.
    fn scalar(self) -> Result<Value, FormulaError> {
        match self {
            Value::Range(mut rows) => {
                if rows.len() == 1 && rows[0].len() == 1 {
                    Ok(rows.remove(0).remove(0).into())
                } else {
                    Err(eval_error("range used where a single value is expected"))
                }
            },
            other => Ok(other),
        }
    }

    fn number(self) -> Result<f64, FormulaError> {
        match self.scalar()? {
            Value::Empty => Ok(0.0),
            Value::Number(n) => Ok(n),
            Value::Text(s) => datatype::parse_real(s.trim())
                .ok_or_else(|| eval_error(format!("#VALUE! '{}' is not a number", s))),
            Value::Range(_) => Err(eval_error("range used where a number is expected")),
        }
    }

    fn text(self) -> Result<String, FormulaError> {
        match self.scalar()? {
            Value::Empty => Ok(String::new()),
            Value::Number(n) => Ok(datatype::format_real(n)),
            Value::Text(s) => Ok(s),
            Value::Range(_) => Err(eval_error("range used where text is expected")),
        }
    }

    fn truth(self) -> Result<bool, FormulaError> {
        match self.scalar()? {
            Value::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
            Value::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
            other => Ok(other.number()? != 0.0),
        }
    }
}

fn boolean(b: bool) -> Value {
    Value::Number(if b { 1.0 } else { 0.0 })
}

struct Context<'c> {
    cells: &'c mut dyn CellSource,
}

impl Context<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value, FormulaError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Text(s) => Ok(Value::Text(s.clone())),
            Expr::Ref(a) => Ok(self.cells.read_cell(*a)?.into()),
            Expr::Range(a, b) => Ok(Value::Range(self.cells.read_range(*a, *b)?)),
            Expr::Negate(inner) => Ok(Value::Number(-self.eval(inner)?.number()?)),
            Expr::Percent(inner) => Ok(Value::Number(self.eval(inner)?.number()? / 100.0)),
            Expr::Chain(first, rest) => {
                let mut value = self.eval(first)?;
                for (op, operand) in rest {
                    let right = self.eval(operand)?;
                    value = self.binary(*op, value, right)?;
                }
                Ok(value)
            },
            Expr::Call(name, args) => self.call(name, args),
        }
    }

    fn binary(&mut self, op: Op, left: Value, right: Value) -> Result<Value, FormulaError> {
        let value = match op {
            Op::Add => Value::Number(left.number()? + right.number()?),
            Op::Sub => Value::Number(left.number()? - right.number()?),
            Op::Mul => Value::Number(left.number()? * right.number()?),
            Op::Div => {
                let divisor = right.number()?;
                if divisor == 0.0 {
                    return Err(eval_error("#DIV/0!"));
                }
                Value::Number(left.number()? / divisor)
            },
            Op::Pow => Value::Number(left.number()?.powf(right.number()?)),
            Op::Concat => Value::Text(left.text()? + &right.text()?),
            Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                let ordering = compare(left.scalar()?, right.scalar()?);
                boolean(match op {
                    Op::Eq => ordering.is_eq(),
                    Op::Ne => ordering.is_ne(),
                    Op::Lt => ordering.is_lt(),
                    Op::Le => ordering.is_le(),
                    Op::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                })
            },
            Op::Percent => return Err(eval_error("'%' is not a binary operator")),
        };
        Ok(value)
    }

    /// Numbers found in the arguments; text and empty cells inside ranges
    /// are skipped, scalar arguments must be numeric.
    fn numbers(&mut self, args: &[Expr]) -> Result<Vec<f64>, FormulaError> {
        let mut out = Vec::new();
        for arg in args {
            match self.eval(arg)? {
                Value::Range(rows) => {
                    out.extend(rows.into_iter().flatten().filter_map(|v| match v {
                        CellValue::Number(n) => Some(n),
                        _ => None,
                    }))
                },
                Value::Empty => {},
                other => out.push(other.number()?),
            }
        }
        Ok(out)
    }

    fn arg(&mut self, name: &str, args: &[Expr], index: usize) -> Result<Value, FormulaError> {
        let expr = args
            .get(index)
            .ok_or_else(|| eval_error(format!("{} expects at least {} argument(s)", name, index + 1)))?;
        self.eval(expr)
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Value, FormulaError> {
        let value = match name {
            "SUM" => Value::Number(self.numbers(args)?.iter().sum()),
            "AVERAGE" => {
                let values = self.numbers(args)?;
                if values.is_empty() {
                    return Err(eval_error("#DIV/0!"));
                }
                Value::Number(values.iter().sum::<f64>() / values.len() as f64)
            },
            "MIN" => Value::Number(self.numbers(args)?.into_iter().reduce(f64::min).unwrap_or(0.0)),
            "MAX" => Value::Number(self.numbers(args)?.into_iter().reduce(f64::max).unwrap_or(0.0)),
            "COUNT" => Value::Number(self.numbers(args)?.len() as f64),
            "COUNTA" => {
                let mut count = 0usize;
                for arg in args {
                    count += match self.eval(arg)? {
                        Value::Range(rows) => rows
                            .iter()
                            .flatten()
                            .filter(|v| **v != CellValue::Empty)
                            .count(),
                        Value::Empty => 0,
                        _ => 1,
                    };
                }
                Value::Number(count as f64)
            },
            "ABS" => Value::Number(self.arg(name, args, 0)?.number()?.abs()),
            "INT" => Value::Number(self.arg(name, args, 0)?.number()?.floor()),
            "SQRT" => {
                let n = self.arg(name, args, 0)?.number()?;
                if n < 0.0 {
                    return Err(eval_error("#NUM! square root of a negative number"));
                }
                Value::Number(n.sqrt())
            },
            "ROUND" => {
                let n = self.arg(name, args, 0)?.number()?;
                let digits = match args.get(1) {
                    Some(expr) => self.eval(expr)?.number()?.trunc() as i32,
                    None => 0,
                };
                let scale = 10f64.powi(digits);
                Value::Number((n * scale).round() / scale)
            },
            "MOD" => {
                let n = self.arg(name, args, 0)?.number()?;
                let d = self.arg(name, args, 1)?.number()?;
                if d == 0.0 {
                    return Err(eval_error("#DIV/0!"));
                }
                Value::Number(n - d * (n / d).floor())
            },
            "IF" => {
                if self.arg(name, args, 0)?.truth()? {
                    match args.get(1) {
                        Some(expr) => self.eval(expr)?,
                        None => boolean(true),
                    }
                } else {
                    match args.get(2) {
                        Some(expr) => self.eval(expr)?,
                        None => boolean(false),
                    }
                }
            },
            "AND" | "OR" => {
                let mut truths = Vec::with_capacity(args.len());
                for arg in args {
                    truths.push(self.eval(arg)?.truth()?);
                }
                if truths.is_empty() {
                    return Err(eval_error(format!("{} expects at least 1 argument(s)", name)));
                }
                boolean(if name == "AND" {
                    truths.iter().all(|t| *t)
                } else {
                    truths.iter().any(|t| *t)
                })
            },
            "NOT" => boolean(!self.arg(name, args, 0)?.truth()?),
            "TRUE" => boolean(true),
            "FALSE" => boolean(false),
            "CONCATENATE" => {
                let mut out = String::new();
                for arg in args {
                    out.push_str(&self.eval(arg)?.text()?);
                }
                Value::Text(out)
            },
            "LEN" => Value::Number(self.arg(name, args, 0)?.text()?.chars().count() as f64),
            "UPPER" => Value::Text(self.arg(name, args, 0)?.text()?.to_uppercase()),
            "LOWER" => Value::Text(self.arg(name, args, 0)?.text()?.to_lowercase()),
            _ => return Err(eval_error(format!("unsupported function {}", name))),
        };
        Ok(value)
    }
}

/// Spreadsheet ordering: empty < numbers < text, text case-insensitive.
fn compare(left: Value, right: Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    fn rank(v: &Value) -> u8 {
        match v {
            Value::Number(_) | Value::Empty => 0,
            Value::Text(_) | Value::Range(_) => 1,
        }
    }

    match (&left, &right) {
        (Value::Text(a), Value::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Value::Empty, Value::Text(b)) => "".cmp(b.as_str()),
        (Value::Text(a), Value::Empty) => a.as_str().cmp(""),
        _ if rank(&left) != rank(&right) => rank(&left).cmp(&rank(&right)),
        _ => {
            let a = if let Value::Number(n) = left { n } else { 0.0 };
            let b = if let Value::Number(n) = right { n } else { 0.0 };
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        },
    }
}

/// Evaluator for a useful subset of OpenFormula.
///
/// # Examples
///
/// ```
/// use odstab::ods::formula::{BuiltinEvaluator, CellAddress, CellSource, CellValue, Evaluation, ExpressionEvaluator};
/// use odstab::common::FormulaError;
///
/// struct NoCells;
/// impl CellSource for NoCells {
///     fn read_range(&mut self, a: CellAddress, _: CellAddress) -> Result<Vec<Vec<CellValue>>, FormulaError> {
///         Err(FormulaError::OutOfRange(a.to_string()))
///     }
/// }
///
/// let evaluator = BuiltinEvaluator::new();
/// assert_eq!(evaluator.evaluate("=1+2*3", &mut NoCells).unwrap(), Evaluation::Integer(7));
/// assert_eq!(evaluator.evaluate("=\"a\"&\"b\"", &mut NoCells).unwrap(), Evaluation::Text("ab".into()));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEvaluator;

impl BuiltinEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for BuiltinEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        cells: &mut dyn CellSource,
    ) -> Result<Evaluation, FormulaError> {
        let tokens = Tokenizer::new(expression).tokenize()?;
        let expr = Parser::parse(tokens)?;
        let value = Context { cells }.eval(&expr)?;

        let value = match value {
            Value::Range(rows) if !(rows.len() == 1 && rows[0].len() == 1) => {
                let width = rows.first().map_or(0, Vec::len);
                return Ok(Evaluation::NonConstant(format!(
                    "range of {}x{} cells",
                    rows.len(),
                    width
                )));
            },
            other => other.scalar()?,
        };
        Ok(match value {
            Value::Empty => Evaluation::Empty,
            Value::Text(s) => Evaluation::Text(s),
            Value::Number(n) if !n.is_finite() => return Err(eval_error("#NUM! result is not finite")),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER => {
                Evaluation::Integer(n as i64)
            },
            Value::Number(n) => Evaluation::Real(n),
            Value::Range(_) => Evaluation::NonConstant("range".to_string()),
        })
    }
}
