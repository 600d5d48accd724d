//! The test-expression evaluator for conditional directives.
// Copyright (C) 2024  Frankie Baffa
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use {
    crate::{
        context::{
            is_truthy,
            FlatContext,
        },
        error::{
            Error,
            Result,
        },
    },
    serde_json::Value as JsonValue,
};

const SPACE: char = ' ';
const TAB: char = '\t';

/// Evaluate a directive test expression against a flattened context.
///
/// An empty expression is the constant `true`. Identifiers resolve
/// against the flattened context and nothing else; the expression has no
/// call or assignment syntax and cannot mutate the context.
///
/// # Examples
///
/// ```rust
/// use sigil_core::{Context, evaluate};
///
/// let mut ctx = Context::new();
/// ctx.set("env", "prod");
/// assert!(evaluate("env = 'prod'", &ctx.flatten()).unwrap());
/// ```
pub
fn evaluate<S: AsRef<str>>(expression: S, context: &FlatContext) -> Result<bool> {
    let raw = expression.as_ref();
    if raw.trim().is_empty() {
        return Ok(true);
    }

    let normalized = normalize_equality(raw);
    let mut scanner = Scanner::new(&normalized, raw);
    let value = scanner.or_chain(context)?;
    scanner.trim_start();
    if !scanner.eof() {
        return Err(scanner.illegal("Unexpected trailing input"));
    }

    Ok(is_truthy(&value))
}

/// Double every `=` whose neighbors are not `=`, so `a = b` reads as an
/// equality test. Neighbors are taken from the original text, left to
/// right, which keeps the scan from revisiting sequences it already
/// produced.
fn normalize_equality(expression: &str) -> String {
    let chars = expression.chars().collect::<Vec<char>>();
    let mut out = String::with_capacity(expression.len() + 2);

    for (idx, c) in chars.iter().enumerate() {
        out.push(*c);
        if *c == '='
            && (idx == 0 || chars[idx - 1] != '=')
            && chars.get(idx + 1) != Some(&'=')
        {
            out.push('=');
        }
    }

    out
}

enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$')
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    raw: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str, raw: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            raw,
        }
    }

    fn pos(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.pos().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.pos().starts_with(token) {
            self.pos += token.len();
            return true;
        }

        false
    }

    fn trim_start(&mut self) {
        while self.pos().starts_with(SPACE) || self.pos().starts_with(TAB) {
            self.pos += 1;
        }
    }

    fn illegal<S: AsRef<str>>(&self, detail: S) -> Error {
        Error::Evaluation(
            format!("{} at position {}", detail.as_ref(), self.pos + 1),
            self.raw.to_owned(),
        )
    }

    fn or_chain(&mut self, ctx: &FlatContext) -> Result<JsonValue> {
        let mut value = self.and_chain(ctx)?;

        loop {
            self.trim_start();
            if !self.eat("||") {
                break;
            }

            let rhs = self.and_chain(ctx)?;
            value = JsonValue::Bool(is_truthy(&value) || is_truthy(&rhs));
        }

        Ok(value)
    }

    fn and_chain(&mut self, ctx: &FlatContext) -> Result<JsonValue> {
        let mut value = self.comparison(ctx)?;

        loop {
            self.trim_start();
            if !self.eat("&&") {
                break;
            }

            let rhs = self.comparison(ctx)?;
            value = JsonValue::Bool(is_truthy(&value) && is_truthy(&rhs));
        }

        Ok(value)
    }

    // the scanner accepts the !==/<==/>== shapes the equality
    // normalization can produce and reads them as their two-character
    // operators
    fn comparison(&mut self, ctx: &FlatContext) -> Result<JsonValue> {
        let lhs = self.unary(ctx)?;
        self.trim_start();

        let op = if self.eat("==") {
            while self.eat("=") {}
            Some(Op::Eq)
        }
        else if self.eat("!=") {
            while self.eat("=") {}
            Some(Op::Ne)
        }
        else if self.eat("<=") {
            while self.eat("=") {}
            Some(Op::Le)
        }
        else if self.eat(">=") {
            while self.eat("=") {}
            Some(Op::Ge)
        }
        else if self.eat("<") {
            Some(Op::Lt)
        }
        else if self.eat(">") {
            Some(Op::Gt)
        }
        else {
            None
        };

        match op {
            None => Ok(lhs),
            Some(op) => {
                let rhs = self.unary(ctx)?;
                self.compare(op, &lhs, &rhs).map(JsonValue::Bool)
            },
        }
    }

    fn unary(&mut self, ctx: &FlatContext) -> Result<JsonValue> {
        self.trim_start();

        if self.pos().starts_with('!') {
            self.bump();
            let value = self.unary(ctx)?;
            return Ok(JsonValue::Bool(!is_truthy(&value)));
        }

        self.primary(ctx)
    }

    fn primary(&mut self, ctx: &FlatContext) -> Result<JsonValue> {
        self.trim_start();

        if self.eat("(") {
            let value = self.or_chain(ctx)?;
            self.trim_start();
            if !self.eat(")") {
                return Err(self.illegal("Unterminated group"));
            }

            return Ok(value);
        }

        match self.peek() {
            Some(q) if q == '\'' || q == '"' => {
                self.bump();
                let mut literal = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == q => break,
                        Some(c) => literal.push(c),
                        None => return Err(self.illegal("Unterminated string literal")),
                    }
                }

                Ok(JsonValue::String(literal))
            },
            Some(c) if c.is_ascii_digit() || c == '-' => {
                let mut number = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() || c == '.' || c == '-' {
                        number.push(c);
                        self.bump();
                    }
                    else {
                        break;
                    }
                }

                let parsed = number.parse::<f64>()
                    .map_err(|_| self.illegal("Malformed number"))?;

                Ok(JsonValue::from(parsed))
            },
            Some(c) if is_identifier_char(c) => {
                let mut name = String::new();
                while let Some(c) = self.peek() {
                    if is_identifier_char(c) {
                        name.push(c);
                        self.bump();
                    }
                    else {
                        break;
                    }
                }

                match name.as_str() {
                    "true" => Ok(JsonValue::Bool(true)),
                    "false" => Ok(JsonValue::Bool(false)),
                    "null" => Ok(JsonValue::Null),
                    _ => Ok(ctx.get(&name).cloned().unwrap_or(JsonValue::Null)),
                }
            },
            _ => Err(self.illegal("Expected a value")),
        }
    }

    fn compare(&self, op: Op, lhs: &JsonValue, rhs: &JsonValue) -> Result<bool> {
        match op {
            Op::Eq => Ok(loose_eq(lhs, rhs)),
            Op::Ne => Ok(!loose_eq(lhs, rhs)),
            op => {
                let ordering = if let (Some(a), Some(b)) = (numeric(lhs), numeric(rhs)) {
                    a.partial_cmp(&b)
                }
                else if let (JsonValue::String(a), JsonValue::String(b)) = (lhs, rhs) {
                    Some(a.cmp(b))
                }
                else {
                    return Err(Error::Evaluation(
                        format!("Cannot compare {lhs} to {rhs}"),
                        self.raw.to_owned(),
                    ));
                };

                let Some(ordering) = ordering else {
                    return Ok(false);
                };

                Ok(match op {
                    Op::Lt => ordering.is_lt(),
                    Op::Le => ordering.is_le(),
                    Op::Gt => ordering.is_gt(),
                    Op::Ge => ordering.is_ge(),
                    Op::Eq | Op::Ne => unreachable!("handled above"),
                })
            },
        }
    }
}

fn loose_eq(lhs: &JsonValue, rhs: &JsonValue) -> bool {
    match (lhs, rhs) {
        (JsonValue::Null, JsonValue::Null) => true,
        (JsonValue::String(a), JsonValue::String(b)) => a == b,
        (JsonValue::Bool(a), JsonValue::Bool(b)) => a == b,
        _ => match (numeric(lhs), numeric(rhs)) {
            (Some(a), Some(b)) => a == b,
            _ => lhs == rhs,
        },
    }
}

fn numeric(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
