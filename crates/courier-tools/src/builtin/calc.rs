// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::schema_for;
use crate::tool::{Tool, ToolCall, ToolOutput};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
struct CalcParams {
    /// An arithmetic expression using +, -, *, /, and parentheses
    expr: String,
}

/// A small four-function calculator tool, used for multi-tool turn demos
/// and tests alongside [`crate::builtin::search::SearchTool`].
pub struct CalcTool;

#[async_trait]
impl Tool for CalcTool {
    fn name(&self) -> &str {
        "calc"
    }

    fn description(&self) -> &str {
        "Evaluate a simple arithmetic expression (+, -, *, /, parentheses)."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<CalcParams>()
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let expr = match call.args.get("expr").and_then(|v| v.as_str()) {
            Some(e) => e,
            None => return ToolOutput::err(&call.id, "missing 'expr'"),
        };
        match eval(expr) {
            Ok(n) => ToolOutput::ok(&call.id, format_number(n)),
            Err(e) => ToolOutput::err(&call.id, format!("invalid expression: {e}")),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn eval(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut pos = 0;
    let value = parse_expr(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(format!("unexpected trailing tokens at {pos}"));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(s: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => { i += 1; }
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num = num_str.parse::<f64>().map_err(|_| format!("bad number '{num_str}'"))?;
                tokens.push(Token::Num(num));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    let mut value = parse_term(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Plus) => { *pos += 1; value += parse_term(tokens, pos)?; }
            Some(Token::Minus) => { *pos += 1; value -= parse_term(tokens, pos)?; }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_term(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    let mut value = parse_factor(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Token::Star) => { *pos += 1; value *= parse_factor(tokens, pos)?; }
            Some(Token::Slash) => {
                *pos += 1;
                let rhs = parse_factor(tokens, pos)?;
                if rhs == 0.0 {
                    return Err("division by zero".into());
                }
                value /= rhs;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_factor(tokens: &[Token], pos: &mut usize) -> Result<f64, String> {
    match tokens.get(*pos) {
        Some(Token::Num(n)) => { *pos += 1; Ok(*n) }
        Some(Token::Minus) => { *pos += 1; Ok(-parse_factor(tokens, pos)?) }
        Some(Token::LParen) => {
            *pos += 1;
            let value = parse_expr(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Token::RParen) => { *pos += 1; Ok(value) }
                _ => Err("expected closing parenthesis".into()),
            }
        }
        other => Err(format!("unexpected token {other:?}")),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
