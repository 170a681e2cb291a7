//! Pure integer arithmetic evaluator (spec.md §4.5). Operates on text
//! that has already had every label identifier substituted with its
//! decimal address by [`crate::symbol::SymbolTable::eval_expr`] — this
//! module only ever sees numbers, parens and operators.
//!
//! `asm.py` hands the substituted string to Python's own `eval`, which
//! for two plain integers treats `/` the same as `//` (this script
//! predates `from __future__ import division`) and gives `%` the sign
//! of the divisor. This evaluator reproduces both of those behaviors
//! rather than Rust's truncating `/`/`%`, so a port of existing gaia
//! sources keeps computing the same constants.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "expr.pest"]
struct ExprParser;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalError(pub String);

fn floor_div(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(EvalError("division by zero".to_owned()));
    }
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(EvalError("division by zero".to_owned()));
    }
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn parse_number(pair: Pair<Rule>) -> Result<i64, EvalError> {
    let text = pair.as_str();
    let inner = pair.into_inner().next().unwrap();
    let parsed = match inner.as_rule() {
        Rule::hex => i64::from_str_radix(&inner.as_str()[2..], 16),
        Rule::oct => i64::from_str_radix(&inner.as_str()[2..], 8),
        Rule::bin => i64::from_str_radix(&inner.as_str()[2..], 2),
        Rule::dec => inner.as_str().parse(),
        _ => unreachable!(),
    };
    parsed.map_err(|_| EvalError(format!("invalid integer literal: {}", text)))
}

fn eval_atom(pair: Pair<Rule>) -> Result<i64, EvalError> {
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::number => parse_number(inner),
        Rule::expr => eval_expr(inner),
        _ => unreachable!(),
    }
}

fn eval_unary(pair: Pair<Rule>) -> Result<i64, EvalError> {
    let mut ops = Vec::new();
    let mut value = 0i64;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::neg | Rule::pos | Rule::inv => ops.push(p.as_rule()),
            Rule::atom => value = eval_atom(p)?,
            _ => unreachable!(),
        }
    }
    for op in ops.into_iter().rev() {
        value = match op {
            Rule::neg => value.wrapping_neg(),
            Rule::pos => value,
            Rule::inv => !value,
            _ => unreachable!(),
        };
    }
    Ok(value)
}

/// Left-associative fold over a `level ~ (op ~ level)*` shaped pair,
/// used identically for every binary-precedence rule in the grammar.
fn eval_binary_level(
    pair: Pair<Rule>,
    eval_operand: fn(Pair<Rule>) -> Result<i64, EvalError>,
) -> Result<i64, EvalError> {
    let mut pairs = pair.into_inner();
    let mut acc = eval_operand(pairs.next().unwrap())?;
    let mut op_rule = None;
    for p in pairs {
        match p.as_rule() {
            Rule::mul
            | Rule::floordiv
            | Rule::div
            | Rule::modulo
            | Rule::add
            | Rule::sub
            | Rule::shl
            | Rule::shr
            | Rule::bitand
            | Rule::bitxor
            | Rule::bitor => op_rule = Some(p.as_rule()),
            _ => {
                let rhs = eval_operand(p)?;
                acc = apply_binary(op_rule.take().unwrap(), acc, rhs)?;
            }
        }
    }
    Ok(acc)
}

fn apply_binary(op: Rule, lhs: i64, rhs: i64) -> Result<i64, EvalError> {
    Ok(match op {
        Rule::mul => lhs.wrapping_mul(rhs),
        Rule::div | Rule::floordiv => floor_div(lhs, rhs)?,
        Rule::modulo => floor_mod(lhs, rhs)?,
        Rule::add => lhs.wrapping_add(rhs),
        Rule::sub => lhs.wrapping_sub(rhs),
        Rule::shl => lhs.wrapping_shl(rhs as u32),
        Rule::shr => lhs.wrapping_shr(rhs as u32),
        Rule::bitand => lhs & rhs,
        Rule::bitxor => lhs ^ rhs,
        Rule::bitor => lhs | rhs,
        _ => unreachable!(),
    })
}

fn eval_muldiv(pair: Pair<Rule>) -> Result<i64, EvalError> {
    eval_binary_level(pair, eval_unary)
}

fn eval_addsub(pair: Pair<Rule>) -> Result<i64, EvalError> {
    eval_binary_level(pair, eval_muldiv)
}

fn eval_shift(pair: Pair<Rule>) -> Result<i64, EvalError> {
    eval_binary_level(pair, eval_addsub)
}

fn eval_band(pair: Pair<Rule>) -> Result<i64, EvalError> {
    eval_binary_level(pair, eval_shift)
}

fn eval_bxor(pair: Pair<Rule>) -> Result<i64, EvalError> {
    eval_binary_level(pair, eval_band)
}

fn eval_expr(pair: Pair<Rule>) -> Result<i64, EvalError> {
    eval_binary_level(pair, eval_bxor)
}

/// Evaluate a pure integer arithmetic expression with no identifiers.
pub fn eval(text: &str) -> Result<i64, EvalError> {
    let mut parsed = ExprParser::parse(Rule::program, text)
        .map_err(|err| EvalError(format!("eval error: {} ({})", text, err)))?;
    let expr_pair = parsed
        .next()
        .unwrap()
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| EvalError(format!("eval error: {}", text)))?;
    eval_expr(expr_pair)
}
