// Rewrite rules for the oauth object text.
//
// Each rule takes text and returns text so it can be tested on its own.
// They all go through the tokenizer, which keeps string literals opaque:
// a `?` or `!0` inside a string is never rewritten.

use indexmap::IndexMap;

use super::ExtractError;
use super::tokens::{Token, render, tokenize};

// ── Keys ─────────────────────────────────────────────────────────────

/// Quote bareword object keys: `{a:1,b:2}` → `{"a":1,"b":2}`.
///
/// Only words preceded by `{` or `,` and followed by `:` are keys.
pub fn quote_keys(text: &str) -> Result<String, ExtractError> {
    let mut tokens = tokenize(text)?;
    for i in 1..tokens.len().saturating_sub(1) {
        let is_key = (tokens[i - 1].is_punct('{') || tokens[i - 1].is_punct(','))
            && tokens[i + 1].is_punct(':');
        if let (true, Token::Word(word)) = (is_key, &tokens[i]) {
            tokens[i] = Token::Str(word.clone());
        }
    }
    Ok(render(&tokens))
}

// ── Substitution ─────────────────────────────────────────────────────

/// Replace whole identifiers by their mapped text, and `!0`/`!1` by
/// `true`/`false`.
///
/// Identifiers are matched as complete word tokens, so a mapping for
/// `e.API` leaves `e.API_URL` alone. Replacement text is tokenized, not
/// pasted, so it may be any expression the later rules understand.
pub fn substitute(text: &str, replacements: &IndexMap<String, String>) -> Result<String, ExtractError> {
    let tokens = tokenize(text)?;
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        if token.is_punct('!') {
            let literal = match iter.peek() {
                Some(Token::Word(w)) if w == "0" => Some("true"),
                Some(Token::Word(w)) if w == "1" => Some("false"),
                _ => None,
            };
            if let Some(literal) = literal {
                iter.next();
                out.push(Token::Word(literal.into()));
                continue;
            }
        }

        match token {
            Token::Word(word) => match replacements.get(&word) {
                Some(replacement) => out.extend(tokenize(replacement)?),
                None => out.push(Token::Word(word)),
            },
            other => out.push(other),
        }
    }

    Ok(render(&out))
}

// ── parseInt ─────────────────────────────────────────────────────────

/// Evaluate every `parseInt(<literal>[, <radix>])` call.
pub fn evaluate_parse_int(text: &str) -> Result<String, ExtractError> {
    let tokens = tokenize(text)?;
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let is_call = matches!(&tokens[i], Token::Word(w) if w == "parseInt")
            && tokens.get(i + 1).is_some_and(|t| t.is_punct('('));
        if !is_call {
            out.push(tokens[i].clone());
            i += 1;
            continue;
        }

        let close = tokens[i + 2..]
            .iter()
            .position(|t| t.is_punct(')'))
            .map(|p| p + i + 2)
            .ok_or_else(|| ExtractError::ParseInt {
                args: render(&tokens[i + 2..]),
            })?;
        let args = &tokens[i + 2..close];
        let value = parse_int_call(args).ok_or_else(|| ExtractError::ParseInt {
            args: render(args),
        })?;
        out.push(Token::Word(value.to_string()));
        i = close + 1;
    }

    Ok(render(&out))
}

fn literal_text(token: &Token) -> Option<&str> {
    match token {
        Token::Str(s) | Token::Word(s) => Some(s),
        Token::Punct(_) => None,
    }
}

fn parse_int_call(args: &[Token]) -> Option<i64> {
    let (input, radix) = match args {
        [value] => (literal_text(value)?, None),
        [value, comma, radix] if comma.is_punct(',') => {
            let radix: u32 = literal_text(radix)?.parse().ok()?;
            (literal_text(value)?, Some(radix))
        }
        _ => return None,
    };
    parse_int(input, radix)
}

/// Integer parsing with `parseInt`'s sign, radix and `0x` rules, but strict:
/// trailing garbage is an error rather than silently ignored.
fn parse_int(input: &str, radix: Option<u32>) -> Option<i64> {
    let input = input.trim();
    let (negative, unsigned) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };

    let hex_digits = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"));
    let (digits, radix) = match (radix, hex_digits) {
        (None | Some(16), Some(hex)) => (hex, 16),
        (None, None) => (unsigned, 10),
        (Some(r), _) if (2..=36).contains(&r) => (unsigned, r),
        _ => return None,
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

// ── String concatenation ─────────────────────────────────────────────

/// Collapse `"A"+"B"` into `"AB"`.
pub fn concat_strings(text: &str) -> Result<String, ExtractError> {
    let tokens = tokenize(text)?;
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if let Token::Str(first) = &tokens[i] {
            let mut joined = first.clone();
            while let (Some(plus), Some(Token::Str(next))) = (tokens.get(i + 1), tokens.get(i + 2)) {
                if !plus.is_punct('+') {
                    break;
                }
                joined.push_str(next);
                i += 2;
            }
            out.push(Token::Str(joined));
        } else {
            out.push(tokens[i].clone());
        }
        i += 1;
    }

    Ok(render(&out))
}

// ── Ternaries ────────────────────────────────────────────────────────

/// Reduce `cond ? then : else` expressions until none remain.
///
/// The condition must be a single literal or word, optionally negated with
/// `!`. The outermost ternary is reduced first; the winning branch is
/// spliced in and the scan restarts.
pub fn reduce_ternaries(text: &str) -> Result<String, ExtractError> {
    let mut tokens = tokenize(text)?;

    while let Some(question) = tokens.iter().position(|t| t.is_punct('?')) {
        let (start, condition) = condition_before(&tokens, question)?;
        let colon = then_branch_end(&tokens, question)?;
        let end = else_branch_end(&tokens, colon);

        let branch = if condition {
            &tokens[question + 1..colon]
        } else {
            &tokens[colon + 1..end]
        };
        if branch.is_empty() {
            return Err(ExtractError::Ternary {
                message: format!("empty branch in {}", render(&tokens[start..end])),
            });
        }

        tokens = [&tokens[..start], branch, &tokens[end..]].concat();
    }

    Ok(render(&tokens))
}

fn is_opener(token: &Token) -> bool {
    token.is_punct('(') || token.is_punct('[') || token.is_punct('{')
}

fn is_closer(token: &Token) -> bool {
    token.is_punct(')') || token.is_punct(']') || token.is_punct('}')
}

/// Start index and truth value of the condition ending right before `question`.
fn condition_before(tokens: &[Token], question: usize) -> Result<(usize, bool), ExtractError> {
    let Some(operand) = question.checked_sub(1).map(|i| &tokens[i]) else {
        return Err(ExtractError::Ternary {
            message: "missing condition".into(),
        });
    };
    if !operand.is_primary() {
        return Err(ExtractError::Ternary {
            message: format!("unsupported condition ending in {}", render(std::slice::from_ref(operand))),
        });
    }

    let mut start = question - 1;
    let mut negations = 0_u32;
    while start > 0 && tokens[start - 1].is_punct('!') {
        start -= 1;
        negations += 1;
    }

    if let Some(before) = start.checked_sub(1).map(|i| &tokens[i]) {
        let separated = [',', ':', '?', '(', '[', '{']
            .iter()
            .any(|&c| before.is_punct(c));
        if !separated {
            return Err(ExtractError::Ternary {
                message: format!(
                    "condition is part of a larger expression: {}",
                    render(&tokens[start.saturating_sub(1)..=question])
                ),
            });
        }
    }

    let value = truthiness(operand)?;
    Ok((start, value ^ (negations % 2 == 1)))
}

fn truthiness(token: &Token) -> Result<bool, ExtractError> {
    match token {
        Token::Str(s) => Ok(!s.is_empty()),
        Token::Word(w) => match w.as_str() {
            "true" => Ok(true),
            "false" | "null" | "undefined" | "NaN" => Ok(false),
            other => other
                .parse::<f64>()
                .map(|n| n != 0.0 && !n.is_nan())
                .map_err(|_| ExtractError::UnresolvedIdentifier { name: other.into() }),
        },
        Token::Punct(c) => Err(ExtractError::Ternary {
            message: format!("unsupported condition {c:?}"),
        }),
    }
}

/// Index of the `:` closing the then-branch that starts after `question`.
fn then_branch_end(tokens: &[Token], question: usize) -> Result<usize, ExtractError> {
    let mut depth = 0_usize;
    let mut nested = 0_usize;
    for (k, token) in tokens.iter().enumerate().skip(question + 1) {
        if is_opener(token) {
            depth += 1;
        } else if is_closer(token) {
            if depth == 0 {
                break;
            }
            depth -= 1;
        } else if depth == 0 && token.is_punct('?') {
            nested += 1;
        } else if depth == 0 && token.is_punct(':') {
            if nested == 0 {
                return Ok(k);
            }
            nested -= 1;
        }
    }
    Err(ExtractError::Ternary {
        message: format!("no ':' for the '?' in {}", render(&tokens[question..])),
    })
}

/// Index one past the else-branch that starts after `colon`.
fn else_branch_end(tokens: &[Token], colon: usize) -> usize {
    let mut depth = 0_usize;
    let mut nested = 0_usize;
    for (k, token) in tokens.iter().enumerate().skip(colon + 1) {
        if is_opener(token) {
            depth += 1;
        } else if is_closer(token) {
            if depth == 0 {
                return k;
            }
            depth -= 1;
        } else if depth == 0 && token.is_punct(',') {
            return k;
        } else if depth == 0 && token.is_punct('?') {
            nested += 1;
        } else if depth == 0 && token.is_punct(':') {
            if nested == 0 {
                return k;
            }
            nested -= 1;
        }
    }
    tokens.len()
}
