// Tokenizer for the JavaScript subset found in the bundle's config object.
//
// Three token kinds are enough: string literals (decoded), words
// (identifiers, member chains like `e.API_URL`, numbers, keywords) and
// single punctuation characters. Rendering emits JSON-compatible text:
// strings are re-encoded with JSON escapes, whitespace is dropped except
// between two adjacent words. A template literal is only accepted when it
// has no `${...}` interpolation.

use super::ExtractError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Str(String),
    Word(String),
    Punct(char),
}

impl Token {
    pub(crate) fn is_punct(&self, c: char) -> bool {
        matches!(self, Self::Punct(p) if *p == c)
    }

    /// String literal or word: something a ternary condition can be.
    pub(crate) fn is_primary(&self) -> bool {
        matches!(self, Self::Str(_) | Self::Word(_))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.')
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, ExtractError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        if matches!(c, '"' | '\'' | '`') {
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, ch)) = chars.next() {
                if ch == c {
                    closed = true;
                    break;
                }
                if c == '`' && ch == '$' && chars.peek().is_some_and(|&(_, n)| n == '{') {
                    return Err(ExtractError::TemplateLiteral { offset });
                }
                if ch != '\\' {
                    value.push(ch);
                    continue;
                }
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    'b' => value.push('\u{8}'),
                    'f' => value.push('\u{c}'),
                    'v' => value.push('\u{b}'),
                    '0' => value.push('\0'),
                    'x' => {
                        let hex: String = (0..2).filter_map(|_| chars.next().map(|(_, h)| h)).collect();
                        value.push(decode_hex(&hex, offset)?);
                    }
                    'u' => {
                        let hex: String = if chars.peek().is_some_and(|&(_, h)| h == '{') {
                            chars.next();
                            chars
                                .by_ref()
                                .map(|(_, h)| h)
                                .take_while(|&h| h != '}')
                                .collect()
                        } else {
                            (0..4).filter_map(|_| chars.next().map(|(_, h)| h)).collect()
                        };
                        value.push(decode_hex(&hex, offset)?);
                    }
                    // Line continuation.
                    '\n' => {}
                    other => value.push(other),
                }
            }
            if !closed {
                return Err(ExtractError::UnterminatedString { offset });
            }
            tokens.push(Token::Str(value));
            continue;
        }

        if is_word_char(c) {
            let mut word = String::from(c);
            while let Some(&(_, next)) = chars.peek() {
                if !is_word_char(next) {
                    break;
                }
                word.push(next);
                chars.next();
            }
            tokens.push(Token::Word(word));
            continue;
        }

        tokens.push(Token::Punct(c));
    }

    Ok(tokens)
}

fn decode_hex(hex: &str, offset: usize) -> Result<char, ExtractError> {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or(ExtractError::UnterminatedString { offset })
}

pub(crate) fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut previous_was_word = false;
    for token in tokens {
        match token {
            Token::Str(s) => {
                out.push_str(&serde_json::Value::String(s.clone()).to_string());
                previous_was_word = false;
            }
            Token::Word(w) => {
                if previous_was_word {
                    out.push(' ');
                }
                out.push_str(w);
                previous_was_word = true;
            }
            Token::Punct(c) => {
                out.push(*c);
                previous_was_word = false;
            }
        }
    }
    out
}
