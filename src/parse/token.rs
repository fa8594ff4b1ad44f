//! Line lexer for the equation notation.

use super::ParseError;
use crate::store::Quarter;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(f64),
    /// Variable mnemonic (leading uppercase letter).
    Var(String),
    /// Function name (leading lowercase letter).
    Func(String),
    /// `@`-prefixed function or directive name, lowercased.
    At(String),
    /// A bare quarter literal like `1979Q4`.
    QuarterLit(Quarter),
    /// A double-quoted string, e.g. `"2005:02"`.
    Str(String),
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

pub fn lex(src: &str, line: u32) -> Result<Vec<Token>, ParseError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            ',' => {
                out.push(Token::Comma);
                i += 1;
            }
            '+' => {
                out.push(Token::Plus);
                i += 1;
            }
            '-' => {
                out.push(Token::Minus);
                i += 1;
            }
            '*' => {
                out.push(Token::Star);
                i += 1;
            }
            '/' => {
                out.push(Token::Slash);
                i += 1;
            }
            '^' => {
                out.push(Token::Caret);
                i += 1;
            }
            '=' => {
                out.push(Token::Eq);
                i += 1;
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    out.push(Token::Le);
                    i += 2;
                } else {
                    out.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    out.push(Token::Ge);
                    i += 2;
                } else {
                    out.push(Token::Gt);
                    i += 1;
                }
            }
            '"' => {
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] != b'"' {
                    j += 1;
                }
                if j == bytes.len() {
                    return Err(ParseError::Syntax { line, msg: "unterminated string".into() });
                }
                out.push(Token::Str(src[start..j].to_string()));
                i = j + 1;
            }
            '@' => {
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                    j += 1;
                }
                if j == start {
                    return Err(ParseError::Syntax { line, msg: "dangling '@'".into() });
                }
                out.push(Token::At(src[start..j].to_ascii_lowercase()));
                i = j;
            }
            _ if c.is_ascii_digit() => {
                let (tok, next) = lex_number(src, i, line)?;
                out.push(tok);
                i = next;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut j = i;
                while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
                    j += 1;
                }
                let word = &src[start..j];
                if c.is_ascii_uppercase() {
                    out.push(Token::Var(word.to_string()));
                } else {
                    out.push(Token::Func(word.to_string()));
                }
                i = j;
            }
            _ => {
                return Err(ParseError::Syntax {
                    line,
                    msg: format!("unexpected character '{c}'"),
                });
            }
        }
    }

    Ok(out)
}

/// Reads a number, or a quarter literal of the form `YYYYQn`.
fn lex_number(src: &str, start: usize, line: u32) -> Result<(Token, usize), ParseError> {
    let bytes = src.as_bytes();
    let mut j = start;
    while j < bytes.len() && bytes[j].is_ascii_digit() {
        j += 1;
    }

    // Quarter literal: exactly four digits, 'Q', one digit, no trailing word.
    if j - start == 4
        && matches!(bytes.get(j), Some(b'Q') | Some(b'q'))
        && bytes.get(j + 1).is_some_and(|b| b.is_ascii_digit())
        && !bytes.get(j + 2).is_some_and(|b| b.is_ascii_alphanumeric())
    {
        let lit = &src[start..j + 2];
        let quarter = lit
            .parse::<Quarter>()
            .map_err(|_| ParseError::Syntax { line, msg: format!("bad quarter '{lit}'") })?;
        return Ok((Token::QuarterLit(quarter), j + 2));
    }

    if j < bytes.len() && bytes[j] == b'.' {
        j += 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
    }
    if j < bytes.len() && (bytes[j] == b'e' || bytes[j] == b'E') {
        let mut k = j + 1;
        if k < bytes.len() && (bytes[k] == b'+' || bytes[k] == b'-') {
            k += 1;
        }
        if k < bytes.len() && bytes[k].is_ascii_digit() {
            j = k;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
        }
    }

    let text = &src[start..j];
    let value = text
        .parse::<f64>()
        .map_err(|_| ParseError::Syntax { line, msg: format!("bad number '{text}'") })?;
    Ok((Token::Num(value), j))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_operators_and_names() {
        let toks = lex("GDPM = CONS + 0.5 * IF(-1)", 1).unwrap();
        assert_eq!(
            toks,
            vec![
                Token::Var("GDPM".into()),
                Token::Eq,
                Token::Var("CONS".into()),
                Token::Plus,
                Token::Num(0.5),
                Token::Star,
                Token::Var("IF".into()),
                Token::LParen,
                Token::Minus,
                Token::Num(1.0),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn lexes_functions_and_at_names() {
        let toks = lex("dlog(CONS) + @trend(1979Q4)", 3).unwrap();
        assert_eq!(toks[0], Token::Func("dlog".into()));
        assert_eq!(toks[5], Token::At("trend".into()));
        assert_eq!(toks[7], Token::QuarterLit("1979Q4".parse().unwrap()));
    }

    #[test]
    fn mixed_case_names_are_variables() {
        let toks = lex("DIPHHmf", 1).unwrap();
        assert_eq!(toks, vec![Token::Var("DIPHHmf".into())]);
    }

    #[test]
    fn quarter_literal_needs_exact_shape() {
        // Five leading digits is a number followed by a variable.
        let toks = lex("19790Q4", 1).unwrap();
        assert_eq!(toks[0], Token::Num(19790.0));
        // Exponent notation still lexes as a number.
        let toks = lex("1e-6", 1).unwrap();
        assert_eq!(toks, vec![Token::Num(1e-6)]);
    }

    #[test]
    fn strings_and_comparisons() {
        let toks = lex("@recode(@date >= @dateval(\"2005:02\"), 1, 0)", 1).unwrap();
        assert!(toks.contains(&Token::Ge));
        assert!(toks.contains(&Token::Str("2005:02".into())));
    }

    #[test]
    fn rejects_garbage() {
        assert!(lex("GDPM = #", 7).is_err());
        assert!(lex("\"open", 7).is_err());
    }
}
