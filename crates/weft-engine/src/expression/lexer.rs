//! Expression tokenizer.

use crate::ExpressionError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

/// Punctuators, longest first so that greedy matching works.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "+=", "-=", "+", "-", "*", "/", "%",
    "<", ">", "!", "=", "(", ")", "[", "]", "{", "}", ",", ".", ":", "?", ";",
];

/// Split source into tokens paired with their byte offsets.
pub(crate) fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit()
            || (c == '.' && source[offset + 1..].starts_with(|n: char| n.is_ascii_digit()))
        {
            let end = source[offset..]
                .find(|n: char| !(n.is_ascii_digit() || n == '.'))
                .map_or(source.len(), |len| offset + len);
            let text = &source[offset..end];
            let value = text.parse::<f64>().map_err(|_| ExpressionError::Syntax {
                offset,
                message: format!("invalid number {text:?}"),
            })?;
            tokens.push((Token::Number(value), offset));
            while chars.peek().is_some_and(|&(i, _)| i < end) {
                chars.next();
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let end = source[offset..]
                .find(|n: char| !(n.is_alphanumeric() || n == '_' || n == '$'))
                .map_or(source.len(), |len| offset + len);
            tokens.push((Token::Ident(source[offset..end].to_owned()), offset));
            while chars.peek().is_some_and(|&(i, _)| i < end) {
                chars.next();
            }
            continue;
        }

        if matches!(c, '"' | '\'' | '`') {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some((_, ch)) = chars.next() {
                match ch {
                    '\\' => match chars.next() {
                        Some((_, 'n')) => text.push('\n'),
                        Some((_, 't')) => text.push('\t'),
                        Some((_, escaped)) => text.push(escaped),
                        None => break,
                    },
                    ch if ch == c => {
                        closed = true;
                        break;
                    }
                    ch => text.push(ch),
                }
            }
            if !closed {
                return Err(ExpressionError::Syntax {
                    offset,
                    message: "unterminated string".to_owned(),
                });
            }
            tokens.push((Token::Str(text), offset));
            continue;
        }

        let rest = &source[offset..];
        let Some(punct) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) else {
            return Err(ExpressionError::Syntax {
                offset,
                message: format!("unexpected character {c:?}"),
            });
        };
        tokens.push((Token::Punct(*punct), offset));
        for _ in 0..punct.len() {
            chars.next();
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            kinds("a !== b && c"),
            vec![
                Token::Ident("a".to_owned()),
                Token::Punct("!=="),
                Token::Ident("b".to_owned()),
                Token::Punct("&&"),
                Token::Ident("c".to_owned()),
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers_and_strings() {
        assert_eq!(
            kinds(r#"1.5 + .5 + 'it\'s' + `x`"#),
            vec![
                Token::Number(1.5),
                Token::Punct("+"),
                Token::Number(0.5),
                Token::Punct("+"),
                Token::Str("it's".to_owned()),
                Token::Punct("+"),
                Token::Str("x".to_owned()),
            ]
        );
    }

    #[test]
    fn test_member_dot_is_not_a_number() {
        assert_eq!(
            kinds("items.length"),
            vec![
                Token::Ident("items".to_owned()),
                Token::Punct("."),
                Token::Ident("length".to_owned()),
            ]
        );
    }

    #[test]
    fn test_tokenize_errors() {
        assert!(matches!(
            tokenize("'open"),
            Err(ExpressionError::Syntax { offset: 0, .. })
        ));
        assert!(matches!(
            tokenize("a # b"),
            Err(ExpressionError::Syntax { offset: 2, .. })
        ));
        assert!(tokenize("1.2.3").is_err());
    }
}
