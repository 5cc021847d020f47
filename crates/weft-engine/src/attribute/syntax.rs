//! Attribute-name grammar.
//!
//! ```text
//! PREFIX NAME ([TAG])? (.MODIFIER)*
//! NAME     = {escaped} | chars up to '[' or '.'
//! MODIFIER = key | key[value]
//! ```

/// A `key` or `key[value]` modifier, raw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modifier {
    pub key: String,
    /// Text inside the brackets, `None` when the modifier has none.
    pub raw: Option<String>,
}

/// Structure of an attribute name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSyntax {
    /// Name following the prefix, with `{}` escaping removed.
    pub name: String,
    pub tag: Option<String>,
    pub modifiers: Vec<Modifier>,
}

impl AttributeSyntax {
    /// Parse an attribute name against a directive prefix.
    ///
    /// Returns `None` when the attribute does not start with `prefix` or when
    /// brackets are unbalanced.
    ///
    /// # Example
    ///
    /// ```
    /// use weft_engine::AttributeSyntax;
    ///
    /// let syntax = AttributeSyntax::parse("@click[outside].throttle[200ms].once", "@").unwrap();
    /// assert_eq!(syntax.name, "click");
    /// assert_eq!(syntax.tag.as_deref(), Some("outside"));
    /// assert_eq!(syntax.modifiers[0].key, "throttle");
    /// assert_eq!(syntax.modifiers[0].raw.as_deref(), Some("200ms"));
    /// assert_eq!(syntax.modifiers[1].raw, None);
    /// ```
    #[must_use]
    pub fn parse(attribute: &str, prefix: &str) -> Option<Self> {
        let rest = attribute.strip_prefix(prefix)?;

        let (name, mut rest) = if let Some(escaped) = rest.strip_prefix('{') {
            let end = escaped.find('}')?;
            (escaped[..end].to_owned(), &escaped[end + 1..])
        } else {
            let end = rest.find(['[', '.']).unwrap_or(rest.len());
            (rest[..end].to_owned(), &rest[end..])
        };

        let mut tag = None;
        if let Some(inner) = rest.strip_prefix('[') {
            let (value, tail) = bracketed(inner)?;
            tag = Some(value.to_owned());
            rest = tail;
        }

        let mut modifiers = Vec::new();
        while let Some(inner) = rest.strip_prefix('.') {
            let end = inner.find(['[', '.']).unwrap_or(inner.len());
            let key = inner[..end].to_owned();
            rest = &inner[end..];
            let raw = if let Some(inner) = rest.strip_prefix('[') {
                let (value, tail) = bracketed(inner)?;
                rest = tail;
                Some(value.to_owned())
            } else {
                None
            };
            if key.is_empty() {
                return None;
            }
            modifiers.push(Modifier { key, raw });
        }

        if !rest.is_empty() {
            return None;
        }

        Some(Self {
            name,
            tag,
            modifiers,
        })
    }

    /// Raw value of a modifier: `None` when absent, `Some(None)` when present
    /// without brackets.
    #[must_use]
    pub fn modifier(&self, key: &str) -> Option<Option<&str>> {
        self.modifiers
            .iter()
            .find(|modifier| modifier.key == key)
            .map(|modifier| modifier.raw.as_deref())
    }
}

/// Split `value]tail` at the matching bracket, allowing nested brackets.
fn bracketed(input: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (index, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' if depth == 0 => return Some((&input[..index], &input[index + 1..])),
            ']' => depth -= 1,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn modifier(key: &str, raw: Option<&str>) -> Modifier {
        Modifier {
            key: key.to_owned(),
            raw: raw.map(str::to_owned),
        }
    }

    #[test]
    fn test_literal_prefix_has_empty_name() {
        let syntax = AttributeSyntax::parse("*for.key[x]", "*for").unwrap();
        assert_eq!(syntax.name, "");
        assert_eq!(syntax.tag, None);
        assert_eq!(syntax.modifiers, vec![modifier("key", Some("x"))]);
    }

    #[test]
    fn test_name_tag_and_modifiers() {
        let syntax = AttributeSyntax::parse(":class[dark].camel.prop", ":").unwrap();
        assert_eq!(syntax.name, "class");
        assert_eq!(syntax.tag.as_deref(), Some("dark"));
        assert_eq!(
            syntax.modifiers,
            vec![modifier("camel", None), modifier("prop", None)]
        );
    }

    #[test]
    fn test_escaped_name() {
        let syntax = AttributeSyntax::parse("@{update:value}.once", "@").unwrap();
        assert_eq!(syntax.name, "update:value");
        assert_eq!(syntax.modifiers, vec![modifier("once", None)]);
    }

    #[test]
    fn test_nested_brackets_in_modifier() {
        let syntax = AttributeSyntax::parse("@key.keys[a[0]]", "@").unwrap();
        assert_eq!(syntax.modifiers, vec![modifier("keys", Some("a[0]"))]);
    }

    #[test]
    fn test_invalid_syntax() {
        assert_eq!(AttributeSyntax::parse("x-if", "*"), None);
        assert_eq!(AttributeSyntax::parse("@{open", "@"), None);
        assert_eq!(AttributeSyntax::parse("@click[open", "@"), None);
        assert_eq!(AttributeSyntax::parse("@click..once", "@"), None);
        assert_eq!(AttributeSyntax::parse("@click[a]b", "@"), None);
    }

    #[test]
    fn test_modifier_lookup() {
        let syntax = AttributeSyntax::parse("@click.once.debounce[1s]", "@").unwrap();
        assert_eq!(syntax.modifier("once"), Some(None));
        assert_eq!(syntax.modifier("debounce"), Some(Some("1s")));
        assert_eq!(syntax.modifier("passive"), None);
    }
}
