//! Tokenizer for the artifact/action tag grammar.
//!
//! Only `boltArtifact` and `boltAction` tags are tokens. Everything else in
//! the response is text and is never tokenized, so file contents may contain
//! arbitrary markup. Every token carries its byte span in the source so the
//! parser can slice raw bodies back out.

use std::ops::Range;

/// Tag names recognized by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagName {
    Artifact,
    Action,
}

impl TagName {
    const ALL: [TagName; 2] = [TagName::Artifact, TagName::Action];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Artifact => "boltArtifact",
            Self::Action => "boltAction",
        }
    }
}

/// An attribute of an open tag. `value` is `None` for valueless, unquoted or
/// unterminated attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub value: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Open {
        name: TagName,
        attributes: Vec<Attribute<'a>>,
        span: Range<usize>,
    },
    Close {
        name: TagName,
        span: Range<usize>,
    },
}

impl<'a> Token<'a> {
    pub fn span(&self) -> &Range<usize> {
        match self {
            Self::Open { span, .. } | Self::Close { span, .. } => span,
        }
    }

    pub fn is_close(&self, tag: TagName) -> bool {
        matches!(self, Self::Close { name, .. } if *name == tag)
    }
}

/// Look up the value of the first attribute called `name`.
pub fn attribute<'a>(attributes: &[Attribute<'a>], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name == name)
        .and_then(|a| a.value)
}

/// Split `input` into open and close tag tokens, in source order.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(offset) = input[pos..].find('<') {
        let start = pos + offset;
        let rest = &input[start + 1..];

        if let Some(after_slash) = rest.strip_prefix('/') {
            if let Some((name, len)) = match_name(after_slash) {
                let tail = &after_slash[len..];
                let trimmed = tail.trim_start();
                if trimmed.starts_with('>') {
                    let end = start + 2 + len + (tail.len() - trimmed.len()) + 1;
                    tokens.push(Token::Close {
                        name,
                        span: start..end,
                    });
                    pos = end;
                    continue;
                }
            }
        } else if let Some((name, len)) = match_name(rest) {
            let tail = &rest[len..];
            match tail.find('>') {
                Some(close) => {
                    let end = start + 1 + len + close + 1;
                    tokens.push(Token::Open {
                        name,
                        attributes: parse_attributes(&tail[..close]),
                        span: start..end,
                    });
                    pos = end;
                    continue;
                }
                // No '>' left anywhere, so no complete tag can follow
                None => break,
            }
        }

        pos = start + 1;
    }

    tokens
}

fn match_name(s: &str) -> Option<(TagName, usize)> {
    TagName::ALL.into_iter().find_map(|tag| {
        let name = tag.as_str();
        let rest = s.strip_prefix(name)?;
        match rest.chars().next() {
            Some(c) if c.is_whitespace() || c == '/' || c == '>' => Some((tag, name.len())),
            _ => None,
        }
    })
}

fn parse_attributes(inner: &str) -> Vec<Attribute<'_>> {
    let mut attributes = Vec::new();
    let mut rest = inner;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
        if rest.is_empty() {
            break;
        }

        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        if name_len == 0 {
            // Stray '='
            rest = &rest[1..];
            continue;
        }

        let name = &rest[..name_len];
        rest = rest[name_len..].trim_start();

        let Some(after_eq) = rest.strip_prefix('=') else {
            attributes.push(Attribute { name, value: None });
            continue;
        };
        rest = after_eq.trim_start();

        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &rest[1..];
                match body.find(quote) {
                    Some(end) => {
                        attributes.push(Attribute {
                            name,
                            value: Some(&body[..end]),
                        });
                        rest = &body[end + 1..];
                    }
                    None => {
                        attributes.push(Attribute { name, value: None });
                        break;
                    }
                }
            }
            _ => {
                let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
                attributes.push(Attribute { name, value: None });
                rest = &rest[len..];
            }
        }
    }

    attributes
}
