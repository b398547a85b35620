//! Step parser for LLM build responses.
//!
//! A response contains zero or more artifact blocks, each holding zero or
//! more action blocks:
//!
//! ```text
//! <boltArtifact id="..." title="ArtifactTitle"> ... </boltArtifact>
//! <boltAction type="file" filePath="relative/path"> <content> </boltAction>
//! <boltAction type="shell"> <shell-command> </boltAction>
//! ```
//!
//! An artifact runs from its open tag to the first following artifact close
//! tag, and an action to the first following action close tag. Blocks do not
//! nest: a nested artifact open tag is ignored, and an action open tag inside
//! an action body is just part of the body. Anything that does not form a
//! complete block is skipped without error.
//!
//! # Example
//!
//! ```rust
//! use forge_core::{parse_build_steps, StepType};
//!
//! let steps = parse_build_steps(
//!     r#"<boltArtifact title="Demo"><boltAction type="shell">npm install</boltAction></boltArtifact>"#,
//! );
//! assert_eq!(steps[0].step_type, StepType::CreateFolder);
//! assert_eq!(steps[1].code.as_deref(), Some("npm install"));
//! ```

pub mod tokenizer;

pub use tokenizer::{attribute, tokenize, Attribute, TagName, Token};

use crate::step::{BuildStep, NewStep, StepId, StepType};

/// Title used for artifacts without a `title` attribute.
pub const UNTITLED_ARTIFACT: &str = "Untitled Artifact";

/// Number of command characters shown in a shell step description.
pub const SHELL_PREVIEW_CHARS: usize = 50;

/// Parse a response into ordered, pending build steps.
///
/// Ids start at 0 for every call, so parsing the same text twice yields
/// identical output.
pub fn parse_build_steps(response: &str) -> Vec<BuildStep> {
    let tokens = tokenize(response);
    let mut steps = Vec::new();
    let mut next_id: StepId = 0;
    let mut push = |steps: &mut Vec<BuildStep>, step: NewStep| {
        steps.push(step.into_step(next_id));
        next_id += 1;
    };

    let mut i = 0;
    while i < tokens.len() {
        let Token::Open {
            name: TagName::Artifact,
            attributes,
            ..
        } = &tokens[i]
        else {
            i += 1;
            continue;
        };

        // Without a close tag no later artifact can be complete either
        let Some(close) = find_close(&tokens, i + 1, TagName::Artifact) else {
            break;
        };

        let title = attribute(attributes, "title").unwrap_or(UNTITLED_ARTIFACT);
        push(&mut steps, artifact_step(title));

        for action in actions(response, &tokens[i + 1..close]) {
            push(&mut steps, action);
        }

        i = close + 1;
    }

    steps
}

/// Replace `\n`, `\t`, `\"` and `\'` escape sequences, then trim.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            let replacement = match chars.peek() {
                Some('n') => Some('\n'),
                Some('t') => Some('\t'),
                Some('"') => Some('"'),
                Some('\'') => Some('\''),
                _ => None,
            };
            if let Some(r) = replacement {
                out.push(r);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }

    out.trim().to_string()
}

fn find_close(tokens: &[Token<'_>], from: usize, tag: TagName) -> Option<usize> {
    tokens
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, t)| t.is_close(tag))
        .map(|(idx, _)| idx)
}

fn artifact_step(title: &str) -> NewStep {
    NewStep::new(StepType::CreateFolder, title, format!("Initialize {}", title))
}

fn actions(source: &str, tokens: &[Token<'_>]) -> Vec<NewStep> {
    let mut out = Vec::new();
    let mut k = 0;

    while k < tokens.len() {
        let Token::Open {
            name: TagName::Action,
            attributes,
            span,
        } = &tokens[k]
        else {
            k += 1;
            continue;
        };

        let Some(close) = find_close(tokens, k + 1, TagName::Action) else {
            break;
        };

        let body = &source[span.end..tokens[close].span().start];
        if let Some(step) = action_step(attributes, body) {
            out.push(step);
        }

        k = close + 1;
    }

    out
}

fn action_step(attributes: &[Attribute<'_>], body: &str) -> Option<NewStep> {
    let action_type = attribute(attributes, "type")?;
    let content = unescape(body);

    match action_type {
        "file" => {
            let path = attribute(attributes, "filePath").filter(|p| !p.is_empty())?;
            Some(
                NewStep::new(
                    StepType::CreateFile,
                    format!("Create {}", path),
                    format!("Creating file at {}", path),
                )
                .with_path(path)
                .with_code(content),
            )
        }
        "shell" => {
            let preview: String = content.chars().take(SHELL_PREVIEW_CHARS).collect();
            let ellipsis = if content.chars().count() > SHELL_PREVIEW_CHARS {
                "..."
            } else {
                ""
            };
            Some(
                NewStep::new(
                    StepType::RunScript,
                    "Run command",
                    format!("Execute shell command: {}{}", preview, ellipsis),
                )
                .with_code(content),
            )
        }
        _ => None,
    }
}
