//! Command extraction: raw text in, ordered invocation AST out.
//!
//! The extractor walks the text line by line. Inline commands consume the rest
//! of their line. Block commands consume a body up to the first unescaped
//! `>>>`; a body that reaches a line opening another known command, or the end
//! of the text, is rejected as unterminated and scanning resumes right after
//! the offending header, so a body can never swallow a later invocation.

use crate::core::command::{CommandName, CommandRequest, CommandShape};
use crate::core::grammar::{
    BLOCK_CLOSE, BLOCK_OPEN, ESCAPE, Grammar, LineToken, SourceLine, line_index_of, split_lines,
};
use serde::{Deserialize, Serialize};

/// Byte range of an invocation within the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInvocation {
    pub command: CommandName,
    /// Marker plus name, as written.
    pub token: String,
    pub argument_text: String,
    pub body: Option<String>,
    pub request: CommandRequest,
    pub span: SourceSpan,
    /// Zero-based line on which the invocation ends.
    pub anchor_line: usize,
}

impl CommandInvocation {
    pub fn name(&self) -> &'static str {
        self.command.as_str()
    }
}

/// Invocation-shaped text that could not be parsed. The offending token is
/// kept so the caller can see what did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedInvocation {
    pub token: String,
    pub message: String,
    pub span: SourceSpan,
    pub anchor_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Candidate {
    Command(CommandInvocation),
    Malformed(MalformedInvocation),
}

impl Candidate {
    pub fn token(&self) -> &str {
        match self {
            Candidate::Command(inv) => &inv.token,
            Candidate::Malformed(bad) => &bad.token,
        }
    }

    pub fn span(&self) -> SourceSpan {
        match self {
            Candidate::Command(inv) => inv.span,
            Candidate::Malformed(bad) => bad.span,
        }
    }

    pub fn anchor_line(&self) -> usize {
        match self {
            Candidate::Command(inv) => inv.anchor_line,
            Candidate::Malformed(bad) => bad.anchor_line,
        }
    }
}

enum BodyScan {
    Closed { body: String, close_at: usize },
    Interrupted { line: usize, token: String },
    Unterminated,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor {
    grammar: Grammar,
}

/// Extracts with the default `@` grammar.
pub fn extract(text: &str) -> Vec<Candidate> {
    Extractor::default().extract(text)
}

impl Extractor {
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    pub fn extract(&self, text: &str) -> Vec<Candidate> {
        let lines = split_lines(text);
        let mut out = Vec::new();
        let mut idx = 0;

        while idx < lines.len() {
            let line = lines[idx];
            let LineToken::Marker {
                marker_offset,
                name,
                rest,
                rest_offset,
            } = self.grammar.classify(&text[line.start..line.end])
            else {
                idx += 1;
                continue;
            };

            let start = line.start + marker_offset;
            let token = self.grammar.token(name);
            let Some(command) = CommandName::from_name(name) else {
                out.push(Candidate::Malformed(MalformedInvocation {
                    token,
                    message: format!("unknown command '{name}'"),
                    span: SourceSpan {
                        start,
                        end: line.end,
                    },
                    anchor_line: idx,
                }));
                idx += 1;
                continue;
            };

            idx = match command.shape() {
                CommandShape::Inline => {
                    let argument_text = rest.trim();
                    let span = SourceSpan {
                        start,
                        end: line.end,
                    };
                    out.push(
                        match CommandRequest::parse(command, argument_text, None) {
                            Ok(request) => Candidate::Command(CommandInvocation {
                                command,
                                token,
                                argument_text: argument_text.to_string(),
                                body: None,
                                request,
                                span,
                                anchor_line: idx,
                            }),
                            Err(message) => Candidate::Malformed(MalformedInvocation {
                                token,
                                message,
                                span,
                                anchor_line: idx,
                            }),
                        },
                    );
                    idx + 1
                }
                CommandShape::Block => {
                    let header = BlockHeader {
                        command,
                        token,
                        start,
                        rest,
                        rest_at: line.start + rest_offset,
                        line_idx: idx,
                    };
                    self.extract_block(text, &lines, header, &mut out)
                }
            };
        }

        for candidate in &out {
            match candidate {
                Candidate::Command(inv) => tracing::debug!(
                    command = inv.name(),
                    start = inv.span.start,
                    end = inv.span.end,
                    "extracted invocation"
                ),
                Candidate::Malformed(bad) => tracing::debug!(
                    token = %bad.token,
                    message = %bad.message,
                    "extracted malformed invocation"
                ),
            }
        }
        out
    }

    /// Parses one block invocation and returns the index of the next line to
    /// scan.
    fn extract_block(
        &self,
        text: &str,
        lines: &[SourceLine],
        header: BlockHeader<'_>,
        out: &mut Vec<Candidate>,
    ) -> usize {
        let header_line = lines[header.line_idx];
        let malformed = |message: String, end: usize, anchor_line: usize| {
            Candidate::Malformed(MalformedInvocation {
                token: header.token.clone(),
                message,
                span: SourceSpan {
                    start: header.start,
                    end,
                },
                anchor_line,
            })
        };

        let Some(open_rel) = header.rest.find(BLOCK_OPEN) else {
            out.push(malformed(
                format!(
                    "{} needs a body: expected `{}` after the path",
                    header.command, BLOCK_OPEN
                ),
                header_line.end,
                header.line_idx,
            ));
            return header.line_idx + 1;
        };
        let argument_text = header.rest[..open_rel].trim();

        let mut body_start = header.rest_at + open_rel + BLOCK_OPEN.len();
        if text[body_start..].starts_with("\r\n") {
            body_start += 2;
        } else if text[body_start..].starts_with('\n') {
            body_start += 1;
        }

        match self.scan_body(text, lines, body_start) {
            BodyScan::Closed { body, close_at } => {
                let end = close_at + BLOCK_CLOSE.len();
                let anchor_line = line_index_of(lines, close_at);
                let span = SourceSpan {
                    start: header.start,
                    end,
                };
                out.push(
                    match CommandRequest::parse(header.command, argument_text, Some(&body)) {
                        Ok(request) => Candidate::Command(CommandInvocation {
                            command: header.command,
                            token: header.token.clone(),
                            argument_text: argument_text.to_string(),
                            body: Some(body),
                            request,
                            span,
                            anchor_line,
                        }),
                        Err(message) => malformed(message, end, anchor_line),
                    },
                );
                anchor_line + 1
            }
            BodyScan::Interrupted { line, token } => {
                out.push(malformed(
                    format!(
                        "unterminated body: `{}` on line {} starts before the closing `{}`",
                        token,
                        line + 1,
                        BLOCK_CLOSE
                    ),
                    lines[line].start,
                    header.line_idx,
                ));
                line
            }
            BodyScan::Unterminated => {
                out.push(malformed(
                    format!(
                        "unterminated body: no closing `{}` before end of text",
                        BLOCK_CLOSE
                    ),
                    header_line.end,
                    header.line_idx,
                ));
                header.line_idx + 1
            }
        }
    }

    /// Non-greedy scan for the first unescaped close delimiter.
    fn scan_body(&self, text: &str, lines: &[SourceLine], body_start: usize) -> BodyScan {
        let marker = self.grammar.marker;
        let escaped_close = format!("{ESCAPE}{BLOCK_CLOSE}");
        let mut body = String::new();
        let mut pos = body_start;
        let mut at_line_start = body_start == 0 || text[..body_start].ends_with('\n');

        while pos < text.len() {
            if at_line_start {
                at_line_start = false;
                let line = lines[line_index_of(lines, pos)];
                let content = &text[pos..line.end];
                if let Some(command) = self.grammar.starts_known_command(content) {
                    return BodyScan::Interrupted {
                        line: line_index_of(lines, pos),
                        token: self.grammar.token(command.as_str()),
                    };
                }
                let trimmed = content.trim_start_matches([' ', '\t']);
                let indent = content.len() - trimmed.len();
                if let Some(after) = trimmed.strip_prefix(ESCAPE) {
                    if after.starts_with(marker) {
                        body.push_str(&content[..indent]);
                        body.push(marker);
                        pos += indent + ESCAPE.len_utf8() + marker.len_utf8();
                        continue;
                    }
                }
            }

            let rest = &text[pos..];
            if rest.starts_with(escaped_close.as_str()) {
                body.push_str(BLOCK_CLOSE);
                pos += escaped_close.len();
                continue;
            }
            if rest.starts_with(BLOCK_CLOSE) {
                return BodyScan::Closed {
                    body,
                    close_at: pos,
                };
            }
            let Some(ch) = rest.chars().next() else {
                break;
            };
            body.push(ch);
            pos += ch.len_utf8();
            if ch == '\n' {
                at_line_start = true;
            }
        }
        BodyScan::Unterminated
    }
}

struct BlockHeader<'a> {
    command: CommandName,
    token: String,
    start: usize,
    rest: &'a str,
    /// Absolute offset of `rest`.
    rest_at: usize,
    line_idx: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::WriteMode;

    fn commands(candidates: &[Candidate]) -> Vec<&CommandInvocation> {
        candidates
            .iter()
            .filter_map(|c| match c {
                Candidate::Command(inv) => Some(inv),
                Candidate::Malformed(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_plain_text_has_no_candidates() {
        assert!(extract("hello\nno commands here, email a@b.c\n").is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_inline_invocation_span() {
        let text = "Let me look.\n@read-file path=/notes.md\nDone.";
        let out = extract(text);
        assert_eq!(out.len(), 1);
        let inv = commands(&out)[0];
        assert_eq!(inv.command, CommandName::ReadFile);
        assert_eq!(&text[inv.span.start..inv.span.end], "@read-file path=/notes.md");
        assert_eq!(inv.anchor_line, 1);
    }

    #[test]
    fn test_block_body_excludes_delimiter_newline() {
        let text = "@create-file a.txt <<<\nhello\nworld\n>>>\nafter";
        let out = extract(text);
        let inv = commands(&out)[0];
        assert_eq!(inv.body.as_deref(), Some("hello\nworld\n"));
        assert_eq!(inv.anchor_line, 3);
        assert_eq!(
            inv.request,
            CommandRequest::Write {
                path: "a.txt".to_string(),
                content: "hello\nworld\n".to_string(),
                mode: WriteMode::Create
            }
        );
        assert_eq!(&text[inv.span.end..], "\nafter");
    }

    #[test]
    fn test_single_line_block() {
        let out = extract("@append-file log.txt <<<entry>>> trailing words");
        let inv = commands(&out)[0];
        assert_eq!(inv.body.as_deref(), Some("entry"));
    }

    #[test]
    fn test_escaped_delimiters_in_body() {
        let text = "@create-file doc.md <<<\nuse \\>>> to close\n\\@read-file x\n>>>";
        let out = extract(text);
        assert_eq!(out.len(), 1);
        let inv = commands(&out)[0];
        assert_eq!(inv.body.as_deref(), Some("use >>> to close\n@read-file x\n"));
    }

    #[test]
    fn test_unterminated_block_is_parse_error_and_does_not_swallow() {
        let text = "@create-file a.txt <<<\nhalf a body\n@roster\nmore";
        let out = extract(text);
        assert_eq!(out.len(), 2);
        match &out[0] {
            Candidate::Malformed(bad) => {
                assert_eq!(bad.token, "@create-file");
                assert!(bad.message.contains("unterminated"));
                assert_eq!(bad.anchor_line, 0);
            }
            other => panic!("expected malformed, got {other:?}"),
        }
        assert!(matches!(&out[1], Candidate::Command(inv) if inv.command == CommandName::Roster));
    }

    #[test]
    fn test_unterminated_at_end_of_text() {
        let out = extract("@replace-file a.txt <<<\nnever closed\n");
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Candidate::Malformed(bad) if bad.message.contains("end of text")));
    }

    #[test]
    fn test_block_without_open_delimiter() {
        let out = extract("@create-file a.txt\n@status");
        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], Candidate::Malformed(bad) if bad.message.contains("<<<")));
        assert!(matches!(&out[1], Candidate::Command(inv) if inv.command == CommandName::Status));
    }

    #[test]
    fn test_unknown_command_keeps_token() {
        let out = extract("@roster\n@launch-missiles now");
        assert_eq!(out.len(), 2);
        match &out[1] {
            Candidate::Malformed(bad) => {
                assert_eq!(bad.token, "@launch-missiles");
                assert_eq!(bad.message, "unknown command 'launch-missiles'");
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_markers_inside_body_are_content() {
        let out = extract("@create-file a.rs <<<\n@param x\n>>>");
        let inv = commands(&out)[0];
        assert_eq!(inv.body.as_deref(), Some("@param x\n"));
    }

    #[test]
    fn test_encounter_order() {
        let text = "@status\ntext\n@list-directory\n@create-file x <<<\ny\n>>>\n@roster";
        let out = extract(text);
        let names: Vec<&str> = out.iter().map(|c| c.token()).collect();
        assert_eq!(
            names,
            vec!["@status", "@list-directory", "@create-file", "@roster"]
        );
    }
}
