//! Stitches per-invocation results back into the original text.
//!
//! Results are inserted after the line each invocation ends on, in source
//! order. Text with no invocations comes back byte-for-byte unchanged.

use crate::core::extractor::Candidate;
use crate::core::mode::Mode;
use crate::core::outcome::{ExecutionResult, FailureKind};
use crate::core::principal::Principal;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationRecord {
    pub candidate: Candidate,
    pub result: ExecutionResult,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub total: usize,
    pub succeeded: usize,
    pub parse_errors: usize,
    pub permission_errors: usize,
    pub handler_errors: usize,
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} invocation(s): {} ok, {} parse, {} permission, {} handler",
            self.total,
            self.succeeded,
            self.parse_errors,
            self.permission_errors,
            self.handler_errors
        )
    }
}

/// Output of one pass. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transcript {
    text: String,
    records: Vec<InvocationRecord>,
    mode: Mode,
    principal: Principal,
}

impl Transcript {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn records(&self) -> &[InvocationRecord] {
        &self.records
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    pub fn summary(&self) -> PassSummary {
        let mut summary = PassSummary {
            total: self.records.len(),
            ..PassSummary::default()
        };
        for record in &self.records {
            match record.result.failure_kind() {
                None => summary.succeeded += 1,
                Some(FailureKind::ParseError) => summary.parse_errors += 1,
                Some(FailureKind::PermissionError) => summary.permission_errors += 1,
                Some(FailureKind::HandlerError) => summary.handler_errors += 1,
            }
        }
        summary
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub fn assemble(
    original: &str,
    records: Vec<InvocationRecord>,
    mode: Mode,
    principal: Principal,
) -> Transcript {
    if records.is_empty() {
        return Transcript {
            text: original.to_string(),
            records,
            mode,
            principal,
        };
    }

    let mut text = String::with_capacity(original.len() + 64 * records.len());
    let mut pending = records.iter().peekable();
    for (idx, line) in original.split_inclusive('\n').enumerate() {
        text.push_str(line);
        let mut newline_checked = false;
        while let Some(record) = pending.next_if(|r| r.candidate.anchor_line() <= idx) {
            if !newline_checked {
                if !line.ends_with('\n') {
                    text.push('\n');
                }
                newline_checked = true;
            }
            text.push_str(&render_result(record.candidate.token(), &record.result));
        }
    }
    // Anchors always point at an existing line; this only guards the invariant.
    for record in pending {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&render_result(record.candidate.token(), &record.result));
    }

    Transcript {
        text,
        records,
        mode,
        principal,
    }
}

/// One rendered result block. `token` is the marker plus command name.
pub fn render_result(token: &str, result: &ExecutionResult) -> String {
    match result {
        ExecutionResult::Success { output } => {
            let mut block = format!("[{token} ok]\n");
            block.push_str(output);
            if !output.is_empty() && !output.ends_with('\n') {
                block.push('\n');
            }
            block.push_str(&format!("[/{token}]\n"));
            block
        }
        ExecutionResult::Failure { kind, message } => {
            let flat: Vec<&str> = message.split_whitespace().collect();
            format!("[{token} {kind}] {}\n", flat.join(" "))
        }
    }
}
