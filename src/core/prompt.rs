//! Mode-specific instructions sent alongside requests to the language model.
//!
//! The command list is generated from [`commands_for_mode`], the same table the
//! permission matrix consults, so the prompt can never advertise a command the
//! mode forbids or omit one it allows.

use crate::core::command::{Category, CommandShape};
use crate::core::grammar::{BLOCK_CLOSE, BLOCK_OPEN, ESCAPE, Grammar};
use crate::core::mode::Mode;
use crate::core::permission::commands_for_mode;

const PROMPT_HEADER: &str = "## Inline commands";
const PROMPT_PREAMBLE: &str = "You can act on the workspace by writing commands in your reply. \
Each command goes on its own line. Results are inserted after that line before the reply is shown.";

fn mode_headline(mode: Mode) -> &'static str {
    match mode {
        Mode::ChatOnly => "Current mode: chat-only. You may read, but not run or change anything.",
        Mode::Hybrid => "Current mode: hybrid. You may read and run commands in a sandbox, but not change files.",
        Mode::Autonomous => "Current mode: autonomous. You may read, run sandboxed commands and change files.",
    }
}

pub fn build(mode: Mode) -> String {
    build_with(Grammar::default(), mode)
}

pub fn build_with(grammar: Grammar, mode: Mode) -> String {
    let allowed = commands_for_mode(mode);
    let marker = grammar.marker;
    let mut out = String::new();

    out.push_str(PROMPT_HEADER);
    out.push_str("\n\n");
    out.push_str(PROMPT_PREAMBLE);
    out.push_str("\n\n");
    out.push_str(mode_headline(mode));
    out.push_str("\n\nAvailable commands:\n");
    for command in &allowed {
        out.push_str(&format!("- `{}`: {}\n", grammar.usage(*command), command.summary()));
    }

    out.push_str("\nRules:\n");
    out.push_str(&format!(
        "- A command starts with `{marker}` at the beginning of a line, followed by its name.\n"
    ));
    out.push_str("- Arguments may be quoted; `key=value` form is also accepted.\n");
    if allowed.iter().any(|c| c.shape() == CommandShape::Block) {
        out.push_str(&format!(
            "- File bodies go between `{BLOCK_OPEN}` at the end of the command line and a closing `{BLOCK_CLOSE}`. \
Write `{ESCAPE}{BLOCK_CLOSE}` for a literal `{BLOCK_CLOSE}` and start a body line with `{ESCAPE}{marker}` for a literal `{marker}`.\n"
        ));
    }
    out.push_str(&format!(
        "- To mention `{marker}` at the start of a line without running anything, write `{ESCAPE}{marker}`.\n"
    ));
    out.push_str("- Commands run in order; a failed command does not stop the ones after it.\n");

    let unavailable: Vec<&str> = [Category::Read, Category::Exec, Category::Write]
        .into_iter()
        .filter(|category| !allowed.iter().any(|c| c.category() == *category))
        .map(Category::as_str)
        .collect();
    if !unavailable.is_empty() {
        out.push_str(&format!(
            "\nNot available in {} mode: {} commands. Do not attempt them.\n",
            mode,
            unavailable.join(" and ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_only_prompt_has_no_block_rules() {
        let prompt = build(Mode::ChatOnly);
        assert!(prompt.contains("`@read-file <path>`"));
        assert!(!prompt.contains(BLOCK_OPEN));
        assert!(prompt.contains("Not available in chat-only mode: exec and write commands."));
    }

    #[test]
    fn test_autonomous_prompt_lists_everything() {
        let prompt = build(Mode::Autonomous);
        assert!(prompt.contains("`@create-file <path> <<<`"));
        assert!(!prompt.contains("Not available"));
    }

    #[test]
    fn test_custom_marker_is_used() {
        let prompt = build_with(Grammar::new('!').unwrap(), Mode::Hybrid);
        assert!(prompt.contains("`!exec-in-sandbox <target> <command text>`"));
        assert!(!prompt.contains("`@"));
    }
}
