//! Manifest text parser.
//!
//! Line-oriented format: `<VERB> <rest-of-line>`. Lines ending in a
//! backslash continue onto the next line; blank lines are skipped.
//! Parsing is deterministic: the same text always yields the same
//! directive sequence with positions `0..n`.

use crate::core::directive::{Directive, DirectiveKind};
use crate::error::{Error, Result};

/// One verb line after continuation joining, with the source line
/// number where it started (1-based, for error reporting).
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogicalLine {
    text: String,
    line: usize,
}

/// Join backslash-continued lines and drop blanks.
///
/// Each physical line is trimmed before joining, so a continuation
/// concatenates the trimmed pieces directly. A sequence that joins to
/// nothing is skipped like any other blank line.
fn logical_lines(text: &str) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut start_line = 0;

    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if buf.is_empty() {
            start_line = idx + 1;
        }
        if let Some(head) = trimmed.strip_suffix('\\') {
            buf.push_str(head);
            continue;
        }
        buf.push_str(trimmed);
        let joined = std::mem::take(&mut buf);
        // A continuation can leave trailing whitespace behind (piece
        // ending in "x \"); the logical line itself stays trimmed.
        let joined = joined.trim_end();
        if !joined.is_empty() {
            out.push(LogicalLine {
                text: joined.to_string(),
                line: start_line,
            });
        }
    }

    // Trailing backslash on the last line: nothing left to join with.
    let tail = buf.trim_end();
    if !tail.is_empty() {
        out.push(LogicalLine {
            text: tail.to_string(),
            line: start_line,
        });
    }

    out
}

/// Parse manifest text into an ordered directive sequence.
///
/// Positions are indices in the returned sequence, not source line
/// numbers. Any malformed line aborts the parse; no partial sequence
/// is returned.
pub fn parse(text: &str) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();

    for logical in logical_lines(text) {
        let (verb, rest) = match logical.text.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim_start()),
            None => (logical.text.as_str(), ""),
        };
        let kind = DirectiveKind::from_verb(verb).ok_or_else(|| Error::Parse {
            line: logical.line,
            message: format!("unknown directive '{verb}'"),
        })?;
        let directive =
            Directive::new(kind, rest, directives.len()).map_err(|message| Error::Parse {
                line: logical.line,
                message,
            })?;
        directives.push(directive);
    }

    Ok(directives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::directive::Action;

    #[test]
    fn positions_follow_file_order_not_line_numbers() {
        let text = "NAME demo\n\n\nENV KEY value\n\nRUN echo hi\n";
        let directives = parse(text).expect("parse");
        let kinds: Vec<DirectiveKind> = directives.iter().map(Directive::kind).collect();
        assert_eq!(
            kinds,
            vec![DirectiveKind::Name, DirectiveKind::Env, DirectiveKind::Run]
        );
        let positions: Vec<usize> = directives.iter().map(Directive::position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn continuation_joins_with_only_preexisting_separators() {
        // Space before the backslash survives; leading whitespace on the
        // continued line is trimmed away.
        let text = "RUN pkg install -y \\\n    nginx\n";
        let directives = parse(text).expect("parse");
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].raw(), "pkg install -y nginx");

        // No separator anywhere means the pieces abut.
        let tight = parse("RUN pkg install -y\\\nnginx").expect("parse");
        assert_eq!(tight[0].raw(), "pkg install -ynginx");
    }

    #[test]
    fn continuation_to_blank_is_skipped() {
        let text = "\\\n\nNAME demo\n";
        let directives = parse(text).expect("parse");
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].kind(), DirectiveKind::Name);
    }

    #[test]
    fn trailing_continuation_still_emits_the_line() {
        let directives = parse("RUN echo hi \\").expect("parse");
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].raw(), "echo hi");
    }

    #[test]
    fn unknown_verb_reports_source_line() {
        let text = "NAME demo\n\nBOGUS something\n";
        let err = parse(text).unwrap_err();
        let Error::Parse { line, message } = err else {
            panic!("expected parse error, got {err}");
        };
        assert_eq!(line, 3);
        assert!(message.contains("BOGUS"));
    }

    #[test]
    fn malformed_payload_reports_source_line() {
        let err = parse("NAME demo\nADD only_one_path\n").unwrap_err();
        let Error::Parse { line, .. } = err else {
            panic!("expected parse error");
        };
        assert_eq!(line, 2);
    }

    #[test]
    fn parsing_twice_yields_identical_structures() {
        let text = "NAME demo\nENV A 1\nRUN echo $A\nVOLUME /data /mnt/data\n";
        let first = parse(text).expect("first parse");
        let second = parse(text).expect("second parse");
        assert_eq!(first, second);
    }

    #[test]
    fn jexec_flag_parses_through_the_full_pipeline() {
        let directives = parse("JEXEC -o service nginx reload\n").expect("parse");
        assert!(directives[0].ignore_errors());
        let Action::Jexec { command, .. } = directives[0].action() else {
            panic!("expected jexec action");
        };
        assert_eq!(command, "service nginx reload");
    }
}
