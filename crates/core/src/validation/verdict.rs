//! Parsing of a check script's output.
//!
//! The last two non-empty lines of stdout are the `used` and `banned`
//! results and must be exactly `True` or `False`. Every non-empty line
//! before them is diagnostic output from the script.

/// Token printed by Python for a true boolean.
const TRUE_TOKEN: &str = "True";

/// Token printed by Python for a false boolean.
const FALSE_TOKEN: &str = "False";

/// Result of checking one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub used: bool,
    pub banned: bool,
    /// Lines printed by the script before the results.
    pub diagnostics: Vec<String>,
}

impl Verdict {
    /// Status label written to the run log.
    pub fn label(&self) -> &'static str {
        if self.banned {
            "BANNED"
        } else if self.used {
            "USED"
        } else {
            "OK"
        }
    }
}

/// Why a check's output could not be turned into a [`Verdict`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerdictError {
    #[error("Expected at least 2 result lines, found {0}")]
    MissingLines(usize),

    #[error("Invalid boolean token '{0}'")]
    InvalidToken(String),
}

/// Parse the stdout of a successful check run.
pub fn parse_verdict(stdout: &str) -> Result<Verdict, VerdictError> {
    let lines: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(VerdictError::MissingLines(lines.len()));
    }

    let split = lines.len() - 2;
    let used = parse_bool(lines[split])?;
    let banned = parse_bool(lines[split + 1])?;

    Ok(Verdict {
        used,
        banned,
        diagnostics: lines[..split].iter().map(|l| (*l).to_string()).collect(),
    })
}

fn parse_bool(token: &str) -> Result<bool, VerdictError> {
    match token {
        TRUE_TOKEN => Ok(true),
        FALSE_TOKEN => Ok(false),
        other => Err(VerdictError::InvalidToken(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_two_result_lines() {
        let v = parse_verdict("True\nFalse\n").unwrap();
        assert!(v.used);
        assert!(!v.banned);
        assert!(v.diagnostics.is_empty());
        assert_eq!(v.label(), "USED");
    }

    #[test]
    fn preceding_lines_are_diagnostics() {
        let v = parse_verdict("checking...\n\nstatus 403\nFalse\nTrue\n").unwrap();
        assert_eq!(v.diagnostics, vec!["checking...", "status 403"]);
        assert!(v.banned);
        assert_eq!(v.label(), "BANNED");
    }

    #[test]
    fn trailing_blank_lines_and_crlf_are_ignored() {
        let v = parse_verdict("False\r\nFalse\r\n\n\n").unwrap();
        assert_eq!(v.label(), "OK");
    }

    #[test]
    fn single_line_is_missing_lines() {
        assert_matches!(parse_verdict("True\n"), Err(VerdictError::MissingLines(1)));
        assert_matches!(parse_verdict(""), Err(VerdictError::MissingLines(0)));
    }

    #[test]
    fn other_tokens_are_rejected() {
        assert_matches!(
            parse_verdict("true\nFalse"),
            Err(VerdictError::InvalidToken(t)) if t == "true"
        );
        assert_matches!(
            parse_verdict("True\n1"),
            Err(VerdictError::InvalidToken(t)) if t == "1"
        );
    }
}
