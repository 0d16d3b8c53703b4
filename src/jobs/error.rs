use std::path::PathBuf;

/// Errors returned synchronously from `submit`. No job is created.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("missing required input(s): {}", .missing.join(", "))]
    MissingInput { missing: Vec<&'static str> },
    #[error("failed to prepare job workspace {}: {source}", .path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a job ended in `failed`. Rendered into the job's error detail.
#[derive(Debug, thiserror::Error)]
pub enum JobFailure {
    #[error("failed to launch encoder {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for encoder: {0}")]
    Wait(#[source] std::io::Error),
    #[error("{}", describe_exit(.code, .diagnostics))]
    Exit {
        code: Option<i32>,
        diagnostics: Option<String>,
    },
    #[error("{}", .diagnostics.as_deref().unwrap_or("encoder produced no output file"))]
    MissingOutput { diagnostics: Option<String> },
}

fn describe_exit(code: &Option<i32>, diagnostics: &Option<String>) -> String {
    match (diagnostics, code) {
        (Some(text), _) => text.clone(),
        (None, Some(code)) => format!("encoder exited with status {}", code),
        (None, None) => "encoder terminated by signal".to_string(),
    }
}

/// Keep at most this many trailing characters of encoder stderr.
pub const DIAGNOSTIC_TAIL_CHARS: usize = 400;

/// Last `DIAGNOSTIC_TAIL_CHARS` characters of `stderr`, or `None` when empty.
pub fn diagnostic_tail(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    if text.is_empty() {
        return None;
    }
    let skip = text.chars().count().saturating_sub(DIAGNOSTIC_TAIL_CHARS);
    Some(text.chars().skip(skip).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_characters() {
        let long = format!("{}END", "x".repeat(1000));
        let tail = diagnostic_tail(long.as_bytes()).unwrap();
        assert_eq!(tail.chars().count(), DIAGNOSTIC_TAIL_CHARS);
        assert!(tail.ends_with("END"));

        assert_eq!(diagnostic_tail(b"short"), Some("short".to_string()));
        assert_eq!(diagnostic_tail(b""), None);
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let text = "é".repeat(500);
        let tail = diagnostic_tail(text.as_bytes()).unwrap();
        assert_eq!(tail, "é".repeat(DIAGNOSTIC_TAIL_CHARS));
    }

    #[test]
    fn failure_messages_fall_back_to_generic_text() {
        let exit = JobFailure::Exit {
            code: Some(1),
            diagnostics: None,
        };
        assert_eq!(exit.to_string(), "encoder exited with status 1");

        let missing = JobFailure::MissingOutput {
            diagnostics: Some("Output file is empty".into()),
        };
        assert_eq!(missing.to_string(), "Output file is empty");

        let err = RenderError::MissingInput {
            missing: vec!["image", "meta"],
        };
        assert_eq!(err.to_string(), "missing required input(s): image, meta");
    }
}
