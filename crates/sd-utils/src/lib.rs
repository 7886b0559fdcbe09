//! Shared helpers and process plumbing for sysdeck.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};

use sd_core::{CommandRunner, ExternalTool, Probe, ToolError};
use thiserror::Error;
use tracing::{debug, trace};

/// Result type for shared helpers.
pub type UtilsResult<T> = Result<T, UtilsError>;

/// Shared error variants for cross-crate helpers.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// An IO error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A file was not valid UTF-8 text.
    #[error("{0} is not a text file")]
    NotText(String),
}

/// Spawns real processes with `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(tool: &ExternalTool) -> Command {
        let mut command = Command::new(tool.program());
        command.args(tool.arguments());
        command
    }
}

impl CommandRunner for SystemRunner {
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn capture(&self, tool: &ExternalTool) -> Result<String, ToolError> {
        debug!(command = %tool.command_line(), "capturing");
        let output = Self::command(tool)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| spawn_error(tool, err))?;

        if !output.stderr.is_empty() {
            trace!(
                program = tool.program(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "stderr"
            );
        }
        if !tool.accepts(output.status.code()) {
            return Err(ToolError::Exit {
                program: tool.program().to_string(),
                code: output.status.code(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| ToolError::Output {
            program: tool.program().to_string(),
        })
    }

    fn run(&self, tool: &ExternalTool) -> Result<(), ToolError> {
        debug!(command = %tool.command_line(), "running attached");
        let status = Self::command(tool)
            .status()
            .map_err(|err| spawn_error(tool, err))?;
        if tool.accepts(status.code()) {
            Ok(())
        } else {
            Err(ToolError::Exit {
                program: tool.program().to_string(),
                code: status.code(),
            })
        }
    }
}

fn spawn_error(tool: &ExternalTool, err: std::io::Error) -> ToolError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ToolError::Missing {
            program: tool.program().to_string(),
        }
    } else {
        ToolError::Spawn {
            program: tool.program().to_string(),
            source: err,
        }
    }
}

/// Treats a program as installed when its executable is on PATH.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathProbe;

impl Probe for PathProbe {
    fn is_installed(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Trimmed, non-empty lines of tool output.
pub fn non_empty_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Keep at most `max` lines, noting how many were dropped.
pub fn truncate_lines(text: &str, max: usize) -> String {
    let total = text.lines().count();
    if total <= max {
        return text.to_string();
    }
    let note = format!("... {} more lines", total - max);
    let mut kept: Vec<&str> = text.lines().take(max).collect();
    kept.push(&note);
    kept.join("\n")
}

/// Binary size with a unit, e.g. `1.5 MiB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Read a small text file, refusing binary content.
pub fn read_text(path: &Path, limit: u64) -> UtilsResult<String> {
    let file = std::fs::File::open(path)?;
    let mut buffer = Vec::new();
    file.take(limit).read_to_end(&mut buffer)?;
    String::from_utf8(buffer).map_err(|_| UtilsError::NotText(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_lines_trims() {
        let lines: Vec<_> = non_empty_lines("  jq \n\n htop\n").collect();
        assert_eq!(lines, vec!["jq", "htop"]);
    }

    #[test]
    fn truncate_lines_notes_remainder() {
        assert_eq!(truncate_lines("a\nb", 5), "a\nb");
        assert_eq!(truncate_lines("a\nb\nc\nd", 2), "a\nb\n... 2 more lines");
    }

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.5 KiB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn read_text_rejects_binary() {
        let dir = tempfile::tempdir().expect("temp dir");
        let text = dir.path().join("resolv.conf");
        std::fs::write(&text, "nameserver 1.1.1.1\n").unwrap();
        assert_eq!(read_text(&text, 1024).unwrap(), "nameserver 1.1.1.1\n");

        let binary = dir.path().join("font.ttf");
        std::fs::write(&binary, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        assert!(matches!(read_text(&binary, 1024), Err(UtilsError::NotText(_))));
    }

    #[test]
    fn missing_program_is_reported() {
        let runner = SystemRunner::new();
        let tool = ExternalTool::new("sysdeck-definitely-not-a-real-binary");
        assert!(!runner.is_available(tool.program()));
        assert!(matches!(runner.capture(&tool), Err(ToolError::Missing { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn unexpected_exit_code_is_reported() {
        let runner = SystemRunner::new();
        let tool = ExternalTool::new("sh").args(["-c", "exit 3"]);
        assert!(matches!(
            runner.capture(&tool),
            Err(ToolError::Exit { code: Some(3), .. })
        ));
        assert!(matches!(
            runner.run(&tool),
            Err(ToolError::Exit { code: Some(3), .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn accepted_exit_codes_are_not_errors() {
        let runner = SystemRunner::new();
        let tool = ExternalTool::new("sh")
            .args(["-c", "echo LISTEN; exit 1"])
            .expect_codes(&[0, 1]);
        assert_eq!(runner.capture(&tool).unwrap(), "LISTEN\n");
        assert!(runner.run(&tool).is_ok());

        let strict = ExternalTool::new("sh").args(["-c", "exit 1"]);
        assert!(runner.capture(&strict).is_err());
    }
}
