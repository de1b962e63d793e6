//! Pre/post hook execution around a filesystem's backup.
//!
//! Hooks are opaque shell commands. Each receives the filesystem name,
//! source, destination directory, snapshot timestamp, and phase both as
//! `HARDSNAP_*` environment variables and via `{placeholder}` substitution
//! in the command string. Exit status zero is success; anything else is a
//! hook failure. An empty hook list is skipped silently.

use tracing::info;

use crate::error::{HardsnapError, Result};
use crate::platform::command_for_script;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Pre,
    Post,
}

impl HookPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            HookPhase::Pre => "pre",
            HookPhase::Post => "post",
        }
    }
}

/// Context passed to hook commands.
pub struct HookContext {
    pub filesystem: String,
    pub source: String,
    pub destination: String,
    pub timestamp: String,
    pub phase: HookPhase,
}

/// Run a list of hook commands in order, stopping at the first failure.
pub fn run_hook_list(cmds: &[String], ctx: &HookContext) -> Result<()> {
    for cmd in cmds {
        execute_hook(cmd, ctx)?;
    }
    Ok(())
}

fn execute_hook(cmd: &str, ctx: &HookContext) -> Result<()> {
    let expanded = substitute_variables(cmd, ctx);
    info!(phase = ctx.phase.as_str(), "running hook: {expanded}");

    let mut child = command_for_script(&expanded);
    child.env("HARDSNAP_FILESYSTEM", &ctx.filesystem);
    child.env("HARDSNAP_SOURCE", &ctx.source);
    child.env("HARDSNAP_DESTINATION", &ctx.destination);
    child.env("HARDSNAP_TIMESTAMP", &ctx.timestamp);
    child.env("HARDSNAP_PHASE", ctx.phase.as_str());

    let output = child
        .output()
        .map_err(|e| HardsnapError::Hook(format!("failed to execute '{expanded}': {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(HardsnapError::Hook(format!(
            "hook '{expanded}' exited with {code}: {}",
            stderr.trim_end()
        )));
    }

    Ok(())
}

fn substitute_variables(cmd: &str, ctx: &HookContext) -> String {
    cmd.replace("{filesystem}", &shell_escape(&ctx.filesystem))
        .replace("{source}", &shell_escape(&ctx.source))
        .replace("{destination}", &shell_escape(&ctx.destination))
        .replace("{timestamp}", &shell_escape(&ctx.timestamp))
        .replace("{phase}", &shell_escape(ctx.phase.as_str()))
}

fn shell_escape(input: &str) -> String {
    if input.is_empty() {
        return "''".to_string();
    }
    let escaped = input.replace('\'', "'\"'\"'");
    format!("'{escaped}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ctx(phase: HookPhase) -> HookContext {
        HookContext {
            filesystem: "home".into(),
            source: "host:/home".into(),
            destination: "/var/backup/home".into(),
            timestamp: "20260830.120000".into(),
            phase,
        }
    }

    #[test]
    fn variable_substitution() {
        let result = substitute_variables(
            "echo {filesystem} {source} {destination} {timestamp} {phase}",
            &make_ctx(HookPhase::Pre),
        );
        assert_eq!(
            result,
            "echo 'home' 'host:/home' '/var/backup/home' '20260830.120000' 'pre'"
        );
    }

    #[test]
    fn shell_escape_quotes() {
        assert_eq!(shell_escape(""), "''");
        assert_eq!(shell_escape("a'b"), "'a'\"'\"'b'");
    }

    #[cfg(unix)]
    #[test]
    fn env_vars_are_set() {
        let cmds = vec![
            "test \"$HARDSNAP_FILESYSTEM\" = home \
             && test \"$HARDSNAP_PHASE\" = post \
             && test \"$HARDSNAP_TIMESTAMP\" = 20260830.120000"
                .to_string(),
        ];
        let result = run_hook_list(&cmds, &make_ctx(HookPhase::Post));
        assert!(result.is_ok(), "env vars should be set: {:?}", result.err());
    }

    #[test]
    fn empty_list_is_skipped() {
        assert!(run_hook_list(&[], &make_ctx(HookPhase::Pre)).is_ok());
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let cmds = vec!["exit 3".to_string()];
        let err = run_hook_list(&cmds, &make_ctx(HookPhase::Pre)).unwrap_err();
        assert!(matches!(err, HardsnapError::Hook(_)));
        assert!(err.to_string().contains("exited with 3"));
    }

    #[cfg(unix)]
    #[test]
    fn first_failure_stops_the_list() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("second_ran");
        let cmds = vec!["false".to_string(), format!("touch {}", marker.display())];
        assert!(run_hook_list(&cmds, &make_ctx(HookPhase::Pre)).is_err());
        assert!(!marker.exists(), "later hooks should not run after a failure");
    }
}
