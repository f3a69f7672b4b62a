use anyhow::{Context as _, Result};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::Stdout;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command as TokioCommand;

pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// The CLI handed interactive and captured work. Overridable per run so a
/// plain `kubectl` (or a test stub) can stand in for `oc`.
pub fn oc_binary(flag_value: &str) -> String {
    std::env::var("OCULAR_OC")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| flag_value.to_string())
}

pub fn describe_argv(oc: &str, namespace: &str, resource_type: &str, name: &str) -> Vec<String> {
    vec![
        oc.to_string(),
        "describe".to_string(),
        "-n".to_string(),
        namespace.to_string(),
        resource_type.to_string(),
        name.to_string(),
    ]
}

pub fn yaml_argv(oc: &str, namespace: &str, resource_type: &str, name: &str) -> Vec<String> {
    vec![
        oc.to_string(),
        "get".to_string(),
        "-o".to_string(),
        "yaml".to_string(),
        "-n".to_string(),
        namespace.to_string(),
        resource_type.to_string(),
        name.to_string(),
    ]
}

pub fn edit_argv(oc: &str, namespace: &str, resource_type: &str, name: &str) -> Vec<String> {
    vec![
        oc.to_string(),
        "edit".to_string(),
        "-n".to_string(),
        namespace.to_string(),
        resource_type.to_string(),
        name.to_string(),
    ]
}

pub fn logs_argv(oc: &str, namespace: &str, container: &str, name: &str) -> Vec<String> {
    vec![
        oc.to_string(),
        "logs".to_string(),
        "-n".to_string(),
        namespace.to_string(),
        "-c".to_string(),
        container.to_string(),
        name.to_string(),
    ]
}

pub fn rsh_argv(oc: &str, namespace: &str, container: &str, name: &str) -> Vec<String> {
    vec![
        oc.to_string(),
        "rsh".to_string(),
        "-n".to_string(),
        namespace.to_string(),
        "-c".to_string(),
        container.to_string(),
        name.to_string(),
    ]
}

pub fn ssh_argv(hostname: &str, command: &[&str]) -> Vec<String> {
    let mut argv = vec![
        "ssh".to_string(),
        "-t".to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        format!("core@{hostname}"),
    ];
    argv.extend(command.iter().map(|part| part.to_string()));
    argv
}

pub fn suspend(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode for subprocess")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen for subprocess")?;
    terminal
        .show_cursor()
        .context("failed to show cursor for subprocess")?;
    Ok(())
}

pub fn resume(terminal: &mut TuiTerminal) -> Result<()> {
    enable_raw_mode().context("failed to re-enable raw mode after subprocess")?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)
        .context("failed to re-enter alternate screen after subprocess")?;
    terminal
        .clear()
        .context("failed to clear terminal after subprocess")?;
    Ok(())
}

/// Hand the real terminal to a subprocess and take it back afterwards. The
/// screen is resumed on every exit path, including a failed spawn.
pub async fn run_interactive(terminal: &mut TuiTerminal, argv: &[String]) -> Result<ExitStatus> {
    let (program, args) = argv
        .split_first()
        .context("empty interactive command line")?;
    suspend(terminal)?;

    let run_result = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("failed to run {program}"));
    let restore_result = resume(terminal);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal resume error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(status), Ok(())) => Ok(status),
    }
}

#[derive(Debug)]
pub enum CaptureOutcome {
    /// Output landed in the scratch file, ready for the pager.
    Ready(PathBuf),
    /// Subprocess exited non-zero; the scratch file was discarded.
    Failed(i32),
}

/// Run a subprocess with stdout/stderr redirected into a scratch file while
/// the dashboard stays on screen. The caller pages and then deletes the file.
pub async fn run_captured(argv: &[String], prefix: &str, suffix: &str) -> Result<CaptureOutcome> {
    let (program, args) = argv.split_first().context("empty captured command line")?;
    let scratch = tempfile::Builder::new()
        .prefix(&format!("{prefix}-"))
        .suffix(suffix)
        .tempfile()
        .context("failed to create capture scratch file")?;
    let (file, path) = scratch
        .keep()
        .context("failed to persist capture scratch file")?;
    let stderr_handle = file
        .try_clone()
        .context("failed to clone capture scratch handle")?;

    let status = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(file))
        .stderr(Stdio::from(stderr_handle))
        .status()
        .await
        .with_context(|| format!("failed to run {program}"));

    let status = match status {
        Ok(status) => status,
        Err(error) => {
            let _ = std::fs::remove_file(&path);
            return Err(error);
        }
    };

    if status.success() {
        Ok(CaptureOutcome::Ready(path))
    } else {
        let _ = std::fs::remove_file(&path);
        Ok(CaptureOutcome::Failed(status.code().unwrap_or(-1)))
    }
}

/// Page a scratch file through `less` with the terminal handed over, then
/// remove the file.
pub async fn page_file(terminal: &mut TuiTerminal, path: &std::path::Path) -> Result<()> {
    let argv = vec!["less".to_string(), path.display().to_string()];
    let result = run_interactive(terminal, &argv).await;
    let _ = std::fs::remove_file(path);
    result.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::{describe_argv, logs_argv, rsh_argv, ssh_argv, yaml_argv};

    #[test]
    fn cli_invocations_match_the_oc_surface() {
        assert_eq!(
            describe_argv("oc", "prod", "pods", "api-0"),
            ["oc", "describe", "-n", "prod", "pods", "api-0"]
        );
        assert_eq!(
            yaml_argv("oc", "prod", "services", "web"),
            ["oc", "get", "-o", "yaml", "-n", "prod", "services", "web"]
        );
        assert_eq!(
            logs_argv("oc", "prod", "app", "api-0"),
            ["oc", "logs", "-n", "prod", "-c", "app", "api-0"]
        );
        assert_eq!(
            rsh_argv("oc", "prod", "app", "api-0"),
            ["oc", "rsh", "-n", "prod", "-c", "app", "api-0"]
        );
    }

    #[test]
    fn node_ssh_disables_host_key_checking_and_allocates_a_tty() {
        assert_eq!(
            ssh_argv("worker-1", &["top"]),
            [
                "ssh",
                "-t",
                "-o",
                "StrictHostKeyChecking=no",
                "core@worker-1",
                "top"
            ]
        );
        assert_eq!(
            ssh_argv("worker-1", &[]),
            ["ssh", "-t", "-o", "StrictHostKeyChecking=no", "core@worker-1"]
        );
    }
}
