use crate::command::{ExitCode, Stdin, Stdout};
use crate::parser::RedirectKind;
use anyhow::{Context, Result};
use nix::unistd::{AccessFlags, access};
use std::fs::{File, OpenOptions};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};

/// A redirection whose target has already been expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRedirect {
    /// Which stream, and how the file is opened.
    pub kind: RedirectKind,
    /// File to open, relative to the shell's working directory.
    pub path: PathBuf,
}

/// Command that is not a builtin.
pub struct ExternalCommand {
    program: PathBuf,
    argv: Vec<String>,
    redirects: Vec<FileRedirect>,
}

impl ExternalCommand {
    /// `argv[0]` is passed to the process as its own name, `program` is what gets executed.
    pub fn new(program: PathBuf, argv: Vec<String>, redirects: Vec<FileRedirect>) -> Self {
        Self {
            program,
            argv,
            redirects,
        }
    }

    /// Open the redirection targets in order. A later redirection of the same
    /// stream replaces an earlier one, but every target is still opened.
    fn open_redirects(&self) -> Result<(Option<File>, Option<File>)> {
        let mut input = None;
        let mut output = None;
        for redirect in &self.redirects {
            let path = &redirect.path;
            match redirect.kind {
                RedirectKind::Input => {
                    let file = File::open(path)
                        .with_context(|| format!("{}: cannot open for reading", path.display()))?;
                    input = Some(file);
                }
                RedirectKind::Output | RedirectKind::Append => {
                    let mut options = OpenOptions::new();
                    if redirect.kind == RedirectKind::Append {
                        options.append(true);
                    } else {
                        options.write(true).truncate(true);
                    }
                    let file = options
                        .create(true)
                        .open(path)
                        .with_context(|| format!("{}: cannot open for writing", path.display()))?;
                    output = Some(file);
                }
            }
        }
        Ok((input, output))
    }

    /// Start the process.
    ///
    /// File redirections apply only to streams still connected to the shell's
    /// own descriptors; a pipe handed in for a stream takes precedence. Every
    /// descriptor passed in or opened here is closed in this process before
    /// returning, whether or not the spawn succeeded.
    pub fn spawn(self, stdin: Box<dyn Stdin>, stdout: Box<dyn Stdout>) -> Result<Child> {
        let (input, output) = self.open_redirects()?;

        let stdin = match input {
            Some(file) if stdin.is_inherited() => Stdio::from(file),
            _ => stdin.stdio(),
        };
        let stdout = match output {
            Some(file) if stdout.is_inherited() => Stdio::from(file),
            _ => stdout.stdio(),
        };

        let mut cmd = std::process::Command::new(&self.program);
        if let Some((name, args)) = self.argv.split_first() {
            cmd.arg0(name).args(args);
        }
        let child = cmd
            .stdin(stdin)
            .stdout(stdout)
            .spawn()
            .with_context(|| format!("{}: cannot execute", self.program.display()))?;
        tracing::debug!(pid = child.id(), program = %self.program.display(), "spawned");
        Ok(child)
    }
}

/// Map a process exit status onto a shell status code.
pub fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    if let Some(signal) = exit_status.signal() {
        128 + signal
    } else if exit_status.core_dumped() {
        255
    } else {
        -1
    }
}

/// Resolve a command name the way a typical shell would.
///
/// Behavior:
/// - A name containing `/` anywhere is returned unchanged, without checking it.
/// - Otherwise each directory of the colon-separated `search_paths` is tried in
///   order, and the first `dir/name` that is an executable file wins.
/// - An empty name resolves to nothing.
pub fn find_command_path(search_paths: &str, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains('/') {
        return Some(PathBuf::from(name));
    }
    search_paths
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| PathBuf::from(format!("{dir}/{name}")))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("chmod");
        path
    }

    #[test]
    fn name_with_separator_is_used_as_is() {
        assert_eq!(
            find_command_path("/bin", "./foo"),
            Some(PathBuf::from("./foo"))
        );
        assert_eq!(
            find_command_path("", "/does/not/exist"),
            Some(PathBuf::from("/does/not/exist"))
        );
        assert_eq!(
            find_command_path("/bin", "bin/sh"),
            Some(PathBuf::from("bin/sh"))
        );
    }

    #[test]
    fn single_component_found_in_path() {
        let found = find_command_path("/bin:/usr/bin", "sh")
            .expect("Expected to find 'sh' in /bin or /usr/bin");
        assert!(found.ends_with("sh"), "unexpected path {found:?}");
    }

    #[test]
    fn single_component_not_found_in_path() {
        assert_eq!(find_command_path("/bin:/usr/bin", "nonexisting-cmd-xyz"), None);
        assert_eq!(find_command_path("", "sh"), None);
        assert_eq!(find_command_path("/bin", ""), None);
    }

    #[test]
    fn search_order_and_execute_permission() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_script(first.path(), "tool", 0o644);
        let runnable = write_script(second.path(), "tool", 0o755);
        fs::create_dir(first.path().join("subdir")).unwrap();

        let search = format!("{}:{}", first.path().display(), second.path().display());
        assert_eq!(find_command_path(&search, "tool"), Some(runnable));
        assert_eq!(find_command_path(&search, "subdir"), None);

        let preferred = write_script(first.path(), "tool", 0o755);
        assert_eq!(find_command_path(&search, "tool"), Some(preferred));
    }

    #[test]
    fn exit_code_of_normal_and_signalled_processes() {
        let status = std::process::Command::new("/bin/sh")
            .args(["-c", "exit 3"])
            .status()
            .unwrap();
        assert_eq!(exit_code(status), 3);

        let status = std::process::Command::new("/bin/sh")
            .args(["-c", "kill -TERM $$"])
            .status()
            .unwrap();
        assert_eq!(exit_code(status), 128 + 15);
    }
}
