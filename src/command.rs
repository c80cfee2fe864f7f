use crate::env::Environment;
use anyhow::Result;
use std::io::{Read, Write};
use std::process::{Child, Stdio};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Status of a command that succeeded.
pub const SUCCESS: ExitCode = 0;
/// Generic failure: a failed built-in, or a file, pipe or process that couldn't be set up.
pub const FAILURE: ExitCode = 1;
/// The input line couldn't be parsed.
pub const PARSE_FAILURE: ExitCode = 2;
/// The program name didn't resolve to an executable.
pub const NOT_FOUND: ExitCode = 127;

/// Abstraction over a readable input stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// Implementors typically wrap standard input or a pipe. A blanket implementation
/// exists for any type that implements `Read` and `Into<Stdio>` (e.g. `File` or
/// `os_pipe::PipeReader`).
pub trait Stdin: Read {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;

    /// True when this is the shell's own standard input, which file redirections may replace.
    fn is_inherited(&self) -> bool {
        false
    }
}

impl<T: Read + Into<Stdio>> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Abstraction over a writable output stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// A blanket implementation exists for any type that implements `Write` and `Into<Stdio>`.
pub trait Stdout: Write {
    /// Convert this output into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;

    /// True when this is the shell's own standard output, which file redirections may replace.
    fn is_inherited(&self) -> bool {
        false
    }
}

impl<T: Write + Into<Stdio>> Stdout for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// The shell's own standard input, handed to the first stage of a pipeline.
pub struct InheritedStdin(std::io::Stdin);

impl InheritedStdin {
    /// Wrap the process's standard input.
    pub fn new() -> Self {
        Self(std::io::stdin())
    }
}

impl Default for InheritedStdin {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }

    fn is_inherited(&self) -> bool {
        true
    }
}

/// The shell's own standard output, handed to the last stage of a pipeline.
pub struct InheritedStdout(std::io::Stdout);

impl InheritedStdout {
    /// Wrap the process's standard output.
    pub fn new() -> Self {
        Self(std::io::stdout())
    }
}

impl Default for InheritedStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for InheritedStdout {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl Stdout for InheritedStdout {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }

    fn is_inherited(&self) -> bool {
        true
    }
}

/// Object-safe trait for commands that run inside the shell process.
///
/// This is implemented by built-ins via a blanket impl.
pub trait ExecutableCommand {
    /// Executes the command.
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}

/// What starting one pipeline stage produced.
#[derive(Debug)]
pub enum Spawned {
    /// The stage completed without leaving a process behind (built-in, no-op or error).
    Finished(ExitCode),
    /// A foreground process the pipeline waits for.
    Running(Child),
    /// A background process nobody waits for.
    Background(Child),
}
