use crate::command::{CommandFactory, ExecutableCommand, ExitCode, SUCCESS, Stdin, Stdout};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::io::{Read, Write};
use std::path::Path;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. They ignore redirections.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        <T as BuiltinCommand>::execute(*self, &mut stdin, &mut stdout, env)
    }
}

/// Outcome of a built-in whose arguments didn't parse, or that was asked for `--help`.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.is_error {
            bail!("{}", self.output.trim_end());
        }
        writeln!(stdout, "{}", self.output.trim_end())?;
        Ok(SUCCESS)
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Change the working directory of the shell.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: String,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = Path::new(&self.target);
        env::set_current_dir(target)
            .with_context(|| format!("can't chdir to {}", target.display()))?;
        tracing::debug!(dir = %target.display(), "changed working directory");
        Ok(SUCCESS)
    }
}

#[derive(FromArgs)]
/// Leave the shell once the current line finishes.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(SUCCESS)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::command::{InheritedStdin, InheritedStdout};
    use std::io::Cursor;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    /// Serializes tests that read or change the process working directory.
    pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn create(name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        let env = Environment::default();
        if let Some(cmd) = Factory::<Cd>::default().try_create(&env, name, args) {
            return Some(cmd);
        }
        Factory::<Exit>::default().try_create(&env, name, args)
    }

    fn run(name: &str, args: &[&str], env: &mut Environment) -> Result<ExitCode> {
        let cmd = create(name, args).expect("builtin should be recognized");
        cmd.execute(
            Box::new(InheritedStdin::new()),
            Box::new(InheritedStdout::new()),
            env,
        )
    }

    #[test]
    fn test_factory_ignores_other_names() {
        assert!(create("ls", &[]).is_none());
        assert!(create("cd", &["/"]).is_some());
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let canonical_temp = temp.path().canonicalize().unwrap();
        let orig = env::current_dir().unwrap();

        let mut shell_env = Environment::default();
        let target = canonical_temp.to_string_lossy().to_string();
        let code = run("cd", &[&target], &mut shell_env).unwrap();

        let new_cwd = env::current_dir().unwrap().canonicalize().unwrap();
        env::set_current_dir(orig).expect("failed to restore cwd");

        assert_eq!(code, SUCCESS);
        assert_eq!(new_cwd, canonical_temp);
    }

    #[test]
    fn test_cd_requires_exactly_one_argument() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let mut shell_env = Environment::default();

        let missing = run("cd", &[], &mut shell_env).unwrap_err();
        let extra = run("cd", &["/", "/tmp"], &mut shell_env).unwrap_err();
        assert_eq!(env::current_dir().unwrap(), orig);
        assert!(format!("{missing:#}").contains("target"), "{missing:#}");
        assert!(format!("{extra:#}").contains("/tmp"), "{extra:#}");
    }

    #[test]
    fn test_cd_help_prints_usage_without_moving() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let mut shell_env = Environment::default();

        assert_eq!(run("cd", &["--help"], &mut shell_env).unwrap(), SUCCESS);
        assert!(run("cd", &["-x"], &mut shell_env).is_err());
        assert_eq!(env::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let _lock = lock_current_dir();
        let orig = env::current_dir().unwrap();
        let mut shell_env = Environment::default();

        let name = format!("nonexistent_dir_for_cd_test_{}", std::process::id());
        let cmd = Cd { target: name };
        let res = cmd.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut shell_env);

        let err = res.unwrap_err();
        assert!(format!("{err:#}").starts_with("can't chdir to nonexistent_dir_for_cd_test_"));
        assert_eq!(env::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_exit_flags_the_session() {
        let mut shell_env = Environment::default();
        assert_eq!(run("exit", &[], &mut shell_env).unwrap(), SUCCESS);
        assert!(shell_env.should_exit);

        let mut shell_env = Environment::default();
        assert!(run("exit", &["now"], &mut shell_env).is_err());
        assert!(!shell_env.should_exit);
    }
}
