use crate::command::{
    CommandFactory, ExitCode, FAILURE, InheritedStdin, InheritedStdout, NOT_FOUND, PARSE_FAILURE,
    SUCCESS, Spawned, Stdin, Stdout,
};
use crate::env::Environment;
use crate::external::{self, ExternalCommand, FileRedirect};
use crate::parser::{self, Expr, ParsedCommand, Pipeline, Statement};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::process::Child;

const PROMPT: &str = "soyshell> ";

/// Report a problem with the current line to the user.
fn report(message: impl std::fmt::Display) {
    eprintln!("soyshell: {message}");
}

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports built-in commands defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A minimal shell that parses input lines and runs them as processes.
///
/// The interpreter owns an [`Environment`] holding the user's constants and a
/// list of [`CommandFactory`] objects consulted for built-ins before a program
/// name is looked up on the search path.
///
/// Example
/// ```no_run
/// use soyshell::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run_line("{GREETING = hello} ; echo $GREETING world");
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    builtins: Vec<Box<dyn CommandFactory>>,
    background: Vec<Child>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of built-in factories.
    pub fn new(env: Environment, builtins: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env,
            builtins,
            background: Vec::new(),
        }
    }

    /// Create an interpreter with the default built-ins and the given search path.
    pub fn with_search_path(search_path: impl Into<String>) -> Self {
        Self::new(Environment::new(search_path), default_builtins())
    }

    /// Session state, including the constants.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Mutable session state.
    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// True once `exit` ran.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Parse and evaluate one input line, returning its status.
    ///
    /// A line that fails to parse runs nothing at all.
    pub fn run_line(&mut self, line: &str) -> ExitCode {
        match parser::construct_ast(line) {
            Ok(ast) => {
                tracing::debug!(?ast, "parsed line");
                self.eval_expr(&ast)
            }
            Err(err) => {
                report(format_args!("parse error: {err}"));
                PARSE_FAILURE
            }
        }
    }

    /// Evaluate an expression tree.
    ///
    /// `&&` and `||` short-circuit on the status of their left statement, `;`
    /// always runs both sides, and `=` stores a constant. Evaluation stops early
    /// once `exit` has run.
    pub fn eval_expr(&mut self, expr: &Expr) -> ExitCode {
        match expr {
            Expr::Empty => SUCCESS,
            Expr::Statement(statement) => self.eval_statement(statement),
            Expr::And(left, right) => {
                let status = self.eval_statement(left);
                if status != SUCCESS || self.should_exit() {
                    return status;
                }
                self.eval_expr(right)
            }
            Expr::Or(left, right) => {
                let status = self.eval_statement(left);
                if status == SUCCESS || self.should_exit() {
                    return status;
                }
                self.eval_expr(right)
            }
            Expr::Sequence(left, right) => {
                let status = self.eval_statement(left);
                if self.should_exit() {
                    return status;
                }
                self.eval_expr(right)
            }
            Expr::Assign { key, value } => self.assign(key, value),
        }
    }

    fn assign(&mut self, key: &str, value: &str) -> ExitCode {
        let value = self.env.expand(value);
        match self.env.set_const(key, value) {
            Ok(()) => {
                tracing::debug!(key, "constant assigned");
                SUCCESS
            }
            Err(err) => {
                report(err);
                FAILURE
            }
        }
    }

    fn eval_statement(&mut self, statement: &Statement) -> ExitCode {
        match statement {
            Statement::Block(expr) => self.eval_expr(expr),
            Statement::Pipeline(pipeline) => self.eval_invoke(pipeline),
        }
    }

    /// Run a pipeline and return the status of its last stage.
    ///
    /// Stage `i` writes into pipe `i`, whose read end becomes the standard input
    /// of stage `i + 1`. This process keeps only the most recent read end; each
    /// write end is dropped as soon as its stage has been started, so readers
    /// see end-of-file once their writer exits. All stages are started before
    /// any is waited for. Statuses of earlier stages are discarded.
    ///
    /// A trailing `&` on the last stage puts the whole pipeline in the
    /// background: none of its processes is waited for.
    fn eval_invoke(&mut self, pipeline: &Pipeline) -> ExitCode {
        let count = pipeline.stages.len();
        let background = pipeline.stages.last().is_some_and(|stage| stage.background);
        tracing::debug!(stages = count, pipes = pipeline.pipe_count(), "running pipeline");

        let mut started = Vec::with_capacity(count);
        let mut stdin: Box<dyn Stdin> = Box::new(InheritedStdin::new());
        for (i, stage) in pipeline.stages.iter().enumerate() {
            let mut next_stdin = None;
            let stdout: Box<dyn Stdout> = if i + 1 == count {
                Box::new(InheritedStdout::new())
            } else {
                match os_pipe::pipe() {
                    Ok((reader, writer)) => {
                        next_stdin = Some(reader);
                        Box::new(writer)
                    }
                    Err(err) => {
                        report(format_args!("cannot create pipe: {err}"));
                        started.push(Spawned::Finished(FAILURE));
                        break;
                    }
                }
            };

            started.push(self.eval_cmd(stdin, stdout, stage));
            stdin = match next_stdin {
                Some(reader) => Box::new(reader),
                None => Box::new(InheritedStdin::new()),
            };
        }
        drop(stdin);

        let mut status = SUCCESS;
        for spawned in started {
            let spawned = match spawned {
                Spawned::Running(child) if background => Spawned::Background(child),
                other => other,
            };
            status = self.finish(spawned);
        }
        status
    }

    /// Start one pipeline stage with the given standard streams.
    ///
    /// Built-ins run in-process. Anything else is resolved on the search path
    /// and started as a child process, which the caller decides whether to wait for.
    fn eval_cmd(
        &mut self,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        command: &ParsedCommand,
    ) -> Spawned {
        if command.program().is_none() {
            return Spawned::Finished(SUCCESS);
        }

        let argv: Vec<String> = command
            .argv
            .iter()
            .map(|word| word.expand(&self.env.constants))
            .collect();
        let name = argv[0].as_str();
        let args: Vec<&str> = argv[1..].iter().map(String::as_str).collect();

        for factory in &self.builtins {
            if let Some(builtin) = factory.try_create(&self.env, name, &args) {
                return match builtin.execute(stdin, stdout, &mut self.env) {
                    Ok(code) => Spawned::Finished(code),
                    Err(err) => {
                        report(format_args!("{name}: {err:#}"));
                        Spawned::Finished(FAILURE)
                    }
                };
            }
        }

        let Some(program) = external::find_command_path(self.env.constants.search_path(), name)
        else {
            report(format_args!("{name}: not a valid command"));
            return Spawned::Finished(NOT_FOUND);
        };
        tracing::debug!(name, program = %program.display(), "resolved");

        let redirects = command
            .redirects
            .iter()
            .map(|redirect| FileRedirect {
                kind: redirect.kind,
                path: redirect.target.expand(&self.env.constants).into(),
            })
            .collect();
        match ExternalCommand::new(program, argv, redirects).spawn(stdin, stdout) {
            Ok(child) => Spawned::Running(child),
            Err(err) => {
                report(format_args!("{err:#}"));
                Spawned::Finished(FAILURE)
            }
        }
    }

    fn finish(&mut self, spawned: Spawned) -> ExitCode {
        match spawned {
            Spawned::Finished(code) => code,
            Spawned::Running(mut child) => match child.wait() {
                Ok(status) => external::exit_code(status),
                Err(err) => {
                    report(format_args!("cannot wait for process {}: {err}", child.id()));
                    FAILURE
                }
            },
            Spawned::Background(child) => {
                tracing::debug!(pid = child.id(), "started in background");
                self.background.push(child);
                SUCCESS
            }
        }
    }

    /// Collect background processes that have exited, without blocking.
    pub fn reap_background(&mut self) {
        self.background.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = child.id(), %status, "background process finished");
                false
            }
            Ok(None) => true,
            Err(err) => {
                tracing::warn!(pid = child.id(), "cannot poll background process: {err}");
                false
            }
        });
    }

    /// Number of background processes not yet known to have exited.
    pub fn background_jobs(&self) -> usize {
        self.background.len()
    }

    /// Read-Eval-Print Loop over the terminal until `exit` or end of input.
    ///
    /// Ctrl-C discards the line being edited.
    pub fn repl(&mut self, record_history: bool) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;

        while !self.should_exit() {
            self.reap_background();
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    if record_history {
                        rl.add_history_entry(line.as_str())?;
                    }
                    let status = self.run_line(&line);
                    tracing::debug!(status, "line finished");
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}

fn default_builtins() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    vec![
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Exit>::default()),
    ]
}

impl Default for Interpreter {
    /// Create an interpreter with the default built-ins (`cd`, `exit`) and the
    /// default search path.
    fn default() -> Self {
        Self::new(Environment::default(), default_builtins())
    }
}
