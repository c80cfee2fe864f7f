use crate::constants::ConstantStore;
use crate::lexer::{self, LexingError, Token, match_brace, split_into_tokens};
use std::fmt;

/// Operators joining a statement to the rest of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `&&`: run the right side only if the left side succeeded.
    And,
    /// `||`: run the right side only if the left side failed.
    Or,
    /// `;`: run both sides in order.
    Sequence,
    /// `=`: store the right side under the name on the left.
    Assign,
}

impl Operator {
    /// Recognize an operator token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "&&" => Some(Self::And),
            "||" => Some(Self::Or),
            ";" => Some(Self::Sequence),
            "=" => Some(Self::Assign),
            _ => None,
        }
    }

    /// The operator as written in the input.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Sequence => ";",
            Self::Assign => "=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of redirection
///
/// Defines the specific operation mode for an I/O redirection (`<`, `>`, `>>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Input redirection (`<`): Reads standard input from a specified file.
    Input,
    /// Output redirection (`>`): Writes standard output to a file, **overwriting** the file if it exists.
    Output,
    /// Output redirection with append (`>>`): Writes standard output to a file, **appending** to the file if it exists.
    Append,
}

impl RedirectKind {
    /// Recognize a redirection operator token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "<" => Some(Self::Input),
            ">" => Some(Self::Output),
            ">>" => Some(Self::Append),
            _ => None,
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "<",
            Self::Output => ">",
            Self::Append => ">>",
        })
    }
}

/// Errors that can occur during the AST construction (parsing) phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsingError {
    /// Unbalanced brace or quote.
    #[error(transparent)]
    Lexing(#[from] LexingError),
    /// An operator was the first token of an expression.
    #[error("operator '{0}' has nothing on its left")]
    MissingLeftOperand(Operator),
    /// An operator was the last token of an expression.
    #[error("operator '{0}' has nothing on its right")]
    MissingRightOperand(Operator),
    /// A statement with no content.
    #[error("empty statement")]
    EmptyStatement,
    /// A statement starting with `{` whose matching `}` isn't its last character.
    #[error("expression not properly enclosed in braces")]
    NotEnclosed,
    /// A `|` with no command before it.
    #[error("'|' has no command before it")]
    MissingPipeSource,
    /// A `|` with no command after it.
    #[error("'|' has no command after it")]
    MissingPipeTarget,
    /// A redirection operator at the end of the command.
    #[error("expected a file name after '{0}'")]
    MissingRedirectTarget(RedirectKind),
    /// A redirection operator where a file name was expected.
    #[error("expected a file name, found '{0}'")]
    InvalidRedirectTarget(String),
    /// Something other than a redirection operator after a redirection target.
    #[error("expected a redirection operator, found '{0}'")]
    ExpectedRedirect(String),
}

fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii_whitespace())
}

/// An expression split at its first top-level operator.
///
/// Without an operator, `statement` holds the whole trimmed input and `rest` is
/// empty. With one, both sides are non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedExpr<'a> {
    /// Text left of the operator.
    pub statement: &'a str,
    /// The first top-level operator, if any.
    pub operator: Option<Operator>,
    /// Text right of the operator, itself an expression.
    pub rest: &'a str,
}

/// Split an expression at the first operator token.
///
/// The scan never looks inside brace or quote spans, so `{a && b} || c` splits at
/// `||`. Splitting at the first operator makes `a && b && c` parse as `a` `&&`
/// `b && c`.
pub fn parse_expr(expr: &str) -> Result<ParsedExpr<'_>, ParsingError> {
    let expr = trim(expr);
    for token in split_into_tokens(expr) {
        let token = token?;
        let Some(operator) = Operator::from_token(token.text) else {
            continue;
        };
        let statement = trim(&expr[..token.start]);
        if statement.is_empty() {
            return Err(ParsingError::MissingLeftOperand(operator));
        }
        let rest = trim(&expr[token.end..]);
        if rest.is_empty() {
            return Err(ParsingError::MissingRightOperand(operator));
        }
        return Ok(ParsedExpr {
            statement,
            operator: Some(operator),
            rest,
        });
    }

    Ok(ParsedExpr {
        statement: expr,
        operator: None,
        rest: "",
    })
}

/// What a statement turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind<'a> {
    /// Content of a `{ ... }` statement, braces stripped.
    Block(&'a str),
    /// A pipeline of commands.
    Invocation(&'a str),
}

/// Classify a statement as a braced sub-expression or an invocation.
pub fn parse_statement(statement: &str) -> Result<StatementKind<'_>, ParsingError> {
    let statement = trim(statement);
    if statement.is_empty() {
        return Err(ParsingError::EmptyStatement);
    }
    if !statement.starts_with('{') {
        return Ok(StatementKind::Invocation(statement));
    }
    let close = match_brace(statement, 0, statement.len()).ok_or(LexingError::UnmatchedBrace(0))?;
    if close != statement.len() - 1 {
        return Err(ParsingError::NotEnclosed);
    }
    Ok(StatementKind::Block(trim(&statement[1..close])))
}

/// Split an invocation at `|` tokens into the text of each stage.
///
/// Empty input gives no stages at all.
pub fn parse_invocation(invocation: &str) -> Result<Vec<&str>, ParsingError> {
    let invocation = trim(invocation);
    let mut stages = Vec::new();
    let mut stage_start = 0;

    for token in split_into_tokens(invocation) {
        let token = token?;
        if token.text != "|" {
            continue;
        }
        let stage = trim(&invocation[stage_start..token.start]);
        if stage.is_empty() {
            return Err(ParsingError::MissingPipeSource);
        }
        stages.push(stage);
        stage_start = token.end;
    }

    let last = trim(&invocation[stage_start..]);
    if !last.is_empty() {
        stages.push(last);
    } else if !stages.is_empty() {
        return Err(ParsingError::MissingPipeTarget);
    }
    Ok(stages)
}

/// A command-line word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Word {
    /// An unquoted word; `$NAME` references are expanded before use.
    Plain(String),
    /// Content of a `"..."` word, used verbatim.
    Quoted(String),
}

impl Word {
    fn from_token(token: &Token<'_>) -> Self {
        if token.is_quoted() {
            Word::Quoted(token.unquoted().to_string())
        } else {
            Word::Plain(token.text.to_string())
        }
    }

    /// The word's final text given the current constants.
    pub fn expand(&self, constants: &ConstantStore) -> String {
        match self {
            Word::Plain(text) => constants.expand(text),
            Word::Quoted(text) => text.clone(),
        }
    }
}

/// A redirection of standard input or output to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Which stream, and how the file is opened.
    pub kind: RedirectKind,
    /// Path of the file.
    pub target: Word,
}

/// One stage of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Program name followed by its arguments.
    pub argv: Vec<Word>,
    /// Redirections in the order they were written.
    pub redirects: Vec<Redirect>,
    /// Set by a trailing ` &`.
    pub background: bool,
}

impl ParsedCommand {
    /// The program name, absent for an empty command.
    pub fn program(&self) -> Option<&Word> {
        self.argv.first()
    }
}

/// Parse one pipeline stage.
///
/// An empty stage gives a command without a program, which the caller treats as
/// a no-op.
pub fn parse_command(stage: &str) -> Result<ParsedCommand, ParsingError> {
    let mut text = trim(stage);
    let mut command = ParsedCommand::default();

    if let Some(head) = text.strip_suffix('&') {
        if head.bytes().last().is_some_and(lexer::is_blank) {
            command.background = true;
            text = trim(head);
        }
    }

    let mut tokens = split_into_tokens(text);
    let mut pending = None;
    while let Some(token) = tokens.next() {
        let token = token?;
        if !token.is_quoted() && !command.argv.is_empty() {
            if let Some(kind) = RedirectKind::from_token(token.text) {
                pending = Some(kind);
                break;
            }
        }
        command.argv.push(Word::from_token(&token));
    }

    // After the first operator: target, operator, target, ...
    while let Some(kind) = pending {
        let target = tokens
            .next()
            .ok_or(ParsingError::MissingRedirectTarget(kind))??;
        if !target.is_quoted() && RedirectKind::from_token(target.text).is_some() {
            return Err(ParsingError::InvalidRedirectTarget(target.text.to_string()));
        }
        command.redirects.push(Redirect {
            kind,
            target: Word::from_token(&target),
        });

        pending = match tokens.next() {
            None => None,
            Some(token) => {
                let token = token?;
                match RedirectKind::from_token(token.text) {
                    Some(kind) if !token.is_quoted() => Some(kind),
                    _ => return Err(ParsingError::ExpectedRedirect(token.text.to_string())),
                }
            }
        };
    }

    Ok(command)
}

/// Commands connected by pipes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    /// Stages in source order.
    pub stages: Vec<ParsedCommand>,
}

impl Pipeline {
    /// Number of pipes needed to connect the stages.
    pub fn pipe_count(&self) -> usize {
        self.stages.len().saturating_sub(1)
    }
}

/// A statement node of the syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// A `{ ... }` sub-expression.
    Block(Box<Expr>),
    /// A pipeline of commands.
    Pipeline(Pipeline),
}

/// An expression node of the syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Blank input.
    Empty,
    /// A single statement.
    Statement(Statement),
    /// `left && right`
    And(Statement, Box<Expr>),
    /// `left || right`
    Or(Statement, Box<Expr>),
    /// `left ; right`
    Sequence(Statement, Box<Expr>),
    /// `key = value`. The value is kept raw and expanded when the assignment runs.
    Assign {
        /// Name of the constant, validated when the assignment runs.
        key: String,
        /// Everything to the right of `=`.
        value: String,
    },
}

fn build_statement(statement: &str) -> Result<Statement, ParsingError> {
    match parse_statement(statement)? {
        StatementKind::Block(inner) => Ok(Statement::Block(Box::new(construct_ast(inner)?))),
        StatementKind::Invocation(invocation) => {
            let stages = parse_invocation(invocation)?
                .into_iter()
                .map(parse_command)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Statement::Pipeline(Pipeline { stages }))
        }
    }
}

/// Parse a whole input line into a syntax tree.
///
/// Any error anywhere in the line fails the entire parse, so nothing on a
/// malformed line is ever executed.
pub fn construct_ast(line: &str) -> Result<Expr, ParsingError> {
    let parsed = parse_expr(line)?;
    let Some(operator) = parsed.operator else {
        if parsed.statement.is_empty() {
            return Ok(Expr::Empty);
        }
        return Ok(Expr::Statement(build_statement(parsed.statement)?));
    };

    match operator {
        Operator::Assign => Ok(Expr::Assign {
            key: parsed.statement.to_string(),
            value: parsed.rest.to_string(),
        }),
        Operator::And => Ok(Expr::And(
            build_statement(parsed.statement)?,
            Box::new(construct_ast(parsed.rest)?),
        )),
        Operator::Or => Ok(Expr::Or(
            build_statement(parsed.statement)?,
            Box::new(construct_ast(parsed.rest)?),
        )),
        Operator::Sequence => Ok(Expr::Sequence(
            build_statement(parsed.statement)?,
            Box::new(construct_ast(parsed.rest)?),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plain(s: &str) -> Word {
        Word::Plain(s.to_string())
    }

    fn quoted(s: &str) -> Word {
        Word::Quoted(s.to_string())
    }

    fn squash(s: &str) -> String {
        s.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_parse_expr_without_operator() {
        let parsed = parse_expr("  ls -l  ").unwrap();
        assert_eq!(
            parsed,
            ParsedExpr {
                statement: "ls -l",
                operator: None,
                rest: ""
            }
        );
    }

    #[test]
    fn test_parse_expr_blank_input_is_noop() {
        let parsed = parse_expr(" \t ").unwrap();
        assert_eq!(parsed.statement, "");
        assert_eq!(parsed.operator, None);
        assert_eq!(parsed.rest, "");
        assert_eq!(construct_ast("   ").unwrap(), Expr::Empty);
    }

    #[test]
    fn test_parse_expr_splits_at_first_operator() {
        let parsed = parse_expr("a && b || c").unwrap();
        assert_eq!(parsed.statement, "a");
        assert_eq!(parsed.operator, Some(Operator::And));
        assert_eq!(parsed.rest, "b || c");
    }

    #[test]
    fn test_parse_expr_reconstructs_input() {
        for line in [
            "echo a && echo b",
            "  false ||   true ; echo done ",
            "NAME = hello world",
            "{ ls | wc } ; pwd",
        ] {
            let parsed = parse_expr(line).unwrap();
            let op = parsed.operator.unwrap();
            let rebuilt = format!("{} {} {}", parsed.statement, op, parsed.rest);
            assert_eq!(squash(&rebuilt), squash(line));
        }
    }

    #[test]
    fn test_parse_expr_skips_brace_and_quote_spans() {
        let parsed = parse_expr("{ {x} && y }").unwrap();
        assert_eq!(parsed.operator, None);

        let parsed = parse_expr("{a && b} || c").unwrap();
        assert_eq!(parsed.statement, "{a && b}");
        assert_eq!(parsed.operator, Some(Operator::Or));

        let parsed = parse_expr(r#"echo "x ; y""#).unwrap();
        assert_eq!(parsed.operator, None);
    }

    #[test]
    fn test_parse_expr_operators_need_whitespace() {
        let parsed = parse_expr("a&&b").unwrap();
        assert_eq!(parsed.operator, None);
        assert_eq!(parsed.statement, "a&&b");
    }

    #[test]
    fn test_parse_expr_missing_operands() {
        assert_eq!(
            parse_expr("&& foo"),
            Err(ParsingError::MissingLeftOperand(Operator::And))
        );
        assert_eq!(
            parse_expr("foo &&"),
            Err(ParsingError::MissingRightOperand(Operator::And))
        );
        assert_eq!(
            parse_expr("; "),
            Err(ParsingError::MissingLeftOperand(Operator::Sequence))
        );
    }

    #[test]
    fn test_parse_expr_unmatched_brace() {
        assert!(matches!(
            parse_expr("{ echo a && b"),
            Err(ParsingError::Lexing(LexingError::UnmatchedBrace(0)))
        ));
    }

    #[test]
    fn test_parse_statement() {
        assert_eq!(
            parse_statement(" { a && b } ").unwrap(),
            StatementKind::Block("a && b")
        );
        assert_eq!(
            parse_statement("ls | wc").unwrap(),
            StatementKind::Invocation("ls | wc")
        );
        assert_eq!(parse_statement("  "), Err(ParsingError::EmptyStatement));
        assert_eq!(parse_statement("{a} b"), Err(ParsingError::NotEnclosed));
        assert_eq!(parse_statement("{}").unwrap(), StatementKind::Block(""));
    }

    #[test]
    fn test_parse_invocation() {
        assert_eq!(parse_invocation("ls").unwrap(), vec!["ls"]);
        assert_eq!(
            parse_invocation("cat  f |  grep  x |wc").unwrap(),
            vec!["cat  f", "grep  x |wc"]
        );
        assert_eq!(
            parse_invocation("a | b | c").unwrap(),
            vec!["a", "b", "c"]
        );
        assert!(parse_invocation("  ").unwrap().is_empty());
        assert_eq!(parse_invocation("| a"), Err(ParsingError::MissingPipeSource));
        assert_eq!(parse_invocation("a | | b"), Err(ParsingError::MissingPipeSource));
        assert_eq!(parse_invocation("a |"), Err(ParsingError::MissingPipeTarget));
    }

    #[test]
    fn test_parse_invocation_does_not_split_logical_or() {
        assert_eq!(parse_invocation(r#"echo "a | b""#).unwrap(), vec![r#"echo "a | b""#]);
        assert_eq!(parse_invocation("a || b").unwrap(), vec!["a || b"]);
    }

    #[test]
    fn test_parse_command_quoting() {
        let command = parse_command(r#"echo "a b" c"#).unwrap();
        assert_eq!(command.argv, vec![plain("echo"), quoted("a b"), plain("c")]);
        assert!(command.redirects.is_empty());
        assert!(!command.background);
    }

    #[test]
    fn test_parse_command_background() {
        let command = parse_command("ffmpeg    -i foo.mp4   bar.mkv  & ").unwrap();
        assert!(command.background);
        assert_eq!(
            command.argv,
            vec![plain("ffmpeg"), plain("-i"), plain("foo.mp4"), plain("bar.mkv")]
        );

        let command = parse_command("echo a&").unwrap();
        assert!(!command.background);
        assert_eq!(command.argv, vec![plain("echo"), plain("a&")]);
    }

    #[test]
    fn test_parse_command_redirections() {
        let command = parse_command("sort < in.txt > out.txt >> log &").unwrap();
        assert!(command.background);
        assert_eq!(command.argv, vec![plain("sort")]);
        assert_eq!(
            command.redirects,
            vec![
                Redirect {
                    kind: RedirectKind::Input,
                    target: plain("in.txt")
                },
                Redirect {
                    kind: RedirectKind::Output,
                    target: plain("out.txt")
                },
                Redirect {
                    kind: RedirectKind::Append,
                    target: plain("log")
                },
            ]
        );
    }

    #[test]
    fn test_parse_command_quoted_redirect_target() {
        let command = parse_command(r#"echo hi > "my file""#).unwrap();
        assert_eq!(command.redirects[0].target, quoted("my file"));
    }

    #[test]
    fn test_parse_command_malformed_redirections() {
        assert_eq!(
            parse_command("echo hi >"),
            Err(ParsingError::MissingRedirectTarget(RedirectKind::Output))
        );
        assert_eq!(
            parse_command("echo hi > >> f"),
            Err(ParsingError::InvalidRedirectTarget(">>".to_string()))
        );
        assert_eq!(
            parse_command("echo hi > f extra"),
            Err(ParsingError::ExpectedRedirect("extra".to_string()))
        );
        assert_eq!(
            parse_command("cat < a b"),
            Err(ParsingError::ExpectedRedirect("b".to_string()))
        );
    }

    #[test]
    fn test_parse_command_unterminated_quote() {
        assert_eq!(
            parse_command(r#"echo "abc"#),
            Err(ParsingError::Lexing(LexingError::UnterminatedQuote(5)))
        );
    }

    #[test]
    fn test_parse_command_empty_stage() {
        let command = parse_command("   ").unwrap();
        assert_eq!(command.program(), None);
        assert!(command.argv.is_empty());
    }

    #[test]
    fn test_first_token_is_always_the_program() {
        let command = parse_command("> f").unwrap();
        assert_eq!(command.argv, vec![plain(">"), plain("f")]);
        assert!(command.redirects.is_empty());
    }

    #[test]
    fn test_word_expansion() {
        let mut constants = ConstantStore::default();
        constants.set("NAME", "world").unwrap();
        assert_eq!(plain("hello$NAME!").expand(&constants), "helloworld!");
        assert_eq!(quoted("hello$NAME!").expand(&constants), "hello$NAME!");
    }

    #[test]
    fn test_construct_ast_right_nested() {
        let ast = construct_ast("a && b || c").unwrap();
        let cmd = |name: &str| {
            Statement::Pipeline(Pipeline {
                stages: vec![ParsedCommand {
                    argv: vec![plain(name)],
                    ..Default::default()
                }],
            })
        };
        assert_eq!(
            ast,
            Expr::And(
                cmd("a"),
                Box::new(Expr::Or(cmd("b"), Box::new(Expr::Statement(cmd("c")))))
            )
        );
    }

    #[test]
    fn test_construct_ast_blocks_are_transparent() {
        let braced = construct_ast("{a && b}").unwrap();
        let Expr::Statement(Statement::Block(inner)) = &braced else {
            panic!("expected a block, got {braced:?}");
        };
        assert_eq!(**inner, construct_ast("a && b").unwrap());
    }

    #[test]
    fn test_construct_ast_assignment_keeps_raw_value() {
        assert_eq!(
            construct_ast("GREETING = hello $NAME && more").unwrap(),
            Expr::Assign {
                key: "GREETING".to_string(),
                value: "hello $NAME && more".to_string()
            }
        );
    }

    #[test]
    fn test_construct_ast_rejects_errors_anywhere() {
        assert!(construct_ast("true ; echo \"oops").is_err());
        assert!(construct_ast("true && { false").is_err());
        assert_eq!(
            construct_ast("true ; | wc"),
            Err(ParsingError::MissingPipeSource)
        );
    }

    #[test]
    fn test_pipe_count() {
        let Expr::Statement(Statement::Pipeline(pipeline)) = construct_ast("a | b | c").unwrap() else {
            panic!("expected a pipeline");
        };
        assert_eq!(pipeline.stages.len(), 3);
        assert_eq!(pipeline.pipe_count(), 2);
        assert_eq!(Pipeline::default().pipe_count(), 0);
    }
}
