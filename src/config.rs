use crate::constants::DEFAULT_PATH;
use argh::FromArgs;

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[derive(FromArgs, Debug, Clone, PartialEq, Eq)]
/// A minimal shell with constants, pipelines and redirections.
pub struct Config {
    #[argh(option, short = 'c')]
    /// execute the provided line and exit with its status
    pub command: Option<String>,

    #[argh(option, default = "default_path()")]
    /// initial value of the PATH constant
    pub path: String,

    #[argh(option, default = "default_log_level()")]
    /// log filter used when SOYSHELL_LOG isn't set
    pub log_level: String,

    #[argh(switch)]
    /// don't record interactive lines in the editor history
    pub no_history: bool,
}
