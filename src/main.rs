use soyshell::{Config, Interpreter, logging};

fn main() {
    let config: Config = argh::from_env();
    logging::init(&config.log_level);

    let mut shell = Interpreter::with_search_path(config.path);
    if let Some(line) = config.command {
        std::process::exit(shell.run_line(&line));
    }

    if let Err(err) = shell.repl(!config.no_history) {
        tracing::error!("error: {err:#}");
        std::process::exit(1);
    }
}
