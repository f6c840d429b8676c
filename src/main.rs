use clap::Parser;
use tradearena::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    tradearena::logging::init_logging(cli.log_json);
    run(cli)
}
