use std::process::ExitCode;

fn main() -> ExitCode {
    switchover_cli::run()
}
