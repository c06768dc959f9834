use std::process::ExitCode;

fn main() -> ExitCode {
    brickbot_cli::run()
}
