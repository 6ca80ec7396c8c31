use std::process::ExitCode;

fn main() -> ExitCode {
    garcon_cli::run()
}
