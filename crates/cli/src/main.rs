use std::process::ExitCode;

fn main() -> ExitCode {
    aquaroute_cli::run()
}
