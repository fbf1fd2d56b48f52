use clap::Parser;

use commands::start::{self, StartArgs};
use commands::GlobalArgs;

mod commands;
mod output;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "start-pipeline")]
#[command(version = VERSION)]
#[command(about = "Launch the EEG transform and tuning stages via Docker, Singularity or Slurm")]
struct Cli {
    #[command(flatten)]
    args: StartArgs,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = output::map_cmd_result_to_json(start::run(cli.args, &global));

    if let Err(err) = &json_result {
        eprintln!("{}", output::diagnostic(err));
    }
    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", output::diagnostic(&err));
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
