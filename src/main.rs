//! cnholiday - Chinese public holiday queries from the command line
//!
//! Answers whether a date is a holiday or a compensatory workday, lists a
//! year's holidays and counts down to the next one. Results are printed as
//! JSON on stdout; logs go to stderr.

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tokio::io::BufReader;

use cnholiday::app::{render, App};
use cnholiday::cache::SweepConfig;
use cnholiday::cli::{Cli, Command};
use cnholiday::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet, cli.log_json)?;

    let app = App::from_config(&cli.app_config())?;

    if cli.command == Command::Shell {
        let input = BufReader::new(tokio::io::stdin());
        app.run_shell(input, tokio::io::stdout(), SweepConfig::default())
            .await?;
        return Ok(ExitCode::SUCCESS);
    }

    let result = app.execute(&cli.command).await;
    println!("{}", render(&result, true)?);

    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
