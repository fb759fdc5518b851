//! `liftoff check-target`

use crate::error::CliResult;
use crate::output::{print_error, print_success, print_warning};
use clap::Args;
use liftoff_platform::validate_target;

#[derive(Debug, Args)]
pub struct CheckTargetArgs {
    /// Target as an operator would type it
    pub target: String,
}

pub fn execute(args: CheckTargetArgs) -> CliResult<bool> {
    match validate_target(&args.target) {
        Ok(warnings) => {
            print_success(&format!("Target '{}' is well-formed", args.target.trim()));
            for warning in &warnings {
                print_warning(warning);
            }
            Ok(true)
        }
        Err(e) => {
            print_error(&e.report_line());
            Ok(false)
        }
    }
}
