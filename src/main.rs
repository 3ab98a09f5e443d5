//! The crl-serials binary.

use std::env::current_dir;
use std::process::exit;
use clap::{Command, crate_version};
use log::error;
use crl_serials::{Config, ExitError, Logger, Operation};

// Since `main` with a result currently insists on printing a message, but
// in our case we only get an `ExitError` if all is said and done, we make our
// own, more quiet version.
fn _main() -> Result<(), ExitError> {
    Logger::init()?;
    let cur_dir = match current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            error!(
                "Fatal: cannot get current directory ({}). Aborting.",
                err
            );
            return Err(ExitError::Generic);
        }
    };
    let matches = Operation::config_args(Config::config_args(
        Command::new("crl-serials")
            .version(crate_version!())
            .about("decodes certificate revocation lists into serial sets")
    )).get_matches();
    let config = Config::from_arg_matches(&matches, &cur_dir)?;
    Logger::switch_logging(&config)?;
    let operation = Operation::from_arg_matches(&matches, &cur_dir)?;
    operation.run(&config)
}

fn main() {
    match _main() {
        Ok(_) => exit(0),
        Err(err) => err.exit(),
    }
}
