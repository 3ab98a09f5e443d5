//! What crl-serials can do for you.
//!
//! This module implements all the commands users can ask for. They are
//! encapsulated in the type [`Operation`] which can determine the command
//! from the command line argumments and then execute it.
//!
//! [`Operation`]: enum.Operation.html

use std::{fs, io};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use chrono::Utc;
use clap::{Args, ArgMatches, FromArgMatches, Parser};
use log::{debug, error, info};
use serde::Serialize;
use crate::config::{Config, InputFormat, OutputFormat};
use crate::crl::CertificateList;
use crate::error::{ExitError, Failed};
use crate::serial::Serial;
use crate::set::SerialSet;


//------------ Operation -----------------------------------------------------

/// The command to execute.
///
/// This type collects all the commands we have defined plus any possible
/// extra configuration they support.
///
/// You can create a value from the command line arguments. First, you add
/// all necessary sub-commands and arguments to a clap `Command` via
/// [`config_args`] and then process the argument matches into a value in
/// [`from_arg_matches`]. Finally, you can execute the created command
/// through the [`run`] method.
///
/// [`config_args`]: #method.config_args
/// [`from_arg_matches`]: #method.from_arg_matches
/// [`run`]: #method.run
#[derive(Clone, Debug)]
pub enum Operation {
    Decode(Decode),
    Serials(Serials),
    Check(Check),
    PrintConfig(PrintConfig),
}

impl Operation {
    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        let app = Decode::config_args(app);
        let app = Serials::config_args(app);
        let app = Check::config_args(app);
        PrintConfig::config_args(app)
    }

    /// Creates a command from clap matches.
    ///
    /// Relative paths are interpreted relative to `cur_dir`.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<Self, Failed> {
        Ok(match matches.subcommand() {
            Some(("decode", matches)) => {
                Operation::Decode(Decode::from_arg_matches(matches, cur_dir)?)
            }
            Some(("serials", matches)) => {
                Operation::Serials(
                    Serials::from_arg_matches(matches, cur_dir)?
                )
            }
            Some(("check", matches)) => {
                Operation::Check(Check::from_arg_matches(matches, cur_dir)?)
            }
            Some(("config", _)) => {
                Operation::PrintConfig(PrintConfig)
            }
            _ => {
                error!(
                    "Failed: a command is required.\n\
                     \nCommonly used commands are:\
                     \n   decode    Prints a summary of revocation lists\
                     \n   serials   Lists the distinct revoked serials\
                     \n   check     Checks whether a serial is revoked\
                     \n\
                     \nSee crl-serials -h for a usage summary."
                );
                return Err(Failed)
            }
        })
    }

    /// Runs the command.
    pub fn run(self, config: &Config) -> Result<(), ExitError> {
        match self {
            Operation::Decode(cmd) => cmd.run(config),
            Operation::Serials(cmd) => cmd.run(config),
            Operation::Check(cmd) => cmd.run(config),
            Operation::PrintConfig(cmd) => cmd.run(config),
        }
    }
}


//------------ Decode --------------------------------------------------------

/// Decode list bodies and print a summary for each.
#[derive(Clone, Debug, Parser)]
pub struct Decode {
    /// Files containing DER encoded revocation list bodies
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

/// The summary of a single list.
#[derive(Clone, Debug, Serialize)]
struct Summary {
    file: String,
    version: u8,
    this_update: String,
    next_update: Option<String>,
    entries: usize,
    crl_number: Option<Serial>,
    stale: bool,
}

impl Decode {
    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        app.subcommand(
            Decode::augment_args(
                clap::Command::new("decode")
                    .about("Prints a summary of revocation list bodies")
            )
        )
    }

    /// Creates a command from clap matches.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<Self, Failed> {
        let mut res = parse_args::<Self>(matches)?;
        res.files = join_paths(cur_dir, res.files);
        Ok(res)
    }

    fn run(self, config: &Config) -> Result<(), ExitError> {
        let now = Utc::now();
        let mut summaries = Vec::with_capacity(self.files.len());
        for path in &self.files {
            let crl = load_list(path, config)?;
            let crl_number = crl.crl_number().map_err(|err| {
                error!("{}: invalid CRL number: {}", path.display(), err);
                ExitError::Invalid
            })?;
            summaries.push(Summary {
                file: path.display().to_string(),
                version: crl.version().number(),
                this_update: crl.this_update().to_string(),
                next_update: crl.next_update().map(|time| time.to_string()),
                entries: crl.len(),
                crl_number,
                stale: crl.is_stale(now),
            });
        }

        let stdout = io::stdout();
        let mut target = stdout.lock();
        match config.output_format {
            OutputFormat::Text => {
                for item in &summaries {
                    Self::write_summary(&mut target, item)
                        .map_err(output_failed)?;
                }
                Ok(())
            }
            OutputFormat::Json => write_json(&mut target, &summaries)
        }
    }

    fn write_summary(
        target: &mut impl Write, item: &Summary
    ) -> Result<(), io::Error> {
        writeln!(target, "{}:", item.file)?;
        writeln!(target, "  version:     {}", item.version)?;
        writeln!(target, "  this update: {}", item.this_update)?;
        match item.next_update {
            Some(ref next) if item.stale => {
                writeln!(target, "  next update: {} (stale)", next)?
            }
            Some(ref next) => writeln!(target, "  next update: {}", next)?,
            None => writeln!(target, "  next update: none")?,
        }
        writeln!(target, "  entries:     {}", item.entries)?;
        if let Some(ref number) = item.crl_number {
            writeln!(target, "  CRL number:  {}", number)?;
        }
        Ok(())
    }
}


//------------ Serials -------------------------------------------------------

/// Print the distinct serials revoked by a number of lists.
#[derive(Clone, Debug, Parser)]
pub struct Serials {
    /// Files containing DER encoded revocation list bodies
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

impl Serials {
    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        app.subcommand(
            Serials::augment_args(
                clap::Command::new("serials")
                    .about("Lists the distinct revoked serial numbers")
            )
        )
    }

    /// Creates a command from clap matches.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<Self, Failed> {
        let mut res = parse_args::<Self>(matches)?;
        res.files = join_paths(cur_dir, res.files);
        Ok(res)
    }

    /// Collects the serials of all files into a set.
    fn collect(&self, config: &Config) -> Result<SerialSet, ExitError> {
        let mut set = SerialSet::new();
        let mut entries = 0;
        for path in &self.files {
            let crl = load_list(path, config)?;
            let new = set.add_revoked(&crl);
            debug!(
                "{}: {} entries, {} new serials.",
                path.display(), crl.len(), new
            );
            entries += crl.len();
        }
        info!(
            "Found {} entries with {} distinct serials.",
            entries, set.len()
        );
        Ok(set)
    }

    fn run(self, config: &Config) -> Result<(), ExitError> {
        let mut list = self.collect(config)?.list();
        list.sort();

        let stdout = io::stdout();
        let mut target = stdout.lock();
        match config.output_format {
            OutputFormat::Text => {
                for serial in &list {
                    writeln!(target, "{}", serial).map_err(output_failed)?;
                }
                Ok(())
            }
            OutputFormat::Json => write_json(&mut target, &list)
        }
    }
}


//------------ Check ---------------------------------------------------------

/// Check whether a serial number has been revoked.
#[derive(Clone, Debug, Parser)]
pub struct Check {
    /// The serial number in hex
    #[arg(short, long, value_name = "HEX")]
    serial: Serial,

    /// Files containing DER encoded revocation list bodies
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

/// A list that revokes the serial in question.
#[derive(Clone, Debug, Serialize)]
struct Revocation {
    file: String,
    revocation_date: String,
}

/// The result of a check.
#[derive(Clone, Debug, Serialize)]
struct CheckResult<'a> {
    serial: &'a Serial,
    revoked: bool,
    revocations: Vec<Revocation>,
}

impl Check {
    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        app.subcommand(
            Check::augment_args(
                clap::Command::new("check")
                    .about("Checks whether a serial number has been revoked")
            )
        )
    }

    /// Creates a command from clap matches.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<Self, Failed> {
        let mut res = parse_args::<Self>(matches)?;
        res.files = join_paths(cur_dir, res.files);
        Ok(res)
    }

    /// Finds all lists that revoke the serial.
    fn revocations(
        &self, config: &Config
    ) -> Result<Vec<Revocation>, ExitError> {
        let mut res = Vec::new();
        for path in &self.files {
            let crl = load_list(path, config)?;
            let entry = crl.revoked().iter().find(|entry| {
                entry.serial() == &self.serial
            });
            if let Some(entry) = entry {
                res.push(Revocation {
                    file: path.display().to_string(),
                    revocation_date: entry.revocation_date().to_string(),
                })
            }
        }
        Ok(res)
    }

    fn run(self, config: &Config) -> Result<(), ExitError> {
        let revocations = self.revocations(config)?;
        let revoked = !revocations.is_empty();

        let stdout = io::stdout();
        let mut target = stdout.lock();
        match config.output_format {
            OutputFormat::Text => {
                if revoked {
                    for item in &revocations {
                        writeln!(
                            target, "{}: revoked in {} at {}",
                            self.serial, item.file, item.revocation_date
                        ).map_err(output_failed)?;
                    }
                }
                else {
                    writeln!(target, "{}: not revoked", self.serial)
                        .map_err(output_failed)?;
                }
            }
            OutputFormat::Json => {
                write_json(&mut target, &CheckResult {
                    serial: &self.serial, revoked, revocations
                })?;
            }
        }

        if revoked {
            Ok(())
        }
        else {
            Err(ExitError::NotRevoked)
        }
    }
}


//------------ PrintConfig ---------------------------------------------------

/// Print the configuration.
#[derive(Clone, Copy, Debug)]
pub struct PrintConfig;

impl PrintConfig {
    /// Adds the command configuration to a clap app.
    pub fn config_args(app: clap::Command) -> clap::Command {
        app.subcommand(clap::Command::new("config")
            .about("Prints the current config and exits")
        )
    }

    /// Prints the current configuration to stdout and exits.
    fn run(self, config: &Config) -> Result<(), ExitError> {
        println!("{}", config);
        Ok(())
    }
}


//------------ Helpers -------------------------------------------------------

/// Converts the matches of a sub-command into its arguments.
fn parse_args<T: FromArgMatches>(matches: &ArgMatches) -> Result<T, Failed> {
    T::from_arg_matches(matches).map_err(|err| {
        error!("Failed to process command line arguments: {}", err);
        Failed
    })
}

/// Makes all paths relative to `cur_dir`.
fn join_paths(cur_dir: &Path, paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.into_iter().map(|path| cur_dir.join(path)).collect()
}

/// Reads and decodes a list body from a file.
fn load_list(
    path: &Path, config: &Config
) -> Result<CertificateList, ExitError> {
    let data = read_input(path, config)?;
    CertificateList::decode(&data).map_err(|err| {
        error!("{}: {}", path.display(), err);
        ExitError::Invalid
    })
}

/// Reads the content of an input file.
///
/// Enforces the configured size limit and strips the base64 encoding if
/// necessary.
fn read_input(path: &Path, config: &Config) -> Result<Vec<u8>, ExitError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) => {
            error!("Failed to open file {}: {}", path.display(), err);
            return Err(ExitError::Generic)
        }
    };
    let mut data = Vec::new();
    let res = match config.max_input_size {
        Some(limit) => {
            file.take(limit.saturating_add(1)).read_to_end(&mut data)
        }
        None => (&file).read_to_end(&mut data)
    };
    if let Err(err) = res {
        error!("Failed to read file {}: {}", path.display(), err);
        return Err(ExitError::Generic)
    }
    if let Some(limit) = config.max_input_size {
        if data.len() as u64 > limit {
            error!(
                "File {} exceeds maximum input size of {} bytes.",
                path.display(), limit
            );
            return Err(ExitError::Generic)
        }
    }

    match config.input_format {
        InputFormat::Der => Ok(data),
        InputFormat::Base64 => {
            data.retain(|ch| !ch.is_ascii_whitespace());
            base64::decode(&data).map_err(|err| {
                error!("{}: invalid base64: {}", path.display(), err);
                ExitError::Invalid
            })
        }
    }
}

/// Writes a value as JSON followed by a new line.
fn write_json<T: Serialize + ?Sized>(
    target: &mut impl Write, value: &T
) -> Result<(), ExitError> {
    if let Err(err) = serde_json::to_writer_pretty(&mut *target, value) {
        error!("Failed to write output: {}", err);
        return Err(ExitError::Generic)
    }
    writeln!(target).map_err(output_failed)
}

/// Logs a failure to write the output.
fn output_failed(err: io::Error) -> ExitError {
    error!("Failed to write output: {}", err);
    ExitError::Generic
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::der::test::tlv;

    const FILLED: &[u8] = include_bytes!("../test/crl/filled.der");

    fn test_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("test/crl")
    }

    fn arg_matches(args: &[&str]) -> ArgMatches {
        Operation::config_args(
            Config::config_args(clap::Command::new("crl-serials"))
        ).get_matches_from(args)
    }

    fn check(serial: &str) -> Check {
        Check {
            serial: Serial::from_hex(serial).unwrap(),
            files: vec![
                test_dir().join("empty.der"), test_dir().join("filled.der")
            ],
        }
    }

    #[test]
    fn parse_commands() {
        let cur_dir = Path::new("/work");
        match Operation::from_arg_matches(
            &arg_matches(&["crl-serials", "decode", "a.der", "/b.der"]),
            cur_dir
        ).unwrap() {
            Operation::Decode(cmd) => {
                assert_eq!(
                    cmd.files,
                    [PathBuf::from("/work/a.der"), PathBuf::from("/b.der")]
                );
            }
            _ => panic!("expected decode command")
        }
        match Operation::from_arg_matches(
            &arg_matches(&["crl-serials", "check", "-s", "00FF", "a.der"]),
            cur_dir
        ).unwrap() {
            Operation::Check(cmd) => {
                assert_eq!(cmd.serial.id(), "00ff");
                assert_eq!(cmd.files, [PathBuf::from("/work/a.der")]);
            }
            _ => panic!("expected check command")
        }
        assert!(matches!(
            Operation::from_arg_matches(
                &arg_matches(&["crl-serials", "config"]), cur_dir
            ),
            Ok(Operation::PrintConfig(_))
        ));
        assert!(
            Operation::from_arg_matches(
                &arg_matches(&["crl-serials"]), cur_dir
            ).is_err()
        );
    }

    #[test]
    fn bad_command_lines() {
        let app = Operation::config_args(
            Config::config_args(clap::Command::new("crl-serials"))
        );
        assert!(
            app.clone().try_get_matches_from(["crl-serials", "decode"])
                .is_err()
        );
        assert!(
            app.clone().try_get_matches_from(
                ["crl-serials", "check", "--serial", "xyz", "a.der"]
            ).is_err()
        );
        assert!(
            app.try_get_matches_from(["crl-serials", "check", "a.der"])
                .is_err()
        );
    }

    #[test]
    fn read_der_and_base64() {
        let dir = tempfile::tempdir().unwrap();
        let der = dir.path().join("filled.der");
        let b64 = dir.path().join("filled.b64");
        fs::write(&der, FILLED).unwrap();
        let mut encoded = base64::encode(FILLED).into_bytes();
        encoded.insert(10, b'\n');
        encoded.insert(20, b' ');
        encoded.push(b'\n');
        fs::write(&b64, encoded).unwrap();

        let mut config = Config::default();
        assert_eq!(read_input(&der, &config).unwrap(), FILLED);
        config.input_format = InputFormat::Base64;
        assert_eq!(read_input(&b64, &config).unwrap(), FILLED);
        assert_eq!(read_input(&der, &config), Err(ExitError::Invalid));
    }

    #[test]
    fn input_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filled.der");
        fs::write(&path, FILLED).unwrap();

        let mut config = Config::default();
        config.max_input_size = Some(FILLED.len() as u64);
        assert!(read_input(&path, &config).is_ok());
        config.max_input_size = Some(FILLED.len() as u64 - 1);
        assert_eq!(read_input(&path, &config), Err(ExitError::Generic));
        config.max_input_size = None;
        assert!(read_input(&path, &config).is_ok());
    }

    #[test]
    fn missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        assert_eq!(
            load_list(&dir.path().join("missing.der"), &config).unwrap_err(),
            ExitError::Generic
        );
        let path = dir.path().join("broken.der");
        fs::write(&path, tlv(0x30, b"\x02\x01")).unwrap();
        assert_eq!(
            load_list(&path, &config).unwrap_err(), ExitError::Invalid
        );
    }

    #[test]
    fn collect_serials() {
        let cmd = Serials {
            files: vec![
                test_dir().join("filled.der"), test_dir().join("filled.der")
            ],
        };
        let set = cmd.collect(&Config::default()).unwrap();
        assert_eq!(set.len(), 220);
        assert!(set.contains(
            &Serial::from_hex("0101ea518c68c0f00789e9cd92736c75").unwrap()
        ));
    }

    #[test]
    fn check_revoked() {
        let config = Config::default();
        let revocations = check("0101ea518c68c0f00789e9cd92736c75")
            .revocations(&config).unwrap();
        assert_eq!(revocations.len(), 1);
        assert!(revocations[0].file.ends_with("filled.der"));
        assert!(
            check("0101ea518c68c0f00789e9cd92736c75").run(&config).is_ok()
        );
    }

    #[test]
    fn check_not_revoked() {
        let config = Config::default();
        assert!(check("01").revocations(&config).unwrap().is_empty());
        assert_eq!(check("01").run(&config), Err(ExitError::NotRevoked));
    }
}
