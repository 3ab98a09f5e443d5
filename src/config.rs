//! Configuration.
//!
//! This module primarily contains the type [`Config`] that holds all the
//! configuration used by the command line tool. It can be loaded both from
//! a TOML formatted config file and command line options.

use std::{fmt, fs};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use clap::{Args, ArgAction, ArgMatches, Command, FromArgMatches};
use dirs::home_dir;
use log::{LevelFilter, error};
use crate::error::Failed;


//------------ Defaults for Some Values --------------------------------------

/// The default log level.
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Warn;

/// The default maximum size of an input file in bytes.
const DEFAULT_MAX_INPUT_SIZE: u64 = 64 * 1024 * 1024;

/// The name of the config file looked for in the home directory.
const DEFAULT_CONFIG_FILE: &str = ".crl-serials.conf";


//------------ Config --------------------------------------------------------

/// The configuration of the command line tool.
///
/// All values are public and can be accessed directly.
///
/// The function [`config_args`] adds the global options to a clap command.
/// Its matches can then be used to create the config via
/// [`from_arg_matches`]. Finally, [`to_toml`] can be used to produce a
/// TOML value that contains a configuration file content representing the
/// current configuration.
///
/// [`config_args`]: #method.config_args
/// [`from_arg_matches`]: #method.from_arg_matches
/// [`to_toml`]: #method.to_toml
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The maximum log level.
    pub log_level: LevelFilter,

    /// Where to log to.
    pub log_target: LogTarget,

    /// How input files are encoded.
    pub input_format: InputFormat,

    /// How results are printed.
    pub output_format: OutputFormat,

    /// The maximum size of an input file in bytes.
    ///
    /// If this is `None`, files of any size are accepted.
    pub max_input_size: Option<u64>,
}

impl Config {
    /// Adds the basic arguments to a clap command.
    ///
    /// The function follows clap’s builder pattern: it takes a command,
    /// adds a bunch of arguments to it and returns it at the end.
    pub fn config_args(app: Command) -> Command {
        GlobalArgs::augment_args(app)
    }

    /// Creates a configuration from command line matches.
    ///
    /// The function attempts to create configuration from the command line
    /// arguments provided via `matches`. It will try to read a config file
    /// if provided via the config file option (`-c` or `--config`) or a
    /// file in `$HOME/.crl-serials.conf` otherwise. If the latter doesn’t
    /// exist either, starts with a default configuration.
    ///
    /// All relative paths given in command line arguments will be
    /// interpreted relative to `cur_dir`. Conversely, paths in the config
    /// file are treated as relative to the config file’s directory.
    pub fn from_arg_matches(
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<Self, Failed> {
        let args = GlobalArgs::from_matches(matches)?;
        let mut res = Self::create_base_config(
            args.config.as_ref().map(|path| cur_dir.join(path)).as_deref()
        )?;
        res.apply_args(args, cur_dir);
        Ok(res)
    }

    /// Applies the basic command line arguments to a configuration.
    ///
    /// The path arguments in `matches` will be interpreted relative to
    /// `cur_dir`.
    pub fn apply_arg_matches(
        &mut self,
        matches: &ArgMatches,
        cur_dir: &Path,
    ) -> Result<(), Failed> {
        self.apply_args(GlobalArgs::from_matches(matches)?, cur_dir);
        Ok(())
    }

    fn apply_args(&mut self, args: GlobalArgs, cur_dir: &Path) {
        // log_target
        if let Some(file) = args.logfile {
            if file == "-" {
                self.log_target = LogTarget::Stderr
            }
            else {
                self.log_target = LogTarget::File(cur_dir.join(file))
            }
        }

        // log_level
        match (args.verbose, args.quiet) {
            // This assumes that -v and -q are conflicting.
            (0, 0) => { }
            (1, 0) => self.log_level = LevelFilter::Info,
            (_, 0) => self.log_level = LevelFilter::Debug,
            (0, 1) => self.log_level = LevelFilter::Error,
            (0, _) => self.log_level = LevelFilter::Off,
            _ => { } // Conflicting options are caught by clap.
        }

        if let Some(format) = args.input_format {
            self.input_format = format
        }
        if let Some(format) = args.output_format {
            self.output_format = format
        }
        if let Some(size) = args.max_input_size {
            self.max_input_size = if size == 0 { None } else { Some(size) }
        }
    }

    /// Creates the correct base configuration for the given config file.
    ///
    /// If no config path is given, tries to read the default config in
    /// `$HOME/.crl-serials.conf`. If that doesn’t exist, creates a default
    /// config.
    fn create_base_config(path: Option<&Path>) -> Result<Self, Failed> {
        let file = match path {
            Some(path) => {
                match ConfigFile::read(path)? {
                    Some(file) => file,
                    None => {
                        error!("Cannot read config file {}", path.display());
                        return Err(Failed);
                    }
                }
            }
            None => {
                let path = match home_dir() {
                    Some(dir) => dir.join(DEFAULT_CONFIG_FILE),
                    None => return Ok(Self::default())
                };
                match ConfigFile::read(&path)? {
                    Some(file) => file,
                    None => return Ok(Self::default())
                }
            }
        };
        Self::from_config_file(file)
    }

    /// Creates a base config from a config file.
    fn from_config_file(mut file: ConfigFile) -> Result<Self, Failed> {
        let log_target = Self::log_target_from_config_file(&mut file)?;
        let res = Config {
            log_level: {
                file.take_from_str("log-level")?.unwrap_or(DEFAULT_LOG_LEVEL)
            },
            log_target,
            input_format: {
                file.take_from_str("input-format")?.unwrap_or_default()
            },
            output_format: {
                file.take_from_str("output-format")?.unwrap_or_default()
            },
            max_input_size: {
                match file.take_u64("max-input-size")? {
                    Some(0) => None,
                    Some(size) => Some(size),
                    None => Some(DEFAULT_MAX_INPUT_SIZE),
                }
            },
        };
        file.check_exhausted()?;
        Ok(res)
    }

    /// Determines the logging target from the config file.
    fn log_target_from_config_file(
        file: &mut ConfigFile
    ) -> Result<LogTarget, Failed> {
        let log_target = file.take_string("log")?;
        let log_file = file.take_path("log-file")?;
        match log_target.as_deref() {
            Some("stderr") => Ok(LogTarget::Stderr),
            Some("file") | None => {
                match log_file {
                    Some(path) => Ok(LogTarget::File(path)),
                    None if log_target.is_none() => Ok(LogTarget::Stderr),
                    None => {
                        error!(
                            "Failed in config file {}: \
                             log target \"file\" requires 'log-file' value.",
                            file.path.display()
                        );
                        Err(Failed)
                    }
                }
            }
            Some(value) => {
                error!(
                    "Failed in config file {}: invalid log target '{}'",
                    file.path.display(), value
                );
                Err(Failed)
            }
        }
    }

    /// Returns a TOML representation of the config.
    pub fn to_toml(&self) -> toml::Value {
        let mut res = toml::value::Table::new();
        res.insert(
            "log-level".into(),
            self.log_level.to_string().to_lowercase().into()
        );
        match self.log_target {
            LogTarget::Stderr => {
                res.insert("log".into(), "stderr".into());
            }
            LogTarget::File(ref file) => {
                res.insert("log".into(), "file".into());
                res.insert(
                    "log-file".into(), file.display().to_string().into()
                );
            }
        }
        res.insert(
            "input-format".into(), self.input_format.to_string().into()
        );
        res.insert(
            "output-format".into(), self.output_format.to_string().into()
        );
        res.insert(
            "max-input-size".into(),
            toml::Value::Integer(
                self.max_input_size.map(|size| {
                    i64::try_from(size).unwrap_or(i64::MAX)
                }).unwrap_or(0)
            )
        );
        toml::Value::Table(res)
    }
}


//--- Default

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: DEFAULT_LOG_LEVEL,
            log_target: LogTarget::default(),
            input_format: InputFormat::default(),
            output_format: OutputFormat::default(),
            max_input_size: Some(DEFAULT_MAX_INPUT_SIZE),
        }
    }
}


//--- Display

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_toml())
    }
}


//------------ LogTarget -----------------------------------------------------

/// The target to log to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogTarget {
    /// Stderr.
    Stderr,

    /// A file.
    ///
    /// The argument is the file name.
    File(PathBuf)
}

impl Default for LogTarget {
    fn default() -> Self {
        LogTarget::Stderr
    }
}


//------------ InputFormat ---------------------------------------------------

/// The encoding of input files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputFormat {
    /// The files contain the DER encoded list body.
    Der,

    /// The files contain the DER encoded list body in base64.
    ///
    /// White space is ignored.
    Base64,
}

impl Default for InputFormat {
    fn default() -> Self {
        InputFormat::Der
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "der" => Ok(InputFormat::Der),
            "base64" => Ok(InputFormat::Base64),
            _ => Err(format!("invalid input format '{}'", s))
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            InputFormat::Der => "der",
            InputFormat::Base64 => "base64",
        })
    }
}


//------------ OutputFormat --------------------------------------------------

/// The format of printed results.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    /// Human readable text.
    Text,

    /// JSON.
    Json,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Text
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("invalid output format '{}'", s))
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        })
    }
}


//------------ GlobalArgs ----------------------------------------------------

/// The global command line arguments.
#[derive(Clone, Debug, Args)]
struct GlobalArgs {
    /// Read base configuration from this file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Encoding of input files ("der" or "base64")
    #[arg(long, value_name = "FORMAT")]
    input_format: Option<InputFormat>,

    /// Format of printed results ("text" or "json")
    #[arg(long, value_name = "FORMAT")]
    output_format: Option<OutputFormat>,

    /// Maximum size of an input file (0 for no limit)
    #[arg(long, value_name = "BYTES")]
    max_input_size: Option<u64>,

    /// Log more information, twice for even more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Log less information, twice for no information
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,

    /// Log to this file
    #[arg(long, value_name = "PATH")]
    logfile: Option<String>,
}

impl GlobalArgs {
    fn from_matches(matches: &ArgMatches) -> Result<Self, Failed> {
        <Self as FromArgMatches>::from_arg_matches(matches).map_err(|err| {
            error!("Failed to process command line arguments: {}", err);
            Failed
        })
    }
}


//------------ ConfigFile ----------------------------------------------------

/// The content of a config file.
///
/// This is a thin wrapper around `toml::Table` to make dealing with it more
/// convenient.
#[derive(Clone, Debug)]
struct ConfigFile {
    /// The content of the file.
    content: toml::value::Table,

    /// The path to the config file.
    path: PathBuf,

    /// The directory we found the file in.
    ///
    /// This is used in relative paths.
    dir: PathBuf,
}

impl ConfigFile {
    /// Reads the config file at the given path.
    ///
    /// If there is no such file, returns `None`. If there is a file but it
    /// is broken, aborts.
    fn read(path: &Path) -> Result<Option<Self>, Failed> {
        let mut file = match fs::File::open(path) {
            Ok(file) => file,
            Err(_) => return Ok(None)
        };
        let mut config = String::new();
        if let Err(err) = file.read_to_string(&mut config) {
            error!(
                "Failed to read config file {}: {}",
                path.display(), err
            );
            return Err(Failed);
        }
        Self::parse(&config, path).map(Some)
    }

    /// Parses the content of the file from a string.
    fn parse(content: &str, path: &Path) -> Result<Self, Failed> {
        let content = match toml::from_str(content) {
            Ok(toml::Value::Table(content)) => content,
            Ok(_) => {
                error!(
                    "Failed to parse config file {}: Not a mapping.",
                    path.display()
                );
                return Err(Failed);
            }
            Err(err) => {
                error!(
                    "Failed to parse config file {}: {}",
                    path.display(), err
                );
                return Err(Failed);
            }
        };
        Ok(ConfigFile {
            content,
            path: path.into(),
            dir: path.parent().map(Into::into).unwrap_or_default(),
        })
    }

    /// Takes a string value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t a string.
    fn take_string(&mut self, key: &str) -> Result<Option<String>, Failed> {
        match self.content.remove(key) {
            Some(value) => {
                if let toml::Value::String(res) = value {
                    Ok(Some(res))
                }
                else {
                    error!(
                        "Failed in config file {}: \
                         '{}' expected to be a string.",
                        self.path.display(), key
                    );
                    Err(Failed)
                }
            }
            None => Ok(None)
        }
    }

    /// Takes an unsigned integer value from the config file.
    ///
    /// The value is taken from the given `key`. Returns `Ok(None)` if there
    /// is no such key. Returns an error if the key exists but the value
    /// isn’t an integer or is negative.
    fn take_u64(&mut self, key: &str) -> Result<Option<u64>, Failed> {
        match self.content.remove(key) {
            Some(value) => {
                if let toml::Value::Integer(res) = value {
                    match u64::try_from(res) {
                        Ok(res) => Ok(Some(res)),
                        Err(_) => {
                            error!(
                                "Failed in config file {}: \
                                 '{}' expected to be a positive integer.",
                                self.path.display(), key
                            );
                            Err(Failed)
                        }
                    }
                }
                else {
                    error!(
                        "Failed in config file {}: \
                         '{}' expected to be an integer.",
                        self.path.display(), key
                    );
                    Err(Failed)
                }
            }
            None => Ok(None)
        }
    }

    /// Takes a value from a string for the given key.
    ///
    /// The value is taken from the given `key` and converted via
    /// `FromStr`. Returns `Ok(None)` if there is no such key.
    fn take_from_str<T>(&mut self, key: &str) -> Result<Option<T>, Failed>
    where T: FromStr, T::Err: fmt::Display {
        match self.take_string(key)? {
            Some(value) => {
                match T::from_str(&value) {
                    Ok(some) => Ok(Some(some)),
                    Err(err) => {
                        error!(
                            "Failed in config file {}: \
                             illegal value in '{}': {}.",
                            self.path.display(), key, err
                        );
                        Err(Failed)
                    }
                }
            }
            None => Ok(None)
        }
    }

    /// Takes a path value from the config file.
    ///
    /// Relative paths are interpreted relative to the directory of the
    /// config file.
    fn take_path(&mut self, key: &str) -> Result<Option<PathBuf>, Failed> {
        self.take_string(key).map(|opt| opt.map(|path| self.dir.join(path)))
    }

    /// Checks whether the config file is now empty.
    ///
    /// If it isn’t, logs an error and returns an error.
    fn check_exhausted(&self) -> Result<(), Failed> {
        if !self.content.is_empty() {
            let keys = self.content.keys().map(String::as_str)
                .collect::<Vec<_>>().join(", ");
            error!(
                "Failed in config file {}: Unknown settings {}.",
                self.path.display(), keys
            );
            Err(Failed)
        }
        else {
            Ok(())
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn process_basic_args(args: &[&str]) -> Config {
        let mut config = Config::default();
        config.apply_arg_matches(
            &Config::config_args(Command::new("crl-serials"))
                .get_matches_from(args),
            Path::new("/test")
        ).unwrap();
        config
    }

    fn parse_config(content: &str) -> Result<Config, Failed> {
        Config::from_config_file(
            ConfigFile::parse(content, Path::new("/test/crl-serials.conf"))?
        )
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LevelFilter::Warn);
        assert_eq!(config.log_target, LogTarget::Stderr);
        assert_eq!(config.input_format, InputFormat::Der);
        assert_eq!(config.output_format, OutputFormat::Text);
        assert_eq!(config.max_input_size, Some(DEFAULT_MAX_INPUT_SIZE));
    }

    #[test]
    fn good_config_file() {
        let config = parse_config(
            "log-level = \"info\"\n\
             log = \"file\"\n\
             log-file = \"crl.log\"\n\
             input-format = \"base64\"\n\
             output-format = \"json\"\n\
             max-input-size = 1024\n"
        ).unwrap();
        assert_eq!(config.log_level, LevelFilter::Info);
        assert_eq!(
            config.log_target,
            LogTarget::File(PathBuf::from("/test/crl.log"))
        );
        assert_eq!(config.input_format, InputFormat::Base64);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.max_input_size, Some(1024));
    }

    #[test]
    fn minimal_config_file() {
        assert_eq!(parse_config("").unwrap(), Config::default());
        assert_eq!(
            parse_config("max-input-size = 0").unwrap().max_input_size,
            None
        );
        assert_eq!(
            parse_config("log-file = \"/var/log/crl\"").unwrap().log_target,
            LogTarget::File(PathBuf::from("/var/log/crl"))
        );
    }

    #[test]
    fn bad_config_file() {
        assert!(parse_config("log-level = 5").is_err());
        assert!(parse_config("log-level = \"loud\"").is_err());
        assert!(parse_config("log = \"syslog\"").is_err());
        assert!(parse_config("log = \"file\"").is_err());
        assert!(parse_config("input-format = \"pem\"").is_err());
        assert!(parse_config("max-input-size = -1").is_err());
        assert!(parse_config("max-input-size = \"big\"").is_err());
        assert!(parse_config("frobnicate = true").is_err());
        assert!(parse_config("this is not toml").is_err());
    }

    #[test]
    fn read_your_own_config() {
        let config = Config {
            log_level: LevelFilter::Debug,
            log_target: LogTarget::File(PathBuf::from("/var/log/crl.log")),
            input_format: InputFormat::Base64,
            output_format: OutputFormat::Json,
            max_input_size: None,
        };
        let content = config.to_string();
        assert_eq!(parse_config(&content).unwrap(), config);
        let content = Config::default().to_string();
        assert_eq!(parse_config(&content).unwrap(), Config::default());
    }

    #[test]
    fn basic_args() {
        let config = process_basic_args(&[
            "crl-serials", "--input-format", "base64",
            "--output-format", "json", "--max-input-size", "0",
            "--logfile", "out.log",
        ]);
        assert_eq!(config.input_format, InputFormat::Base64);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.max_input_size, None);
        assert_eq!(
            config.log_target,
            LogTarget::File(PathBuf::from("/test/out.log"))
        );
        let config = process_basic_args(&["crl-serials", "--logfile", "-"]);
        assert_eq!(config.log_target, LogTarget::Stderr);
    }

    #[test]
    fn verbosity() {
        assert_eq!(
            process_basic_args(&["crl-serials"]).log_level,
            LevelFilter::Warn
        );
        assert_eq!(
            process_basic_args(&["crl-serials", "-v"]).log_level,
            LevelFilter::Info
        );
        assert_eq!(
            process_basic_args(&["crl-serials", "-vv"]).log_level,
            LevelFilter::Debug
        );
        assert_eq!(
            process_basic_args(&["crl-serials", "-q"]).log_level,
            LevelFilter::Error
        );
        assert_eq!(
            process_basic_args(&["crl-serials", "-qq"]).log_level,
            LevelFilter::Off
        );
        assert!(
            Config::config_args(Command::new("crl-serials"))
                .try_get_matches_from(["crl-serials", "-v", "-q"]).is_err()
        );
    }

    #[test]
    fn config_file_from_args() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("test.conf"),
            "output-format = \"json\"\nlog-file = \"crl.log\"\n"
        ).unwrap();
        let matches = Config::config_args(Command::new("crl-serials"))
            .get_matches_from(["crl-serials", "-c", "test.conf", "-v"]);
        let config = Config::from_arg_matches(&matches, dir.path()).unwrap();
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.log_level, LevelFilter::Info);
        assert_eq!(
            config.log_target, LogTarget::File(dir.path().join("crl.log"))
        );

        let matches = Config::config_args(Command::new("crl-serials"))
            .get_matches_from(["crl-serials", "-c", "missing.conf"]);
        assert!(Config::from_arg_matches(&matches, dir.path()).is_err());
    }
}
