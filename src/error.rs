//! Error types used by the command line front end.
//!
//! The library itself reports problems with decoding through
//! [`DecodeError`] and [`InvalidHex`]. Everything built on top of it uses
//! the two types defined here.
//!
//! The most important is [`Failed`]. This error indicates that an
//! operation had to be canceled for some reason and callers can assume
//! that all diagnostic information has been logged and they need not do
//! anything further.
//!
//! Secondly, [`ExitError`] is used when the program should be terminated. It
//! provides enough information to determine the exit code of the program.
//!
//! [`DecodeError`]: crate::der::DecodeError
//! [`InvalidHex`]: crate::serial::InvalidHex

use std::process;


//------------ Failed --------------------------------------------------------

/// An operation has failed to complete.
///
/// This error types is used to indicate that an operation has failed,
/// diagnostic information has been printed or logged, and the caller can’t
/// really do anything to recover.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Failed;


//------------ ExitError -----------------------------------------------------

/// An error happened that should lead to terminating the program.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitError {
    /// Something has happened.
    ///
    /// This should be exit status 1.
    Generic,

    /// An input file could not be decoded.
    ///
    /// This should be exit status 2.
    Invalid,

    /// The serial number asked about has not been revoked.
    ///
    /// This should be exit status 3.
    NotRevoked,
}

impl ExitError {
    /// Returns the process exit status for the error.
    pub fn exit_code(self) -> i32 {
        match self {
            ExitError::Generic => 1,
            ExitError::Invalid => 2,
            ExitError::NotRevoked => 3,
        }
    }

    /// Terminates the process with the appropriate exit status.
    pub fn exit(self) -> ! {
        process::exit(self.exit_code())
    }
}

impl From<Failed> for ExitError {
    fn from(_: Failed) -> ExitError {
        ExitError::Generic
    }
}
