//! Revoked serial numbers from X.509 certificate revocation lists.
//!
//! This crate decodes the DER encoded body of a certificate revocation
//! list, the `TBSCertList` of RFC 5280, via [`CertificateList::decode`]
//! and provides the serial numbers of all revoked certificates in a
//! canonical form as [`Serial`]. A [`SerialSet`] collects these serials
//! from any number of lists, dropping duplicates.
//!
//! The command line tool built on top of this, via `main.rs`, is only a
//! very tiny frontend to the [`Config`] and [`Operation`] types.

pub use self::config::Config;
pub use self::crl::{CertificateList, CrlReason, RevokedEntry, Version};
pub use self::der::DecodeError;
pub use self::error::{ExitError, Failed};
pub use self::log::Logger;
pub use self::operation::Operation;
pub use self::serial::{InvalidHex, Serial};
pub use self::set::SerialSet;
pub use self::x509::Time;

pub mod config;
pub mod crl;
pub mod der;
pub mod error;
pub mod log;
pub mod operation;
pub mod serial;
pub mod set;
pub mod x509;
