//! Read the public data of EMV payment cards: applications, PAN, expiry,
//! cardholder name, scheme, counters, and the transaction log.
//!
//! The protocol work happens in [`reader::EmvReader`], which talks to the
//! card through the [`exchange::Transceiver`] seam. Everything else is
//! parsing: ISO 7816-4 BER-TLV in [`tlv`], track data in [`track`], the
//! log format in [`transaction`].

pub mod card;
pub mod config;
pub mod currency;
pub mod exchange;
pub mod reader;
pub mod records;
pub mod scheme;
pub mod terminal;
pub mod tlv;
pub mod track;
pub mod transaction;

pub use card::{Application, ApplicationStep, Card, CardState};
pub use config::ReaderConfig;
pub use exchange::{CommunicationError, PcscTransceiver, Transceiver};
pub use reader::EmvReader;
pub use scheme::{DefaultSchemeResolver, Scheme, SchemeResolver};
pub use terminal::{DefaultTerminal, Terminal};
