use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::currency;
use crate::tlv::decoders::{bcd_to_u64, be_to_u32};
use crate::tlv::{DecodeError, Dol};

/// Some VISA cards log amounts with this offset added. Undocumented;
/// observed on live cards.
const VISA_AMOUNT_OFFSET: u64 = 1_500_000_000;

/// One entry of the card's transaction log, sliced out of a log record
/// according to the Log Format DOL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    /// Minor units of `currency`.
    pub amount: i64,
    /// ISO 4217 alphabetic code, "XXX" when the log does not say.
    pub currency: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub country: Option<u16>,
    pub transaction_type: Option<u8>,
    pub counter: Option<u16>,
}

impl TransactionRecord {
    /// Slice `payload` by the Log Format entries, in order. `Ok(None)`
    /// means a well-formed record that is only log noise (amount <= 1)
    /// and must not be kept.
    pub fn parse(format: &Dol, payload: &[u8]) -> Result<Option<TransactionRecord>, DecodeError> {
        let mut tx = TransactionRecord {
            amount: 0,
            currency: currency::UNKNOWN_CURRENCY.to_string(),
            date: None,
            time: None,
            country: None,
            transaction_type: None,
            counter: None,
        };

        let mut offset = 0;
        for entry in format.entries() {
            let end = offset + entry.length;
            if payload.len() < end {
                return Err(DecodeError::MessageTooShort(end, payload.len()));
            }
            let value = &payload[offset..end];
            offset = end;

            match entry.tag {
                0x9f02 => {
                    let mut amount = bcd_to_u64(value)?;
                    if amount >= VISA_AMOUNT_OFFSET {
                        amount -= VISA_AMOUNT_OFFSET;
                    }
                    tx.amount = amount as i64;
                }
                0x5f2a => {
                    tx.currency = currency::alpha_code(bcd_to_u64(value)? as u16).to_string();
                }
                0x9a => {
                    let digits = bcd_to_u64(value)?;
                    tx.date = NaiveDate::from_ymd_opt(
                        2000 + (digits / 10000) as i32,
                        (digits / 100 % 100) as u32,
                        (digits % 100) as u32,
                    );
                }
                0x9f21 => {
                    let digits = bcd_to_u64(value)?;
                    tx.time = NaiveTime::from_hms_opt(
                        (digits / 10000) as u32,
                        (digits / 100 % 100) as u32,
                        (digits % 100) as u32,
                    );
                }
                0x9f1a => {
                    tx.country = Some(bcd_to_u64(value)? as u16);
                }
                0x9c => {
                    if let Some(b) = value.first() {
                        tx.transaction_type = Some(*b);
                    }
                }
                0x9f36 => {
                    tx.counter = Some(be_to_u32(value) as u16);
                }
                _ => {}
            }
        }

        if tx.amount <= 1 {
            return Ok(None);
        }
        Ok(Some(tx))
    }
}
