use chrono::{Datelike, Local};
use rand::Rng;

/// Supplies the terminal-side value for one DOL entry. The returned bytes
/// are the element's natural encoding; the DOL constructor fits them to the
/// requested length.
pub trait Terminal {
    fn construct_value(&self, tag: u32, length: usize) -> Vec<u8>;
}

/// Terminal profile of a dumb contactless reader: zero amount, no CVM, a
/// fresh unpredictable number per request.
pub struct DefaultTerminal;

impl Terminal for DefaultTerminal {
    fn construct_value(&self, tag: u32, length: usize) -> Vec<u8> {
        match tag {
            // TTQ: EMV mode, contact chip and signature supported
            0x9f66 => vec![0xf0, 0x00, 0x00, 0x00],
            // Amount, Authorised / Amount, Other: zero
            0x9f02 | 0x9f03 => vec![0; 6],
            // Terminal country / transaction currency: 0840
            0x9f1a | 0x5f2a => vec![0x08, 0x40],
            // TVR: nothing to report
            0x95 => vec![0; 5],
            // Transaction date, YYMMDD BCD
            0x9a => bcd_date(),
            // Transaction type: purchase
            0x9c => vec![0x00],
            // Unpredictable number
            0x9f37 => rand::thread_rng().gen::<[u8; 4]>().to_vec(),
            // Terminal type: unattended, offline with online capability
            0x9f35 => vec![0x22],
            _ => vec![0; length],
        }
    }
}

fn bcd_date() -> Vec<u8> {
    let today = Local::now().date_naive();
    [
        (today.year() % 100) as u8,
        today.month() as u8,
        today.day() as u8,
    ]
    .iter()
    .map(|n| (n / 10) << 4 | (n % 10))
    .collect()
}
