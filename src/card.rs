use serde::Serialize;

use crate::scheme::Scheme;
use crate::transaction::TransactionRecord;

/// Counter value for "the card would not tell us".
pub const UNKNOWN_COUNTER: i32 = -1;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum CardState {
    Unknown,
    Active,
    Locked,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ApplicationStep {
    NotSelected,
    Selected,
    GpoPerformed,
}

/// One payment application advertised by the card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Application {
    pub aid: Vec<u8>,
    pub label: Option<String>,
    pub priority: Option<u8>,
    pub step: ApplicationStep,
    pub left_pin_try: i32,
    pub tx_counter: i32,
    pub transactions: Vec<TransactionRecord>,
}

impl Application {
    pub fn new(aid: Vec<u8>) -> Self {
        Application {
            aid,
            label: None,
            priority: None,
            step: ApplicationStep::NotSelected,
            left_pin_try: UNKNOWN_COUNTER,
            tx_counter: UNKNOWN_COUNTER,
            transactions: Vec::new(),
        }
    }
}

/// Everything one read session could learn about a card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub state: CardState,
    pub scheme: Scheme,
    pub pan: Option<String>,
    pub expiry: Option<String>,
    pub holder_first: Option<String>,
    pub holder_last: Option<String>,
    pub bic: Option<String>,
    pub iban: Option<String>,
    pub applications: Vec<Application>,
}

impl Card {
    pub fn new() -> Self {
        Card {
            state: CardState::Unknown,
            scheme: Scheme::Unknown,
            pan: None,
            expiry: None,
            holder_first: None,
            holder_last: None,
            bic: None,
            iban: None,
            applications: Vec::new(),
        }
    }
}

impl Default for Card {
    fn default() -> Self {
        Card::new()
    }
}

/// Order applications the way the card asks to: priority ascending, entries
/// without a priority last. The sort is stable so insertion order breaks ties.
pub fn sort_by_priority(applications: &mut [Application]) {
    applications.sort_by_key(|app| app.priority.map(u16::from).unwrap_or(u16::MAX));
}
