use serde::Serialize;

/// Read-session options. A plain value, fixed for the whole session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderConfig {
    /// Select the contactless PPSE ("2PAY.SYS.DDF01") rather than the
    /// contact PSE ("1PAY.SYS.DDF01").
    pub contactless: bool,
    /// Extract the transaction log when the card advertises one.
    pub read_transactions: bool,
    /// Keep reading the remaining applications after the first success.
    pub read_all_aids: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            contactless: true,
            read_transactions: true,
            read_all_aids: true,
        }
    }
}
