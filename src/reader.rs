use log::{debug, info, warn};

use crate::card::{sort_by_priority, Application, ApplicationStep, Card, CardState, UNKNOWN_COUNTER};
use crate::config::ReaderConfig;
use crate::exchange::{exchange, sw_is_success, ApduCommand, CommunicationError, Transceiver};
use crate::records::{self, read_directory_records, AflEntry};
use crate::scheme::{Scheme, SchemeResolver};
use crate::terminal::Terminal;
use crate::tlv::{self, decoders::be_to_u32, Dol, FieldMap};
use crate::track;
use crate::transaction::TransactionRecord;

/// Payment System Environment names, contactless and contact.
const PPSE: &[u8] = b"2PAY.SYS.DDF01";
const PSE: &[u8] = b"1PAY.SYS.DDF01";

/// Drives one read session against one card and returns what it learned.
///
/// The card is a half-duplex peer; everything happens sequentially on the
/// caller's thread, one APDU at a time.
pub struct EmvReader<'a> {
    transceiver: &'a mut dyn Transceiver,
    terminal: &'a dyn Terminal,
    schemes: &'a dyn SchemeResolver,
    config: ReaderConfig,
}

impl<'a> EmvReader<'a> {
    pub fn new(
        transceiver: &'a mut dyn Transceiver,
        terminal: &'a dyn Terminal,
        schemes: &'a dyn SchemeResolver,
        config: ReaderConfig,
    ) -> Self {
        EmvReader {
            transceiver,
            terminal,
            schemes,
            config,
        }
    }

    /// Discover the card's applications and read the first (or every)
    /// one that answers. Only transport failures abort; a card that
    /// refuses everything comes back as `CardState::Locked`.
    pub fn read_card(&mut self) -> Result<Card, CommunicationError> {
        let mut card = Card::new();

        let directory = if self.config.contactless { PPSE } else { PSE };
        let (response, sw) = exchange(self.transceiver, &ApduCommand::select(directory))?;

        if sw_is_success(sw) {
            let mut applications = self.parse_fci(&response)?;
            sort_by_priority(&mut applications);
            info!("Directory lists {} application(s)", applications.len());

            let mut any_success = false;
            for application in applications.iter_mut() {
                if self.read_application(&mut card, application)? {
                    any_success = true;
                    if !self.config.read_all_aids {
                        break;
                    }
                }
            }
            card.applications = applications;
            card.state = if any_success {
                CardState::Active
            } else {
                CardState::Locked
            };
        } else {
            debug!("No payment system directory ({:04x}), probing known AIDs", sw);
            card.state = CardState::Locked;
            let schemes = self.schemes;
            for (scheme, aid) in schemes.known_aids() {
                debug!("Probing {} AID {}", scheme, hex::encode_upper(aid));
                let mut application = Application::new(aid.to_vec());
                if self.read_application(&mut card, &mut application)? {
                    card.applications = vec![application];
                    card.state = CardState::Active;
                    break;
                }
            }
        }

        Ok(card)
    }

    /// Collect the Application Templates (tag 61) the directory advertises,
    /// either from the records of the SFI named in the FCI or from the FCI
    /// itself, and turn them into applications to select.
    fn parse_fci(&mut self, response: &[u8]) -> Result<Vec<Application>, CommunicationError> {
        let mut templates: Vec<Vec<u8>> = Vec::new();

        let sfi = tlv::find(response, &[0x88])
            .and_then(|value| value.first().copied())
            .filter(|sfi| *sfi != 0 && sfi & 0xe0 == 0);
        match sfi {
            Some(sfi) => {
                for record in read_directory_records(self.transceiver, sfi)? {
                    for template in tlv::find_all(&record, 0x61) {
                        templates.push(template.to_vec());
                    }
                }
            }
            None => {
                for template in tlv::find_all(response, 0x61) {
                    templates.push(template.to_vec());
                }
            }
        }

        let mut applications = Vec::new();
        for template in &templates {
            let Some(aid) = tlv::find(template, &[0x4f]) else {
                continue;
            };
            if !(5..=16).contains(&aid.len()) {
                debug!("Skipping template with bad AID length {}", aid.len());
                continue;
            }
            let mut application = Application::new(aid.to_vec());
            application.label = tlv::find(template, &[0x50]).and_then(ascii_string);
            application.priority = tlv::find(template, &[0x87])
                .and_then(|value| value.first())
                .map(|b| b & 0x0f);
            applications.push(application);
        }
        Ok(applications)
    }

    /// SELECT one application and pull everything public out of it.
    /// Returns whether the application yielded a PAN.
    fn read_application(
        &mut self,
        card: &mut Card,
        application: &mut Application,
    ) -> Result<bool, CommunicationError> {
        info!("Selecting application {}", hex::encode_upper(&application.aid));
        let (response, sw) = exchange(self.transceiver, &ApduCommand::select(&application.aid))?;
        if !sw_is_success(sw) {
            debug!("SELECT refused ({:04x})", sw);
            return Ok(false);
        }
        application.step = ApplicationStep::Selected;

        if application.label.is_none() {
            application.label = tlv::find(&response, &[0x50, 0x9f12]).and_then(ascii_string);
        }
        // Some banks put account details straight into the FCI
        if card.bic.is_none() {
            card.bic = tlv::find(&response, &[0x5f54]).and_then(ascii_string);
        }
        if card.iban.is_none() {
            card.iban = tlv::find(&response, &[0x5f53]).and_then(ascii_string);
        }

        // 9f4d per the book; df60 is what VISA cards actually use
        let log_entry = tlv::find(&response, &[0x9f4d, 0xdf60])
            .filter(|value| value.len() == 2)
            .map(|value| (value[0], value[1]));

        let pdol = tlv::find(&response, &[0x9f38]).and_then(|raw| Dol::try_from(raw).ok());

        // GPO with the PDOL the card asked for, then with an empty command
        // template, then READ RECORD as a last resort
        let gpo_data = match &pdol {
            Some(dol) => tlv::encode_tlv(0x83, &dol.construct(self.terminal)),
            None => vec![0x83, 0x00],
        };
        let (mut response, mut sw) = exchange(
            self.transceiver,
            &ApduCommand::get_processing_options(&gpo_data),
        )?;
        if !sw_is_success(sw) && pdol.is_some() {
            debug!("GPO refused ({:04x}), retrying with an empty PDOL", sw);
            (response, sw) = exchange(
                self.transceiver,
                &ApduCommand::get_processing_options(&[0x83, 0x00]),
            )?;
        }
        if !sw_is_success(sw) {
            debug!("GPO refused ({:04x}), falling back to READ RECORD", sw);
            (response, sw) = exchange(self.transceiver, &ApduCommand::read_record(1, 1))?;
        }
        if !sw_is_success(sw) {
            return Ok(false);
        }
        application.step = ApplicationStep::GpoPerformed;

        if !self.extract_common_data(card, &response)? {
            // Nothing usable came back, so this does not count as a read
            // application
            application.step = ApplicationStep::Selected;
            return Ok(false);
        }

        self.resolve_scheme(card, &application.aid);

        application.left_pin_try = self.read_counter(0x9f17)?;
        application.tx_counter = self.read_counter(0x9f36)?;

        if self.config.read_transactions {
            if let Some((sfi, count)) = log_entry {
                application.transactions = self.read_transaction_log(sfi, count)?;
            }
        }

        Ok(true)
    }

    /// Dig the PAN (and whatever else is nearby) out of a GPO response.
    /// Format 1 responses carry the AIP and AFL concatenated; format 2
    /// responses are TLV and may carry track data directly.
    fn extract_common_data(
        &mut self,
        card: &mut Card,
        response: &[u8],
    ) -> Result<bool, CommunicationError> {
        if let Some(rmt1) = tlv::find(response, &[0x80]) {
            if rmt1.len() < 2 {
                return Ok(false);
            }
            // First 2 bytes are the AIP, the rest is the AFL
            return self.walk_afl_for_pan(card, &rmt1[2..]);
        }

        if let Some(rmt2) = tlv::find(response, &[0x77]) {
            if track::extract_card_data(card, response) {
                track::extract_holder_name(card, response);
                return Ok(true);
            }
            if let Some(afl) = tlv::find(rmt2, &[0x94]) {
                return self.walk_afl_for_pan(card, afl);
            }
        }

        Ok(false)
    }

    fn walk_afl_for_pan(
        &mut self,
        card: &mut Card,
        afl: &[u8],
    ) -> Result<bool, CommunicationError> {
        let entries = AflEntry::parse_all(afl);
        debug!("Walking {} AFL entr(ies)", entries.len());

        let mut fields = FieldMap::new();
        let found = records::walk_afl(self.transceiver, &entries, |payload| {
            tlv::collect_fields(payload, &mut fields);
            track::extract_holder_name(card, payload);
            track::extract_card_data(card, payload)
        })?;

        // Account details sometimes live in the records rather than the FCI
        if card.bic.is_none() {
            card.bic = fields.get(&0x5f54).and_then(|value| ascii_string(value));
        }
        if card.iban.is_none() {
            card.iban = fields.get(&0x5f53).and_then(|value| ascii_string(value));
        }

        Ok(found)
    }

    fn resolve_scheme(&self, card: &mut Card, aid: &[u8]) {
        let mut scheme = self.schemes.scheme_by_aid(aid).unwrap_or(Scheme::Unknown);
        if scheme == Scheme::Cb {
            // CB cards are co-branded; the PAN says which network they
            // actually run on
            if let Some(by_pan) = card
                .pan
                .as_deref()
                .and_then(|pan| self.schemes.scheme_by_pan(pan))
            {
                scheme = by_pan;
            }
        }
        info!("Card scheme: {}", scheme);
        card.scheme = scheme;
    }

    /// GET DATA for a counter-ish tag (PIN tries left, ATC). A refusal is
    /// not an error, it reads as "the card would not tell us".
    fn read_counter(&mut self, tag: u16) -> Result<i32, CommunicationError> {
        let (response, sw) = exchange(self.transceiver, &ApduCommand::get_data(tag))?;
        if !sw_is_success(sw) {
            return Ok(UNKNOWN_COUNTER);
        }
        let value = tlv::find(&response, &[tag as u32]).unwrap_or(&response);
        if value.is_empty() {
            return Ok(UNKNOWN_COUNTER);
        }
        Ok(be_to_u32(value) as i32)
    }

    /// Fetch the Log Format and slice the log records by it. Records the
    /// card refuses end the log; records that fail to parse are dropped.
    fn read_transaction_log(
        &mut self,
        sfi: u8,
        count: u8,
    ) -> Result<Vec<TransactionRecord>, CommunicationError> {
        let (response, sw) = exchange(self.transceiver, &ApduCommand::get_data(0x9f4f))?;
        if !sw_is_success(sw) {
            debug!("Card advertises a log but no Log Format");
            return Ok(Vec::new());
        }
        let raw_format = tlv::find(&response, &[0x9f4f]).unwrap_or(&response);
        let Ok(format) = Dol::try_from(raw_format) else {
            return Ok(Vec::new());
        };
        if format.is_empty() {
            return Ok(Vec::new());
        }

        let mut transactions = Vec::new();
        for record in 1..=count {
            let (payload, sw) = exchange(self.transceiver, &ApduCommand::read_record(sfi, record))?;
            if !sw_is_success(sw) {
                break;
            }
            match TransactionRecord::parse(&format, &payload) {
                Ok(Some(tx)) => transactions.push(tx),
                Ok(None) => debug!("Skipping noise log record {:02x}", record),
                Err(err) => warn!("Dropping unreadable log record {:02x}: {}", record, err),
            }
        }
        info!("Extracted {} transaction(s)", transactions.len());
        Ok(transactions)
    }
}

fn ascii_string(raw: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(raw).ok()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}
