//! Session driver tests against a scripted card. Every test pins the exact
//! APDU sequence the driver is allowed to send; an unexpected or missing
//! command fails the test.

use std::collections::VecDeque;

use chrono::NaiveDate;
use hex_literal::hex;

use emvread::{
    ApplicationStep, CardState, CommunicationError, DefaultSchemeResolver, DefaultTerminal,
    EmvReader, ReaderConfig, Scheme, Transceiver,
};

struct ScriptedCard {
    script: VecDeque<(Vec<u8>, Vec<u8>)>,
}

impl ScriptedCard {
    fn new(steps: &[(&[u8], &[u8])]) -> Self {
        ScriptedCard {
            script: steps
                .iter()
                .map(|(cmd, resp)| (cmd.to_vec(), resp.to_vec()))
                .collect(),
        }
    }

    fn assert_done(&self) {
        assert!(
            self.script.is_empty(),
            "{} scripted exchange(s) never happened",
            self.script.len()
        );
    }
}

impl Transceiver for ScriptedCard {
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, CommunicationError> {
        let (expected, response) = self
            .script
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command {}", hex::encode(command)));
        assert_eq!(
            hex::encode(command),
            hex::encode(&expected),
            "command out of order"
        );
        Ok(response)
    }

    fn is_connected(&self) -> bool {
        true
    }
}

fn read(card: &mut ScriptedCard, config: ReaderConfig) -> emvread::Card {
    let terminal = DefaultTerminal;
    let schemes = DefaultSchemeResolver;
    let result = EmvReader::new(card, &terminal, &schemes, config)
        .read_card()
        .expect("scripted session must not hit transport errors");
    card.assert_done();
    result
}

const SELECT_PPSE: &[u8] = &hex!("00 a4 04 00 0e 325041592e5359532e4444463031 00");
const SELECT_PSE: &[u8] = &hex!("00 a4 04 00 0e 315041592e5359532e4444463031 00");

#[test]
fn ppse_with_single_visa_application() {
    let mut card = ScriptedCard::new(&[
        (
            SELECT_PPSE,
            &hex!(
                "6f 23
                   84 0e 325041592e5359532e4444463031
                   a5 11 bf0c 0e 61 0c 4f 07 a0000000031010 50 01 56
                 9000"
            ),
        ),
        (
            &hex!("00 a4 04 00 07 a0000000031010 00"),
            &hex!(
                "6f 19
                   84 07 a0000000031010
                   a5 0e 50 01 56 5f2d 02 656e 9f38 03 9f6604
                 9000"
            ),
        ),
        (
            &hex!("80 a8 00 00 06 8304f0000000 00"),
            &hex!("77 0a 82 02 1980 94 04 08010100 9000"),
        ),
        (
            &hex!("00 b2 01 0c 00"),
            &hex!(
                "70 20
                   57 12 4111111111111111d251220100000000000f
                   5f20 09 564953412054455354
                 9000"
            ),
        ),
        (&hex!("80 ca 9f17 00"), &hex!("9f17 01 03 9000")),
        (&hex!("80 ca 9f36 00"), &hex!("9f36 02 002a 9000")),
    ]);

    let result = read(&mut card, ReaderConfig::default());

    assert_eq!(result.state, CardState::Active);
    assert_eq!(result.scheme, Scheme::Visa);
    assert_eq!(result.pan.as_deref(), Some("4111111111111111"));
    assert_eq!(result.expiry.as_deref(), Some("2512"));
    assert_eq!(result.holder_last.as_deref(), Some("VISA TEST"));
    assert_eq!(result.holder_first, None);

    assert_eq!(result.applications.len(), 1);
    let app = &result.applications[0];
    assert_eq!(app.aid, hex!("a0000000031010"));
    assert_eq!(app.label.as_deref(), Some("V"));
    assert_eq!(app.step, ApplicationStep::GpoPerformed);
    assert_eq!(app.left_pin_try, 3);
    assert_eq!(app.tx_counter, 42);
    assert!(app.transactions.is_empty());
}

#[test]
fn pse_directory_walk_over_sfi() {
    let mut card = ScriptedCard::new(&[
        // Contact PSE names an SFI instead of listing applications inline
        (
            SELECT_PSE,
            &hex!("6f 15 84 0e 315041592e5359532e4444463031 a5 03 88 01 01 9000"),
        ),
        (
            &hex!("00 b2 01 0c 00"),
            &hex!("70 0e 61 0c 4f 07 a0000000031010 50 01 56 9000"),
        ),
        (&hex!("00 b2 02 0c 00"), &hex!("6a83")),
        (
            &hex!("00 a4 04 00 07 a0000000031010 00"),
            &hex!("6f 09 84 07 a0000000031010 9000"),
        ),
        (
            &hex!("80 a8 00 00 02 8300 00"),
            &hex!("80 06 1980 08010100 9000"),
        ),
        (
            &hex!("00 b2 01 0c 00"),
            &hex!("70 14 57 12 4111111111111111d251220100000000000f 9000"),
        ),
        (&hex!("80 ca 9f17 00"), &hex!("6a81")),
        (&hex!("80 ca 9f36 00"), &hex!("6a81")),
    ]);

    let config = ReaderConfig {
        contactless: false,
        ..ReaderConfig::default()
    };
    let result = read(&mut card, config);

    assert_eq!(result.state, CardState::Active);
    assert_eq!(result.scheme, Scheme::Visa);
    assert_eq!(result.pan.as_deref(), Some("4111111111111111"));
    assert_eq!(result.applications.len(), 1);
    assert_eq!(result.applications[0].label.as_deref(), Some("V"));
    // The card would not hand out its counters
    assert_eq!(result.applications[0].left_pin_try, -1);
    assert_eq!(result.applications[0].tx_counter, -1);
}

#[test]
fn applications_are_read_in_priority_order() {
    let mut card = ScriptedCard::new(&[
        // Visa listed first but with priority 2; Mastercard has priority 1
        (
            SELECT_PPSE,
            &hex!(
                "6f 31
                   84 0e 325041592e5359532e4444463031
                   a5 1f bf0c 1c
                     61 0c 4f 07 a0000000031010 87 01 02
                     61 0c 4f 07 a0000000041010 87 01 01
                 9000"
            ),
        ),
        (
            &hex!("00 a4 04 00 07 a0000000041010 00"),
            &hex!("6f 09 84 07 a0000000041010 9000"),
        ),
        (
            &hex!("80 a8 00 00 02 8300 00"),
            &hex!("80 06 1980 08010100 9000"),
        ),
        (
            &hex!("00 b2 01 0c 00"),
            &hex!("70 14 57 12 5500000000000004d261220100000000000f 9000"),
        ),
        (&hex!("80 ca 9f17 00"), &hex!("6a81")),
        (&hex!("80 ca 9f36 00"), &hex!("6a81")),
        // read_all_aids keeps going; the lower-priority Visa app refuses
        (&hex!("00 a4 04 00 07 a0000000031010 00"), &hex!("6a82")),
    ]);

    let result = read(&mut card, ReaderConfig::default());

    assert_eq!(result.state, CardState::Active);
    assert_eq!(result.scheme, Scheme::Mastercard);
    assert_eq!(result.applications.len(), 2);
    assert_eq!(result.applications[0].aid, hex!("a0000000041010"));
    assert_eq!(result.applications[0].step, ApplicationStep::GpoPerformed);
    assert_eq!(result.applications[1].aid, hex!("a0000000031010"));
    assert_eq!(result.applications[1].step, ApplicationStep::NotSelected);
}

#[test]
fn aid_fallback_after_empty_ppse() {
    let mut card = ScriptedCard::new(&[
        (SELECT_PPSE, &hex!("6a82")),
        // Known AIDs are probed in order until one answers
        (&hex!("00 a4 04 00 07 a0000000031010 00"), &hex!("6a82")),
        (&hex!("00 a4 04 00 07 a0000000032010 00"), &hex!("6a82")),
        (
            &hex!("00 a4 04 00 07 a0000000041010 00"),
            &hex!("6f 0f 84 07 a0000000041010 a5 04 50 02 4d43 9000"),
        ),
        (
            &hex!("80 a8 00 00 02 8300 00"),
            &hex!("80 06 1980 08010100 9000"),
        ),
        (
            &hex!("00 b2 01 0c 00"),
            &hex!("70 14 57 12 5500000000000004d261220100000000000f 9000"),
        ),
        (&hex!("80 ca 9f17 00"), &hex!("6a81")),
        (&hex!("80 ca 9f36 00"), &hex!("6a81")),
    ]);

    let result = read(&mut card, ReaderConfig::default());

    assert_eq!(result.state, CardState::Active);
    assert_eq!(result.scheme, Scheme::Mastercard);
    assert_eq!(result.pan.as_deref(), Some("5500000000000004"));
    assert_eq!(result.applications.len(), 1);
    assert_eq!(result.applications[0].label.as_deref(), Some("MC"));
}

#[test]
fn locked_card() {
    let mut steps: Vec<(&[u8], &[u8])> = vec![(SELECT_PPSE, &hex!("6a82"))];
    let probes: &[&[u8]] = &[
        &hex!("00 a4 04 00 07 a0000000031010 00"),
        &hex!("00 a4 04 00 07 a0000000032010 00"),
        &hex!("00 a4 04 00 07 a0000000041010 00"),
        &hex!("00 a4 04 00 07 a0000000043060 00"),
        &hex!("00 a4 04 00 06 a00000002501 00"),
        &hex!("00 a4 04 00 07 a0000000421010 00"),
        &hex!("00 a4 04 00 07 a0000001523010 00"),
        &hex!("00 a4 04 00 07 a0000000651010 00"),
        &hex!("00 a4 04 00 08 a000000333010101 00"),
        &hex!("00 a4 04 00 07 a0000002771010 00"),
    ];
    for probe in probes.iter().copied() {
        steps.push((probe, &hex!("6a82")));
    }
    let mut card = ScriptedCard::new(&steps);

    let result = read(&mut card, ReaderConfig::default());

    assert_eq!(result.state, CardState::Locked);
    assert_eq!(result.pan, None);
    assert!(result.applications.is_empty());
}

#[test]
fn wrong_length_answer_is_retried_exactly_once() {
    let mut card = ScriptedCard::new(&[
        (
            SELECT_PPSE,
            &hex!(
                "6f 23
                   84 0e 325041592e5359532e4444463031
                   a5 11 bf0c 0e 61 0c 4f 07 a0000000031010 50 01 56
                 9000"
            ),
        ),
        (
            &hex!("00 a4 04 00 07 a0000000031010 00"),
            &hex!("6f 19 84 07 a0000000031010 a5 0e 50 01 56 5f2d 02 656e 9f38 03 9f6604 9000"),
        ),
        (
            &hex!("80 a8 00 00 06 8304f0000000 00"),
            &hex!("77 0a 82 02 1980 94 04 08010100 9000"),
        ),
        // The card corrects our Le; the follow-up must carry it verbatim
        (&hex!("00 b2 01 0c 00"), &hex!("6c22")),
        (
            &hex!("00 b2 01 0c 22"),
            &hex!(
                "70 20
                   57 12 4111111111111111d251220100000000000f
                   5f20 09 564953412054455354
                 9000"
            ),
        ),
        (&hex!("80 ca 9f17 00"), &hex!("6a81")),
        (&hex!("80 ca 9f36 00"), &hex!("6a81")),
    ]);

    let result = read(&mut card, ReaderConfig::default());

    assert_eq!(result.state, CardState::Active);
    assert_eq!(result.pan.as_deref(), Some("4111111111111111"));
}

#[test]
fn gpo_fallback_chain() {
    let mut card = ScriptedCard::new(&[
        (
            SELECT_PPSE,
            &hex!(
                "6f 23
                   84 0e 325041592e5359532e4444463031
                   a5 11 bf0c 0e 61 0c 4f 07 a0000000031010 50 01 56
                 9000"
            ),
        ),
        (
            &hex!("00 a4 04 00 07 a0000000031010 00"),
            &hex!("6f 19 84 07 a0000000031010 a5 0e 50 01 56 5f2d 02 656e 9f38 03 9f6604 9000"),
        ),
        // GPO with the card's PDOL, then with an empty command template,
        // then the READ RECORD last resort
        (&hex!("80 a8 00 00 06 8304f0000000 00"), &hex!("6985")),
        (&hex!("80 a8 00 00 02 8300 00"), &hex!("6985")),
        (
            &hex!("00 b2 01 0c 00"),
            &hex!("70 14 57 12 4111111111111111d251220100000000000f 9000"),
        ),
        (&hex!("80 ca 9f17 00"), &hex!("6a81")),
        (&hex!("80 ca 9f36 00"), &hex!("6a81")),
    ]);

    let result = read(&mut card, ReaderConfig::default());

    assert_eq!(result.state, CardState::Active);
    assert_eq!(result.pan.as_deref(), Some("4111111111111111"));
    assert_eq!(result.applications[0].step, ApplicationStep::GpoPerformed);
}

#[test]
fn transaction_log_extraction() {
    let mut card = ScriptedCard::new(&[
        (
            SELECT_PPSE,
            &hex!(
                "6f 23
                   84 0e 325041592e5359532e4444463031
                   a5 11 bf0c 0e 61 0c 4f 07 a0000000031010 50 01 56
                 9000"
            ),
        ),
        // FCI advertises a 3-record log in SFI 11
        (
            &hex!("00 a4 04 00 07 a0000000031010 00"),
            &hex!(
                "6f 19
                   84 07 a0000000031010
                   a5 0e 50 01 56 9f4d 02 0b03 9f38 03 9f6604
                 9000"
            ),
        ),
        (
            &hex!("80 a8 00 00 06 8304f0000000 00"),
            &hex!("77 0a 82 02 1980 94 04 08010100 9000"),
        ),
        (
            &hex!("00 b2 01 0c 00"),
            &hex!("70 14 57 12 4111111111111111d251220100000000000f 9000"),
        ),
        (&hex!("80 ca 9f17 00"), &hex!("9f17 01 03 9000")),
        (&hex!("80 ca 9f36 00"), &hex!("9f36 02 002a 9000")),
        (&hex!("80 ca 9f4f 00"), &hex!("9f4f 08 9f0206 5f2a02 9a03 9000")),
        // Amounts carry the VISA offset; the second normalizes to 1 and is
        // log noise
        (
            &hex!("00 b2 01 5c 00"),
            &hex!("001500000100 0978 260115 9000"),
        ),
        (
            &hex!("00 b2 02 5c 00"),
            &hex!("001500000001 0978 260116 9000"),
        ),
        (&hex!("00 b2 03 5c 00"), &hex!("6a83")),
    ]);

    let result = read(&mut card, ReaderConfig::default());

    assert_eq!(result.state, CardState::Active);
    let transactions = &result.applications[0].transactions;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount, 100);
    assert_eq!(transactions[0].currency, "EUR");
    assert_eq!(transactions[0].date, NaiveDate::from_ymd_opt(2026, 1, 15));
}

#[test]
fn cb_scheme_is_overridden_by_pan() {
    let mut card = ScriptedCard::new(&[
        (
            SELECT_PPSE,
            &hex!(
                "6f 20
                   84 0e 325041592e5359532e4444463031
                   a5 0e bf0c 0b 61 09 4f 07 a0000000421010
                 9000"
            ),
        ),
        (
            &hex!("00 a4 04 00 07 a0000000421010 00"),
            &hex!("6f 09 84 07 a0000000421010 9000"),
        ),
        (
            &hex!("80 a8 00 00 02 8300 00"),
            &hex!("80 06 1980 08010100 9000"),
        ),
        (
            &hex!("00 b2 01 0c 00"),
            &hex!("70 14 57 12 4974000000000000d261220100000000000f 9000"),
        ),
        (&hex!("80 ca 9f17 00"), &hex!("6a81")),
        (&hex!("80 ca 9f36 00"), &hex!("6a81")),
    ]);

    let result = read(&mut card, ReaderConfig::default());

    assert_eq!(result.state, CardState::Active);
    assert_eq!(result.pan.as_deref(), Some("4974000000000000"));
    // The AID says CB, the PAN says which network actually runs the card
    assert_eq!(result.scheme, Scheme::Visa);
}

#[test]
fn bank_details_are_harvested_from_the_fci() {
    let mut card = ScriptedCard::new(&[
        (
            SELECT_PPSE,
            &hex!(
                "6f 20
                   84 0e 325041592e5359532e4444463031
                   a5 0e bf0c 0b 61 09 4f 07 a0000000031010
                 9000"
            ),
        ),
        (
            &hex!("00 a4 04 00 07 a0000000031010 00"),
            &hex!(
                "6f 29
                   84 07 a0000000031010
                   a5 1e
                     5f54 08 4147524946524151
                     5f53 10 46523736333030303630303031303131
                 9000"
            ),
        ),
        (
            &hex!("80 a8 00 00 02 8300 00"),
            &hex!("80 06 1980 08010100 9000"),
        ),
        (
            &hex!("00 b2 01 0c 00"),
            &hex!("70 14 57 12 4974000000000000d261220100000000000f 9000"),
        ),
        (&hex!("80 ca 9f17 00"), &hex!("6a81")),
        (&hex!("80 ca 9f36 00"), &hex!("6a81")),
    ]);

    let result = read(&mut card, ReaderConfig::default());

    assert_eq!(result.bic.as_deref(), Some("AGRIFRAQ"));
    assert_eq!(result.iban.as_deref(), Some("FR76300060001011"));
}

#[test]
fn first_app_only_stops_after_a_success() {
    let mut card = ScriptedCard::new(&[
        (
            SELECT_PPSE,
            &hex!(
                "6f 31
                   84 0e 325041592e5359532e4444463031
                   a5 1f bf0c 1c
                     61 0c 4f 07 a0000000041010 87 01 01
                     61 0c 4f 07 a0000000031010 87 01 02
                 9000"
            ),
        ),
        (
            &hex!("00 a4 04 00 07 a0000000041010 00"),
            &hex!("6f 09 84 07 a0000000041010 9000"),
        ),
        (
            &hex!("80 a8 00 00 02 8300 00"),
            &hex!("80 06 1980 08010100 9000"),
        ),
        (
            &hex!("00 b2 01 0c 00"),
            &hex!("70 14 57 12 5500000000000004d261220100000000000f 9000"),
        ),
        (&hex!("80 ca 9f17 00"), &hex!("6a81")),
        (&hex!("80 ca 9f36 00"), &hex!("6a81")),
        // No SELECT for the second application
    ]);

    let config = ReaderConfig {
        read_all_aids: false,
        ..ReaderConfig::default()
    };
    let result = read(&mut card, config);

    assert_eq!(result.state, CardState::Active);
    assert_eq!(result.applications.len(), 2);
    assert_eq!(result.applications[1].step, ApplicationStep::NotSelected);
}
