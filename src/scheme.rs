use std::fmt::Display;

use serde::Serialize;

/// Card scheme, resolved from the AID and, for co-branded CB cards, from
/// the PAN's issuer identification digits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Scheme {
    Visa,
    Mastercard,
    Amex,
    Cb,
    Discover,
    Jcb,
    UnionPay,
    Maestro,
    Interac,
    Unknown,
}

impl Scheme {
    pub fn name(&self) -> &'static str {
        match self {
            Scheme::Visa => "VISA",
            Scheme::Mastercard => "Mastercard",
            Scheme::Amex => "American Express",
            Scheme::Cb => "CB",
            Scheme::Discover => "Discover",
            Scheme::Jcb => "JCB",
            Scheme::UnionPay => "UnionPay",
            Scheme::Maestro => "Maestro",
            Scheme::Interac => "Interac",
            Scheme::Unknown => "Unknown",
        }
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Scheme lookup tables, injected into the driver so products can carry
/// their own registries.
pub trait SchemeResolver {
    fn scheme_by_aid(&self, aid: &[u8]) -> Option<Scheme>;
    fn scheme_by_pan(&self, pan: &str) -> Option<Scheme>;
    /// Candidate applications to try when the card has no readable payment
    /// system directory, in selection-priority order.
    fn known_aids(&self) -> &[(Scheme, &'static [u8])];
}

/// Registered application provider identifiers, longest-prefix matched
/// against the selected AID.
const AID_PREFIXES: &[(&[u8], Scheme)] = &[
    (&[0xa0, 0x00, 0x00, 0x00, 0x03], Scheme::Visa),
    (&[0xa0, 0x00, 0x00, 0x00, 0x04, 0x30, 0x60], Scheme::Maestro),
    (&[0xa0, 0x00, 0x00, 0x00, 0x04], Scheme::Mastercard),
    (&[0xa0, 0x00, 0x00, 0x00, 0x05], Scheme::Maestro),
    (&[0xa0, 0x00, 0x00, 0x00, 0x25], Scheme::Amex),
    (&[0xa0, 0x00, 0x00, 0x00, 0x42], Scheme::Cb),
    (&[0xa0, 0x00, 0x00, 0x00, 0x65], Scheme::Jcb),
    (&[0xa0, 0x00, 0x00, 0x01, 0x52], Scheme::Discover),
    (&[0xa0, 0x00, 0x00, 0x02, 0x77], Scheme::Interac),
    (&[0xa0, 0x00, 0x00, 0x03, 0x33], Scheme::UnionPay),
];

/// AIDs worth probing blind, most common first.
const KNOWN_AIDS: &[(Scheme, &[u8])] = &[
    (Scheme::Visa, &[0xa0, 0x00, 0x00, 0x00, 0x03, 0x10, 0x10]),
    (Scheme::Visa, &[0xa0, 0x00, 0x00, 0x00, 0x03, 0x20, 0x10]),
    (Scheme::Mastercard, &[0xa0, 0x00, 0x00, 0x00, 0x04, 0x10, 0x10]),
    (Scheme::Maestro, &[0xa0, 0x00, 0x00, 0x00, 0x04, 0x30, 0x60]),
    (Scheme::Amex, &[0xa0, 0x00, 0x00, 0x00, 0x25, 0x01]),
    (Scheme::Cb, &[0xa0, 0x00, 0x00, 0x00, 0x42, 0x10, 0x10]),
    (Scheme::Discover, &[0xa0, 0x00, 0x00, 0x01, 0x52, 0x30, 0x10]),
    (Scheme::Jcb, &[0xa0, 0x00, 0x00, 0x00, 0x65, 0x10, 0x10]),
    (Scheme::UnionPay, &[0xa0, 0x00, 0x00, 0x03, 0x33, 0x01, 0x01, 0x01]),
    (Scheme::Interac, &[0xa0, 0x00, 0x00, 0x02, 0x77, 0x10, 0x10]),
];

/// Built-in registries covering the major schemes.
pub struct DefaultSchemeResolver;

impl SchemeResolver for DefaultSchemeResolver {
    fn scheme_by_aid(&self, aid: &[u8]) -> Option<Scheme> {
        AID_PREFIXES
            .iter()
            .find(|(prefix, _)| aid.starts_with(prefix))
            .map(|(_, scheme)| *scheme)
    }

    fn scheme_by_pan(&self, pan: &str) -> Option<Scheme> {
        if pan.is_empty() || !pan.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let prefix = |n: usize| -> u32 {
            pan.get(..n)
                .and_then(|p| p.parse().ok())
                .unwrap_or(0)
        };
        let p1 = prefix(1);
        let p2 = prefix(2);
        let p4 = prefix(4);
        if p1 == 4 {
            Some(Scheme::Visa)
        } else if (51..=55).contains(&p2) || (2221..=2720).contains(&p4) {
            Some(Scheme::Mastercard)
        } else if p2 == 34 || p2 == 37 {
            Some(Scheme::Amex)
        } else if p4 == 6011 || (644..=649).contains(&prefix(3)) || p2 == 65 {
            Some(Scheme::Discover)
        } else if (3528..=3589).contains(&p4) {
            Some(Scheme::Jcb)
        } else if p2 == 62 {
            Some(Scheme::UnionPay)
        } else {
            None
        }
    }

    fn known_aids(&self) -> &[(Scheme, &'static [u8])] {
        KNOWN_AIDS
    }
}
