use log::debug;

use crate::card::Card;
use crate::tlv;

/// Fields recovered from track data or the equivalent discrete tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackData {
    pub pan: String,
    /// YYMM as printed in the track.
    pub expiry: Option<String>,
    pub service_code: Option<String>,
    /// "SURNAME/FIRST" when the track carries it (track 1 only).
    pub holder: Option<String>,
}

fn valid_pan(pan: &str) -> bool {
    (8..=19).contains(&pan.len()) && pan.bytes().all(|b| b.is_ascii_digit())
}

/// Track 2 Equivalent Data (tag 57): BCD PAN, 'D' separator, YYMM expiry,
/// service code, discretionary data, 'F' padding to a whole byte.
pub fn parse_track2(raw: &[u8]) -> Option<TrackData> {
    let digits = hex::encode_upper(raw);
    let (pan, rest) = digits.split_once('D')?;
    if !valid_pan(pan) {
        return None;
    }
    let rest = rest.trim_end_matches('F');
    Some(TrackData {
        pan: pan.to_string(),
        expiry: rest.get(..4).map(str::to_string),
        service_code: rest.get(4..7).map(str::to_string),
        holder: None,
    })
}

/// Track 1 Data (tag 56): ASCII format B, `%B<pan>^<name>^<YYMM><service>...`.
pub fn parse_track1(raw: &[u8]) -> Option<TrackData> {
    let text = std::str::from_utf8(raw).ok()?;
    let text = text.strip_prefix('%').unwrap_or(text);
    let text = text.strip_prefix('B')?;
    let mut fields = text.split('^');
    let pan = fields.next()?.trim();
    if !valid_pan(pan) {
        return None;
    }
    let holder = fields.next().map(|name| name.trim().to_string());
    let rest = fields.next().unwrap_or("");
    Some(TrackData {
        pan: pan.to_string(),
        expiry: rest.get(..4).map(str::to_string),
        service_code: rest.get(4..7).map(str::to_string),
        holder: holder.filter(|name| !name.is_empty()),
    })
}

/// Pull the PAN and expiry out of a record or GPO payload, preferring track
/// data and falling back to the discrete PAN (5a) / expiration date (5f24)
/// tags. Returns whether a PAN was found.
pub fn extract_card_data(card: &mut Card, payload: &[u8]) -> bool {
    if let Some(track) = tlv::find(payload, &[0x57]).and_then(parse_track2) {
        debug!("PAN via track 2 equivalent data");
        apply(card, track);
        return true;
    }
    if let Some(track) = tlv::find(payload, &[0x56]).and_then(parse_track1) {
        debug!("PAN via track 1 data");
        apply(card, track);
        return true;
    }
    if let Some(raw) = tlv::find(payload, &[0x5a]) {
        let pan = hex::encode_upper(raw);
        let pan = pan.trim_end_matches('F');
        if valid_pan(pan) {
            debug!("PAN via discrete data elements");
            card.pan = Some(pan.to_string());
            if card.expiry.is_none() {
                // 5f24 is YYMMDD; keep the YYMM the tracks would have carried
                card.expiry = tlv::find(payload, &[0x5f24])
                    .map(hex::encode)
                    .and_then(|d| d.get(..4).map(str::to_string));
            }
            return true;
        }
    }
    false
}

fn apply(card: &mut Card, track: TrackData) {
    card.pan = Some(track.pan);
    if card.expiry.is_none() {
        card.expiry = track.expiry;
    }
    if card.holder_last.is_none() {
        if let Some(holder) = track.holder {
            let (last, first) = split_holder_name(&holder);
            card.holder_last = last;
            card.holder_first = first;
        }
    }
}

/// Cardholder Name (tag 5f20) is "SURNAME/FIRST"; either part may be
/// missing or blank.
pub fn split_holder_name(name: &str) -> (Option<String>, Option<String>) {
    let mut parts = name.split('/');
    let last = parts
        .next()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string);
    let first = parts
        .next()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string);
    (last, first)
}

/// Record the cardholder name from a payload's 5f20, first find wins.
pub fn extract_holder_name(card: &mut Card, payload: &[u8]) {
    if card.holder_last.is_some() {
        return;
    }
    if let Some(raw) = tlv::find(payload, &[0x5f20]) {
        if let Ok(name) = std::str::from_utf8(raw) {
            let (last, first) = split_holder_name(name);
            card.holder_last = last;
            card.holder_first = first;
        }
    }
}
