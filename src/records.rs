use log::debug;

use crate::exchange::{exchange, sw_is_success, ApduCommand, CommunicationError, Transceiver};

/// Directory files never hold more records than this.
pub const MAX_SFI_RECORDS: u8 = 16;

/// Scan a directory SFI record by record until the card stops answering.
/// The first non-success status ends the file.
pub fn read_directory_records(
    card: &mut dyn Transceiver,
    sfi: u8,
) -> Result<Vec<Vec<u8>>, CommunicationError> {
    let mut records = Vec::new();
    for record in 1..=MAX_SFI_RECORDS {
        let (payload, sw) = exchange(card, &ApduCommand::read_record(sfi, record))?;
        debug!("SFI {:02x} rec {:02x} ({:04x})", sfi, record, sw);
        if !sw_is_success(sw) {
            break;
        }
        records.push(payload);
    }
    Ok(records)
}

/// One Application File Locator entry, unpacked from its 4-byte group.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AflEntry {
    pub sfi: u8,
    pub first_record: u8,
    pub last_record: u8,
    pub offline_auth_records: u8,
}

impl AflEntry {
    /// Unpack all well-formed 4-byte groups. Groups with an SFI outside
    /// 1..=30 or an inverted record range are dropped; a trailing partial
    /// group is ignored.
    pub fn parse_all(raw: &[u8]) -> Vec<AflEntry> {
        raw.chunks_exact(4)
            .filter_map(|group| {
                let entry = AflEntry {
                    sfi: group[0] >> 3,
                    first_record: group[1],
                    last_record: group[2],
                    offline_auth_records: group[3],
                };
                ((1..=30).contains(&entry.sfi)
                    && entry.first_record >= 1
                    && entry.first_record <= entry.last_record)
                    .then_some(entry)
            })
            .collect()
    }
}

/// Read every record the AFL points at, handing each payload to `visit`.
/// A record the card refuses is skipped, not fatal; `visit` returning true
/// short-circuits the walk. Returns whether the walk was short-circuited.
pub fn walk_afl(
    card: &mut dyn Transceiver,
    entries: &[AflEntry],
    mut visit: impl FnMut(&[u8]) -> bool,
) -> Result<bool, CommunicationError> {
    for entry in entries {
        for record in entry.first_record..=entry.last_record {
            let (payload, sw) = exchange(card, &ApduCommand::read_record(entry.sfi, record))?;
            debug!("SFI {:02x} rec {:02x} ({:04x})", entry.sfi, record, sw);
            if !sw_is_success(sw) {
                continue;
            }
            if visit(&payload) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
