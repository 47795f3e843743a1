use std::error::Error;
use std::fmt::Display;

use log::{debug, trace};

/// Command success.
pub const SW_SUCCESS: u16 = 0x9000;
/// Warning: selected file is deactivated. Interac answers SELECT with this
/// and is otherwise perfectly readable, so it counts as success.
pub const SW_FILE_DEACTIVATED: u16 = 0x6285;

const INS_SELECT: u8 = 0xa4;
const INS_READ_RECORD: u8 = 0xb2;
const INS_GET_DATA: u8 = 0xca;
const INS_GET_PROCESSING_OPTIONS: u8 = 0xa8;
const INS_GET_RESPONSE: u8 = 0xc0;

/// Both plain success and the deactivated-file warning.
pub fn sw_is_success(sw: u16) -> bool {
    sw == SW_SUCCESS || sw == SW_FILE_DEACTIVATED
}

/// Wrong Le; SW2 carries the length to re-issue with.
pub fn sw_wrong_length(sw: u16) -> Option<u8> {
    (sw >> 8 == 0x6c).then(|| sw as u8)
}

/// An ISO 7816-4 command: the four header bytes, optional command data,
/// and `ne`, the number of response bytes requested (0..=65536, zero
/// omits the Le field entirely).
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct ApduCommand<'a> {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: &'a [u8],
    pub ne: u32,
}

impl<'a> ApduCommand<'a> {
    fn new(cla: u8, ins: u8, p1: u8, p2: u8, data: &'a [u8]) -> Self {
        ApduCommand {
            cla,
            ins,
            p1,
            p2,
            data,
            // Ask for up to 256 bytes everywhere and let the card correct us
            ne: 0x100,
        }
    }

    /// Serialize to the wire form. Lc and Le wrap their maxima to zero
    /// (256 response bytes encode as a 0x00 Le byte); oversized fields
    /// switch the whole command to extended length.
    pub fn encode(&self) -> Option<Box<[u8]>> {
        let nc = self.data.len();
        if nc > 0xffff || self.ne > 0x10000 {
            return None;
        }
        // Extended length is all or nothing: a zero marker byte after the
        // header, then 16-bit Lc and Le fields
        let extended = nc > 0xff || self.ne > 0x100;

        let mut raw = Vec::with_capacity(9 + nc);
        raw.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2]);

        if nc > 0 {
            if extended {
                raw.push(0x00);
                raw.extend_from_slice(&(nc as u16).to_be_bytes());
            } else {
                raw.push(nc as u8);
            }
            raw.extend_from_slice(self.data);
        }

        if self.ne > 0 {
            if extended {
                if nc == 0 {
                    raw.push(0x00);
                }
                raw.extend_from_slice(&(self.ne as u16).to_be_bytes());
            } else {
                raw.push(self.ne as u8);
            }
        }

        Some(raw.into_boxed_slice())
    }

    /// SELECT by name, first or only occurrence. `name` is an AID or a
    /// DF name such as "2PAY.SYS.DDF01".
    pub fn select(name: &'a [u8]) -> Self {
        Self::new(0x00, INS_SELECT, 0x04, 0x00, name)
    }

    /// READ RECORD addressed by record number: P1 is the record, P2 packs
    /// the SFI above the addressing-mode bits.
    pub fn read_record(sfi: u8, record: u8) -> ApduCommand<'static> {
        ApduCommand::new(0x00, INS_READ_RECORD, record, sfi << 3 | 0x04, &[])
    }

    /// GET DATA for a single primitive tag, carried in P1/P2.
    pub fn get_data(tag: u16) -> ApduCommand<'static> {
        let [p1, p2] = tag.to_be_bytes();
        ApduCommand::new(0x80, INS_GET_DATA, p1, p2, &[])
    }

    /// GET PROCESSING OPTIONS. The data is a command template (tag 83)
    /// wrapping the PDOL values, possibly empty.
    pub fn get_processing_options(template: &'a [u8]) -> Self {
        Self::new(0x80, INS_GET_PROCESSING_OPTIONS, 0x00, 0x00, template)
    }
}

/// Transport failure talking to the card. The only error that aborts a read
/// session; protocol-level failures are status words, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommunicationError {
    Transport(String),
    ResponseTooShort(usize),
    CommandTooLong,
}

impl Display for CommunicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommunicationError::Transport(msg) => write!(f, "Card transport failed: {}", msg),
            CommunicationError::ResponseTooShort(got) => {
                write!(f, "Response too short for a status word, got {} bytes", got)
            }
            CommunicationError::CommandTooLong => write!(f, "Could not encode command"),
        }
    }
}

impl Error for CommunicationError {}

/// A byte-in / byte-out channel to a smart card. Responses include the
/// 2-byte status word trailer.
pub trait Transceiver {
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, CommunicationError>;
    fn is_connected(&self) -> bool;
}

fn split_sw(data: &[u8]) -> Result<(&[u8], u8, u8), CommunicationError> {
    if data.len() < 2 {
        return Err(CommunicationError::ResponseTooShort(data.len()));
    }
    Ok((
        &data[..data.len() - 2],
        data[data.len() - 2],
        data[data.len() - 1],
    ))
}

/// Send one command and collect its full response payload plus final status
/// word. Wrong-length (6cxx) answers are re-issued once with the corrected
/// Le, and continuation data (61xx) is drained with GET RESPONSE.
pub fn exchange(
    card: &mut dyn Transceiver,
    command: &ApduCommand,
) -> Result<(Vec<u8>, u16), CommunicationError> {
    let raw = command.encode().ok_or(CommunicationError::CommandTooLong)?;
    trace!("=> {}", hex::encode(&raw));

    let mut response = Vec::new();
    let data = card.transceive(&raw)?;
    let (payload, mut sw1, mut sw2) = split_sw(&data)?;
    response.extend_from_slice(payload);

    if sw1 == 0x6c {
        // Reduce data size requested; SW2 of zero means the full 256 bytes
        let mut modified_command = *command;
        modified_command.ne = if sw2 == 0 { 0x100 } else { sw2 as u32 };
        let raw = modified_command
            .encode()
            .ok_or(CommunicationError::CommandTooLong)?;
        trace!("=> {} (corrected Le)", hex::encode(&raw));

        let data = card.transceive(&raw)?;
        let (payload, s1, s2) = split_sw(&data)?;
        (sw1, sw2) = (s1, s2);
        response.extend_from_slice(payload);
    }

    while sw1 == 0x61 {
        // Continuation data available
        let continuation_command = [0x00, INS_GET_RESPONSE, 0x00, 0x00, sw2];

        let data = card.transceive(&continuation_command)?;
        let (payload, s1, s2) = split_sw(&data)?;
        (sw1, sw2) = (s1, s2);
        response.extend_from_slice(payload);
    }

    let sw = (sw1 as u16) << 8 | (sw2 as u16);
    debug!("<= {} {:04x}", hex::encode(&response), sw);
    Ok((response, sw))
}

/// [`Transceiver`] over a PC/SC smart card reader.
pub struct PcscTransceiver {
    card: pcsc::Card,
}

impl PcscTransceiver {
    pub fn new(card: pcsc::Card) -> Self {
        PcscTransceiver { card }
    }

    pub fn into_inner(self) -> pcsc::Card {
        self.card
    }
}

impl Transceiver for PcscTransceiver {
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, CommunicationError> {
        let mut receive_buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
        let data = self
            .card
            .transmit(command, &mut receive_buffer)
            .map_err(|err| CommunicationError::Transport(err.to_string()))?;
        Ok(data.to_vec())
    }

    fn is_connected(&self) -> bool {
        self.card.status2_owned().is_ok()
    }
}
