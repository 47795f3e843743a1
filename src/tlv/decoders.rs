//! Decode what EMV calls "BER-TLV"
//! This is a TLV (Tag, Length, Value) format where
//!  * The tag is 1 to 3 bytes and represents the interpretation of the data, not just the type
//!  * The length is 1 to 3 bytes and caps the value at 65535 bytes
//!  * The value is a string, number, or binary data encoded according to EMV types
//!
//! Tags are handled as plain unsigned integers (0x6f, 0x9f38, ...) so they can be
//! matched densely. Constructed values are not materialized into a tree; callers
//! hand the value slice back to [`find`]/[`find_all`] when they want to descend.
//!
//! For more information read EMV 4.4 Book 3 annex B1 and then cry.

use super::errors::DecodeError;
use super::FieldMap;

/// Decode the tag and length of a TLV string. Returns `(tag, length, header_len)`
/// where `header_len` is the number of bytes occupied by the tag and length fields.
pub fn read_tl(raw: &[u8]) -> Result<(u32, usize, usize), DecodeError> {
    // Tag + length is always at least 2 bytes
    if raw.len() < 2 {
        return Err(DecodeError::MessageTooShort(2, raw.len()));
    }

    // If the bottom 5 bits are all set the tag continues into the following
    // bytes, for as long as their high bit is set
    let (tag, tag_len) = if raw[0] & 0x1f == 0x1f {
        let mut tag = raw[0] as u32;
        let mut tag_len = 1;
        loop {
            if tag_len >= raw.len() {
                return Err(DecodeError::MessageTooShort(tag_len + 1, raw.len()));
            }
            let b = raw[tag_len];
            tag = (tag << 8) | b as u32;
            tag_len += 1;
            if b & 0x80 == 0 {
                break;
            }
            // Nothing on a payment card needs more than 3 tag bytes
            if tag_len >= 3 {
                return Err(DecodeError::TagTooLong(tag_len + 1));
            }
        }
        (tag, tag_len)
    } else {
        (raw[0] as u32, 1)
    };

    // Length is always at least 1 byte
    if raw.len() < tag_len + 1 {
        return Err(DecodeError::MessageTooShort(tag_len + 1, raw.len()));
    }

    // If the high bit of the first byte is set then it encodes how many bytes follow
    let (len, len_len) = if raw[tag_len] & 0x80 == 0x80 {
        let num_bytes = (raw[tag_len] & 0x7f) as usize;
        // 0x81 and 0x82 forms only; a card claiming a >64KiB value is broken
        if num_bytes > 2 {
            return Err(DecodeError::LengthTooLong(2, num_bytes));
        }
        if raw.len() < tag_len + 1 + num_bytes {
            return Err(DecodeError::MessageTooShort(
                tag_len + 1 + num_bytes,
                raw.len(),
            ));
        }

        let mut len = 0usize;
        for b in &raw[tag_len + 1..tag_len + 1 + num_bytes] {
            len = (len << 8) | (*b as usize);
        }
        (len, num_bytes + 1)
    } else {
        (raw[tag_len] as usize, 1)
    };

    Ok((tag, len, tag_len + len_len))
}

/// Whether a tag introduces a constructed value (bit 6 of the leading tag byte).
pub fn is_constructed(tag: u32) -> bool {
    let mut lead = tag;
    while lead > 0xff {
        lead >>= 8;
    }
    lead as u8 & 0x20 == 0x20
}

/// Find the first value whose tag is any of `tags`, descending depth-first
/// into constructed values. Malformed trailing data reads as "not present".
pub fn find<'a>(mut raw: &'a [u8], tags: &[u32]) -> Option<&'a [u8]> {
    while !raw.is_empty() {
        let (tag, len, header) = read_tl(raw).ok()?;
        if raw.len() < header + len {
            return None;
        }
        let value = &raw[header..header + len];
        if tags.contains(&tag) {
            return Some(value);
        }
        if is_constructed(tag) {
            if let Some(inner) = find(value, tags) {
                return Some(inner);
            }
        }
        raw = &raw[header + len..];
    }
    None
}

/// Find every value carrying `tag`, in encounter order, descending depth-first
/// into constructed values. A match is returned whole and not descended into.
pub fn find_all<'a>(raw: &'a [u8], tag: u32) -> Vec<&'a [u8]> {
    let mut found = Vec::new();
    find_all_into(raw, tag, &mut found);
    found
}

fn find_all_into<'a>(mut raw: &'a [u8], tag: u32, found: &mut Vec<&'a [u8]>) {
    while !raw.is_empty() {
        let Ok((t, len, header)) = read_tl(raw) else {
            return;
        };
        if raw.len() < header + len {
            return;
        }
        let value = &raw[header..header + len];
        if t == tag {
            found.push(value);
        } else if is_constructed(t) {
            find_all_into(value, tag, found);
        }
        raw = &raw[header + len..];
    }
}

/// Flatten every primitive field into `map`, depth-first. Duplicate tags
/// accumulate, which is what record walks want.
pub fn collect_fields(mut raw: &[u8], map: &mut FieldMap) {
    while !raw.is_empty() {
        let Ok((tag, len, header)) = read_tl(raw) else {
            return;
        };
        if raw.len() < header + len {
            return;
        }
        let value = &raw[header..header + len];
        if is_constructed(tag) {
            collect_fields(value, map);
        } else {
            map.insert(tag, value.to_vec());
        }
        raw = &raw[header + len..];
    }
}

/// Encode a value length in BER form.
pub fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else if len <= 0xff {
        vec![0x81, len as u8]
    } else {
        vec![0x82, (len >> 8) as u8, len as u8]
    }
}

/// Encode a single field: tag bytes, BER length, then the value.
pub fn encode_tlv(tag: u32, value: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(6 + value.len());
    for shift in (0..4).rev() {
        let b = (tag >> (shift * 8)) as u8;
        if b != 0 || !raw.is_empty() {
            raw.push(b);
        }
    }
    if raw.is_empty() {
        raw.push(0);
    }
    raw.extend_from_slice(&encode_length(value.len()));
    raw.extend_from_slice(value);
    raw
}

/// Decode packed BCD digits into an unsigned integer.
pub fn bcd_to_u64(raw: &[u8]) -> Result<u64, DecodeError> {
    let mut n = 0u64;
    for b in raw {
        for nibble in [b >> 4, b & 0x0f] {
            if nibble > 9 {
                return Err(DecodeError::BadBcd(nibble));
            }
            n = n * 10 + nibble as u64;
        }
    }
    Ok(n)
}

/// Decode a big-endian unsigned integer, as used by the counters behind
/// GET DATA (PIN tries left, ATC).
pub fn be_to_u32(raw: &[u8]) -> u32 {
    raw.iter()
        .rev()
        .take(4)
        .rev()
        .fold(0u32, |acc, b| (acc << 8) | *b as u32)
}
