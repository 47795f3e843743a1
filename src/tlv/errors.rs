use std::error::Error;
use std::fmt::Display;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DecodeError {
    BadBcd(u8),
    MessageTooShort(usize, usize),
    LengthTooLong(usize, usize),
    TagTooLong(usize),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DecodeError::BadBcd(b) => write!(f, "Bad BCD nibble 0x{:1x}", b),
            DecodeError::MessageTooShort(needed, got) => {
                write!(f, "Message too short, needed {}, got {}", needed, got)
            }
            DecodeError::LengthTooLong(allowed, got) => write!(
                f,
                "Length uses too many bytes, at most {} allowed, got {}",
                allowed, got
            ),
            DecodeError::TagTooLong(got) => {
                write!(f, "Tag too long, at most 3 bytes allowed, got {}", got)
            }
        }
    }
}

impl Error for DecodeError {}
