pub mod decoders;
pub mod dol;
pub mod elements;
pub mod errors;

/// Primitive fields flattened out of one or more records, keyed by tag.
/// Cards repeat tags across records, hence a multimap.
pub type FieldMap = multimap::MultiMap<u32, Vec<u8>>;

pub use self::decoders::{collect_fields, encode_length, encode_tlv, find, find_all};
pub use self::dol::{parse_tag_and_length, Dol, TagAndLength};
pub use self::errors::DecodeError;
