use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;

/// How a data element's value is encoded, per EMV 4.3 Book 3 section 4.3.
/// `Numeric` elements are right-justified BCD and pad on the left; everything
/// else pads on the right.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub enum ElementType {
    Alphabetic,
    Alphanumeric,
    AlphanumericSpecial,
    Binary,
    DigitString, // CompressedNumeric in the EMV spec
    Numeric,
    Template,
    Dol,
}

#[derive(Copy, Clone, Debug)]
pub struct DataElement {
    pub tag: u32,
    pub name: &'static str,
    pub short_name: Option<&'static str>,
    pub typ: ElementType,
}

impl Display for DataElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DataElement {{tag: {:#04x}, name: \"{}\", short_name: {:?}, typ: {:?}}}",
            self.tag, self.name, self.short_name, self.typ
        )
    }
}

/// Name a tag for log output, falling back to its hex form is the caller's job.
pub fn tag_name(tag: u32) -> Option<&'static str> {
    ELEMENTS.get(&tag).map(|elem| elem.name)
}

pub fn element_type(tag: u32) -> Option<ElementType> {
    ELEMENTS.get(&tag).map(|elem| elem.typ)
}

macro_rules! elements_map {
    [$($tag:expr => $name:tt $(($short_name:tt))?: $typ:ident,)*] => {
        HashMap::from([$(
            (
                $tag,
                DataElement {
                    tag: $tag,
                    name: $name,
                    short_name: optional!($($short_name)*),
                    typ: ElementType::$typ,
                }
            )
        ,)*])
    };
}
macro_rules! optional {
    () => {None};
    ($($some:tt)*) => {Some($($some)*)};
}

lazy_static! {
    pub static ref ELEMENTS: HashMap<u32, DataElement> = elements_map![
        0x0042 => "Issuer Identification Number (IIN)": Numeric,
        0x004f => "Application Dedicated File (ADF) Name" ("AID"): Binary,
        0x0050 => "Application Label": AlphanumericSpecial,
        0x0056 => "Track 1 Data": Binary,
        0x0057 => "Track 2 Equivalent Data": Binary,
        0x005a => "Application Primary Account Number (PAN)" ("PAN"): DigitString,
        0x0061 => "Application Template": Template,
        0x006f => "File Control Information (FCI) Template": Template,
        0x0070 => "READ RECORD Response Message Template": Template,
        0x0073 => "Directory Discretionary Template": Template,
        0x0077 => "Response Message Template Format 2": Template,
        0x0080 => "Response Message Template Format 1": Binary,
        0x0082 => "Application Interchange Profile" ("AIP"): Binary,
        0x0083 => "Command Template": Binary,
        0x0084 => "Dedicated File (DF) Name": Binary,
        0x0087 => "Application Priority Indicator": Binary,
        0x0088 => "Short File Identifier (SFI)": Binary,
        0x0094 => "Application File Locator (AFL)" ("AFL"): Binary,
        0x0095 => "Terminal Verification Results" ("TVR"): Binary,
        0x009a => "Transaction Date": Numeric,
        0x009c => "Transaction Type": Numeric,
        0x009d => "Directory Definition File (DDF) Name": Binary,
        0x00a5 => "File Control Information (FCI) Proprietary Template": Template,
        0x5f20 => "Cardholder Name": AlphanumericSpecial,
        0x5f24 => "Application Expiration Date": Numeric,
        0x5f25 => "Application Effective Date": Numeric,
        0x5f28 => "Issuer Country Code": Numeric,
        0x5f2a => "Transaction Currency Code": Numeric,
        0x5f2d => "Language Preference": Alphanumeric,
        0x5f30 => "Service Code": Numeric,
        0x5f34 => "Application PAN Sequence Number": Numeric,
        0x5f53 => "International Bank Account Number (IBAN)": Binary,
        0x5f54 => "Bank Identifier Code (BIC)": Binary,
        0x9f01 => "Acquirer Identifier": Numeric,
        0x9f02 => "Amount, Authorised (Numeric)": Numeric,
        0x9f03 => "Amount, Other (Numeric)": Numeric,
        0x9f06 => "Application Identifier (AID) - terminal": Binary,
        0x9f10 => "Issuer Application Data": Binary,
        0x9f11 => "Issuer Code Table Index": Numeric,
        0x9f12 => "Application Preferred Name": AlphanumericSpecial,
        0x9f17 => "Personal Identification Number (PIN) Try Counter": Binary,
        0x9f1a => "Terminal Country Code": Numeric,
        0x9f21 => "Transaction Time": Numeric,
        0x9f26 => "Application Cryptogram": Binary,
        0x9f27 => "Cryptogram Information Data": Binary,
        0x9f32 => "Issuer Public Key Exponent": Binary,
        0x9f35 => "Terminal Type": Numeric,
        0x9f36 => "Application Transaction Counter (ATC)" ("ATC"): Binary,
        0x9f37 => "Unpredictable Number": Binary,
        0x9f38 => "Processing Options Data Object List (PDOL)" ("PDOL"): Dol,
        0x9f42 => "Application Currency Code": Numeric,
        0x9f4d => "Log Entry": Binary,
        0x9f4f => "Log Format": Dol,
        0x9f66 => "Terminal Transaction Qualifiers" ("TTQ"): Binary,
        0x9f6c => "Card Transaction Qualifiers" ("CTQ"): Binary,
        0xbf0c => "FCI Issuer Discretionary Data": Template,
        0xdf60 => "VISA Log Entry": Binary,
    ];
}
