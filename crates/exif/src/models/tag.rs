use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::Ifd;
use crate::error::{ErrorKind, Result};

/// A single decoded EXIF tag.
///
/// Everything the decoder saw is kept, including the raw value bytes, so the
/// tag can be re-interpreted later without re-reading the image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExifTag {
    /// Numeric tag identifier (e.g. `271` for `Make`)
    pub tag_id: u16,
    /// How the raw value is encoded
    pub value_type: ValueType,
    /// Number of values of `value_type` in `raw_value`
    pub value_count: u32,
    /// Offset of the value in the original container
    pub value_offset: i64,
    /// Raw value bytes, as read (not necessarily text)
    pub raw_value: Vec<u8>,
    /// Human readable rendition of the value, possibly empty
    pub string_value: String,
    /// Byte order the raw value was written in
    pub byte_order: ByteOrder,
    /// Tag name (e.g. `Make`)
    pub name: String,
    /// Group the tag belongs to
    pub ifd: Ifd,
}

/// TIFF field types.
///
/// Codes outside the TIFF 6.0 table survive as [`ValueType::Other`] so that
/// nothing is lost between decoding and caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Other(u16),
}
impl ValueType {
    /// Numeric TIFF field type code.
    pub fn code(&self) -> u16 {
        match self {
            ValueType::Byte => 1,
            ValueType::Ascii => 2,
            ValueType::Short => 3,
            ValueType::Long => 4,
            ValueType::Rational => 5,
            ValueType::SByte => 6,
            ValueType::Undefined => 7,
            ValueType::SShort => 8,
            ValueType::SLong => 9,
            ValueType::SRational => 10,
            ValueType::Float => 11,
            ValueType::Double => 12,
            ValueType::Other(code) => *code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            1 => ValueType::Byte,
            2 => ValueType::Ascii,
            3 => ValueType::Short,
            4 => ValueType::Long,
            5 => ValueType::Rational,
            6 => ValueType::SByte,
            7 => ValueType::Undefined,
            8 => ValueType::SShort,
            9 => ValueType::SLong,
            10 => ValueType::SRational,
            11 => ValueType::Float,
            12 => ValueType::Double,
            other => ValueType::Other(other),
        }
    }
}
impl From<u16> for ValueType {
    fn from(code: u16) -> Self {
        Self::from_code(code)
    }
}

/// Byte order of a TIFF/EXIF block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Intel order, marker `II`
    LittleEndian,
    /// Motorola order, marker `MM`
    BigEndian,
}
impl ByteOrder {
    const INTEL: u16 = 0x4949;
    const MOTOROLA: u16 = 0x4D4D;

    /// The two-byte marker found at the start of a TIFF header.
    pub fn marker(&self) -> u16 {
        match self {
            ByteOrder::LittleEndian => Self::INTEL,
            ByteOrder::BigEndian => Self::MOTOROLA,
        }
    }

    pub fn from_marker(marker: u16) -> Result<Self> {
        match marker {
            Self::INTEL => Ok(ByteOrder::LittleEndian),
            Self::MOTOROLA => Ok(ByteOrder::BigEndian),
            other => exn::bail!(ErrorKind::UnknownByteOrder(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "little-endian",
            ByteOrder::BigEndian => "big-endian",
        }
    }
}
impl Display for ByteOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, ValueType::Byte)]
    #[case(2, ValueType::Ascii)]
    #[case(7, ValueType::Undefined)]
    #[case(12, ValueType::Double)]
    #[case(0, ValueType::Other(0))]
    #[case(13, ValueType::Other(13))]
    fn test_value_type_codes(#[case] code: u16, #[case] expected: ValueType) {
        let value_type = ValueType::from_code(code);
        assert_eq!(value_type, expected);
        assert_eq!(value_type.code(), code);
    }

    #[test]
    fn test_byte_order_markers() {
        // 18761 is what Java-era decoders handed out for "II".
        assert_eq!(ByteOrder::from_marker(18761).unwrap(), ByteOrder::LittleEndian);
        assert_eq!(ByteOrder::from_marker(ByteOrder::BigEndian.marker()).unwrap(), ByteOrder::BigEndian);
        let err = ByteOrder::from_marker(0x1234).unwrap_err();
        assert_eq!(*err, ErrorKind::UnknownByteOrder(0x1234));
    }
}
