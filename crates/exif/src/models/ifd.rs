use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// Image File Directory a tag was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ifd {
    /// The EXIF sub-IFD (camera settings, capture time, ...)
    Exif,
    /// The GPS sub-IFD
    Gps,
    /// Vendor-specific maker note
    MakerNote,
}
impl Ifd {
    /// All tag groups, in the order they're stored.
    pub const ALL: [Ifd; 3] = [Ifd::Exif, Ifd::Gps, Ifd::MakerNote];

    /// Returns the display string for the IFD.
    pub fn as_str(&self) -> &'static str {
        match self {
            Ifd::Exif => "EXIF",
            Ifd::Gps => "GPS",
            Ifd::MakerNote => "MAKER_NOTE",
        }
    }
}
impl FromStr for Ifd {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sanitized = s.trim().to_lowercase().replace(['_', '-', ' '], "");
        Ok(match sanitized.as_str() {
            "exif" => Self::Exif,
            "gps" => Self::Gps,
            "makernote" => Self::MakerNote,
            _ => exn::bail!(ErrorKind::UnknownIfd(s.to_string())),
        })
    }
}
impl Display for Ifd {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("EXIF", Ifd::Exif)]
    #[case("gps", Ifd::Gps)]
    #[case("MAKER_NOTE", Ifd::MakerNote)]
    #[case("Maker Note", Ifd::MakerNote)]
    fn test_parse(#[case] input: &str, #[case] expected: Ifd) {
        assert_eq!(input.parse::<Ifd>().unwrap(), expected);
    }

    #[test]
    fn test_display_parses_back() {
        for ifd in Ifd::ALL {
            assert_eq!(ifd.to_string().parse::<Ifd>().unwrap(), ifd);
        }
    }

    #[test]
    fn test_unknown() {
        let err = "interop".parse::<Ifd>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownIfd(s) if s == "interop"));
    }
}
