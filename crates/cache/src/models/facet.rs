use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use exn::ResultExt;
use pixtag_exif as exif;

use crate::error::{Error, ErrorKind};

/// Character encoding declared by (and required of) every stored document.
pub(crate) const DOCUMENT_ENCODING: &str = "UTF-8";
/// Bumped whenever the document layout changes incompatibly.
pub(crate) const DOCUMENT_VERSION: u32 = 1;

#[derive(facet::Facet)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) struct TagSetProxy {
    pub(crate) encoding: String,
    pub(crate) version: u32,
    #[facet(rename = "lastModified")]
    pub(crate) last_modified: i64,
    #[facet(rename = "makerNoteDescription", default)]
    pub(crate) maker_note_description: Option<String>,
    pub(crate) exif: Vec<TagProxy>,
    pub(crate) gps: Vec<TagProxy>,
    #[facet(rename = "makerNote")]
    pub(crate) maker_note: Vec<TagProxy>,
}
impl From<&exif::ExifTagSet> for TagSetProxy {
    fn from(tags: &exif::ExifTagSet) -> Self {
        Self {
            encoding: DOCUMENT_ENCODING.to_string(),
            version: DOCUMENT_VERSION,
            last_modified: tags.last_modified,
            maker_note_description: tags.maker_note_description.clone(),
            exif: tags.exif.iter().map(TagProxy::from).collect(),
            gps: tags.gps.iter().map(TagProxy::from).collect(),
            maker_note: tags.maker_note.iter().map(TagProxy::from).collect(),
        }
    }
}
impl TryFrom<TagSetProxy> for exif::ExifTagSet {
    type Error = Error;
    fn try_from(doc: TagSetProxy) -> Result<Self, Self::Error> {
        if !doc.encoding.eq_ignore_ascii_case(DOCUMENT_ENCODING) {
            exn::bail!(ErrorKind::InvalidData("document encoding"));
        }
        if doc.version != DOCUMENT_VERSION {
            exn::bail!(ErrorKind::InvalidData("document version"));
        }
        let group = |tags: Vec<TagProxy>| tags.into_iter().map(exif::ExifTag::try_from).collect::<Result<Vec<_>, _>>();
        Ok(Self {
            last_modified: doc.last_modified,
            maker_note_description: doc.maker_note_description,
            exif: group(doc.exif)?,
            gps: group(doc.gps)?,
            maker_note: group(doc.maker_note)?,
        })
    }
}

#[derive(facet::Facet)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) struct TagProxy {
    #[facet(rename = "id")]
    tag_id: u16,
    /// TIFF field type code.
    #[facet(rename = "type")]
    value_type: u16,
    #[facet(rename = "count")]
    value_count: u32,
    #[facet(rename = "offset")]
    value_offset: i64,
    /// Base64 (standard alphabet, padded).
    #[facet(rename = "raw")]
    raw_value: String,
    #[facet(rename = "value")]
    string_value: String,
    #[facet(rename = "order")]
    byte_order: ByteOrderProxy,
    name: String,
    ifd: IfdProxy,
}
impl From<&exif::ExifTag> for TagProxy {
    fn from(tag: &exif::ExifTag) -> Self {
        Self {
            tag_id: tag.tag_id,
            value_type: tag.value_type.code(),
            value_count: tag.value_count,
            value_offset: tag.value_offset,
            raw_value: BASE64.encode(&tag.raw_value),
            string_value: tag.string_value.clone(),
            byte_order: (&tag.byte_order).into(),
            name: tag.name.clone(),
            ifd: (&tag.ifd).into(),
        }
    }
}
impl TryFrom<TagProxy> for exif::ExifTag {
    type Error = Error;
    fn try_from(tag: TagProxy) -> Result<Self, Self::Error> {
        Ok(Self {
            tag_id: tag.tag_id,
            value_type: exif::ValueType::from_code(tag.value_type),
            value_count: tag.value_count,
            value_offset: tag.value_offset,
            raw_value: BASE64.decode(tag.raw_value.as_bytes()).or_raise(|| ErrorKind::InvalidData("raw tag value"))?,
            string_value: tag.string_value,
            byte_order: tag.byte_order.into(),
            name: tag.name,
            ifd: tag.ifd.into(),
        })
    }
}

#[repr(u8)]
#[derive(facet::Facet)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) enum ByteOrderProxy {
    II,
    MM,
}
impl From<&exif::ByteOrder> for ByteOrderProxy {
    fn from(order: &exif::ByteOrder) -> Self {
        match order {
            exif::ByteOrder::LittleEndian => Self::II,
            exif::ByteOrder::BigEndian => Self::MM,
        }
    }
}
impl From<ByteOrderProxy> for exif::ByteOrder {
    fn from(order: ByteOrderProxy) -> Self {
        match order {
            ByteOrderProxy::II => Self::LittleEndian,
            ByteOrderProxy::MM => Self::BigEndian,
        }
    }
}

#[repr(u8)]
#[derive(facet::Facet)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) enum IfdProxy {
    Exif,
    Gps,
    MakerNote,
}
impl From<&exif::Ifd> for IfdProxy {
    fn from(ifd: &exif::Ifd) -> Self {
        match ifd {
            exif::Ifd::Exif => Self::Exif,
            exif::Ifd::Gps => Self::Gps,
            exif::Ifd::MakerNote => Self::MakerNote,
        }
    }
}
impl From<IfdProxy> for exif::Ifd {
    fn from(ifd: IfdProxy) -> Self {
        match ifd {
            IfdProxy::Exif => Self::Exif,
            IfdProxy::Gps => Self::Gps,
            IfdProxy::MakerNote => Self::MakerNote,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_is_base64() {
        let tag = exif::ExifTag {
            tag_id: 37500,
            value_type: exif::ValueType::Undefined,
            value_count: 4,
            value_offset: 812,
            raw_value: vec![0x00, 0xff, 0x10, 0x80],
            string_value: String::new(),
            byte_order: exif::ByteOrder::BigEndian,
            name: "MakerNote".to_string(),
            ifd: exif::Ifd::Exif,
        };
        let proxy = TagProxy::from(&tag);
        assert_eq!(proxy.raw_value, "AP8QgA==");
        assert_eq!(proxy.value_type, 7);
        assert_eq!(proxy.byte_order, ByteOrderProxy::MM);
        assert_eq!(exif::ExifTag::try_from(proxy).unwrap(), tag);
    }

    #[test]
    fn test_rejects_foreign_encoding() {
        let doc = TagSetProxy {
            encoding: "ISO-8859-1".to_string(),
            version: DOCUMENT_VERSION,
            last_modified: 0,
            maker_note_description: None,
            exif: vec![],
            gps: vec![],
            maker_note: vec![],
        };
        let err = exif::ExifTagSet::try_from(doc).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("document encoding")));
    }
}
