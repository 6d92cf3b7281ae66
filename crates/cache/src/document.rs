//! Storage format for decoded tag sets.
//!
//! Documents are JSON and declare their own character encoding and layout
//! version. Raw tag bytes are carried as standard padded base64; text is kept
//! as-is.
//!
//! ```json
//! {"encoding":"UTF-8","version":1,"lastModified":1700000000000,
//!  "makerNoteDescription":null,"exif":[...],"gps":[],"makerNote":[]}
//! ```

use exn::ResultExt;
use facet_json::{from_str as from_json, to_string as to_json};
use pixtag_exif::ExifTagSet;

use crate::error::{ErrorKind, Result};
use crate::models::TagSetProxy;

pub fn serialize(tags: &ExifTagSet) -> Result<String> {
    to_json(&TagSetProxy::from(tags)).or_raise(|| ErrorKind::Serialization)
}

/// Parse a stored document.
///
/// Fails with [`ErrorKind::Serialization`] on malformed JSON, a declared
/// encoding other than UTF-8, an unknown version, or undecodable tag bytes.
pub fn deserialize(document: &str) -> Result<ExifTagSet> {
    let proxy = from_json::<TagSetProxy>(document).or_raise(|| ErrorKind::Serialization)?;
    ExifTagSet::try_from(proxy).or_raise(|| ErrorKind::Serialization)
}
