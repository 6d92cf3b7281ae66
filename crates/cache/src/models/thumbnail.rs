use exn::ResultExt;

use crate::error::{Error, ErrorKind};
use crate::identity::FileIdentity;
use crate::thumbnail::{Dimensions, ThumbnailRecord};

#[derive(sqlx::FromRow)]
pub(crate) struct ThumbnailRow {
    pub(crate) path: String,
    pub(crate) last_modified: i64,
    pub(crate) file_length: Option<i64>,
    pub(crate) image: Vec<u8>,
    pub(crate) width: Option<i64>,
    pub(crate) height: Option<i64>,
}
impl ThumbnailRow {
    pub(crate) fn new(identity: &FileIdentity, image: &[u8], dimensions: Option<Dimensions>) -> Result<Self, Error> {
        Ok(Self {
            path: identity.key()?,
            last_modified: identity.last_modified(),
            file_length: identity
                .length()
                .map(i64::try_from)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("file length"))?,
            image: image.to_vec(),
            width: dimensions.map(|d| i64::from(d.width)),
            height: dimensions.map(|d| i64::from(d.height)),
        })
    }
}
impl TryFrom<ThumbnailRow> for ThumbnailRecord {
    type Error = Error;
    fn try_from(row: ThumbnailRow) -> Result<Self, Self::Error> {
        let mut identity = FileIdentity::new(&row.path, row.last_modified)?;
        if let Some(length) = row.file_length {
            identity = identity.with_length(u64::try_from(length).or_raise(|| ErrorKind::InvalidData("file length"))?);
        }
        let dimensions = match (row.width, row.height) {
            (Some(width), Some(height)) => Some(Dimensions {
                width: u32::try_from(width).or_raise(|| ErrorKind::InvalidData("width"))?,
                height: u32::try_from(height).or_raise(|| ErrorKind::InvalidData("height"))?,
            }),
            _ => None,
        };
        Ok(Self { identity, image: row.image, dimensions })
    }
}

/// Just the columns needed to judge whether a thumbnail is up to date.
#[derive(sqlx::FromRow)]
pub(crate) struct ValidationRow {
    pub(crate) last_modified: i64,
    pub(crate) file_length: Option<i64>,
}
impl ValidationRow {
    /// Whether a record with these columns is still valid for `identity`.
    pub(crate) fn is_up_to_date(&self, identity: &FileIdentity) -> bool {
        if self.last_modified < identity.last_modified() {
            return false;
        }
        match (self.file_length, identity.length()) {
            (Some(stored), Some(current)) => u64::try_from(stored).is_ok_and(|stored| stored == current),
            _ => true,
        }
    }
}
