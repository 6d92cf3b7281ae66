mod facet;
mod metadata;
mod thumbnail;

pub(crate) use self::facet::TagSetProxy;
pub(crate) use self::metadata::MetadataRow;
pub(crate) use self::thumbnail::{ThumbnailRow, ValidationRow};
