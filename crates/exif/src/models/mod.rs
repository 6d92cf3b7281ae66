mod ifd;
mod tag;
mod tag_set;

pub use self::ifd::Ifd;
pub use self::tag::{ByteOrder, ExifTag, ValueType};
pub use self::tag_set::ExifTagSet;
