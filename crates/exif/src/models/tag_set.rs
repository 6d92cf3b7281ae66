use crate::{ExifTag, Ifd};

/// Every tag decoded from a single image file, grouped by IFD.
///
/// Groups are unordered bags: the same tag id may appear more than once and
/// lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifTagSet {
    /// Modification time (ms since epoch) of the file the tags were read from
    pub last_modified: i64,
    /// Free-form description of the maker note format, if recognised
    pub maker_note_description: Option<String>,
    pub exif: Vec<ExifTag>,
    pub gps: Vec<ExifTag>,
    pub maker_note: Vec<ExifTag>,
}
impl ExifTagSet {
    pub fn new(last_modified: i64) -> Self {
        Self { last_modified, ..Self::default() }
    }

    /// Add a tag to the group named by its own [`ifd`](ExifTag::ifd).
    pub fn push(&mut self, tag: ExifTag) {
        self.group_mut(tag.ifd).push(tag);
    }

    pub fn with_tag(mut self, tag: ExifTag) -> Self {
        self.push(tag);
        self
    }

    /// All tags of one group.
    pub fn tags(&self, ifd: Ifd) -> &[ExifTag] {
        match ifd {
            Ifd::Exif => &self.exif,
            Ifd::Gps => &self.gps,
            Ifd::MakerNote => &self.maker_note,
        }
    }

    fn group_mut(&mut self, ifd: Ifd) -> &mut Vec<ExifTag> {
        match ifd {
            Ifd::Exif => &mut self.exif,
            Ifd::Gps => &mut self.gps,
            Ifd::MakerNote => &mut self.maker_note,
        }
    }

    /// First tag in `ifd` with the given id.
    pub fn find(&self, ifd: Ifd, tag_id: u16) -> Option<&ExifTag> {
        self.tags(ifd).iter().find(|tag| tag.tag_id == tag_id)
    }

    /// Total number of tags across all groups.
    pub fn len(&self) -> usize {
        self.exif.len() + self.gps.len() + self.maker_note.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
