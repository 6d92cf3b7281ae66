/// Stored metadata record, payload still in its serialized form.
///
/// The timestamp is read alongside the payload so that staleness can be
/// decided without parsing the document.
#[derive(sqlx::FromRow)]
pub(crate) struct MetadataRow {
    pub(crate) last_modified: i64,
    pub(crate) payload: String,
}
