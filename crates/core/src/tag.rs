use serde::{Deserialize, Serialize};

use crate::types::TagId;

/// A named label shared between images. Names are unique and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Split a raw comma-separated tag string into trimmed names.
///
/// Tokens that are empty after trimming are dropped, so `""`, `" , "` and
/// `",,"` all yield no names. Order and duplicates are preserved.
pub fn parse_tag_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Render tags back into the comma-separated form used by the edit form.
///
/// An empty slice renders as an empty string.
pub fn tags_to_string(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| tag.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
