// file: src/models/image.rs
// description: image occurrences recorded while extracting markdown structure
// reference: internal data structures

use serde::{Deserialize, Serialize};

/// One image occurrence in a note body. `marker_id` is the id carried by the
/// inline `<en-media-marker>` tag that replaced the markdown syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub path: String,
    pub alt: String,
    pub marker_id: String,
    pub offset: usize,
    pub width: Option<u32>,
}

/// Last path segment of a forward-slash resource key.
pub fn file_name_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        assert_eq!(file_name_of("assets/photos/cat.png"), "cat.png");
        assert_eq!(file_name_of("cat.png"), "cat.png");
    }
}
