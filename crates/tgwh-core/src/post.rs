use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single post collected from a channel.
///
/// `message_id` is only unique within `channel_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub message_id: i64,
    pub channel_name: String,
    pub channel_title: String,
    pub message_date: Option<DateTime<Utc>>,
    pub message_text: Option<String>,
    pub has_media: bool,
    pub image_path: Option<String>,
    pub views: i64,
    pub forwards: i64,
}

impl Post {
    /// A post without media must not reference an image.
    #[must_use]
    pub fn media_invariant_holds(&self) -> bool {
        self.has_media || self.image_path.is_none()
    }

    /// Drops the image reference, e.g. after a failed download.
    pub fn clear_image(&mut self) {
        self.image_path = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(has_media: bool, image_path: Option<&str>) -> Post {
        Post {
            message_id: 97,
            channel_name: "lobelia4cosmetics".to_string(),
            channel_title: "Lobelia Cosmetics".to_string(),
            message_date: None,
            message_text: None,
            has_media,
            image_path: image_path.map(str::to_string),
            views: 0,
            forwards: 0,
        }
    }

    #[test]
    fn media_invariant_rejects_image_without_media() {
        assert!(!post(false, Some("data/raw/images/x/97.jpg")).media_invariant_holds());
    }

    #[test]
    fn media_invariant_allows_media_without_image() {
        assert!(post(true, None).media_invariant_holds());
        assert!(post(false, None).media_invariant_holds());
        assert!(post(true, Some("data/raw/images/x/97.jpg")).media_invariant_holds());
    }

    #[test]
    fn clear_image_keeps_media_flag() {
        let mut p = post(true, Some("data/raw/images/x/97.jpg"));
        p.clear_image();
        assert!(p.has_media);
        assert!(p.image_path.is_none());
    }
}
