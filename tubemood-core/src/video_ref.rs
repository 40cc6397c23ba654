use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

const MAX_ID_LEN: usize = 64;
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Path prefixes on youtube.com whose next segment is the video id.
const ID_PATH_PREFIXES: &[&str] = &["embed", "shorts", "live", "v", "e"];

/// A canonical reference to a single video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoRef {
    pub id: String,
    pub url: String,
}

impl VideoRef {
    /// Extract a video id from a watch, short, embed, shorts or live URL, or a bare id.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let trimmed = input.trim();
        let invalid = || CoreError::InvalidReference {
            input: input.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        if is_valid_id(trimmed) {
            return Ok(Self::from_id(trimmed));
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };

        let url = Url::parse(&candidate).map_err(|_| invalid())?;
        let id = extract_id(&url).ok_or_else(invalid)?;
        if !is_valid_id(&id) {
            return Err(invalid());
        }

        Ok(Self::from_id(&id))
    }

    fn from_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            url: format!("{}{}", WATCH_URL, id),
        }
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

fn extract_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .or_else(|| host.strip_prefix("music."))
        .unwrap_or(&host);

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => {
            let first = segments.next()?;
            if first == "watch" {
                url.query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned())
            } else if ID_PATH_PREFIXES.contains(&first) {
                segments.next().map(str::to_string)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn is_valid_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= MAX_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_shapes_yield_same_id() {
        let inputs = [
            "https://www.youtube.com/watch?v=ABC123",
            "https://youtu.be/ABC123",
            "https://www.youtube.com/embed/ABC123",
            "ABC123",
        ];

        for input in inputs {
            let video = VideoRef::parse(input).unwrap();
            assert_eq!(video.id, "ABC123", "input: {}", input);
            assert_eq!(video.url, "https://www.youtube.com/watch?v=ABC123");
        }
    }

    #[test]
    fn test_additional_shapes() {
        let cases = [
            ("https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://music.youtube.com/watch?v=dQw4w9WgXcQ&list=RD", "dQw4w9WgXcQ"),
            ("youtube.com/watch?v=dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("youtu.be/dQw4w9WgXcQ?t=42", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/shorts/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("https://www.youtube.com/live/dQw4w9WgXcQ?si=abc", "dQw4w9WgXcQ"),
            ("https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ", "dQw4w9WgXcQ"),
            ("  dQw4w9WgXcQ  ", "dQw4w9WgXcQ"),
        ];

        for (input, expected) in cases {
            assert_eq!(VideoRef::parse(input).unwrap().id, expected, "input: {}", input);
        }
    }

    #[test]
    fn test_invalid_references() {
        let inputs = [
            "",
            "   ",
            "https://vimeo.com/12345",
            "https://www.youtube.com/watch?list=PL123",
            "https://www.youtube.com/channel/UC123",
            "https://youtu.be/",
            "not a video id",
        ];

        for input in inputs {
            match VideoRef::parse(input) {
                Err(CoreError::InvalidReference { .. }) => {}
                other => panic!("Expected InvalidReference for {:?}, got {:?}", input, other),
            }
        }
    }
}
