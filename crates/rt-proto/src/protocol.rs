//! Wire types of the Radio-T site API and the news API.
//!
//! Decoding is best-effort: every field defaults when absent or `null` so a
//! partial payload still yields usable values.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Episode {
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    /// ISO-8601 publish date.
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub categories: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub image: String,
    /// Unique per episode; used as the list key.
    #[serde(deserialize_with = "null_as_default")]
    pub file_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(deserialize_with = "null_as_default")]
    pub show_notes: String,
    #[serde(deserialize_with = "null_as_default")]
    pub audio_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub time_labels: Vec<TimeLabel>,
    #[serde(deserialize_with = "null_as_default")]
    pub show_num: u32,
}

/// One topic of an episode.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TimeLabel {
    #[serde(deserialize_with = "null_as_default")]
    pub topic: String,
    #[serde(deserialize_with = "null_as_default")]
    pub time: String,
    /// Topic length in seconds.
    #[serde(deserialize_with = "null_as_default")]
    pub duration: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Article {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(deserialize_with = "null_as_default")]
    pub snippet: String,
    #[serde(deserialize_with = "null_as_default")]
    pub pic: String,
    #[serde(deserialize_with = "null_as_default")]
    pub link: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ts: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ats: String,
    #[serde(deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub activets: String,
    #[serde(deserialize_with = "null_as_default")]
    pub geek: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub votes: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub del: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub archived: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(deserialize_with = "null_as_default")]
    pub feed: String,
    #[serde(deserialize_with = "null_as_default")]
    pub domain: String,
    #[serde(deserialize_with = "null_as_default")]
    pub comments: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub likes: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub show_num: u32,
}

/// The site API sends `null` for empty lists and unset strings.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Start of the current or most recent live show.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShowStart {
    pub started: String,
}

/// Decode an episode list, skipping elements that do not decode.
/// Anything other than a JSON array yields an empty list.
pub fn decode_episodes(value: Value) -> Vec<Episode> {
    let Value::Array(items) = value else {
        debug!("episode payload is not an array");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Episode>(item) {
            Ok(e) => Some(e),
            Err(e) => {
                debug!("skipping malformed episode: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_episode_missing_fields_default() {
        let e: Episode = serde_json::from_value(json!({
            "title": "Радио-Т 900",
            "audio_url": "https://cdn.radio-t.com/rt_podcast900.mp3",
            "time_labels": [{ "topic": "Вступление", "duration": 120 }]
        }))
        .unwrap();
        assert_eq!(e.title, "Радио-Т 900");
        assert!(e.categories.is_empty());
        assert_eq!(e.time_labels[0].duration, 120);
        assert_eq!(e.time_labels[0].time, "");
        assert_eq!(e.show_num, 0);
    }

    #[test]
    fn test_decode_episodes_skips_malformed() {
        let list = decode_episodes(json!([
            { "title": "ok", "file_name": "rt_podcast1" },
            { "title": 42 },
            "garbage",
            { "title": "also ok", "time_labels": [] }
        ]));
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].file_name, "rt_podcast1");
        assert_eq!(list[1].title, "also ok");
    }

    #[test]
    fn test_null_fields_keep_the_episode() {
        let list = decode_episodes(json!([
            { "title": "rt1", "file_name": "rt1", "time_labels": null },
            { "title": "rt2", "file_name": "rt2", "categories": null, "image": null, "show_num": null },
            { "title": "rt3", "file_name": "rt3",
              "time_labels": [{ "topic": null, "time": "2026-10-17T22:00:00Z", "duration": null }] }
        ]));
        let names: Vec<_> = list.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["rt1", "rt2", "rt3"]);
        assert!(list[0].time_labels.is_empty());
        assert!(list[1].categories.is_empty());
        assert_eq!(list[1].image, "");
        assert_eq!(list[1].show_num, 0);
        assert_eq!(list[2].time_labels[0].topic, "");
        assert_eq!(list[2].time_labels[0].duration, 0);
    }

    #[test]
    fn test_article_null_fields_default() {
        let a: Article = serde_json::from_value(json!({
            "title": "Rust 2.0",
            "pic": null,
            "active": null,
            "votes": null
        }))
        .unwrap();
        assert_eq!(a.pic, "");
        assert!(!a.active);
        assert_eq!(a.votes, 0);
    }

    #[test]
    fn test_decode_episodes_non_array() {
        assert!(decode_episodes(json!({ "error": "nope" })).is_empty());
        assert!(decode_episodes(Value::Null).is_empty());
    }

    #[test]
    fn test_article_flags() {
        let a: Article = serde_json::from_value(json!({
            "title": "Rust 2.0",
            "active": true,
            "geek": true,
            "votes": 3
        }))
        .unwrap();
        assert!(a.active && a.geek);
        assert!(!a.del && !a.archived);
        assert_eq!(a.votes, 3);
    }
}
