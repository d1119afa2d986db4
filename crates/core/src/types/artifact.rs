//! Artifacts produced by providers

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Output of a completed task: a reference to stored content or the content itself
///
/// Equality is byte-for-byte, which is what the cache consistency rule relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Artifact {
    /// Content stored elsewhere (object storage, provider CDN)
    Url { url: String },
    /// Content carried inline, base64-encoded when serialized
    #[serde(rename_all = "camelCase")]
    Inline {
        media_type: String,
        #[serde(serialize_with = "encode_base64", deserialize_with = "decode_base64")]
        data: Vec<u8>,
    },
}

impl Artifact {
    pub fn url(url: impl Into<String>) -> Self {
        Artifact::Url { url: url.into() }
    }

    pub fn inline(media_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Artifact::Inline {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Plain UTF-8 text artifact
    pub fn text(text: impl Into<String>) -> Self {
        Self::inline("text/plain; charset=utf-8", text.into().into_bytes())
    }

    /// The text content, if this is an inline text artifact
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Artifact::Inline { media_type, data } if media_type.starts_with("text/") => {
                std::str::from_utf8(data).ok()
            }
            _ => None,
        }
    }

    /// Bytes accounted against cache capacity
    pub fn size_bytes(&self) -> u64 {
        match self {
            Artifact::Url { url } => url.len() as u64,
            Artifact::Inline { media_type, data } => (media_type.len() + data.len()) as u64,
        }
    }
}

fn encode_base64<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(data))
}

fn decode_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_artifact() {
        let artifact = Artifact::text("Once upon a time");
        assert_eq!(artifact.as_text(), Some("Once upon a time"));
        assert!(Artifact::url("https://cdn.example/img.png").as_text().is_none());
    }

    #[test]
    fn test_inline_serializes_as_base64() {
        let artifact = Artifact::inline("image/png", vec![0u8, 1, 2, 255]);
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["type"], "inline");
        assert_eq!(json["mediaType"], "image/png");
        assert_eq!(json["data"], "AAEC/w==");

        let back: Artifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn test_equality_is_byte_exact() {
        assert_ne!(Artifact::text("a"), Artifact::text("a "));
        assert_eq!(Artifact::url("x"), Artifact::url("x"));
    }
}
