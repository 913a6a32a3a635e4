use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A source cited by an agent answer
pub struct Citation {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Citation {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Citation {
            url: url.into(),
            text: None,
        }
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = Some(text.into());
        self
    }
}

// The backend sends bare URL strings, stored history carries full objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum CitationRepr {
    Url(String),
    Full {
        url: String,
        #[serde(default)]
        text: Option<String>,
    },
}

impl<'de> Deserialize<'de> for Citation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match CitationRepr::deserialize(deserializer)? {
            CitationRepr::Url(url) => Citation { url, text: None },
            CitationRepr::Full { url, text } => Citation { url, text },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_bare_url_and_object() {
        let citations: Vec<Citation> = serde_json::from_value(json!([
            "https://a.example",
            {"url": "https://b.example", "text": "B"},
            {"url": "https://c.example"}
        ]))
        .unwrap();

        assert_eq!(
            citations,
            vec![
                Citation::new("https://a.example"),
                Citation::new("https://b.example").with_text("B"),
                Citation::new("https://c.example"),
            ]
        );
    }

    #[test]
    fn test_serialize_omits_missing_text() {
        let value = serde_json::to_value(Citation::new("https://a.example")).unwrap();
        assert_eq!(value, json!({"url": "https://a.example"}));
    }
}
