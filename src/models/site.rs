//! Site-wide singleton documents
//!
//! The magazine, live stream, editorial agenda and the static pages each
//! exist at most once. They share one key/payload table and are typed here.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key of a singleton document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Magazine,
    Live,
    Pauta,
    AboutPage,
    ContactPage,
    UsageTermsPage,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Magazine => "magazine",
            DocumentKind::Live => "live",
            DocumentKind::Pauta => "pauta",
            DocumentKind::AboutPage => "about",
            DocumentKind::ContactPage => "contact",
            DocumentKind::UsageTermsPage => "usage-terms",
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(
            self,
            DocumentKind::AboutPage | DocumentKind::ContactPage | DocumentKind::UsageTermsPage
        )
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "magazine" => Ok(DocumentKind::Magazine),
            "live" => Ok(DocumentKind::Live),
            "pauta" => Ok(DocumentKind::Pauta),
            "about" => Ok(DocumentKind::AboutPage),
            "contact" => Ok(DocumentKind::ContactPage),
            "usage-terms" => Ok(DocumentKind::UsageTermsPage),
            _ => Err(anyhow::anyhow!("Unknown site document: {}", s)),
        }
    }
}

/// Raw row of the `site_documents` table
#[derive(Debug, Clone)]
pub struct SiteDocument {
    pub kind: DocumentKind,
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl SiteDocument {
    pub fn decode<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| anyhow::anyhow!("Corrupt {} document: {}", self.kind, e))
    }
}

/// Current print edition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Magazine {
    pub pdf_url: String,
}

/// Live broadcast banner
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveStream {
    pub link: String,
    pub is_enabled: bool,
}

/// Editorial agenda image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pauta {
    pub image_url: String,
}

/// Rich-text static page body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageContent {
    pub content: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in [
            DocumentKind::Magazine,
            DocumentKind::Live,
            DocumentKind::Pauta,
            DocumentKind::AboutPage,
            DocumentKind::ContactPage,
            DocumentKind::UsageTermsPage,
        ] {
            assert_eq!(DocumentKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(DocumentKind::from_str("home").is_err());
    }

    #[test]
    fn test_decode_typed_payload() {
        let doc = SiteDocument {
            kind: DocumentKind::Live,
            payload: serde_json::json!({"link": "https://youtu.be/x", "isEnabled": true}),
            updated_at: Utc::now(),
        };
        let live: LiveStream = doc.decode().unwrap();
        assert!(live.is_enabled);

        let bad: anyhow::Result<Magazine> = doc.decode();
        assert!(bad.is_err());
    }
}
