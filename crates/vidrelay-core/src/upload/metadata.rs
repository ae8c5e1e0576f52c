//! Video resource metadata sent when a session is opened.

use serde::{Deserialize, Serialize};

/// "Education" in the service's category list.
pub const DEFAULT_CATEGORY_ID: &str = "27";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Privacy::Private => "private",
            Privacy::Unlisted => "unlisted",
            Privacy::Public => "public",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
}

impl VideoMetadata {
    /// Private video in the default category with no tags.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            tags: Vec::new(),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
            privacy: Privacy::Private,
        }
    }

    /// JSON body for the session-initiation request (`snippet` + `status` parts).
    pub fn resource_json(&self) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": self.privacy.as_str(),
            },
        })
    }
}
