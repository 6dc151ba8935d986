//! Saved resume data, as written by the form builder.
//!
//! Only `personal.name` feeds the export (it names the downloaded file); the
//! other sections are accepted and kept so a saved profile loads unchanged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalInfo {
    pub name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub about: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeProfile {
    pub personal: PersonalInfo,
    #[serde(flatten)]
    pub sections: serde_json::Map<String, serde_json::Value>,
}

impl ResumeProfile {
    pub fn named(name: &str) -> Self {
        ResumeProfile {
            personal: PersonalInfo {
                name: name.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ParseError(format!("resume profile: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// File name the exported document is offered under.
    pub fn file_name(&self) -> String {
        crate::paginate::file_name_for(&self.personal.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_saved_builder_data() {
        let json = r#"{
            "personal": {"name": "Jane Q Doe", "title": "Engineer", "photo": "data:image/png;base64,AA=="},
            "experience": [{"company": "Acme", "role": "Dev"}],
            "skills": ["Rust"]
        }"#;
        let profile = ResumeProfile::from_json_str(json).expect("parse");
        assert_eq!(profile.personal.name, "Jane Q Doe");
        assert_eq!(profile.personal.title, "Engineer");
        assert!(profile.sections.contains_key("experience"));
        assert_eq!(profile.file_name(), "Jane_Q_Doe_resume.pdf");
    }

    #[test]
    fn missing_sections_default() {
        let profile = ResumeProfile::from_json_str("{}").expect("parse");
        assert_eq!(profile.personal.name, "");
        assert_eq!(profile.file_name(), "resume.pdf");
        assert!(matches!(ResumeProfile::from_json_str("[1]"), Err(Error::ParseError(_))));
    }
}
