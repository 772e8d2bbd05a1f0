//! Storage layout convention for one profile key.
//!
//! ```text
//! {key}/{key}.pdf          source document
//! {key}/config/zh.yaml     content documents (bilingual mode)
//! {key}/config/en.yaml
//! {key}/config/config.yaml content document (fallback mode)
//! {key}/{key}.html         rendered artifact
//! ```
//!
//! The renderer and any external retrieval depend on these exact paths.

use crate::models::{ContentDocument, Language, ProfileKey};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const YAML_CONTENT_TYPE: &str = "application/yaml";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

pub fn source_document_path(key: &ProfileKey) -> String {
    format!("{key}/{key}.pdf")
}

pub fn config_dir(key: &ProfileKey) -> String {
    format!("{key}/config")
}

pub fn content_document_path(key: &ProfileKey, document: &ContentDocument) -> String {
    format!("{}/{}", config_dir(key), document.file_name())
}

pub fn html_path(key: &ProfileKey) -> String {
    format!("{key}/{key}.html")
}

/// Every path a run may have written for `key`, in write order.
pub fn all_artifact_paths(key: &ProfileKey) -> Vec<String> {
    vec![
        source_document_path(key),
        content_document_path(key, &ContentDocument::new(Some(Language::Zh), "")),
        content_document_path(key, &ContentDocument::new(Some(Language::En), "")),
        content_document_path(key, &ContentDocument::new(None, "")),
        html_path(key),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ProfileKey {
        ProfileKey::parse("demo1").unwrap()
    }

    #[test]
    fn test_layout_paths() {
        let key = key();
        assert_eq!(source_document_path(&key), "demo1/demo1.pdf");
        assert_eq!(html_path(&key), "demo1/demo1.html");
        assert_eq!(
            content_document_path(&key, &ContentDocument::new(Some(Language::Zh), "x")),
            "demo1/config/zh.yaml"
        );
        assert_eq!(
            content_document_path(&key, &ContentDocument::new(Some(Language::En), "x")),
            "demo1/config/en.yaml"
        );
        assert_eq!(
            content_document_path(&key, &ContentDocument::new(None, "x")),
            "demo1/config/config.yaml"
        );
    }

    #[test]
    fn test_all_artifact_paths_stay_under_key() {
        let key = key();
        let paths = all_artifact_paths(&key);
        assert_eq!(paths.len(), 5);
        assert!(paths.iter().all(|p| p.starts_with("demo1/")));
    }
}
