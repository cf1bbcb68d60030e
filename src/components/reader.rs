//! Readers
//!
//! A reader answers a request with raw bytes, bypassing the event chain.

use super::generator::required_source;
use super::StageSetup;
use crate::error::ProcessingError;

pub trait Reader: Send + Sync {
    fn read(&self, setup: &StageSetup, out: &mut Vec<u8>) -> Result<(), ProcessingError>;

    fn mime_type(&self, setup: &StageSetup) -> String;
}

/// Streams the resource named by `src` verbatim
pub struct ResourceReader;

impl Reader for ResourceReader {
    fn read(&self, setup: &StageSetup, out: &mut Vec<u8>) -> Result<(), ProcessingError> {
        let source = required_source("reader", setup)?;
        out.extend_from_slice(&source.load()?);
        Ok(())
    }

    fn mime_type(&self, setup: &StageSetup) -> String {
        if let Some(mime) = &setup.mime_type {
            return mime.clone();
        }
        let extension = setup
            .src
            .as_deref()
            .and_then(|src| src.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());
        guess_mime_type(extension.as_deref()).to_string()
    }
}

fn guess_mime_type(extension: Option<&str>) -> &'static str {
    match extension {
        Some("html" | "htm") => "text/html",
        Some("xml" | "xsl" | "xmap") => "text/xml",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::source::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_reads_bytes_and_guesses_type() {
        let store = MemoryStore::new();
        store.insert("style/site.css", "body{}");
        let setup = StageSetup {
            type_name: "resource".into(),
            src: Some("style/site.css".into()),
            source: Some(Arc::new(store.source("style/site.css"))),
            ..Default::default()
        };
        let mut out = Vec::new();
        ResourceReader.read(&setup, &mut out).unwrap();
        assert_eq!(out, b"body{}");
        assert_eq!(ResourceReader.mime_type(&setup), "text/css");
    }

    #[test]
    fn test_explicit_mime_type_wins() {
        let setup = StageSetup {
            src: Some("data.bin".into()),
            mime_type: Some("application/x-custom".into()),
            ..Default::default()
        };
        assert_eq!(ResourceReader.mime_type(&setup), "application/x-custom");
        let unknown = StageSetup {
            src: Some("data.bin".into()),
            ..Default::default()
        };
        assert_eq!(ResourceReader.mime_type(&unknown), "application/octet-stream");
    }
}
