//! Attachment resolution: file refs in a thread to fetchable URLs.

use crate::relay::protocol::{FileAttachment, FileRef};

/// Builds `{base}/{thread_id}/{hash}?name={name}` fetch URLs.
#[derive(Debug, Clone)]
pub struct AttachmentResolver {
    base_url: String,
}

impl AttachmentResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    /// Output order matches input order. Never fails: anything unsafe in a URL is percent-encoded.
    pub fn resolve(&self, thread_id: &str, files: &[FileRef]) -> Vec<FileAttachment> {
        files
            .iter()
            .map(|f| FileAttachment {
                title: f.name.clone(),
                url: format!(
                    "{}/{}/{}?name={}",
                    self.base_url,
                    urlencoding::encode(thread_id),
                    urlencoding::encode(&f.hash),
                    urlencoding::encode(&f.name)
                ),
            })
            .collect()
    }
}
