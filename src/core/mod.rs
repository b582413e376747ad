//! Foundational types shared by every other module: configuration and errors.

pub mod config;
pub mod error;

pub use config::{ApiConfig, StorageNodeConfig};
pub use error::{Error, Result};

/// Derives the stable `file_id` from a client-supplied `fileref` by base64
/// encoding its raw bytes, so chunk names never carry the fileref's path
/// separators. See spec.md §3 and §6.
pub fn file_id(fileref: &str) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(fileref.as_bytes())
}

/// Builds the chunk id a storage node persists a chunk under:
/// `<file_id>.part.<order>`.
pub fn chunk_id(fileref: &str, order: u32) -> String {
    format!("{}.part.{}", file_id(fileref), order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_has_no_path_separators() {
        let id = chunk_id("some/nested/path", 3);
        assert!(!id.contains('/'));
        assert!(id.ends_with(".part.3"));
    }
}
