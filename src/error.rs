use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the atlas subsystem.
///
/// Every failure is scoped to a single content item or a single page;
/// batch operations log these and keep going.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// The content does not fit this particular page. Callers try the next page.
    #[error("content '{content}' does not fit in page '{page}'")]
    AllocationFailed { content: String, page: String },

    /// The content does not fit even an empty page of the configured size.
    #[error("content '{content}' ({width}x{height}) is too large for a {page_width}x{page_height} page")]
    ContentTooLargeForPage {
        content: String,
        width: i32,
        height: i32,
        page_width: i32,
        page_height: i32,
    },

    #[error("failed to create page '{page}'")]
    PageCreationFailed {
        page: String,
        #[source]
        source: Box<AtlasError>,
    },

    #[error("content '{0}' has no frames to place")]
    NoFrames(String),

    #[error("unknown page '{0}'")]
    UnknownPage(String),

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
