//! Browser-automation collaborator for channel screenshots.
//!
//! Only the interface is owned here; the capture engine is external. The
//! benchmarker consumes the returned bytes and degrades gracefully when no
//! collaborator is wired in.

use async_trait::async_trait;

use crate::adapters::AdapterError;

/// Screenshots of one channel: the videos-grid page, the channel landing
/// page, and up to a handful of individual thumbnails. All base64 PNG.
#[derive(Clone, Debug, Default)]
pub struct ChannelShots {
    pub videos_page_b64: Option<String>,
    pub channel_page_b64: Option<String>,
    pub individual_thumbs_b64: Vec<String>,
}

/// Capture options.
#[derive(Clone, Debug)]
pub struct CaptureOptions {
    /// Maximum individual thumbnails to capture.
    pub max_thumbnails: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self { max_thumbnails: 6 }
    }
}

#[async_trait]
pub trait ChannelCapture: Send + Sync {
    async fn capture(
        &self,
        channel_url: &str,
        opts: &CaptureOptions,
    ) -> Result<ChannelShots, AdapterError>;
}

/// Stand-in used when no browser collaborator is configured: every capture
/// reports a resource error, which the benchmarker treats as "no
/// screenshots" and falls back to downloaded thumbnails.
pub struct DisabledCapture;

#[async_trait]
impl ChannelCapture for DisabledCapture {
    async fn capture(
        &self,
        _channel_url: &str,
        _opts: &CaptureOptions,
    ) -> Result<ChannelShots, AdapterError> {
        Err(AdapterError::resource("channel capture not configured"))
    }
}
