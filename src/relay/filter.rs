//! Marker filter for the summarizer's stderr.
//!
//! The summarizer logs a lot of progress noise on stderr. Only chunks that
//! carry one of the configured markers are shown to the client.
//!
//! Matching is done on each chunk as it was read from the pipe, so a marker
//! split across two reads is missed.

use crate::config::FilterConfig;

#[derive(Debug, Clone)]
pub struct MarkerFilter {
    markers: Vec<Vec<u8>>,
}

impl MarkerFilter {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().as_bytes().to_vec())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(&config.markers)
    }

    /// True if the chunk contains at least one marker (case-sensitive).
    pub fn should_forward(&self, chunk: &[u8]) -> bool {
        self.markers.iter().any(|marker| contains(chunk, marker))
    }
}

impl Default for MarkerFilter {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default())
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack.windows(needle.len()).any(|w| w == needle)
}
