use url::Url;

use parley_core::DEFAULT_BASE_URL;

use crate::error::ClientError;

/// Normalize a configured base URL.
///
/// Normalization rules:
/// 1) blank input falls back to [`DEFAULT_BASE_URL`]
/// 2) surrounding whitespace and trailing `/` are removed
pub fn normalize_base_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };
    base.trim_end_matches('/').to_string()
}

/// Parsed service root that endpoint paths are appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendUrl {
    base: Url,
}

impl BackendUrl {
    pub fn parse(input: &str) -> Result<Self, ClientError> {
        let normalized = normalize_base_url(input);
        let base = Url::parse(&normalized)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{normalized}: {e}")))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::InvalidBaseUrl(normalized));
        }
        Ok(Self { base })
    }

    pub fn as_str(&self) -> &str {
        self.base.as_str()
    }

    /// Join percent-encoded path segments onto the base. An empty final
    /// segment produces a trailing slash (`/chats/`).
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
