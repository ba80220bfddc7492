use crate::error::CollectError;
use url::Url;

/// The profile being collected: its page URL and the account handle in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    url: Url,
    handle: String,
}

impl Profile {
    /// Parses `https://<site>/@<handle>` or `https://<site>/@<handle>?<query>`.
    ///
    /// The handle is everything between the first `@` and the next `?`.
    pub fn parse(profile_url: &str) -> Result<Self, CollectError> {
        let url = Url::parse(profile_url)
            .map_err(|e| CollectError::InvalidProfileUrl(format!("{}: {}", profile_url, e)))?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(CollectError::InvalidProfileUrl(format!(
                "{}: expected an http(s) URL",
                profile_url
            )));
        }

        let (_, after_at) = profile_url.split_once('@').ok_or_else(|| {
            CollectError::InvalidProfileUrl(format!("{}: no '@<handle>' segment", profile_url))
        })?;
        let handle = after_at.split('?').next().unwrap_or_default();
        if handle.is_empty() {
            return Err(CollectError::InvalidProfileUrl(format!(
                "{}: empty handle",
                profile_url
            )));
        }

        Ok(Self {
            url,
            handle: handle.to_string(),
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Canonical video URL, the identity key of a record.
    pub fn video_url(&self, video_id: &str) -> String {
        format!(
            "{}/@{}/video/{}",
            self.url.origin().ascii_serialization(),
            self.handle,
            video_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_profile() {
        let profile = Profile::parse("https://www.tiktok.com/@diggle").unwrap();
        assert_eq!(profile.handle(), "diggle");
    }

    #[test]
    fn test_parse_strips_query() {
        let profile = Profile::parse("https://www.tiktok.com/@diggle?lang=en&is_from_webapp=1").unwrap();
        assert_eq!(profile.handle(), "diggle");
    }

    #[test]
    fn test_parse_rejects_missing_handle() {
        assert!(Profile::parse("https://www.tiktok.com/diggle").is_err());
        assert!(Profile::parse("https://www.tiktok.com/@").is_err());
        assert!(Profile::parse("https://www.tiktok.com/@?lang=en").is_err());
    }

    #[test]
    fn test_parse_rejects_non_http() {
        assert!(Profile::parse("not a url").is_err());
        assert!(Profile::parse("ftp://www.tiktok.com/@diggle").is_err());
    }

    #[test]
    fn test_video_url() {
        let profile = Profile::parse("https://www.tiktok.com/@diggle?lang=en").unwrap();
        assert_eq!(
            profile.video_url("7301234567890"),
            "https://www.tiktok.com/@diggle/video/7301234567890"
        );
    }
}
