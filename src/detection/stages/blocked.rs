//! Block-list stage.

use async_trait::async_trait;
use log::debug;

use crate::detection::{DetectionStage, PipelineContext};
use crate::error_handling::ProbeError;
use crate::models::{BlockMatch, BlockedResult};

/// Domains known to be blocked by the operator's network.
const BLOCKED_DOMAINS: &[&str] = &[
    "google.com",
    "googleapis.com",
    "gstatic.com",
    "youtube.com",
    "ytimg.com",
    "facebook.com",
    "fbcdn.net",
    "instagram.com",
    "whatsapp.com",
    "twitter.com",
    "x.com",
    "t.co",
    "telegram.org",
    "t.me",
    "wikipedia.org",
    "reddit.com",
    "discord.com",
    "dropbox.com",
    "netflix.com",
    "twitch.tv",
    "medium.com",
    "pinterest.com",
    "tumblr.com",
    "blogspot.com",
    "quora.com",
    "vimeo.com",
    "nytimes.com",
    "bbc.com",
    "line.me",
    "signal.org",
];

pub struct BlockedStage {
    blocked: Vec<String>,
}

impl BlockedStage {
    /// Built-in list plus `extra` entries.
    pub fn new(extra: &[String]) -> Self {
        let mut blocked: Vec<String> = BLOCKED_DOMAINS.iter().map(|d| d.to_string()).collect();
        blocked.extend(
            extra
                .iter()
                .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty()),
        );
        Self { blocked }
    }

    /// Exact match wins over a parent-domain match.
    pub fn check(&self, domain: &str) -> BlockedResult {
        if let Some(entry) = self.blocked.iter().find(|entry| entry.as_str() == domain) {
            return BlockedResult {
                is_blocked: true,
                blocked_reasons: vec![format!("exact match on {entry}")],
                match_type: Some(BlockMatch::Exact),
            };
        }

        let reasons: Vec<String> = self
            .blocked
            .iter()
            .filter(|entry| is_subdomain_of(domain, entry))
            .map(|entry| format!("subdomain of {entry}"))
            .collect();
        if reasons.is_empty() {
            BlockedResult {
                is_blocked: false,
                blocked_reasons: Vec::new(),
                match_type: None,
            }
        } else {
            BlockedResult {
                is_blocked: true,
                blocked_reasons: reasons,
                match_type: Some(BlockMatch::Suffix),
            }
        }
    }
}

pub(crate) fn is_subdomain_of(domain: &str, parent: &str) -> bool {
    domain
        .strip_suffix(parent)
        .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.'))
}

#[async_trait]
impl DetectionStage for BlockedStage {
    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), ProbeError> {
        let verdict = self.check(&ctx.domain);
        let outcome = if verdict.is_blocked {
            debug!("{} is blocked: {:?}", ctx.domain, verdict.blocked_reasons);
            Err(ProbeError::Blocked(verdict.blocked_reasons.join(", ")))
        } else {
            Ok(())
        };
        ctx.result.blocked = Some(verdict);
        outcome
    }

    fn priority(&self) -> u32 {
        10
    }

    fn name(&self) -> &'static str {
        "blocked"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let stage = BlockedStage::new(&[]);
        let verdict = stage.check("google.com");
        assert!(verdict.is_blocked);
        assert_eq!(verdict.match_type, Some(BlockMatch::Exact));
    }

    #[test]
    fn test_suffix_match() {
        let stage = BlockedStage::new(&[]);
        let verdict = stage.check("mail.google.com");
        assert!(verdict.is_blocked);
        assert_eq!(verdict.match_type, Some(BlockMatch::Suffix));
        assert_eq!(verdict.blocked_reasons, vec!["subdomain of google.com"]);
    }

    #[test]
    fn test_lookalike_is_not_blocked() {
        let stage = BlockedStage::new(&[]);
        assert!(!stage.check("notgoogle.com").is_blocked);
        assert!(!stage.check("microsoft.com").is_blocked);
    }

    #[test]
    fn test_configured_extras() {
        let stage = BlockedStage::new(&["Blocked.Example.".to_string(), "  ".to_string()]);
        assert!(stage.check("blocked.example").is_blocked);
        assert!(stage.check("www.blocked.example").is_blocked);
    }

    #[test]
    fn test_is_subdomain_of() {
        assert!(is_subdomain_of("a.example.com", "example.com"));
        assert!(!is_subdomain_of("example.com", "example.com"));
        assert!(!is_subdomain_of(".example.com", "example.com"));
        assert!(!is_subdomain_of("badexample.com", "example.com"));
    }
}
