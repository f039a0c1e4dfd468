use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::InputError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Youtube,
    Twitter,
    News,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FeedFilter {
    #[default]
    All,
    Only(FeedKind),
}

impl FeedFilter {
    pub fn matches(&self, kind: FeedKind) -> bool {
        match self {
            FeedFilter::All => true,
            FeedFilter::Only(k) => *k == kind,
        }
    }
}

impl FromStr for FeedFilter {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(FeedFilter::All),
            "youtube" => Ok(FeedFilter::Only(FeedKind::Youtube)),
            "twitter" => Ok(FeedFilter::Only(FeedKind::Twitter)),
            "news" => Ok(FeedFilter::Only(FeedKind::News)),
            other => Err(InputError::UnknownFeedFilter(other.to_string())),
        }
    }
}

impl fmt::Display for FeedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FeedFilter::All => "all",
            FeedFilter::Only(FeedKind::Youtube) => "youtube",
            FeedFilter::Only(FeedKind::Twitter) => "twitter",
            FeedFilter::Only(FeedKind::News) => "news",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeedItem {
    pub kind: FeedKind,
    pub headline: String,
    /// Channel, author or publication, depending on the kind.
    pub byline: String,
    pub url: String,
}

impl FeedItem {
    fn new(kind: FeedKind, headline: &str, byline: &str) -> Self {
        Self {
            kind,
            headline: headline.to_string(),
            byline: byline.to_string(),
            url: "#".to_string(),
        }
    }
}

static DEFAULT_FEED: Lazy<Vec<FeedItem>> = Lazy::new(|| {
    vec![
        FeedItem::new(FeedKind::Youtube, "Bitcoin Price Prediction 2024", "Crypto Daily"),
        FeedItem::new(FeedKind::Twitter, "Ethereum 2.0 launch date confirmed!", "@ethereumproject"),
        FeedItem::new(FeedKind::News, "Cardano Smart Contracts Go Live", "CoinDesk"),
    ]
});

/// Social/news items, the active filter and user-added sources.
#[derive(Clone, Debug)]
pub struct Feed {
    items: Vec<FeedItem>,
    filter: FeedFilter,
    sources: Vec<String>,
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            items: DEFAULT_FEED.clone(),
            filter: FeedFilter::All,
            sources: Vec::new(),
        }
    }
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_filter(&mut self, filter: FeedFilter) {
        self.filter = filter;
    }

    pub fn filter(&self) -> FeedFilter {
        self.filter
    }

    /// Adds a source handle. Returns `false` if it was already present.
    pub fn add_source(&mut self, source: &str) -> Result<bool, InputError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(InputError::EmptyFeedSource);
        }
        if self.sources.iter().any(|s| s.eq_ignore_ascii_case(source)) {
            return Ok(false);
        }
        self.sources.push(source.to_string());
        Ok(true)
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn visible(&self) -> Vec<FeedItem> {
        self.items
            .iter()
            .filter(|item| self.filter.matches(item.kind))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parses_case_insensitively() {
        assert_eq!("All".parse::<FeedFilter>().unwrap(), FeedFilter::All);
        assert_eq!(
            " YouTube ".parse::<FeedFilter>().unwrap(),
            FeedFilter::Only(FeedKind::Youtube)
        );
        assert!(matches!(
            "tiktok".parse::<FeedFilter>(),
            Err(InputError::UnknownFeedFilter(_))
        ));
    }

    #[test]
    fn visible_items_follow_filter() {
        let mut feed = Feed::new();
        assert_eq!(feed.visible().len(), 3);

        feed.set_filter(FeedFilter::Only(FeedKind::Twitter));
        let visible = feed.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].byline, "@ethereumproject");
    }

    #[test]
    fn sources_are_trimmed_and_deduplicated() {
        let mut feed = Feed::new();
        assert_eq!(feed.add_source("  @VitalikButerin "), Ok(true));
        assert_eq!(feed.add_source("@vitalikbuterin"), Ok(false));
        assert_eq!(feed.add_source("   "), Err(InputError::EmptyFeedSource));
        assert_eq!(feed.sources(), &["@VitalikButerin".to_string()]);
    }
}
