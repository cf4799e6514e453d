use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub const DEFAULT_PRODUCT_NAME: &str = "RHQ";

/// One slash-delimited segment of a history token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ViewId(String);

impl ViewId {
    pub fn new(segment: impl Into<String>) -> Self {
        Self(segment.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments that start with a digit are always entity ids.
    pub fn is_entity_id(&self) -> bool {
        self.0.chars().next().is_some_and(|ch| ch.is_ascii_digit())
    }

    pub fn parse<T: FromStr>(&self) -> Option<T> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for ViewId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ViewId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A parsed history token with a cursor over its segments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewPath {
    segments: Vec<ViewId>,
    index: usize,
    refresh: bool,
}

impl ViewPath {
    /// Parses `A/B/C`; a leading `#` and empty segments are ignored.
    pub fn parse(token: &str) -> Self {
        let token = token.trim().trim_start_matches('#');
        let segments = token
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(ViewId::new)
            .collect();
        Self {
            segments,
            index: 0,
            refresh: false,
        }
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn set_refresh(&mut self, refresh: bool) {
        self.refresh = refresh;
    }

    /// True when the same path is re-requested and loaded content must be reloaded.
    pub fn is_refresh(&self) -> bool {
        self.refresh
    }

    pub fn current(&self) -> Option<&ViewId> {
        self.segments.get(self.index)
    }

    pub fn peek(&self) -> Option<&ViewId> {
        self.segments.get(self.index + 1)
    }

    /// Moves the cursor one segment forward and returns the new current segment.
    pub fn advance(&mut self) -> Option<&ViewId> {
        if self.index < self.segments.len() {
            self.index += 1;
        }
        self.segments.get(self.index)
    }

    pub fn is_end(&self) -> bool {
        self.index >= self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[ViewId] {
        &self.segments
    }

    pub fn remaining(&self) -> &[ViewId] {
        self.segments.get(self.index..).unwrap_or_default()
    }

    /// Token up to and including the current segment.
    pub fn path_to_current(&self) -> String {
        let end = (self.index + 1).min(self.segments.len());
        join(&self.segments[..end])
    }

    /// Browser title: `<product>: A | B`, skipping entity ids after the first segment.
    pub fn title(&self, product_name: &str) -> String {
        let Some((first, rest)) = self.segments.split_first() else {
            return String::new();
        };

        let mut title = format!("{product_name}: {first}");
        for segment in rest.iter().filter(|segment| !segment.is_entity_id()) {
            title.push_str(" | ");
            title.push_str(segment.as_str());
        }
        title
    }
}

impl fmt::Display for ViewPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join(&self.segments))
    }
}

fn join(segments: &[ViewId]) -> String {
    segments
        .iter()
        .map(ViewId::as_str)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_walks_segments() {
        let mut path = ViewPath::parse("#Resource/10001/Monitoring/Graphs");
        assert_eq!(path.current().map(ViewId::as_str), Some("Resource"));
        assert_eq!(path.peek().map(ViewId::as_str), Some("10001"));
        assert_eq!(path.path_to_current(), "Resource");

        assert_eq!(path.advance().and_then(|id| id.parse::<i32>()), Some(10001));
        assert_eq!(path.path_to_current(), "Resource/10001");
        path.advance();
        path.advance();
        assert_eq!(path.remaining().len(), 1);
        assert!(!path.is_end());
        assert_eq!(path.advance(), None);
        assert!(path.is_end());
        assert_eq!(path.advance(), None);
        assert_eq!(path.to_string(), "Resource/10001/Monitoring/Graphs");
    }

    #[test]
    fn empty_segments_are_dropped() {
        let path = ViewPath::parse("Inventory//Resources/");
        assert_eq!(path.segments().len(), 2);
        assert!(ViewPath::parse("").is_end());
        assert!(ViewPath::parse("/").is_empty());
    }

    #[test]
    fn title_skips_entity_ids() {
        let path = ViewPath::parse("Resource/10001/Monitoring/Graphs");
        assert_eq!(path.title(DEFAULT_PRODUCT_NAME), "RHQ: Resource | Monitoring | Graphs");
        assert_eq!(ViewPath::parse("").title(DEFAULT_PRODUCT_NAME), "");
    }

    #[test]
    fn refresh_flag_is_carried() {
        let mut path = ViewPath::parse("Inventory").with_refresh(true);
        assert!(path.is_refresh());
        path.set_refresh(false);
        assert!(!path.is_refresh());
    }
}
