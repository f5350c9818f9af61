//! Cache keys for every list the console loads.

use std::fmt;

/// Identity of a cacheable resource query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Buckets,
    Objects { bucket: String },
    Functions,
    Messages { queue: String },
}

impl CacheKey {
    pub fn objects(bucket: impl Into<String>) -> Self {
        CacheKey::Objects {
            bucket: bucket.into(),
        }
    }

    pub fn messages(queue: impl Into<String>) -> Self {
        CacheKey::Messages {
            queue: queue.into(),
        }
    }

    pub fn is_objects(&self) -> bool {
        matches!(self, CacheKey::Objects { .. })
    }

    pub fn is_messages(&self) -> bool {
        matches!(self, CacheKey::Messages { .. })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Buckets => f.write_str("buckets"),
            CacheKey::Objects { bucket } => write!(f, "objects:{}", bucket),
            CacheKey::Functions => f.write_str("functions"),
            CacheKey::Messages { queue } => write!(f, "messages:{}", queue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(CacheKey::Buckets.to_string(), "buckets");
        assert_eq!(CacheKey::objects("bkt1").to_string(), "objects:bkt1");
        assert_eq!(CacheKey::messages("default").to_string(), "messages:default");
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(CacheKey::objects("a"), CacheKey::objects(String::from("a")));
        assert_ne!(CacheKey::objects("a"), CacheKey::objects("b"));
        assert_ne!(CacheKey::objects("a"), CacheKey::messages("a"));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(CacheKey::objects("a").is_objects());
        assert!(!CacheKey::objects("a").is_messages());
        assert!(CacheKey::messages("q").is_messages());
        assert!(!CacheKey::Buckets.is_objects());
    }
}
