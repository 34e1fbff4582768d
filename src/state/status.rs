use std::fmt;

/// Lifecycle state of a tracked blog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlogStatus {
    /// Registered but not crawled yet
    Pending,

    /// A crawl has started and not finished
    InProgress,

    /// Every stage completed
    Completed,

    /// The last crawl ended with an error
    Failed,

    /// The last crawl was stopped by repeated rate limiting
    Suspended,
}

impl BlogStatus {
    /// Converts the blog status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Suspended => "suspended",
        }
    }

    /// Parses a blog status from a database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Content state of a stored post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostStatus {
    /// Discovered by the post list, content not fetched
    Pending,

    /// Content stored
    Completed,

    /// The post page was missing or unparseable
    Unavailable,
}

impl PostStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Unavailable => "unavailable",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
