/// Crawl progress definitions
///
/// A blog's crawl moves through a fixed sequence of stages. Each stage carries
/// a cursor telling a resumed crawl where to re-enter.
use std::fmt;

/// The stage component of a crawl position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrawlStage {
    Metadata,
    PostList,
    PostContent,
    Reactions,
    Comments,
    Done,
}

impl CrawlStage {
    /// Converts the stage to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::PostList => "post_list",
            Self::PostContent => "post_content",
            Self::Reactions => "reactions",
            Self::Comments => "comments",
            Self::Done => "done",
        }
    }

    /// Parses a stage from a database string representation
    ///
    /// Returns None if the string doesn't match any known stage.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "metadata" => Some(Self::Metadata),
            "post_list" => Some(Self::PostList),
            "post_content" => Some(Self::PostContent),
            "reactions" => Some(Self::Reactions),
            "comments" => Some(Self::Comments),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl fmt::Display for CrawlStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A blog's resumable crawl position
///
/// Cursors record completed work: `PostList { page: 2 }` means pages 1 and 2
/// are committed, `Comments { post_index: 4, page: 1 }` means the first four
/// posts are finished and page 1 of the fifth post's comments is committed.
///
/// The derived ordering follows the crawl: later stages compare greater, and
/// within a stage the cursor fields compare in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrawlProgress {
    Metadata,
    PostList { page: u32 },
    PostContent { post_index: u32 },
    Reactions { post_index: u32 },
    Comments { post_index: u32, page: u32 },
    Done,
}

impl CrawlProgress {
    /// Returns the stage of this position
    pub fn stage(&self) -> CrawlStage {
        match self {
            Self::Metadata => CrawlStage::Metadata,
            Self::PostList { .. } => CrawlStage::PostList,
            Self::PostContent { .. } => CrawlStage::PostContent,
            Self::Reactions { .. } => CrawlStage::Reactions,
            Self::Comments { .. } => CrawlStage::Comments,
            Self::Done => CrawlStage::Done,
        }
    }

    /// Returns true once every stage has completed
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Splits the position into `(stage, cursor_index, cursor_page)` columns
    ///
    /// For `PostList` the page goes into `cursor_page`; post-indexed stages
    /// use `cursor_index`.
    pub fn to_columns(&self) -> (&'static str, u32, u32) {
        let stage = self.stage().to_db_string();
        match *self {
            Self::Metadata | Self::Done => (stage, 0, 0),
            Self::PostList { page } => (stage, 0, page),
            Self::PostContent { post_index } | Self::Reactions { post_index } => {
                (stage, post_index, 0)
            }
            Self::Comments { post_index, page } => (stage, post_index, page),
        }
    }

    /// Rebuilds a position from its database columns
    ///
    /// Returns None if the stage string is unknown.
    pub fn from_columns(stage: &str, cursor_index: u32, cursor_page: u32) -> Option<Self> {
        let progress = match CrawlStage::from_db_string(stage)? {
            CrawlStage::Metadata => Self::Metadata,
            CrawlStage::PostList => Self::PostList { page: cursor_page },
            CrawlStage::PostContent => Self::PostContent {
                post_index: cursor_index,
            },
            CrawlStage::Reactions => Self::Reactions {
                post_index: cursor_index,
            },
            CrawlStage::Comments => Self::Comments {
                post_index: cursor_index,
                page: cursor_page,
            },
            CrawlStage::Done => Self::Done,
        };
        Some(progress)
    }
}

impl fmt::Display for CrawlProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata"),
            Self::PostList { page } => write!(f, "post_list(page {})", page),
            Self::PostContent { post_index } => write!(f, "post_content(post {})", post_index),
            Self::Reactions { post_index } => write!(f, "reactions(post {})", post_index),
            Self::Comments { post_index, page } => {
                write!(f, "comments(post {}, page {})", post_index, page)
            }
            Self::Done => write!(f, "done"),
        }
    }
}
