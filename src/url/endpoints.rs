use crate::config::PlatformConfig;
use crate::url::BlogId;
use url::form_urlencoded::byte_serialize;

/// Builds every platform URL the crawler requests
///
/// Base URLs come from configuration so that tests can point the crawler
/// at a local mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    blog_base: String,
    mobile_base: String,
    api_base: String,
}

impl Endpoints {
    pub fn new(config: &PlatformConfig) -> Self {
        Self {
            blog_base: config.blog_base.trim_end_matches('/').to_string(),
            mobile_base: config.mobile_base.trim_end_matches('/').to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Canonical public URL of a blog
    pub fn blog_url(&self, blog: &BlogId) -> String {
        format!("{}/{}", self.blog_base, blog)
    }

    /// Mobile home page, the source of blog metadata
    pub fn mobile_home(&self, blog: &BlogId) -> String {
        format!("{}/{}", self.mobile_base, blog)
    }

    /// Desktop post list page, the source of the declared post count
    pub fn post_list_page(&self, blog: &BlogId) -> String {
        format!(
            "{}/PostList.naver?blogId={}&categoryNo=0&from=postList",
            self.blog_base, blog
        )
    }

    /// Paged post list API
    pub fn post_list_api(&self, blog: &BlogId, page: u32, page_size: u32) -> String {
        format!(
            "{}/PostTitleListAsync.naver?blogId={}&viewdate=&currentPage={}\
             &categoryNo=0&parentCategoryNo=0&countPerPage={}",
            self.blog_base, blog, page, page_size
        )
    }

    /// Canonical public URL of a post
    pub fn post_url(&self, blog: &BlogId, post_no: &str) -> String {
        format!("{}/{}/{}", self.blog_base, blog, post_no)
    }

    /// Mobile post page, the source of post content
    pub fn mobile_post(&self, blog: &BlogId, post_no: &str) -> String {
        format!("{}/{}/{}", self.mobile_base, blog, post_no)
    }

    /// One page of a post's comment box (1-based)
    pub fn comment_page(&self, blog: &BlogId, post_no: &str, page: u32) -> String {
        format!(
            "{}/CommentList.naver?blogId={}&logNo={}&currentPage={}",
            self.blog_base, blog, post_no, page
        )
    }

    /// Reaction counts API for one post
    pub fn reactions(&self, blog: &BlogId, post_no: &str) -> String {
        let query: String = byte_serialize(format!("BLOG[{}_{}]", blog, post_no).as_bytes()).collect();
        format!(
            "{}/blogserver/like/v1/search/contents?suppress_response_codes=true\
             &pool=blogid&q={}&isDuplication=false&cssIds=BLOG_PC",
            self.api_base, query
        )
    }
}
