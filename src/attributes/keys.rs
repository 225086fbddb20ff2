//! Attribute and activity names shared by the seeding code, the built-in
//! criteria and the frequency gate.

pub const ARTICLES_READ: &str = "articles_read";
pub const ARTICLES_READ_TOTAL: &str = "articles_read_total";
pub const FAVORITE_CATEGORIES: &str = "favorite_categories";
pub const IS_DONOR: &str = "is_donor";
pub const IS_SUBSCRIBER: &str = "is_subscriber";
pub const IS_LOGGED_IN: &str = "is_logged_in";
pub const REFERRER: &str = "referrer";
pub const PAGEVIEWS: &str = "pageviews";

pub const ACTIVITY_ARTICLE_VIEW: &str = "article_view";
pub const ACTIVITY_PROMPT_SEEN: &str = "prompt_seen";
