pub mod images;
pub mod manager;
pub mod rss;

pub use images::{is_valid_image_url, most_neutral_image};
pub use manager::{FeedManager, FeedSource, RssSource};
pub use rss::{parse_feed, FeedReader};

pub mod prelude {
    pub use super::manager::{FeedManager, FeedSource};
    pub use nn_core::{Article, Error, Media, Result};
}
