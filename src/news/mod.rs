//! News domain: feed items, fetching, enrichment, policy, and the
//! refresh pipeline that ties them together.

pub mod extract;
pub mod feed;
pub mod normalize;
pub mod pipeline;
pub mod policy;
pub mod render;
pub mod types;
pub mod updater;

pub use extract::{ContentExtractor, ExtractorApiClient};
pub use feed::{FeedSource, GnewsClient};
pub use pipeline::{RefreshOutcome, RefreshPipeline};
pub use render::Renderer;
pub use types::{Article, ArticleSource};
pub use updater::start_updater;
