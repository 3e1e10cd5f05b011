//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles persistence for a single entity.

pub mod author;
pub mod banner;
pub mod category;
pub mod dashboard;
pub mod invite;
pub mod newsletter;
pub mod ordering;
pub mod post;
pub mod relevant;
pub mod site_document;
pub mod stored_object;
pub mod tag;
pub mod user;
pub mod video;
pub mod webstory;

pub use author::{AuthorRepository, SqlxAuthorRepository};
pub use banner::{BannerRepository, SqlxBannerRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use dashboard::{DashboardRepository, SqlxDashboardRepository};
pub use invite::{InviteRepository, SqlxInviteRepository};
pub use newsletter::{NewsletterRepository, SqlxNewsletterRepository};
pub use ordering::{OrderedTable, OrderingRepository, Position, SqlxOrderingRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use relevant::{RelevantRepository, SqlxRelevantRepository};
pub use site_document::{SiteDocumentRepository, SqlxSiteDocumentRepository};
pub use stored_object::{NewStoredObject, SqlxStoredObjectRepository, StoredObjectRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use video::{SqlxVideoRepository, VideoRepository};
pub use webstory::{SqlxWebstoryRepository, WebstoryRepository};
