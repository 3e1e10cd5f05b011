//! Data models
//!
//! Database entities and the input types accepted by the services. All
//! entities serialize with camelCase field names.

mod author;
mod banner;
mod category;
mod dashboard;
mod newsletter;
mod pagination;
mod post;
mod relevant;
mod site;
mod stored_object;
mod tag;
mod user;
mod video;
mod webstory;

pub use author::Author;
pub use banner::{Banner, CreateBannerInput, UpdateBannerInput};
pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use dashboard::MonthlySummary;
pub use newsletter::NewsletterSubscription;
pub use pagination::{ListParams, PagedResult};
pub use post::{CreatePostInput, Post, PostAuthor, PostDetail, PostStatus, UpdatePostInput};
pub use relevant::{CreateRelevantInput, Relevant, UpdateRelevantInput};
pub use site::{DocumentKind, LiveStream, Magazine, PageContent, Pauta, SiteDocument};
pub use stored_object::{StoredObject, UploadedFile};
pub use tag::{CreateTagInput, Tag, UpdateTagInput};
pub use user::{
    CreateInviteInput, CreateUserInput, InviteStatus, UpdateUserInput, User, UserInvite, UserRole,
};
pub use video::{CreateVideoInput, UpdateVideoInput, Video};
pub use webstory::{
    CreateWebstoryInput, SlideInput, UpdateWebstoryInput, Webstory, WebstorySlide,
};
