//! Services layer - Business logic
//!
//! Services enforce the portal's rules on top of the repositories:
//! validation, role checks, uniqueness, ordering and the account workflows.

pub mod auth;
pub mod author;
pub mod banner;
pub mod category;
pub mod dashboard;
pub mod email;
pub mod error;
pub mod newsletter;
pub mod ordering;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod relevant;
pub mod site;
pub mod tag;
pub mod token;
pub mod twitter;
pub mod upload;
pub mod user;
pub mod validation;
pub mod video;
pub mod webstory;

pub use auth::{
    AcceptInviteInput, AuthService, ChangePasswordInput, InviteInfo, LoginInput, LoginResult,
    ReaderSignupInput, ResetPasswordInput,
};
pub use author::AuthorService;
pub use banner::BannerService;
pub use category::CategoryService;
pub use dashboard::DashboardService;
pub use email::{create_mailer, generate_verification_code, EmailService, Mailer, RecordingMailer};
pub use error::{AuthError, ContentError};
pub use newsletter::{NewsletterService, SubscribeInput};
pub use ordering::OrderingService;
pub use password::{hash_password, validate_password_policy, verify_password};
pub use post::PostService;
pub use rate_limiter::LoginRateLimiter;
pub use relevant::{RelevantService, SignedUrlRequest};
pub use site::{LiveInput, PageInput, SiteService, SiteUpload};
pub use tag::TagService;
pub use token::{Claims, TokenService};
pub use twitter::TwitterService;
pub use upload::{FilePart, LocalObjectStore, ObjectStore, SignedUpload, UploadService};
pub use user::{InviteUserInput, UserService};
pub use validation::{generate_slug, is_valid_email, normalize_email};
pub use video::VideoService;
pub use webstory::{NewWebstory, WebstoryCreated, WebstoryService};
