//! Newsletter subscriptions

use crate::db::repositories::NewsletterRepository;
use crate::models::NewsletterSubscription;
use crate::services::email::EmailService;
use crate::services::error::ContentError;
use crate::services::validation::{is_valid_email, normalize_email};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeInput {
    pub name: String,
    pub email: String,
}

pub struct NewsletterService {
    repo: Arc<dyn NewsletterRepository>,
    email: Arc<EmailService>,
}

impl NewsletterService {
    pub fn new(repo: Arc<dyn NewsletterRepository>, email: Arc<EmailService>) -> Self {
        Self { repo, email }
    }

    /// Record a subscription and confirm it by mail
    pub async fn subscribe(&self, input: &SubscribeInput) -> Result<NewsletterSubscription, ContentError> {
        let name = input.name.trim();
        let email = normalize_email(&input.email);
        if name.is_empty() {
            return Err(ContentError::validation("Name is required"));
        }
        if !is_valid_email(&email) {
            return Err(ContentError::validation("INVALID_EMAIL"));
        }
        if self.repo.get_by_email(&email).await?.is_some() {
            return Err(ContentError::validation("EMAIL_ALREADY_SUBSCRIBED"));
        }
        let subscription = self.repo.create(name, &email).await?;
        self.email
            .send_newsletter_confirmation(&subscription.name, &subscription.email)
            .await?;
        tracing::info!(subscription_id = subscription.id, "Newsletter subscription created");
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::db::repositories::SqlxNewsletterRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::services::email::RecordingMailer;

    async fn setup() -> (Arc<RecordingMailer>, NewsletterService) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let mailer = Arc::new(RecordingMailer::new());
        let email = Arc::new(EmailService::new(mailer.clone(), &AuthConfig::default()));
        (mailer, NewsletterService::new(SqlxNewsletterRepository::boxed(pool), email))
    }

    fn input(name: &str, email: &str) -> SubscribeInput {
        SubscribeInput {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_subscribe_confirms_by_mail() {
        let (mailer, service) = setup().await;
        let sub = service.subscribe(&input("Rita", "Rita@Campo.com.br")).await.unwrap();
        assert_eq!(sub.email, "rita@campo.com.br");
        let mail = mailer.last_to("rita@campo.com.br").unwrap();
        assert!(mail.html.contains("Rita"));
    }

    #[tokio::test]
    async fn test_subscribe_rejections() {
        let (mailer, service) = setup().await;
        assert!(matches!(
            service.subscribe(&input("Rita", "not-an-email")).await,
            Err(ContentError::Validation(_))
        ));
        service.subscribe(&input("Rita", "rita@campo.com")).await.unwrap();
        assert!(matches!(
            service.subscribe(&input("Rita", "rita@campo.com")).await,
            Err(ContentError::Validation(code)) if code == "EMAIL_ALREADY_SUBSCRIBED"
        ));
        assert_eq!(mailer.sent().len(), 1);
    }
}
