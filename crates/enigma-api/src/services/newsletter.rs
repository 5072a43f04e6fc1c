//! Newsletter subscriptions backed by customer identification.

use chrono::Utc;
use enigma_core::{ActorType, AuditEventType, EmailAddress, VisitorId};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::audit::AuditEvent;
use super::{identification, persist_failed, Mutation};
use crate::error::AppError;
use crate::state::{AppState, NewsletterSubscriptionRecord};

/// Default signup source.
pub const DEFAULT_SOURCE: &str = "website";

/// Result of a subscribe call.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscribeOutcome {
    pub subscription: NewsletterSubscriptionRecord,
    /// `false` when the email already had an active subscription.
    pub created: bool,
}

/// Subscription state for one email.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionStatus {
    #[schema(value_type = String)]
    pub email: EmailAddress,
    pub subscribed: bool,
    /// Active subscription, or the most recent cancelled one.
    pub subscription: Option<NewsletterSubscriptionRecord>,
}

fn active(state: &AppState, email: &EmailAddress) -> Option<NewsletterSubscriptionRecord> {
    state
        .subscriptions
        .find(|s| &s.email == email && s.is_active())
}

/// Subscribe `email`, identifying the customer first.
pub async fn subscribe(
    state: &AppState,
    email: EmailAddress,
    source: Option<String>,
    visitor: Option<VisitorId>,
) -> Result<SubscribeOutcome, AppError> {
    let mut mutation = Mutation::begin(state).await?;

    if let Some(existing) = active(state, &email) {
        return Ok(SubscribeOutcome {
            subscription: existing,
            created: false,
        });
    }

    let identification = identification::identify_in(&mut mutation, email.clone(), visitor).await?;
    let customer_id = identification.customer.id;
    let subscription = NewsletterSubscriptionRecord {
        id: Uuid::new_v4(),
        email,
        customer_id,
        source: source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        subscribed_at: Utc::now(),
        unsubscribed_at: None,
    };

    if let Some(conn) = mutation.conn() {
        crate::db::newsletter::insert(conn, &subscription)
            .await
            .map_err(|e| persist_failed("newsletter subscription", subscription.id, e))?;
    }

    mutation
        .audit(
            AuditEvent::new(AuditEventType::NewsletterSubscribed, "newsletter_subscription", subscription.id)
                .actor(ActorType::Customer, Some(customer_id.to_string()))
                .metadata(serde_json::json!({ "source": subscription.source })),
        )
        .await?;

    let stored = subscription.clone();
    mutation.apply(move |s| {
        s.subscriptions.insert(stored.id, stored);
    });
    mutation.commit().await?;

    tracing::info!(id = %subscription.id, customer_id = %customer_id, "newsletter subscription created");

    Ok(SubscribeOutcome {
        subscription,
        created: true,
    })
}

/// Current subscription state of `email`.
pub fn status(state: &AppState, email: EmailAddress) -> SubscriptionStatus {
    let subscription = active(state, &email).or_else(|| {
        state
            .subscriptions
            .list()
            .into_iter()
            .filter(|s| s.email == email)
            .max_by_key(|s| s.subscribed_at)
    });
    SubscriptionStatus {
        subscribed: subscription.as_ref().is_some_and(NewsletterSubscriptionRecord::is_active),
        email,
        subscription,
    }
}

/// Cancel the active subscription of `email`.
pub async fn unsubscribe(
    state: &AppState,
    email: &EmailAddress,
) -> Result<NewsletterSubscriptionRecord, AppError> {
    let mut mutation = Mutation::begin(state).await?;

    let mut updated = active(state, email)
        .ok_or_else(|| AppError::NotFound("no active newsletter subscription for this email".into()))?;
    let now = Utc::now();
    updated.unsubscribed_at = Some(now);

    if let Some(conn) = mutation.conn() {
        crate::db::newsletter::mark_unsubscribed(conn, updated.id, now)
            .await
            .map_err(|e| persist_failed("newsletter subscription", updated.id, e))?;
    }

    mutation
        .audit(
            AuditEvent::new(AuditEventType::NewsletterUnsubscribed, "newsletter_subscription", updated.id)
                .actor(ActorType::Customer, Some(updated.customer_id.to_string())),
        )
        .await?;

    let stored = updated.clone();
    mutation.apply(move |s| {
        s.subscriptions.insert(stored.id, stored);
    });
    mutation.commit().await?;

    tracing::info!(id = %updated.id, "newsletter subscription cancelled");

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(s: &str) -> EmailAddress {
        EmailAddress::new(s).unwrap()
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_while_active() {
        let state = AppState::new();
        let first = subscribe(&state, email("ana@example.com"), Some("footer".into()), None)
            .await
            .unwrap();
        assert!(first.created);
        assert_eq!(first.subscription.source, "footer");

        let again = subscribe(&state, email("ANA@example.com"), None, None).await.unwrap();
        assert!(!again.created);
        assert_eq!(again.subscription.id, first.subscription.id);
        assert_eq!(state.subscriptions.len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_then_resubscribe() {
        let state = AppState::new();
        let sub = subscribe(&state, email("b@example.com"), None, None).await.unwrap();
        assert_eq!(sub.subscription.source, DEFAULT_SOURCE);

        let cancelled = unsubscribe(&state, &email("b@example.com")).await.unwrap();
        assert!(!cancelled.is_active());
        let s = status(&state, email("b@example.com"));
        assert!(!s.subscribed);
        assert_eq!(s.subscription.unwrap().id, cancelled.id);

        let err = unsubscribe(&state, &email("b@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let back = subscribe(&state, email("b@example.com"), None, None).await.unwrap();
        assert!(back.created);
        assert_ne!(back.subscription.id, cancelled.id);
        assert_eq!(back.subscription.customer_id, cancelled.customer_id);
        assert!(status(&state, email("b@example.com")).subscribed);
    }

    #[test]
    fn status_of_unknown_email() {
        let state = AppState::new();
        let s = status(&state, email("nobody@example.com"));
        assert!(!s.subscribed);
        assert!(s.subscription.is_none());
    }
}
