//! Customer identification for newsletter signups.
//!
//! `identify` is idempotent: the same email always resolves to the same
//! customer and a visitor is linked to a given customer at most once.
//! A call that fails to persist changes nothing, so a retry starts clean.

use chrono::Utc;
use enigma_core::{ActorType, AuditEventType, EmailAddress, IdentificationMethod, VisitorId};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::audit::AuditEvent;
use super::{persist_failed, Mutation};
use crate::error::AppError;
use crate::state::{AppState, CustomerIdentity, CustomerRecord, IdentityLink};

/// Outcome of an identification request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Identification {
    pub customer: CustomerRecord,
    #[schema(value_type = String, example = "email_match")]
    pub method: IdentificationMethod,
    /// Present when a visitor id was supplied.
    pub identity: Option<CustomerIdentity>,
}

/// Find or create the customer for `email` and link `visitor` to it.
pub async fn identify(
    state: &AppState,
    email: EmailAddress,
    visitor: Option<VisitorId>,
) -> Result<Identification, AppError> {
    let mut mutation = Mutation::begin(state).await?;
    let identification = identify_in(&mut mutation, email, visitor).await?;
    mutation.commit().await?;
    Ok(identification)
}

/// [`identify`] as part of a larger mutation.
pub(crate) async fn identify_in(
    mutation: &mut Mutation<'_>,
    email: EmailAddress,
    visitor: Option<VisitorId>,
) -> Result<Identification, AppError> {
    let state = mutation.state();
    let now = Utc::now();

    let (customer, created) = match state.customers.find(|c| c.email == email) {
        Some(existing) => (existing, false),
        None => {
            let record = CustomerRecord {
                id: Uuid::new_v4(),
                email,
                created_at: now,
            };
            if let Some(conn) = mutation.conn() {
                crate::db::customers::insert(conn, &record)
                    .await
                    .map_err(|e| persist_failed("customer", record.id, e))?;
            }
            let stored = record.clone();
            mutation.apply(move |s| {
                s.customers.insert(stored.id, stored);
            });
            (record, true)
        }
    };

    let (link, linked) = match visitor {
        Some(visitor_id) => {
            let existing = state
                .identity_links
                .find(|l| l.visitor_id == visitor_id && l.customer_id == customer.id);
            match existing {
                Some(link) => (Some(link), false),
                None => {
                    let link = IdentityLink {
                        visitor_id,
                        customer_id: customer.id,
                        linked_at: now,
                    };
                    if let Some(conn) = mutation.conn() {
                        crate::db::customers::insert_link(conn, &link)
                            .await
                            .map_err(|e| persist_failed("customer identity", customer.id, e))?;
                    }
                    let stored = link.clone();
                    mutation.apply(move |s| s.identity_links.append(stored));
                    (Some(link), true)
                }
            }
        }
        None => (None, false),
    };

    let method = if created {
        IdentificationMethod::NewCustomer
    } else {
        IdentificationMethod::EmailMatch
    };

    if created || linked {
        mutation
            .audit(
                AuditEvent::new(AuditEventType::CustomerIdentified, "customer", customer.id)
                    .actor(
                        ActorType::Anonymous,
                        link.as_ref().map(|l| l.visitor_id.to_string()),
                    )
                    .metadata(serde_json::json!({
                        "method": method.as_str(),
                        "visitor_linked": linked,
                    })),
            )
            .await?;
    }

    tracing::info!(
        customer_id = %customer.id,
        method = method.as_str(),
        visitor_linked = linked,
        "customer identified"
    );

    Ok(Identification {
        customer,
        method,
        identity: link.map(|l| CustomerIdentity {
            visitor_id: l.visitor_id,
            customer_id: Some(l.customer_id),
            linked_at: Some(l.linked_at),
        }),
    })
}

/// The customer a visitor was most recently linked to, if any.
pub fn lookup_identity(state: &AppState, visitor: &VisitorId) -> CustomerIdentity {
    match state.identity_links.last_matching(|l| &l.visitor_id == visitor) {
        Some(link) => CustomerIdentity {
            visitor_id: link.visitor_id,
            customer_id: Some(link.customer_id),
            linked_at: Some(link.linked_at),
        },
        None => CustomerIdentity {
            visitor_id: visitor.clone(),
            customer_id: None,
            linked_at: None,
        },
    }
}
