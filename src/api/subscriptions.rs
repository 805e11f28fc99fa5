//! Subscription (loan) endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{Subscription, SubscriptionDetails, SubscriptionScope, SubscriptionState},
};

use super::AuthenticatedUser;

/// Subscription as listed, with book and borrower
#[derive(Serialize, ToSchema)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub details: SubscriptionDetails,
    pub state: SubscriptionState,
    pub due_date: Option<NaiveDate>,
    pub overdue: bool,
}

impl SubscriptionView {
    fn new(details: SubscriptionDetails, today: NaiveDate) -> Self {
        let due_date = details.due_date();
        Self {
            state: details.state(),
            overdue: due_date.map(|due| today > due).unwrap_or(false),
            due_date,
            details,
        }
    }
}

/// List subscriptions: all of them for staff, the caller's own otherwise
#[utoipa::path(
    get,
    path = "/subscriptions",
    tag = "subscriptions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscriptions visible to the caller", body = Vec<SubscriptionView>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_subscriptions(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<SubscriptionView>>> {
    let scope = SubscriptionScope::for_viewer(claims.role, &claims.sub);
    let today = Utc::now().date_naive();

    let subscriptions = state
        .services
        .loans
        .subscription_details(&scope)
        .await?
        .into_iter()
        .map(|details| SubscriptionView::new(details, today))
        .collect();

    Ok(Json(subscriptions))
}

/// Approve a pending subscription; the lending window starts today
#[utoipa::path(
    post,
    path = "/subscriptions/{id}/approve",
    tag = "subscriptions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Subscription ID")
    ),
    responses(
        (status = 200, description = "Subscription approved", body = Subscription),
        (status = 403, description = "Insufficient rights"),
        (status = 404, description = "Subscription not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already approved", body = crate::error::ErrorResponse)
    )
)]
pub async fn approve_subscription(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Subscription>> {
    claims.require_approve_loans()?;

    let subscription = state.services.loans.approve_subscription(id).await?;
    Ok(Json(subscription))
}
