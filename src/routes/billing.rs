use std::collections::BTreeMap;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, info};

use crate::routes::{auth::AuthSession, tenant::load_tenant};
use crate::services::stripe::CreateCheckoutSessionRequest;
use crate::state::AppState;
use crate::tenancy::{
    billing::ORG_ID_METADATA_KEY, roles::authorize, Permission, TenancyError,
};

pub async fn create_checkout_session(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = authorize(context.role, Permission::ManageBilling) {
        return err.into_response();
    }

    let customer = match app_state.subscriptions.get_subscription(context.org_id).await {
        Ok(subscription) => subscription.and_then(|s| s.stripe_customer_id),
        Err(err) => return TenancyError::from(err).into_response(),
    };
    let customer_email = match customer {
        Some(_) => None,
        None => claims.principal().email_hint().map(str::to_string),
    };

    let app_url = &app_state.config.app_url;
    let mut metadata = BTreeMap::new();
    metadata.insert(ORG_ID_METADATA_KEY.to_string(), context.org_id.to_string());

    let request = CreateCheckoutSessionRequest {
        success_url: format!("{app_url}/dashboard?checkout=success"),
        cancel_url: format!("{app_url}/pricing?checkout=cancelled"),
        price_id: app_state.config.stripe.price_pro.clone(),
        customer,
        customer_email,
        client_reference_id: Some(context.org_id.to_string()),
        metadata,
    };

    match app_state.stripe.create_checkout_session(request).await {
        Ok(session) => match session.url {
            Some(url) => {
                info!(org_id = %context.org_id, session_id = %session.id, "checkout session created");
                Json(json!({ "url": url })).into_response()
            }
            None => {
                error!(org_id = %context.org_id, session_id = %session.id, "checkout session has no url");
                TenancyError::UpstreamProvider("checkout session missing url".into()).into_response()
            }
        },
        Err(err) => TenancyError::UpstreamProvider(err.to_string()).into_response(),
    }
}

pub async fn create_portal_session(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let context = match load_tenant(&app_state, &claims).await {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = authorize(context.role, Permission::ManageBilling) {
        return err.into_response();
    }

    let customer_id = match app_state.subscriptions.get_subscription(context.org_id).await {
        Ok(Some(subscription)) => subscription.stripe_customer_id,
        Ok(None) => None,
        Err(err) => return TenancyError::from(err).into_response(),
    };
    let Some(customer_id) = customer_id else {
        return TenancyError::InvalidInput(
            "No billing account yet. Upgrade to PRO first.".into(),
        )
        .into_response();
    };

    let return_url = format!("{}/dashboard", app_state.config.app_url);
    match app_state
        .stripe
        .create_billing_portal_session(&customer_id, &return_url)
        .await
    {
        Ok(url) => Json(json!({ "url": url })).into_response(),
        Err(err) => TenancyError::UpstreamProvider(err.to_string()).into_response(),
    }
}
