use crate::routes::auth::claims::Claims;
use crate::state::AppState;
use crate::tenancy::{TenancyError, TenantContext};

/// Maps the session to a local user and its active tenant, provisioning one
/// on first use.
pub async fn load_tenant(
    app_state: &AppState,
    claims: &Claims,
) -> Result<TenantContext, TenancyError> {
    let user = app_state
        .identity()
        .resolve_user(&claims.principal())
        .await?;

    app_state
        .tenant_contexts()
        .get_active_tenant_context(&user, claims.first_name.as_deref())
        .await
}
