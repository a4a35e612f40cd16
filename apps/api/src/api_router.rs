use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use aegis_application::RateLimitRule;
use aegis_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{auth, handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/api/profile/password", put(auth::change_password_handler))
        .route("/auth/mfa/totp/enroll", post(auth::mfa_enroll_handler))
        .route("/auth/mfa/totp/confirm", post(auth::mfa_confirm_handler))
        .route("/auth/mfa/totp", delete(auth::mfa_disable_handler))
        .route(
            "/auth/mfa/recovery-codes/regenerate",
            post(auth::mfa_regenerate_recovery_codes_handler),
        )
        .route("/api/sessions", get(auth::list_sessions_handler))
        .route(
            "/api/sessions/{session_id}",
            get(auth::get_session_handler).delete(auth::terminate_session_handler),
        )
        .route(
            "/api/api-keys",
            get(handlers::api_keys::list_api_keys_handler)
                .post(handlers::api_keys::create_api_key_handler),
        )
        .route(
            "/api/api-keys/{key_id}",
            delete(handlers::api_keys::revoke_api_key_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_auth,
        ));

    let login_rate_rule = RateLimitRule::login();
    let register_rate_rule = RateLimitRule::registration();
    let password_reset_rate_rule = RateLimitRule::password_reset();

    let login_routes = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/login/mfa", post(auth::mfa_login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum::Extension(login_rate_rule));

    let register_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum::Extension(register_rate_rule));

    let password_reset_routes = Router::new()
        .route(
            "/password-reset/request",
            post(auth::forgot_password_handler),
        )
        .route(
            "/password-reset/confirm",
            post(auth::reset_password_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum::Extension(password_reset_rate_rule));

    let tenant_routes = Router::new()
        .route(
            "/api/tenants",
            get(handlers::tenants::list_tenants_handler)
                .post(handlers::tenants::create_tenant_handler),
        )
        .route(
            "/api/tenants/{tenant_id}",
            delete(handlers::tenants::deactivate_tenant_handler),
        );

    let cors_layer = cors::build_cors_layer(frontend_url)?;

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(login_routes)
        .merge(register_routes)
        .merge(password_reset_routes)
        .merge(tenant_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state))
}
