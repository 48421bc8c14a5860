// Authentication handlers: per-type login, client registration, token refresh

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use axum_extra::{headers::UserAgent, TypedHeader};
use validator::Validate;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::{
            ChangePasswordRequest, CheckSirenRequest, LoginRequest, RefreshRequest,
            RegisterClientRequest, TokenInfo, TypedLoginRequest, UserType,
        },
        common::ApiResponse,
    },
    services::auth::AuthService,
    utils::{
        auth_errors::AuthError,
        extract::{ApiJson, ApiPath},
    },
};

async fn login_as(
    state: &AppState,
    user_type: UserType,
    request: LoginRequest,
    user_agent: Option<TypedHeader<UserAgent>>,
) -> Response {
    if let Err(e) = request.validate() {
        return AuthError::from(e).into_response();
    }
    let user_agent = user_agent.map(|TypedHeader(ua)| ua.to_string());

    let service = AuthService::new(state);
    match service
        .login(user_type, &request.email, &request.password, user_agent.as_deref())
        .await
    {
        Ok(login) => (StatusCode::OK, Json(ApiResponse::ok(login))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/auth/{type}/login
#[utoipa::path(
    post,
    path = "/api/auth/{user_type}/login",
    tag = "Authentication",
    operation_id = "loginByType",
    params(
        ("user_type" = String, Path, description = "client, expert, apporteur or admin")
    ),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = crate::models::auth::LoginResponse),
        (status = 400, description = "Validation failed or unknown account type"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account inactive or expert not approved")
    )
)]
pub async fn login_typed(
    State(state): State<AppState>,
    ApiPath(user_type): ApiPath<String>,
    user_agent: Option<TypedHeader<UserAgent>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Response {
    let user_type = match user_type.parse::<UserType>() {
        Ok(user_type) => user_type,
        Err(message) => return AuthError::ValidationError(message).into_response(),
    };
    login_as(&state, user_type, request, user_agent).await
}

/// POST /api/auth/login with the account type in the body
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Authentication",
    operation_id = "login",
    request_body = TypedLoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = crate::models::auth::LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account inactive or expert not approved")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    user_agent: Option<TypedHeader<UserAgent>>,
    ApiJson(request): ApiJson<TypedLoginRequest>,
) -> Response {
    let user_type = request.user_type;
    let request = LoginRequest {
        email: request.email,
        password: request.password,
    };
    login_as(&state, user_type, request, user_agent).await
}

/// POST /api/auth/register - client self-registration
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Authentication",
    operation_id = "registerClient",
    request_body = RegisterClientRequest,
    responses(
        (status = 201, description = "Client account created", body = crate::models::auth::LoginResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterClientRequest>,
) -> Response {
    let service = AuthService::new(&state);
    match service.register_client(request).await {
        Ok(login) => (
            StatusCode::CREATED,
            Json(ApiResponse::with_message(login, "Account created")),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/check-siren",
    tag = "Authentication",
    operation_id = "checkSiren",
    request_body = CheckSirenRequest,
    responses(
        (status = 200, description = "Availability of the SIREN", body = crate::models::auth::SirenAvailability),
        (status = 400, description = "Malformed SIREN")
    )
)]
pub async fn check_siren(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CheckSirenRequest>,
) -> Response {
    let service = AuthService::new(&state);
    match service.check_siren(&request.siren).await {
        Ok(availability) => Json(ApiResponse::ok(availability)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Authentication",
    operation_id = "refreshToken",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = crate::models::auth::RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return AuthError::from(e).into_response();
    }
    let service = AuthService::new(&state);
    match service.refresh(&request.refresh_token).await {
        Ok(tokens) => Json(ApiResponse::ok(tokens)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/auth/me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Authentication",
    operation_id = "currentUser",
    responses(
        (status = 200, description = "Profile of the logged-in account", body = crate::models::auth::AccountProfile),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, user: AuthenticatedUser) -> Response {
    let service = AuthService::new(&state);
    match service.current_profile(&user).await {
        Ok(profile) => Json(ApiResponse::ok(profile)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/auth/verify - echoes the claims of a valid token
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    tag = "Authentication",
    operation_id = "verifyToken",
    responses(
        (status = 200, description = "Token is valid", body = TokenInfo),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn verify(user: AuthenticatedUser) -> Response {
    let info = TokenInfo {
        user_id: user.user_id.to_string(),
        email: user.email,
        user_type: user.user_type,
        expires_at: user.exp,
    };
    Json(ApiResponse::ok(info)).into_response()
}

#[utoipa::path(
    put,
    path = "/api/auth/password",
    tag = "Authentication",
    operation_id = "changePassword",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Weak password or same as current"),
        (status = 401, description = "Current password is wrong")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Response {
    let service = AuthService::new(&state);
    match service.change_password(&user, request).await {
        Ok(()) => Json(ApiResponse::message("Password updated")).into_response(),
        Err(e) => e.into_response(),
    }
}
