//! Authentication routes.

use axum::Json;
use axum::extract::State;

use crate::app::AppContext;
use crate::auth::flows::google::GoogleSignInRequest;
use crate::auth::flows::login::LoginRequest;
use crate::auth::flows::otp::{OtpRequest, OtpVerifyRequest};
use crate::auth::flows::register::RegisterRequest;
use crate::auth::AuthResponse;
use crate::error::Result;
use crate::http::ApiResponse;

pub async fn register(
    State(ctx): State<AppContext>,
    Json(request): Json<RegisterRequest>,
) -> Result<ApiResponse<AuthResponse>> {
    let response = ctx.register.register(request).await?;
    Ok(ApiResponse::success(response))
}

pub async fn login(
    State(ctx): State<AppContext>,
    Json(request): Json<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>> {
    let response = ctx.login.login(request).await?;
    Ok(ApiResponse::success(response))
}

pub async fn otp_request(
    State(ctx): State<AppContext>,
    Json(request): Json<OtpRequest>,
) -> Result<ApiResponse<()>> {
    ctx.otp.request_code(request).await?;
    Ok(ApiResponse::<()>::message_only("Code sent"))
}

pub async fn otp_verify(
    State(ctx): State<AppContext>,
    Json(request): Json<OtpVerifyRequest>,
) -> Result<ApiResponse<AuthResponse>> {
    let response = ctx.otp.verify_code(request).await?;
    Ok(ApiResponse::success(response))
}

pub async fn google(
    State(ctx): State<AppContext>,
    Json(request): Json<GoogleSignInRequest>,
) -> Result<ApiResponse<AuthResponse>> {
    let response = ctx.google.sign_in(request).await?;
    Ok(ApiResponse::success(response))
}
