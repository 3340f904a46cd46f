//! Booking routes. All behind the auth gate.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::app::AppContext;
use crate::auth::CurrentAccount;
use crate::bookings::{Booking, BookingRequest};
use crate::error::Result;
use crate::http::ApiResponse;

pub async fn create(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Json(request): Json<BookingRequest>,
) -> Result<ApiResponse<Booking>> {
    let booking = ctx.bookings.create(account.id, request).await?;
    Ok(ApiResponse::success(booking))
}

pub async fn list(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
) -> Result<ApiResponse<Vec<Booking>>> {
    let bookings = ctx.bookings.list(account.id).await?;
    Ok(ApiResponse::success(bookings))
}

pub async fn cancel(
    State(ctx): State<AppContext>,
    Extension(CurrentAccount(account)): Extension<CurrentAccount>,
    Path(booking_id): Path<Uuid>,
) -> Result<ApiResponse<()>> {
    ctx.bookings.cancel(account.id, booking_id).await?;
    Ok(ApiResponse::<()>::message_only("Booking cancelled"))
}
