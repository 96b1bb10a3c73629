//! Request extractors whose rejections render as `{"detail": ...}`.
//!
//! Bad JSON and bad query strings are 400; a path segment that does not
//! parse as an id is 404, so `/api/orders/abc/` looks like any unknown
//! order.

use axum::extract::{FromRequest, FromRequestParts, Json, Path, Query};

use crate::error::AppError;

/// JSON request body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string filters.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Typed path parameters.
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
