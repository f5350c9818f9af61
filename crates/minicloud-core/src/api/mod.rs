//! REST API access for MiniCloud.
//!
//! This module provides the `Gateway`, which attaches the session token to
//! every protected call and reacts to rejections, and the `ApiClient` with one
//! typed method per backend endpoint.
//!
//! Authentication uses the `X-Auth-Token` header obtained from
//! `/api/auth/login` or `/api/auth/register`.

pub mod client;
pub mod error;
pub mod gateway;

pub use client::{ApiClient, BackendStatus};
pub use error::ApiError;
pub use gateway::{ApiRequest, Gateway, RequestBody, AUTH_HEADER};
