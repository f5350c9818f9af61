//! Data models for MiniCloud resources.
//!
//! This module contains the structures exchanged with the backend:
//!
//! - `Bucket`: named storage container
//! - `StoredObject`: a file uploaded into a bucket
//! - `LambdaFunction`, `NewFunction`, `ExecutionResult`: functions and their runs
//! - `QueueMessage`: messages sent to a named queue
//! - `AuthResponse`, `LoginRequest`, `RegisterRequest`: sign-in payloads
//!
//! Timestamps arrive as zone-less local date-times and decode into
//! `chrono::NaiveDateTime`.

pub mod account;
pub mod bucket;
pub mod function;
pub mod object;
pub mod queue;

pub use account::{AuthResponse, LoginRequest, RegisterRequest};
pub use bucket::Bucket;
pub use function::{ExecutionResult, LambdaFunction, NewFunction};
pub use object::StoredObject;
pub use queue::{MessageStatus, QueueMessage};
