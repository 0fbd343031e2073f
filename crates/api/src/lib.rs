//! HTTP side of the assistant: the product/pricing/store REST service and the chat model.

pub mod assembly;
pub mod client;
pub mod error;
pub mod llm;
pub mod services;

pub use assembly::{assemble, Services};
pub use client::{RestClient, RetryPolicy};
pub use error::ApiError;
pub use services::{check_health, HealthReport};
