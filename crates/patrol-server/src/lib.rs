//! patrol-server - Patrol location tracking service.
//!
//! Accepts location reports for patrol units, checks each against the
//! patrol's planned route, and relays the result to every connected
//! WebSocket observer.
//!
//! # Architecture
//!
//! ```text
//!  POST /patrols/{id}/update
//!            │
//!            ▼
//!  ┌────────────────────┐  authorize   ┌────────────────┐
//!  │   UpdatePipeline   │─────────────▶│   Authorizer   │
//!  └─────────┬──────────┘              └────────────────┘
//!            │ record_update (per-patrol lock, route check)
//!            ▼
//!  ┌────────────────────┐
//!  │   PatrolRegistry   │
//!  └─────────┬──────────┘
//!            │ UpdateEvent
//!            ▼
//!  ┌────────────────────┐   bounded queues   GET /ws
//!  │    BroadcastHub    │──────────────────▶ observers
//!  └────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use patrol_server::{run_server, AppConfig};
//!
//! let config = AppConfig::from_file("config/default.toml")?;
//! config.validate()?;
//! run_server(config).await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
mod ws;

pub use auth::{bearer_token, AuthError, Authorizer, TokenAuthorizer};
pub use config::{AppConfig, AuthConfig, RouteConfig, ServerConfig, TokenConfig};
pub use error::{ApiError, ApiResult, AppError, AppResult};
pub use pipeline::{UpdatePipeline, MIN_UPDATE_ROLE};
pub use server::{create_router, run_server, serve, AppState};
