//! # VidTube API
//!
//! REST server for accounts, sessions and video metadata.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           API Services                                  │
//! │                                                                         │
//! │  ┌────────────────────┐  ┌────────────────┐  ┌────────────────────────┐│
//! │  │ SessionTokenManager│  │  JwtManager    │  │  MediaUploader         ││
//! │  │                    │  │                │  │                        ││
//! │  │ • issue            │  │ • access token │  │ • Cloudinary (signed)  ││
//! │  │ • rotate (CAS)     │  │ • refresh token│  │ • staged file cleanup  ││
//! │  │ • revoke           │  │                │  │                        ││
//! │  └────────────────────┘  └────────────────┘  └────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐│  │
//! │  │  │  SQLite      │  │  axum        │  │  verify_jwt middleware   ││  │
//! │  │  │  (vidtube-db)│  │  routes      │  │  cookie or Bearer        ││  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────────────────┘│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `PORT` / `BIND_ADDRESS` - listen address (default: 0.0.0.0:8000)
//! - `DATABASE_URL` - SQLite file (default: vidtube.db)
//! - `ACCESS_TOKEN_SECRET` / `REFRESH_TOKEN_SECRET` - signing secrets (required)
//! - `ACCESS_TOKEN_EXPIRY_SECS` - Access token lifetime (default: 86400)
//! - `REFRESH_TOKEN_EXPIRY_SECS` - Refresh token lifetime (default: 864000)
//! - `CLOUDINARY_CLOUD_NAME` / `CLOUDINARY_API_KEY` / `CLOUDINARY_API_SECRET`

pub mod auth;
pub mod config;
pub mod cookies;
pub mod error;
pub mod forms;
pub mod media;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;
pub mod session;

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use server::{build_router, AppState, RouterOptions};
pub use session::{CredentialPair, SessionError, SessionStore, SessionTokenManager};
