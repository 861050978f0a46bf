//! # Repository Module
//!
//! Database repository implementations for VidTube.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler                                                           │
//! │       │  db.videos().list(&query)                                       │
//! │       ▼                                                                 │
//! │  VideoRepository                                                        │
//! │  ├── insert / find_by_id / update / delete                              │
//! │  ├── list (search, sort, paginate)                                      │
//! │  └── record_view (views + watch history, one transaction)               │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UserRepository`](user::UserRepository) - Accounts, profile updates, refresh token storage
//! - [`VideoRepository`](video::VideoRepository) - Video CRUD, listing, views

pub mod user;
pub mod video;
