//! # REST API
//!
//! The `/v1` HTTP surface over [`CredentialService`](crate::service::CredentialService):
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | GET | `/v1/health` | 200, or 500 while the backend is unhealthy |
//! | GET | `/v1/data?name=` | 200 `{"data": [...]}`, newest first |
//! | GET | `/v1/data/{id}` | 200 |
//! | POST | `/v1/data` | 201 (200 in no-overwrite mode when it exists) |
//! | PUT | `/v1/data` | 200 |
//! | DELETE | `/v1/data?name=` | 204 |

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod tls;

pub use error::ApiError;
pub use routes::{build_router, ApiState};
pub use server::start_api_server;
