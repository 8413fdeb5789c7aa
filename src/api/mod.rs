//! API Module
//!
//! HTTP handlers and routing for the SWR cache server.
//!
//! # Endpoints
//! - `GET /get/:key` - Serve a value, fetching from the origin on miss or staleness
//! - `PUT /set` - Store a value directly
//! - `GET /peek/:key` - Inspect what storage holds for a key
//! - `DELETE /del/:key` - Delete a key
//! - `GET /stats` - Get event-derived cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod origin;
pub mod routes;

pub use handlers::*;
pub use origin::OriginClient;
pub use routes::create_router;
