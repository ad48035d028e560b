//! HTTP API for driving walk sessions from a client
//!
//! - POST /walks/start - Start a walk from an initial fix
//! - POST /walks/:id/fixes - Submit a position fix
//! - POST /walks/:id/stop - Stop a walk and archive its summary
//! - GET /walks/:id/status - Query session status
//! - GET /walks/log - Archived walks by day
//! - DELETE /walks/log/:date/:entry_id - Remove an archived walk
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{FixRequest, FixResponse, StartWalkResponse, StopWalkRequest, StopWalkResponse};
pub use routes::create_router;
pub use state::AppState;
