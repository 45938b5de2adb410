//! HTTP bridge for the method channel
//!
//! Lets a host process drive the recorder over loopback:
//! - POST /channel/:method - Invoke start/stop/isRecording/hasPermissions
//! - GET /status - Recorder state and active session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{ErrorResponse, MethodResponse};
pub use routes::create_router;
pub use state::AppState;
