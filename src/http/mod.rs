//! HTTP control surface for the interview engine
//!
//! One interview slot per process, driven through a REST API:
//! - POST /interview/:code/join - Validate a code and acquire media
//! - POST /interview/start - Connect to the agent and go live
//! - POST /interview/stop - Request the end of the interview
//! - GET /interview/status - Lifecycle, countdown, end message
//! - GET /interview/transcript - Accumulated conversation log
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, InterviewSlot};
