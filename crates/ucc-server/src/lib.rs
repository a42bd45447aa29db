//! ucc-server — the Universal Clause Comparer's REST + WebSocket surface
//! (`spec.md` §6). Routes:
//!   GET  /health                  — liveness
//!   POST /ucc/preprocess          — parse a single PDF
//!   POST /ucc/compare             — synchronous pair comparison
//!   POST /jobs/compare            — submit an async job
//!   GET  /jobs/:job_id            — current Job record
//!   GET  /jobs/:job_id/result     — ComparisonResult / 202 / 410
//!   POST /jobs/:job_id/cancel     — request cancellation
//!   GET  /jobs                   — list jobs
//!   GET  /ws/jobs/:job_id         — progress stream

pub mod error;
pub mod handlers;
pub mod multipart;
pub mod options;
pub mod router;
pub mod serve;
pub mod state;

pub use router::build_router;
pub use serve::serve;
pub use state::AppState;
