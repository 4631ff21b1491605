//! HTTP API handlers for bloc-sr

pub mod buildinfo;
pub mod climbs;
pub mod competitions;
pub mod error;
pub mod health;
pub mod rounds;
pub mod sse;

pub use buildinfo::get_build_info;
pub use climbs::{retract_climb, submit_climb};
pub use competitions::get_competition_results;
pub use error::ApiError;
pub use health::health_routes;
pub use rounds::{add_start_list_entry, advance_round, get_round_results, get_start_list, recompute_round};
pub use sse::event_stream;
