//! Scoring store: queries over the scoring tables
//!
//! Every function takes `&mut SqliteConnection` so callers can compose them
//! inside one transaction (`&mut *tx`) or run them on a pooled connection.

mod climbs;
mod results;
mod rounds;
mod scores;

pub use climbs::{
    climbers_with_active_climbs, get_active_climbs, get_active_climb, soft_delete_climb,
    upsert_climb,
};
pub use results::{
    add_start_list_entry, get_round_results, get_start_list, max_start_order, ranks_for_round,
    upsert_round_result,
};
pub use rounds::{
    competition_id_for_round, get_boulder, get_categories_for_competition, get_climber,
    get_competition, get_next_round, get_round, get_rounds_in_category,
};
pub use scores::{get_round_scores, upsert_climber_round_score};
