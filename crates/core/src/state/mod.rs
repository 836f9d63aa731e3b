pub mod io;
pub mod keys;
pub mod results;

pub use keys::{dish_key_candidates, normalize_key};
pub use results::{DishLookup, QueryRecord, ResultStore};
