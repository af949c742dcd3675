//! XML helpers for the geocoder response.

mod utils;

pub use utils::{find_by_path, find_child, get_tag_name, get_text, has_tag};
