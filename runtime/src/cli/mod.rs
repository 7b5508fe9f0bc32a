//! CLI subcommand implementations for the skinforge binary.

pub mod harvest_cmd;
pub mod list_cmd;
pub mod normalize_cmd;
pub mod output;
pub mod palette_cmd;
pub mod render_cmd;
