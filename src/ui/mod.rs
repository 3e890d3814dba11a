pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    discovery_summary, header, info, mining_summary, section, success, summary_row, timing,
    warn,
};
pub use progress::{MiningProgress, Spinner};
pub use table::{findings_table, stats_table};
pub use theme::{theme, Theme};
