mod models;
mod schema;
mod store;
mod trait_def;

pub use models::*;
pub use schema::CHART_VERSIONED_SCHEMAS;
pub use store::SqliteChartStore;
pub use trait_def::ChartStore;
