//! Configuration management
//!
//! Connection endpoints, fixture settings, and the override hook that
//! hands the endpoint to the application under test.

pub mod connections;
pub mod properties;
pub mod settings;

pub use connections::{ConnectionConfig, SslMode};
pub use properties::{DatasourceProperties, PropertyRegistry, PropertySink};
pub use settings::FixtureSettings;
