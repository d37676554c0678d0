pub mod config;
pub mod event_store;
pub mod tollroad;

pub use config::TollRoadConfig;
pub use event_store::{EventStore, StoredEvent, REGULATOR_STREAM};
pub use tollroad::{
    ExitStatus, Receipt, Regulator, TollBoothOperator, TollRoadError, TollRoadEvent,
    TollRoadResult, TollRoadService,
};
