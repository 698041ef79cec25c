//! Platform collaborator interfaces.
//!
//! Everything the control loop needs from the outside world sits behind a
//! trait here, so both the simulated daemon platform and the test fakes plug
//! into the same core.

pub mod alarm;
pub mod clock;
pub mod link;
pub mod scanner;
pub mod scores;
pub mod store;

pub use alarm::{AlarmService, TokioAlarmService};
pub use clock::{Clock, SystemClock};
pub use link::{LinkInfo, LinkLayer};
pub use scanner::{
    HiddenNetwork, PnoNetwork, PnoSettings, ScanBand, ScanSettings, ScanSource, WifiScanner,
};
pub use scores::{NetworkScoreKey, ScoreCache, INVALID_NETWORK_SCORE};
pub use store::{ConfigStore, MemoryConfigStore, StoreError};
