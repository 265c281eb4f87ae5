pub mod ledger;
pub mod record;

pub use ledger::SessionLedger;
pub use record::{AgingBucket, CptCode, RecordInput, SessionRecord};
