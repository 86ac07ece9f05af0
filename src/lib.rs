pub mod errors;
pub mod feed;
pub mod ledger;
pub mod logging;
pub mod mint;
pub mod oracle;
pub mod policy;
pub mod service;
pub mod settlement;
pub mod state;
pub mod storage;
