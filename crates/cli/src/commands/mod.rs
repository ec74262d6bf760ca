pub mod analyze;
pub mod assemble;
pub mod detect;
pub mod import;
pub mod onboard;
pub mod status;
pub mod store;
