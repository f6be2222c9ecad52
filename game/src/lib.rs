pub mod color;
pub mod history;
pub mod mapping;
pub mod notify;
pub mod sequence;
pub mod session;
pub mod settings;
pub mod sink;
pub mod storage;
pub mod wizard;
