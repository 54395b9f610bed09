pub mod dispatcher;
pub mod flags;
pub mod lock;
pub mod recipients;
pub mod runner;
pub mod scanner;
pub mod schedule;
