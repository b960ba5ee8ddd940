pub mod config;
pub mod crawl;
pub mod fetch;
pub mod finder;
pub mod installer;
pub mod interpreter;
pub mod obtainer;
pub mod tooling;
pub mod translator;
pub mod unpack;
