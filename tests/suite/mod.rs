mod config;
mod proxy;
mod singleton;
