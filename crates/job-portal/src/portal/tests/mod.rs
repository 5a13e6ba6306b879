mod capacity;
mod common;
mod store;
