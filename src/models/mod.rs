pub mod actor;
pub mod courier;
pub mod event;
pub mod offer;
pub mod order;
pub mod store;
