pub mod audit;
pub mod automation;
pub mod integration;
pub mod tenant;
