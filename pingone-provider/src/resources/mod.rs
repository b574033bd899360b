//! Resource descriptors

pub mod environment;
pub mod gateway;
pub mod phone_delivery_settings;
pub mod system_application;

pub use environment::EnvironmentResource;
pub use gateway::GATEWAY;
pub use phone_delivery_settings::PHONE_DELIVERY_SETTINGS;
pub use system_application::SYSTEM_APPLICATION;
