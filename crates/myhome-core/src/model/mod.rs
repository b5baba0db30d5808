// ── Domain model ──

pub mod device;
pub mod gateway;
pub mod mac;

pub use device::{Category, DeviceProperties, DeviceType, DiscoveredDevice, Platform, SuggestedConfig, device_key};
pub use gateway::{GatewayInfo, model_name};
pub use mac::{InvalidMac, MacAddress};
