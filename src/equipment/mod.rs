//! Equipment actuation layer (spec.md §4.3, §4.8): persisted heater/pump
//! state (`EquipmentStatusStore`) and the coupled-command service
//! (`EquipmentService`) sitting on top of it.

mod service;
mod store;

pub use service::EquipmentService;
pub use store::{DeviceStatus, EquipmentStatus, EquipmentStatusStore};
