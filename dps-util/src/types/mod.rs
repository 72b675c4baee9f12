mod device_id;
mod shared_key;

pub use device_id::{DeviceId, InvalidDeviceIdError};
pub use shared_key::SharedKey;
