pub mod device;
pub mod driver;
pub mod grant;
pub mod window;

pub use device::VramDevice;
pub use driver::{Stage, VramDriver, init_module};
pub use grant::GpuMemory;
pub use window::{Mapping, VramWindow};
