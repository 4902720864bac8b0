// Vulkan backend - thin wrappers over ash with explicit resource ownership

pub mod buffer;
pub mod device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use device::DeviceContext;
pub use swapchain::{Swapchain, SwapchainStatus};
pub use sync::FramePool;
