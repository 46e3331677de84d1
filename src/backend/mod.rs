// Backend module - Vulkan object chain for the triangle
//
// Design: thin wrappers around ash, one file per stage of the chain.
// Selection rules live in `selection` so they can be tested without a GPU.

pub mod commands;
pub mod device;
pub mod instance;
pub mod pipeline;
pub mod selection;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use device::VulkanDevice;
pub use instance::VulkanInstance;
pub use surface::Surface;
pub use swapchain::Swapchain;
