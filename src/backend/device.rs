// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Physical device selection (first GPU that can draw and present)
// - Logical device + graphics/present queue creation

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::vk;
use std::ffi::CStr;
use std::sync::Arc;

use super::instance::VulkanInstance;
use super::selection::{self, QueueFamilyIndices};
use super::surface::Surface;

// Must be enabled whenever a device advertises it
const PORTABILITY_SUBSET: &CStr = c"VK_KHR_portability_subset";

fn required_device_extensions() -> [&'static CStr; 1] {
    [khr::Swapchain::name()]
}

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub instance: Arc<VulkanInstance>,

    // Queue handles
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,
}

/// A physical device that passed every check
struct Candidate {
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilyIndices,
    portability_subset: bool,
}

impl VulkanDevice {
    /// Pick a GPU that can present to `surface` and create the logical device on it
    pub fn new(instance: Arc<VulkanInstance>, surface: &Surface) -> Result<Arc<Self>> {
        // Step 1: Pick physical device (GPU)
        let candidate = Self::pick_physical_device(&instance, surface)?;
        let physical_device = candidate.physical_device;

        let properties = unsafe { instance.instance.get_physical_device_properties(physical_device) };

        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        // Step 2: Create logical device
        let device = Self::create_logical_device(&instance, &candidate)?;

        // Step 3: Fetch queues (index 0 of each family)
        let (graphics_queue_family, present_queue_family) =
            match (candidate.queue_families.graphics, candidate.queue_families.present) {
                (Some(graphics), Some(present)) => (graphics, present),
                _ => anyhow::bail!("Selected GPU lost its queue families"),
            };

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_queue_family, 0) };

        log::info!(
            "Queue families: graphics={}, present={}",
            graphics_queue_family,
            present_queue_family
        );

        Ok(Arc::new(Self {
            device,
            physical_device,
            instance,
            graphics_queue,
            present_queue,
            graphics_queue_family,
            present_queue_family,
        }))
    }

    fn pick_physical_device(instance: &VulkanInstance, surface: &Surface) -> Result<Candidate> {
        let devices = unsafe { instance.instance.enumerate_physical_devices() }
            .context("Failed to enumerate physical devices")?;

        if devices.is_empty() {
            anyhow::bail!("Failed to find GPUs with Vulkan support");
        }

        // First suitable device wins
        for physical_device in devices {
            let props = unsafe { instance.instance.get_physical_device_properties(physical_device) };
            let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy();

            match Self::check_device(instance, surface, physical_device)? {
                Ok(candidate) => return Ok(candidate),
                Err(reason) => log::warn!("Skipping physical device `{}`: {}", name, reason),
            }
        }

        anyhow::bail!("Failed to find a suitable GPU")
    }

    /// Outer error: a query failed. Inner error: the device is unsuitable.
    fn check_device(
        instance: &VulkanInstance,
        surface: &Surface,
        physical_device: vk::PhysicalDevice,
    ) -> Result<std::result::Result<Candidate, String>> {
        let families = unsafe {
            instance
                .instance
                .get_physical_device_queue_family_properties(physical_device)
        };
        let queue_families = selection::find_queue_families(&families, |index| {
            surface.supports_present(physical_device, index)
        })?;

        let properties = unsafe {
            instance
                .instance
                .enumerate_device_extension_properties(physical_device)
        }
        .context("Failed to enumerate device extensions")?;
        let available: Vec<&CStr> = properties
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
            .collect();

        let missing = selection::missing_names(&required_device_extensions(), &available);

        // Swapchain queries are only valid once the extension is known to exist
        let support = if missing.is_empty() {
            Some(surface.swapchain_support(physical_device)?)
        } else {
            None
        };

        Ok(
            selection::check_suitability(&queue_families, &missing, support.as_ref()).map(|()| {
                Candidate {
                    physical_device,
                    queue_families,
                    portability_subset: available.contains(&PORTABILITY_SUBSET),
                }
            }),
        )
    }

    fn create_logical_device(
        instance: &VulkanInstance,
        candidate: &Candidate,
    ) -> Result<ash::Device> {
        // One queue per distinct family
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<_> = candidate
            .queue_families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        // Required device extensions
        let mut extensions: Vec<_> = required_device_extensions()
            .iter()
            .map(|name| name.as_ptr())
            .collect();
        if candidate.portability_subset {
            extensions.push(PORTABILITY_SUBSET.as_ptr());
        }

        // Device layers are deprecated but older implementations still read them
        let layer_names: Vec<_> = instance
            .enabled_layers()
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let features = vk::PhysicalDeviceFeatures::default();

        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .instance
                .create_device(candidate.physical_device, &create_info, None)
        }
        .context("Failed to create logical device")?;

        Ok(device)
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("Failed to wait for device idle")?;
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        // Wait for device to finish
        let _ = self.wait_idle();

        unsafe {
            self.device.destroy_device(None);
        }
    }
}
