// Window surface - where presented images end up
//
// Created through ash-window so every platform winit runs on is covered

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::sync::Arc;

use super::instance::VulkanInstance;
use super::selection::SwapchainSupport;

pub struct Surface {
    pub surface: vk::SurfaceKHR,
    pub loader: khr::Surface,
    // Keeps the instance alive until the surface is gone
    _instance: Arc<VulkanInstance>,
}

impl Surface {
    pub fn new<W>(instance: Arc<VulkanInstance>, window: &W) -> Result<Self>
    where
        W: HasRawDisplayHandle + HasRawWindowHandle,
    {
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        }
        .context("Failed to create window surface")?;

        let loader = khr::Surface::new(&instance.entry, &instance.instance);

        Ok(Self {
            surface,
            loader,
            _instance: instance,
        })
    }

    /// Can queue family `queue_family` of `physical_device` present here?
    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        unsafe {
            self.loader.get_physical_device_surface_support(
                physical_device,
                queue_family,
                self.surface,
            )
        }
        .context("Failed to query surface present support")
    }

    /// Query surface capabilities, formats and present modes in one go
    pub fn swapchain_support(&self, physical_device: vk::PhysicalDevice) -> Result<SwapchainSupport> {
        unsafe {
            Ok(SwapchainSupport {
                capabilities: self
                    .loader
                    .get_physical_device_surface_capabilities(physical_device, self.surface)
                    .context("Failed to query surface capabilities")?,
                formats: self
                    .loader
                    .get_physical_device_surface_formats(physical_device, self.surface)
                    .context("Failed to query surface formats")?,
                present_modes: self
                    .loader
                    .get_physical_device_surface_present_modes(physical_device, self.surface)
                    .context("Failed to query surface present modes")?,
            })
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        log::debug!("Destroying surface");
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}
