// Vulkan Instance - connection to the driver
//
// Responsibilities:
// - Validation layer and instance extension checks
// - Instance creation (portability enumeration when the loader offers it)
// - Debug messenger routing validation output into `log`

use anyhow::{Context, Result};
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::CStr;
use std::sync::Arc;

use super::selection::missing_names;

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

const APP_NAME: &CStr = c"Hello Triangle";
const ENGINE_NAME: &CStr = c"No Engine";

// Needed for MoltenVK and other non-conformant implementations
const PORTABILITY_ENUMERATION: &CStr = c"VK_KHR_portability_enumeration";
const PHYSICAL_DEVICE_PROPERTIES_2: &CStr = c"VK_KHR_get_physical_device_properties2";

/// Instance wrapper with automatic cleanup
pub struct VulkanInstance {
    pub instance: ash::Instance,
    pub entry: Entry,
    pub validation_enabled: bool,

    // Debug utils (if validation enabled)
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create the instance for a window living on `display_handle`
    ///
    /// # Arguments
    /// * `display_handle` - Decides which surface extensions are required
    /// * `enable_validation` - Enable Vulkan validation layers (debug only)
    pub fn new(display_handle: RawDisplayHandle, enable_validation: bool) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan instance (validation: {})", enable_validation);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        // Step 2: Layers must be checked before they are requested
        if enable_validation {
            Self::check_validation_layer_support(&entry)?;
        }

        // Step 3: Create instance
        let instance = Self::create_instance(&entry, display_handle, enable_validation)?;

        // Step 4: Setup debug messenger if validation enabled
        let debug_utils = if enable_validation {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        Ok(Arc::new(Self {
            instance,
            entry,
            validation_enabled: enable_validation,
            debug_utils,
        }))
    }

    /// Layer names to pass on to device creation
    pub fn enabled_layers(&self) -> Vec<&'static CStr> {
        if self.validation_enabled {
            vec![VALIDATION_LAYER]
        } else {
            vec![]
        }
    }

    fn check_validation_layer_support(entry: &Entry) -> Result<()> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .context("Failed to enumerate instance layers")?;

        let available: Vec<&CStr> = layers
            .iter()
            .map(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) })
            .collect();

        log::debug!("Available layers: {:?}", available);

        let missing = missing_names(&[VALIDATION_LAYER], &available);
        if !missing.is_empty() {
            anyhow::bail!(
                "Validation layers requested, but not available: {}",
                missing.join(", ")
            );
        }

        Ok(())
    }

    fn create_instance(
        entry: &Entry,
        display_handle: RawDisplayHandle,
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_info = vk::ApplicationInfo::builder()
            .application_name(APP_NAME)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let properties = entry
            .enumerate_instance_extension_properties(None)
            .context("Failed to enumerate instance extensions")?;
        let available: Vec<&CStr> = properties
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
            .collect();

        log::debug!("Available instance extensions:");
        for name in &available {
            log::debug!("\t{}", name.to_string_lossy());
        }

        // Window system extensions (VK_KHR_surface + the platform one)
        let mut extensions: Vec<&CStr> = ash_window::enumerate_required_extensions(display_handle)
            .context("Failed to query window system extensions")?
            .iter()
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
            .collect();

        if enable_validation {
            extensions.push(DebugUtils::name());
        }

        let mut flags = vk::InstanceCreateFlags::empty();
        if available.contains(&PORTABILITY_ENUMERATION) {
            extensions.push(PORTABILITY_ENUMERATION);
            if available.contains(&PHYSICAL_DEVICE_PROPERTIES_2) {
                extensions.push(PHYSICAL_DEVICE_PROPERTIES_2);
            }
            flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        }

        let missing = missing_names(&extensions, &available);
        if !missing.is_empty() {
            anyhow::bail!("Missing required instance extensions: {}", missing.join(", "));
        }
        log::info!("All {} required instance extensions are supported", extensions.len());

        let extension_names: Vec<_> = extensions.iter().map(|name| name.as_ptr()).collect();

        // Validation layers
        let layer_names = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        // Chained so instance creation and destruction are validated too
        let mut debug_info = debug_messenger_info();

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .flags(flags);

        if enable_validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = DebugUtils::new(entry, instance);

        let messenger = unsafe {
            debug_utils.create_debug_utils_messenger(&debug_messenger_info(), None)
        }
        .context("Failed to set up debug messenger")?;

        Ok((debug_utils, messenger))
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan instance...");

        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

/// `log` level a validation message is reported at
pub fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Info
    } else {
        log::Level::Trace
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    log::log!(
        severity_level(message_severity),
        "[Vulkan] {:?}: {}",
        message_type,
        message
    );

    // Never abort the call that triggered the message
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_severity_maps_to_its_log_level() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

        assert_eq!(severity_level(Severity::ERROR), log::Level::Error);
        assert_eq!(severity_level(Severity::WARNING), log::Level::Warn);
        assert_eq!(severity_level(Severity::INFO), log::Level::Info);
        assert_eq!(severity_level(Severity::VERBOSE), log::Level::Trace);
    }

    #[test]
    fn combined_severity_uses_the_most_severe_bit() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

        assert_eq!(severity_level(Severity::WARNING | Severity::INFO), log::Level::Warn);
        assert_eq!(severity_level(Severity::empty()), log::Level::Trace);
    }

    #[test]
    fn messenger_listens_to_every_severity() {
        let info = debug_messenger_info();
        assert!(info.message_severity.contains(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        ));
        assert!(info.pfn_user_callback.is_some());
    }
}
