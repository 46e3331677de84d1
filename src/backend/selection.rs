// Selection rules - the decisions made over driver-reported lists
//
// Everything here is plain data in, plain data out, so it can be tested
// without a GPU. The modules that talk to Vulkan gather the lists and
// hand them to these functions.

use anyhow::Result;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CStr;

/// Names from `required` that do not appear in `available`, in order
pub fn missing_names(required: &[&CStr], available: &[&CStr]) -> Vec<String> {
    required
        .iter()
        .filter(|&&name| !available.contains(&name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Queue families needed to draw and to present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Distinct families to create queues on (one queue each)
    pub fn unique_families(&self) -> Vec<u32> {
        [self.graphics, self.present]
            .into_iter()
            .flatten()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Scan queue families in order, keeping the first graphics-capable family
/// and the first family that can present. Stops once both are known.
pub fn find_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> Result<QueueFamilyIndices>
where
    F: FnMut(u32) -> Result<bool>,
{
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;

        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(index);
        }

        if indices.present.is_none() && supports_present(index)? {
            indices.present = Some(index);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// What a physical device offers for presenting to our surface
#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// A device is usable when it can draw, present, and run a swapchain.
/// The error is the reason it was rejected.
pub fn check_suitability(
    indices: &QueueFamilyIndices,
    missing_extensions: &[String],
    support: Option<&SwapchainSupport>,
) -> Result<(), String> {
    if !indices.is_complete() {
        return Err("missing graphics or present queue family".to_string());
    }

    if !missing_extensions.is_empty() {
        return Err(format!(
            "missing device extensions: {}",
            missing_extensions.join(", ")
        ));
    }

    match support {
        Some(support) if support.is_adequate() => Ok(()),
        _ => Err("insufficient swapchain support".to_string()),
    }
}

/// Prefer 8-bit BGRA sRGB, otherwise whatever the surface lists first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|&mode| mode == preferred)
        .unwrap_or(vk::PresentModeKHR::FIFO) // FIFO is always supported
}

/// Surfaces that leave `current_extent` at `u32::MAX` let us pick the size
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum so we never wait on the driver; 0 max means no limit
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        count
    }
}

/// Swapchain images are shared only when drawing and presenting use different families
pub fn sharing_mode(graphics: u32, present: u32) -> (vk::SharingMode, Vec<u32>) {
    if graphics == present {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, vec![graphics, present])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        }
    }

    fn adequate_support() -> SwapchainSupport {
        SwapchainSupport {
            capabilities: capabilities(2, 0),
            formats: vec![format(
                vk::Format::B8G8R8A8_UNORM,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            )],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    #[test]
    fn missing_names_reports_only_absent_entries() {
        let required = [c"VK_KHR_surface", c"VK_EXT_debug_utils", c"VK_KHR_xcb_surface"];
        let available = [c"VK_KHR_xcb_surface", c"VK_KHR_surface"];

        assert_eq!(
            missing_names(&required, &available),
            vec!["VK_EXT_debug_utils".to_string()]
        );
        assert!(missing_names(&required[..1], &available).is_empty());
        assert!(missing_names(&[], &[]).is_empty());
    }

    #[test]
    fn missing_names_needs_exact_match() {
        let required = [c"VK_LAYER_KHRONOS_validation"];
        let available = [c"VK_LAYER_KHRONOS_validation_extra", c"VK_LAYER_KHRONOS"];
        assert_eq!(missing_names(&required, &available).len(), 1);
    }

    #[test]
    fn queue_families_same_family_for_both() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = find_queue_families(&families, |_| Ok(true)).unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
        assert_eq!(indices.unique_families(), vec![0]);
        assert_eq!(sharing_mode(0, 0).0, vk::SharingMode::EXCLUSIVE);
    }

    #[test]
    fn queue_families_split_across_families() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let indices = find_queue_families(&families, |i| Ok(i == 2)).unwrap();

        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(2));
        assert_eq!(indices.unique_families(), vec![1, 2]);

        let (mode, shared) = sharing_mode(1, 2);
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(shared, vec![1, 2]);
    }

    #[test]
    fn queue_families_keep_first_match_and_stop_early() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut queried = Vec::new();
        let indices = find_queue_families(&families, |i| {
            queried.push(i);
            Ok(i >= 1)
        })
        .unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(1));
        assert_eq!(queried, vec![0, 1]);
    }

    #[test]
    fn queue_families_incomplete_without_graphics() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        let indices = find_queue_families(&families, |_| Ok(true)).unwrap();

        assert!(!indices.is_complete());
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn queue_family_present_query_errors_propagate() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = find_queue_families(&families, |_| anyhow::bail!("surface lost"));
        assert!(result.is_err());
    }

    #[test]
    fn suitability_checks_each_requirement() {
        let complete = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
        };
        let support = adequate_support();
        assert!(check_suitability(&complete, &[], Some(&support)).is_ok());

        let incomplete = QueueFamilyIndices {
            graphics: Some(0),
            present: None,
        };
        assert!(check_suitability(&incomplete, &[], Some(&support)).is_err());

        let missing = vec!["VK_KHR_swapchain".to_string()];
        let err = check_suitability(&complete, &missing, Some(&support)).unwrap_err();
        assert!(err.contains("VK_KHR_swapchain"));

        let mut no_modes = adequate_support();
        no_modes.present_modes.clear();
        assert!(check_suitability(&complete, &[], Some(&no_modes)).is_err());
        assert!(check_suitability(&complete, &[], None).is_err());
    }

    #[test]
    fn surface_format_prefers_srgb_bgra() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);

        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn present_mode_uses_preference_or_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_uses_current_when_fixed() {
        let mut caps = capabilities(2, 3);
        caps.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = choose_extent(&caps, 1234, 567);
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn extent_clamps_window_size() {
        let caps = capabilities(2, 3);

        let extent = choose_extent(&caps, 800, 600);
        assert_eq!((extent.width, extent.height), (800, 600));

        let extent = choose_extent(&caps, 4000, 10);
        assert_eq!((extent.width, extent.height), (1920, 100));
    }

    #[test]
    fn image_count_is_min_plus_one_within_max() {
        assert_eq!(choose_image_count(&capabilities(2, 0)), 3);
        assert_eq!(choose_image_count(&capabilities(2, 8)), 3);
        assert_eq!(choose_image_count(&capabilities(3, 3)), 3);
    }
}
