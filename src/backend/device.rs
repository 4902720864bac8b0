// Device context - instance, adapter selection, queues
//
// Owns the Vulkan instance, the window surface, the logical device and its
// queues. Adapter selection is a top-1 reduction over a pure scoring
// function; anything that scores zero is unusable for this surface.

use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Queue family indices for the two operations we need. They may name the
/// same family.
#[derive(Copy, Clone, Debug)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

pub struct DeviceContext {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub instance: ash::Instance,
    _entry: Entry,

    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::extensions::khr::Surface,

    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub queue_families: QueueFamilies,

    /// Integrated adapters share memory with the host; uploads skip staging.
    pub unified_memory: bool,

    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,

    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl DeviceContext {
    pub fn new(
        app_name: &str,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        enable_validation: bool,
    ) -> RenderResult<Arc<Self>> {
        let entry = unsafe { Entry::load()? };

        let enable_validation = enable_validation && validation_layer_available(&entry)?;
        let instance = create_instance(&entry, app_name, display_handle, enable_validation)?;

        let debug_utils = if enable_validation {
            Some(setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        let surface_loader = ash::extensions::khr::Surface::new(&entry, &instance);
        let surface = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)?
        };

        let (physical_device, queue_families) =
            pick_physical_device(&instance, &surface_loader, surface)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let unified_memory = properties.device_type == vk::PhysicalDeviceType::INTEGRATED_GPU;

        log::info!(
            "Selected GPU: {} ({:?})",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy(),
            properties.device_type
        );
        log::info!(
            "API version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );
        log::info!(
            "Queue families: graphics={} present={}, unified memory: {}",
            queue_families.graphics,
            queue_families.present,
            unified_memory
        );

        let (device, graphics_queue, present_queue) =
            create_logical_device(&instance, physical_device, queue_families, enable_validation)?;

        Ok(Arc::new(Self {
            device,
            physical_device,
            instance,
            _entry: entry,
            surface,
            surface_loader,
            graphics_queue,
            present_queue,
            queue_families,
            unified_memory,
            properties,
            memory_properties,
            debug_utils,
        }))
    }

    /// Wait for all submitted GPU work to finish
    pub fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Find a memory type index satisfying both the resource's type filter
    /// and the requested property flags
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<u32> {
        for i in 0..self.memory_properties.memory_type_count {
            let supported = (type_filter & (1 << i)) != 0;
            let adequate = self.memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties);
            if supported && adequate {
                return Ok(i);
            }
        }
        Err(RenderError::NoSuitableMemoryType)
    }

    /// First candidate format supporting the requested optimal-tiling features
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        features: vk::FormatFeatureFlags,
    ) -> RenderResult<vk::Format> {
        for &format in candidates {
            let props = unsafe {
                self.instance
                    .get_physical_device_format_properties(self.physical_device, format)
            };
            if props.optimal_tiling_features.contains(features) {
                return Ok(format);
            }
        }
        Err(RenderError::UnsupportedFormat("no candidate format supported"))
    }

    pub fn depth_format(&self) -> RenderResult<vk::Format> {
        self.find_supported_format(
            &[
                vk::Format::D32_SFLOAT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )
    }

    /// Highest sample count usable for both color and depth attachments
    pub fn max_sample_count(&self) -> vk::SampleCountFlags {
        max_usable_sample_count(
            self.properties.limits.framebuffer_color_sample_counts,
            self.properties.limits.framebuffer_depth_sample_counts,
        )
    }

    pub fn format_supports_linear_blit(&self, format: vk::Format) -> bool {
        let props = unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        };
        props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        log::info!("Destroying device context");
        let _ = self.wait_idle();

        unsafe {
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn validation_layer_available(entry: &Entry) -> RenderResult<bool> {
    let layers = entry.enumerate_instance_layer_properties()?;
    let found = layers
        .iter()
        .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER);
    if !found {
        log::warn!("Validation layer requested but not available, continuing without it");
    }
    Ok(found)
}

fn create_instance(
    entry: &Entry,
    app_name: &str,
    display_handle: RawDisplayHandle,
    enable_validation: bool,
) -> RenderResult<ash::Instance> {
    let app_name_cstr = std::ffi::CString::new(app_name).unwrap_or_default();

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name_cstr)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(&app_name_cstr)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_2);

    let mut extensions = ash_window::enumerate_required_extensions(display_handle)?.to_vec();
    if enable_validation {
        extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
    }

    let layers = if enable_validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    let instance = unsafe { entry.create_instance(&create_info, None)? };
    Ok(instance)
}

fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> RenderResult<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };
    Ok((debug_utils, messenger))
}

/// Largest sample count present in both limit masks
pub fn max_usable_sample_count(
    color: vk::SampleCountFlags,
    depth: vk::SampleCountFlags,
) -> vk::SampleCountFlags {
    let counts = color & depth;
    let candidates = [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ];
    for candidate in candidates {
        if counts.contains(candidate) {
            return candidate;
        }
    }
    vk::SampleCountFlags::TYPE_1
}

/// Adapter preference; higher wins
pub fn score_adapter(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 30,
        _ => 10,
    }
}

fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
) -> RenderResult<(vk::PhysicalDevice, QueueFamilies)> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    // top-1 reduction over (adapter, score); only the maximum is consumed
    let mut best: Option<(vk::PhysicalDevice, QueueFamilies, u32)> = None;

    for device in devices {
        let Some(families) = check_suitable(instance, surface_loader, surface, device)? else {
            continue;
        };

        let props = unsafe { instance.get_physical_device_properties(device) };
        let score = score_adapter(props.device_type);

        if best.map_or(true, |(_, _, best_score)| score > best_score) {
            best = Some((device, families, score));
        }
    }

    best.map(|(device, families, _)| (device, families))
        .ok_or(RenderError::NoSuitableGpu)
}

/// Returns the queue families if the adapter can drive this surface
fn check_suitable(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> RenderResult<Option<QueueFamilies>> {
    let Some(families) = find_queue_families(instance, surface_loader, surface, device)? else {
        return Ok(None);
    };

    let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
    if !supports_extension(&extensions, ash::extensions::khr::Swapchain::name()) {
        return Ok(None);
    }

    let formats = unsafe { surface_loader.get_physical_device_surface_formats(device, surface)? };
    let present_modes =
        unsafe { surface_loader.get_physical_device_surface_present_modes(device, surface)? };
    if formats.is_empty() || present_modes.is_empty() {
        return Ok(None);
    }

    let features = unsafe { instance.get_physical_device_features(device) };
    if features.sampler_anisotropy != vk::TRUE {
        return Ok(None);
    }

    Ok(Some(families))
}

/// Look up `name` in a list of extension properties. The names in the
/// property structs are fixed-size NUL-padded arrays.
fn supports_extension(extensions: &[vk::ExtensionProperties], name: &CStr) -> bool {
    extensions.iter().any(|ext| {
        let ext_name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
        ext_name == name
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    surface_loader: &ash::extensions::khr::Surface,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> RenderResult<Option<QueueFamilies>> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut graphics = None;
    let mut present = None;

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;

        if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics = Some(index);
        }

        let present_support = unsafe {
            surface_loader.get_physical_device_surface_support(device, index, surface)?
        };
        if present.is_none() && present_support {
            present = Some(index);
        }

        if let (Some(graphics), Some(present)) = (graphics, present) {
            return Ok(Some(QueueFamilies { graphics, present }));
        }
    }

    Ok(None)
}

fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    families: QueueFamilies,
    enable_validation: bool,
) -> RenderResult<(ash::Device, vk::Queue, vk::Queue)> {
    let queue_priorities = [1.0];
    let mut unique_families = vec![families.graphics];
    if families.present != families.graphics {
        unique_families.push(families.present);
    }

    let queue_create_infos: Vec<_> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&queue_priorities)
                .build()
        })
        .collect();

    let extensions = [ash::extensions::khr::Swapchain::name().as_ptr()];
    let features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true);

    let layers = if enable_validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical_device, &create_info, None)? };

    let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
    let present_queue = unsafe { device.get_device_queue(families.present, 0) };

    Ok((device, graphics_queue, present_queue))
}

// Validation messages land in the regular log stream
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_adapters_outrank_integrated() {
        assert!(
            score_adapter(vk::PhysicalDeviceType::DISCRETE_GPU)
                > score_adapter(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
        assert!(
            score_adapter(vk::PhysicalDeviceType::INTEGRATED_GPU)
                > score_adapter(vk::PhysicalDeviceType::CPU)
        );
    }

    #[test]
    fn sample_count_limited_by_both_masks() {
        let c8 = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4
            | vk::SampleCountFlags::TYPE_8;
        let c4 = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4;

        assert_eq!(max_usable_sample_count(c8, c8), vk::SampleCountFlags::TYPE_8);
        // depth limits cap the choice even when color supports more
        assert_eq!(max_usable_sample_count(c8, c4), vk::SampleCountFlags::TYPE_4);
        assert_eq!(
            max_usable_sample_count(vk::SampleCountFlags::TYPE_1, c8),
            vk::SampleCountFlags::TYPE_1
        );
    }

    #[test]
    fn extension_lookup_matches_exact_name() {
        let mut with_swapchain = vk::ExtensionProperties::default();
        for (dst, &src) in with_swapchain
            .extension_name
            .iter_mut()
            .zip(b"VK_KHR_swapchain\0")
        {
            *dst = src as std::os::raw::c_char;
        }
        let mut other = vk::ExtensionProperties::default();
        for (dst, &src) in other.extension_name.iter_mut().zip(b"VK_KHR_surface\0") {
            *dst = src as std::os::raw::c_char;
        }

        let name = ash::extensions::khr::Swapchain::name();
        assert!(supports_extension(&[other, with_swapchain], name));
        assert!(!supports_extension(&[other], name));
        assert!(!supports_extension(&[], name));
    }
}
