// Swapchain - the ring of presentable images
//
// Format, present mode, extent and image count selection live in free
// functions so the policies can be tested without a device. Staleness
// (out-of-date / suboptimal) is reported as data, not as an error; the
// frame scheduler decides what to do with it.

use ash::vk;
use std::sync::Arc;

use super::DeviceContext;
use crate::error::{RenderError, RenderResult};

/// Outcome of an acquire or present call, after folding the transient
/// swapchain conditions into data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwapchainStatus {
    /// Image usable as-is
    Optimal,
    /// Image usable this frame, but the swapchain should be rebuilt
    Suboptimal,
    /// Swapchain no longer matches the surface; rebuild before rendering
    OutOfDate,
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub loader: ash::extensions::khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    device: Arc<DeviceContext>,
}

impl Swapchain {
    /// Create the swapchain against the current surface state.
    ///
    /// `fallback_extent` is the framebuffer size in pixels, consulted only
    /// when the surface reports the "don't care" sentinel extent.
    pub fn new(
        device: Arc<DeviceContext>,
        preferred_present_mode: vk::PresentModeKHR,
        fallback_extent: (u32, u32),
    ) -> RenderResult<Self> {
        let caps = unsafe {
            device
                .surface_loader
                .get_physical_device_surface_capabilities(device.physical_device, device.surface)?
        };
        let formats = unsafe {
            device
                .surface_loader
                .get_physical_device_surface_formats(device.physical_device, device.surface)?
        };
        let present_modes = unsafe {
            device
                .surface_loader
                .get_physical_device_surface_present_modes(device.physical_device, device.surface)?
        };

        let surface_format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&present_modes, preferred_present_mode)?;
        let extent = choose_extent(&caps, fallback_extent.0, fallback_extent.1);
        let image_count = choose_image_count(&caps);

        log::info!(
            "Creating swapchain: {}x{}, {:?}/{:?}, {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            image_count
        );

        let families = device.queue_families;
        let family_indices = [families.graphics, families.present];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(device.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        // images touched by two queue families need CONCURRENT sharing
        create_info = if families.graphics != families.present {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let loader = ash::extensions::khr::Swapchain::new(&device.instance, &device.device);
        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };
        let images = unsafe { loader.get_swapchain_images(swapchain)? };

        let image_views = images
            .iter()
            .map(|&image| create_image_view(&device, image, surface_format.format))
            .collect::<RenderResult<Vec<_>>>()?;

        Ok(Self {
            swapchain,
            loader,
            images,
            image_views,
            format: surface_format.format,
            extent,
            device,
        })
    }

    /// Request the next presentable image, signaling `semaphore` when it is
    /// ready. Staleness comes back as `SwapchainStatus`; everything else is
    /// a fatal error.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
    ) -> RenderResult<(u32, SwapchainStatus)> {
        let result = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, false)) => Ok((index, SwapchainStatus::Optimal)),
            Ok((index, true)) => Ok((index, SwapchainStatus::Suboptimal)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok((0, SwapchainStatus::OutOfDate)),
            Err(e) => Err(RenderError::Vulkan(e)),
        }
    }

    /// Present `image_index` on the present queue once `wait_semaphore` fires
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RenderResult<SwapchainStatus> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };

        match result {
            Ok(false) => Ok(SwapchainStatus::Optimal),
            Ok(true) => Ok(SwapchainStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SwapchainStatus::OutOfDate),
            Err(e) => Err(RenderError::Vulkan(e)),
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn create_image_view(
    device: &DeviceContext,
    image: vk::Image,
    format: vk::Format,
) -> RenderResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    let view = unsafe { device.device.create_image_view(&create_info, None)? };
    Ok(view)
}

/// Prefer 8-bit BGRA with an sRGB nonlinear color space, else the first
/// reported format. An empty list means the surface is unusable.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> RenderResult<vk::SurfaceFormatKHR> {
    if formats.is_empty() {
        return Err(RenderError::UnsupportedSurface("no surface formats reported"));
    }

    Ok(formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(formats[0]))
}

/// Prefer the caller's mode, then MAILBOX, then FIFO (always supported).
/// An empty list means the surface is unusable.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> RenderResult<vk::PresentModeKHR> {
    if modes.is_empty() {
        return Err(RenderError::UnsupportedSurface("no present modes reported"));
    }

    Ok(modes
        .iter()
        .copied()
        .find(|&mode| mode == preferred)
        .or_else(|| {
            modes
                .iter()
                .copied()
                .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        })
        .unwrap_or(vk::PresentModeKHR::FIFO))
}

/// Surface-decided extent unless the sentinel is reported, in which case the
/// framebuffer size clamped into the supported range
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// Triple buffering where the platform allows it; `max_image_count == 0`
/// means unbounded
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = 3.max(caps.min_image_count);
    if caps.max_image_count > 0 {
        count = count.min(caps.max_image_count);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(
        current: (u32, u32),
        min_extent: (u32, u32),
        max_extent: (u32, u32),
        min_images: u32,
        max_images: u32,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min_extent.0,
                height: min_extent.1,
            },
            max_image_extent: vk::Extent2D {
                width: max_extent.0,
                height: max_extent.1,
            },
            min_image_count: min_images,
            max_image_count: max_images,
            ..Default::default()
        }
    }

    #[test]
    fn surface_format_prefers_bgra_srgb() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn empty_format_list_is_an_error() {
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn present_mode_prefers_mailbox_over_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX).unwrap(),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn present_mode_fifo_only_yields_fifo() {
        let modes = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX).unwrap(),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn present_mode_honors_explicit_preference() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::IMMEDIATE).unwrap(),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn extent_uses_surface_decision_when_not_sentinel() {
        let caps = caps((800, 600), (1, 1), (4096, 4096), 2, 0);
        let extent = choose_extent(&caps, 1280, 720);
        assert_eq!(extent, vk::Extent2D { width: 800, height: 600 });
    }

    #[test]
    fn extent_clamps_into_capability_range() {
        let caps = caps((u32::MAX, u32::MAX), (200, 300), (1000, 900), 2, 0);

        let below = choose_extent(&caps, 10, 10);
        assert_eq!(below, vk::Extent2D { width: 200, height: 300 });

        let above = choose_extent(&caps, 5000, 5000);
        assert_eq!(above, vk::Extent2D { width: 1000, height: 900 });

        let inside = choose_extent(&caps, 640, 480);
        assert_eq!(inside, vk::Extent2D { width: 640, height: 480 });
    }

    #[test]
    fn image_count_defaults_to_three() {
        let caps = caps((800, 600), (1, 1), (4096, 4096), 2, 0);
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn image_count_respects_platform_bounds() {
        let capped = caps((800, 600), (1, 1), (4096, 4096), 2, 2);
        assert_eq!(choose_image_count(&capped), 2);

        let raised = caps((800, 600), (1, 1), (4096, 4096), 4, 8);
        assert_eq!(choose_image_count(&raised), 4);
    }
}
