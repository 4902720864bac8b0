// Sampled textures and depth attachments
//
// Textures are uploaded from host pixels, then a full mip chain is
// generated on the GPU with a sequence of blits. The sampler is shared
// by every descriptor set that binds the texture.

use ash::vk;
use std::sync::Arc;

use super::buffer::{one_time_submit, Buffer};
use super::DeviceContext;
use crate::error::{RenderError, RenderResult};

/// Number of mip levels for a base image of the given dimensions: halve
/// the larger side until it reaches 1, counting the base level itself
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    (width.max(height) as f32).log2().floor() as u32 + 1
}

pub struct Texture {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub mip_levels: u32,
}

impl Texture {
    /// Upload RGBA8 pixels into a device-local sampled image and generate
    /// its mip chain
    pub fn from_pixels(
        device: &DeviceContext,
        command_pool: vk::CommandPool,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        let format = vk::Format::R8G8B8A8_SRGB;
        let mip_levels = mip_level_count(width, height);

        let staging = Buffer::new(
            device,
            pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write(device, pixels)?;

        let result = (|| {
            let (image, memory) = create_image(
                device,
                width,
                height,
                mip_levels,
                vk::SampleCountFlags::TYPE_1,
                format,
                vk::ImageTiling::OPTIMAL,
                // TRANSFER_SRC because mip generation blits from lower levels
                vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?;

            let fill = (|| {
                transition_image_layout(
                    device,
                    command_pool,
                    image,
                    mip_levels,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                )?;
                copy_buffer_to_image(device, command_pool, staging.buffer, image, width, height)?;
                // leaves every level in SHADER_READ_ONLY_OPTIMAL
                generate_mipmaps(
                    device,
                    command_pool,
                    image,
                    format,
                    width,
                    height,
                    mip_levels,
                )?;
                let view = create_image_view(
                    device,
                    image,
                    format,
                    vk::ImageAspectFlags::COLOR,
                    mip_levels,
                )?;
                Ok(view)
            })();

            match fill {
                Ok(view) => Ok(Self {
                    image,
                    memory,
                    view,
                    mip_levels,
                }),
                Err(e) => {
                    unsafe {
                        device.device.destroy_image(image, None);
                        device.device.free_memory(memory, None);
                    }
                    Err(e)
                }
            }
        })();

        staging.destroy(device);
        result
    }

    pub fn destroy(&self, device: &DeviceContext) {
        unsafe {
            device.device.destroy_image_view(self.view, None);
            device.device.destroy_image(self.image, None);
            device.device.free_memory(self.memory, None);
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn create_image(
    device: &DeviceContext,
    width: u32,
    height: u32,
    mip_levels: u32,
    samples: vk::SampleCountFlags,
    format: vk::Format,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    memory_flags: vk::MemoryPropertyFlags,
) -> RenderResult<(vk::Image, vk::DeviceMemory)> {
    let image_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .mip_levels(mip_levels)
        .array_layers(1)
        .format(format)
        .tiling(tiling)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(usage)
        .samples(samples)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let image = unsafe { device.device.create_image(&image_info, None)? };
    let requirements = unsafe { device.device.get_image_memory_requirements(image) };

    let memory_type = device.find_memory_type(requirements.memory_type_bits, memory_flags)?;
    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);

    let memory = unsafe { device.device.allocate_memory(&alloc_info, None)? };
    unsafe { device.device.bind_image_memory(image, memory, 0)? };

    Ok((image, memory))
}

pub fn create_image_view(
    device: &DeviceContext,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
) -> RenderResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        });

    let view = unsafe { device.device.create_image_view(&view_info, None)? };
    Ok(view)
}

fn transition_image_layout(
    device: &DeviceContext,
    command_pool: vk::CommandPool,
    image: vk::Image,
    mip_levels: u32,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> RenderResult<()> {
    let (src_access, dst_access, src_stage, dst_stage) = match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        _ => return Err(RenderError::UnsupportedFormat("image layout transition")),
    };

    one_time_submit(device, command_pool, |cmd| {
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        unsafe {
            device.device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier.build()],
            );
        }
    })
}

fn copy_buffer_to_image(
    device: &DeviceContext,
    command_pool: vk::CommandPool,
    buffer: vk::Buffer,
    image: vk::Image,
    width: u32,
    height: u32,
) -> RenderResult<()> {
    one_time_submit(device, command_pool, |cmd| {
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            });

        unsafe {
            device.device.cmd_copy_buffer_to_image(
                cmd,
                buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region.build()],
            );
        }
    })
}

/// Fill mip levels 1..n by blitting each level from the one above it.
/// Each source level is transitioned to TRANSFER_SRC before its blit and
/// to SHADER_READ_ONLY after, so the whole chain ends shader-readable.
fn generate_mipmaps(
    device: &DeviceContext,
    command_pool: vk::CommandPool,
    image: vk::Image,
    format: vk::Format,
    width: u32,
    height: u32,
    mip_levels: u32,
) -> RenderResult<()> {
    if !device.format_supports_linear_blit(format) {
        return Err(RenderError::UnsupportedFormat(
            "linear blit for mipmap generation",
        ));
    }

    one_time_submit(device, command_pool, |cmd| {
        let mut barrier = vk::ImageMemoryBarrier::builder()
            .image(image)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build();

        let mut mip_width = width as i32;
        let mut mip_height = height as i32;

        for level in 1..mip_levels {
            // source level: TRANSFER_DST -> TRANSFER_SRC
            barrier.subresource_range.base_mip_level = level - 1;
            barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
            barrier.new_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
            barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
            barrier.dst_access_mask = vk::AccessFlags::TRANSFER_READ;

            unsafe {
                device.device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }

            let next_width = if mip_width > 1 { mip_width / 2 } else { 1 };
            let next_height = if mip_height > 1 { mip_height / 2 } else { 1 };

            let blit = vk::ImageBlit::builder()
                .src_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: mip_width,
                        y: mip_height,
                        z: 1,
                    },
                ])
                .src_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .dst_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: next_width,
                        y: next_height,
                        z: 1,
                    },
                ])
                .dst_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            unsafe {
                device.device.cmd_blit_image(
                    cmd,
                    image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit.build()],
                    vk::Filter::LINEAR,
                );
            }

            // source level is final: TRANSFER_SRC -> SHADER_READ_ONLY
            barrier.old_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
            barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
            barrier.src_access_mask = vk::AccessFlags::TRANSFER_READ;
            barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;

            unsafe {
                device.device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }

            mip_width = next_width;
            mip_height = next_height;
        }

        // last level was only ever a blit destination
        barrier.subresource_range.base_mip_level = mip_levels - 1;
        barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
        barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
        barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;

        unsafe {
            device.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    })
}

pub fn create_sampler(device: &DeviceContext, mip_levels: u32) -> RenderResult<vk::Sampler> {
    let max_anisotropy = device
        .properties
        .limits
        .max_sampler_anisotropy
        .min(16.0);

    let sampler_info = vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(max_anisotropy)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(mip_levels as f32);

    let sampler = unsafe { device.device.create_sampler(&sampler_info, None)? };
    Ok(sampler)
}

/// Depth attachment sized to the swapchain extent. Owns its handles so a
/// partially built frame setup unwinds cleanly.
pub struct DepthBuffer {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub format: vk::Format,
    device: Arc<DeviceContext>,
}

impl DepthBuffer {
    pub fn new(
        device: Arc<DeviceContext>,
        extent: vk::Extent2D,
        samples: vk::SampleCountFlags,
    ) -> RenderResult<Self> {
        let format = device.depth_format()?;
        let (image, memory) = create_image(
            &device,
            extent.width,
            extent.height,
            1,
            samples,
            format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let view = match create_image_view(&device, image, format, vk::ImageAspectFlags::DEPTH, 1)
        {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.device.destroy_image(image, None);
                    device.device.free_memory(memory, None);
                }
                return Err(e);
            }
        };

        Ok(Self {
            image,
            memory,
            view,
            format,
            device,
        })
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_image_view(self.view, None);
            self.device.device.destroy_image(self.image, None);
            self.device.device.free_memory(self.memory, None);
        }
    }
}

/// Multisampled color attachment the scene renders into before the
/// per-frame resolve to the swapchain image
pub struct ColorTarget {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    device: Arc<DeviceContext>,
}

impl ColorTarget {
    pub fn new(
        device: Arc<DeviceContext>,
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RenderResult<Self> {
        let (image, memory) = create_image(
            &device,
            extent.width,
            extent.height,
            1,
            samples,
            format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let view = match create_image_view(&device, image, format, vk::ImageAspectFlags::COLOR, 1)
        {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.device.destroy_image(image, None);
                    device.device.free_memory(memory, None);
                }
                return Err(e);
            }
        };

        Ok(Self {
            image,
            memory,
            view,
            device,
        })
    }
}

impl Drop for ColorTarget {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_image_view(self.view, None);
            self.device.device.destroy_image(self.image, None);
            self.device.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_count_halves_largest_side_to_one() {
        assert_eq!(mip_level_count(512, 256), 10);
        assert_eq!(mip_level_count(256, 512), 10);
    }

    #[test]
    fn mip_count_of_unit_image_is_one() {
        assert_eq!(mip_level_count(1, 1), 1);
    }

    #[test]
    fn mip_count_rounds_down_for_npot() {
        // 300 -> 150 -> 75 -> 37 -> 18 -> 9 -> 4 -> 2 -> 1
        assert_eq!(mip_level_count(300, 200), 9);
        assert_eq!(mip_level_count(1024, 1), 11);
    }
}
