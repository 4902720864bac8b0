// Frame lifecycle and swapchain generation management
//
// A `Generation` owns every resource derived from one swapchain: the
// depth buffer, render pass, pipeline, framebuffers, per-image uniform
// buffers and descriptor sets, pre-recorded command buffers, and the
// frame synchronization pool. Resize and out-of-date events tear down
// the whole generation and build a fresh one; nothing extent-dependent
// outlives its swapchain.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use log::{debug, info};
use std::ffi::c_void;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::buffer::{upload_buffer, Buffer};
use crate::backend::pipeline::{
    create_descriptor_set_layout, create_framebuffers, create_graphics_pipeline,
    create_render_pass,
};
use crate::backend::texture::{create_sampler, ColorTarget, DepthBuffer, Texture};
use crate::backend::{DeviceContext, FramePool, Swapchain, SwapchainStatus};
use crate::error::RenderResult;
use crate::mesh::{builtin_quads, builtin_texture};

const VERT_SHADER: &str = concat!(env!("OUT_DIR"), "/scene.vert.spv");
const FRAG_SHADER: &str = concat!(env!("OUT_DIR"), "/scene.frag.spv");

const ROTATION_DEGREES_PER_SEC: f32 = 90.0;
const FPS_WINDOW: Duration = Duration::from_secs(1);

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct UniformData {
    model: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
}

/// Model transform for the given time since startup: a steady rotation
/// around the Z axis
fn model_matrix(elapsed_secs: f32) -> Mat4 {
    Mat4::from_rotation_z(ROTATION_DEGREES_PER_SEC.to_radians() * elapsed_secs)
}

fn view_matrix() -> Mat4 {
    Mat4::look_at_rh(Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO, Vec3::Z)
}

/// Perspective projection with the Y axis flipped for Vulkan clip space
fn projection_matrix(extent: vk::Extent2D) -> Mat4 {
    let aspect = extent.width as f32 / extent.height.max(1) as f32;
    let mut proj = Mat4::perspective_rh(45f32.to_radians(), aspect, 0.1, 10.0);
    proj.y_axis.y *= -1.0;
    proj
}

/// Completed-frame statistics for one measurement window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    pub frames: u32,
    pub fps: f64,
}

/// Counts presented frames and emits a sample once per window. The
/// caller decides what to do with the sample; nothing global is touched.
#[derive(Debug)]
struct FpsCounter {
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    fn tick(&mut self, now: Instant) -> Option<FpsSample> {
        self.frames += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed < FPS_WINDOW {
            return None;
        }
        let sample = FpsSample {
            frames: self.frames,
            fps: self.frames as f64 / elapsed.as_secs_f64(),
        };
        self.window_start = now;
        self.frames = 0;
        Some(sample)
    }
}

/// How the frame scheduler reacts to an acquire result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcquireAction {
    /// Render normally
    Render,
    /// The image is usable this frame; rebuild before the next one
    RenderThenRebuild,
    /// The image is unusable; skip the frame and rebuild
    SkipAndRebuild,
}

fn classify_acquire(status: SwapchainStatus) -> AcquireAction {
    match status {
        SwapchainStatus::Optimal => AcquireAction::Render,
        SwapchainStatus::Suboptimal => AcquireAction::RenderThenRebuild,
        SwapchainStatus::OutOfDate => AcquireAction::SkipAndRebuild,
    }
}

/// What happened during one `render_frame` call
#[derive(Debug, Default)]
pub struct FrameReport {
    /// False when the frame was skipped (minimized or swapchain rebuilt)
    pub rendered: bool,
    /// Present when a measurement window closed this frame
    pub fps: Option<FpsSample>,
}

/// Everything owned by one swapchain. Dropping a generation releases all
/// of it in dependency order; the swapchain itself goes last. Raw-handle
/// fields start out null and Drop tolerates that, so a failure partway
/// through `new` still releases whatever was created.
struct Generation {
    frames: FramePool,
    framebuffers: Vec<vk::Framebuffer>,
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    color: Option<ColorTarget>,
    depth: DepthBuffer,
    uniform_buffers: Vec<Buffer>,
    uniform_mapped: Vec<*mut c_void>,
    descriptor_pool: vk::DescriptorPool,
    command_buffers: Vec<vk::CommandBuffer>,
    view: Mat4,
    proj: Mat4,
    swapchain: Swapchain,
    command_pool: vk::CommandPool,
    device: Arc<DeviceContext>,
}

impl Generation {
    #[allow(clippy::too_many_arguments)]
    fn new(
        device: Arc<DeviceContext>,
        command_pool: vk::CommandPool,
        descriptor_set_layout: vk::DescriptorSetLayout,
        preferred_present_mode: vk::PresentModeKHR,
        fallback_extent: (u32, u32),
        clear_color: [f32; 4],
        samples: vk::SampleCountFlags,
        vertex_buffer: &Buffer,
        index_buffer: &Buffer,
        index_count: u32,
        texture_view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> RenderResult<Self> {
        let swapchain = Swapchain::new(device.clone(), preferred_present_mode, fallback_extent)?;
        let image_count = swapchain.image_count();
        let extent = swapchain.extent;

        // owning resources first; each cleans itself up if a later step fails
        let color = if samples != vk::SampleCountFlags::TYPE_1 {
            Some(ColorTarget::new(
                device.clone(),
                extent,
                swapchain.format,
                samples,
            )?)
        } else {
            None
        };
        let depth = DepthBuffer::new(device.clone(), extent, samples)?;
        let frames = FramePool::new(device.clone(), image_count)?;

        let mut gen = Self {
            frames,
            framebuffers: Vec::new(),
            pipeline: vk::Pipeline::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            color,
            depth,
            uniform_buffers: Vec::new(),
            uniform_mapped: Vec::new(),
            descriptor_pool: vk::DescriptorPool::null(),
            command_buffers: Vec::new(),
            view: view_matrix(),
            proj: projection_matrix(extent),
            swapchain,
            command_pool,
            device,
        };

        // from here every `?` unwinds through gen's Drop
        gen.render_pass =
            create_render_pass(&gen.device, gen.swapchain.format, gen.depth.format, samples)?;
        let (pipeline, pipeline_layout) = create_graphics_pipeline(
            &gen.device,
            gen.render_pass,
            extent,
            samples,
            descriptor_set_layout,
            Path::new(VERT_SHADER),
            Path::new(FRAG_SHADER),
        )?;
        gen.pipeline = pipeline;
        gen.pipeline_layout = pipeline_layout;

        gen.framebuffers = create_framebuffers(
            &gen.device,
            &gen.swapchain.image_views,
            gen.color.as_ref().map(|c| c.view),
            gen.depth.view,
            gen.render_pass,
            extent,
        )?;

        // one uniform buffer per image, persistently mapped; buffers land
        // in gen before mapping so an error frees them
        let ubo_size = std::mem::size_of::<UniformData>() as vk::DeviceSize;
        for i in 0..image_count {
            let buffer = Buffer::new(
                &gen.device,
                ubo_size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            gen.uniform_buffers.push(buffer);
            let mapped = gen.uniform_buffers[i].map(&gen.device)?;
            gen.uniform_mapped.push(mapped);
        }

        gen.descriptor_pool = create_descriptor_pool(&gen.device, image_count as u32)?;
        let descriptor_sets = allocate_descriptor_sets(
            &gen.device,
            gen.descriptor_pool,
            descriptor_set_layout,
            &gen.uniform_buffers,
            texture_view,
            sampler,
        )?;

        gen.command_buffers = record_command_buffers(
            &gen.device,
            command_pool,
            gen.render_pass,
            &gen.framebuffers,
            extent,
            clear_color,
            gen.pipeline,
            gen.pipeline_layout,
            &descriptor_sets,
            vertex_buffer.buffer,
            index_buffer.buffer,
            index_count,
        )?;

        debug!(
            "swapchain generation built: {} images, {}x{}, {:?}",
            image_count, extent.width, extent.height, samples
        );

        Ok(gen)
    }

    fn write_uniform(&self, image_index: u32, elapsed_secs: f32) {
        let data = UniformData {
            model: model_matrix(elapsed_secs).to_cols_array_2d(),
            view: self.view.to_cols_array_2d(),
            proj: self.proj.to_cols_array_2d(),
        };
        let bytes = bytemuck::bytes_of(&data);
        let dst = self.uniform_mapped[image_index as usize] as *mut u8;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        // destroy calls are no-ops on null handles, so a partially built
        // generation takes the same path
        unsafe {
            if !self.command_buffers.is_empty() {
                self.device
                    .device
                    .free_command_buffers(self.command_pool, &self.command_buffers);
            }
            self.device
                .device
                .destroy_descriptor_pool(self.descriptor_pool, None);
        }
        for (buffer, _) in self.uniform_buffers.iter().zip(&self.uniform_mapped) {
            unsafe { self.device.device.unmap_memory(buffer.memory) };
        }
        for buffer in &self.uniform_buffers {
            buffer.destroy(&self.device);
        }
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device
                .device
                .destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.device.destroy_render_pass(self.render_pass, None);
        }
        // ColorTarget, DepthBuffer, FramePool and Swapchain drop afterwards
        // in field order
    }
}

pub struct Renderer {
    device: Arc<DeviceContext>,
    command_pool: vk::CommandPool,
    descriptor_set_layout: vk::DescriptorSetLayout,

    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    texture: Texture,
    sampler: vk::Sampler,

    generation: Option<Generation>,

    preferred_present_mode: vk::PresentModeKHR,
    clear_color: [f32; 4],
    msaa_samples: vk::SampleCountFlags,
    extent_hint: (u32, u32),
    needs_rebuild: bool,
    minimized: bool,

    start_time: Instant,
    fps: FpsCounter,
}

impl Renderer {
    pub fn new(
        device: Arc<DeviceContext>,
        preferred_present_mode: vk::PresentModeKHR,
        clear_color: [f32; 4],
        initial_extent: (u32, u32),
    ) -> RenderResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.queue_families.graphics);
        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None)? };

        let descriptor_set_layout = create_descriptor_set_layout(&device)?;

        let mesh = builtin_quads();
        info!(
            "mesh ready: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );

        let vertex_buffer = upload_buffer(
            &device,
            command_pool,
            mesh.vertex_bytes(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = upload_buffer(
            &device,
            command_pool,
            mesh.index_bytes(),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        let msaa_samples = device.max_sample_count();
        info!("multisampling: {:?}", msaa_samples);

        let pixels = builtin_texture();
        let texture = Texture::from_pixels(
            &device,
            command_pool,
            &pixels.pixels,
            pixels.width,
            pixels.height,
        )?;
        let sampler = create_sampler(&device, texture.mip_levels)?;

        let now = Instant::now();
        Ok(Self {
            device,
            command_pool,
            descriptor_set_layout,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            texture,
            sampler,
            generation: None,
            preferred_present_mode,
            clear_color,
            msaa_samples,
            extent_hint: initial_extent,
            needs_rebuild: false,
            minimized: initial_extent.0 == 0 || initial_extent.1 == 0,
            start_time: now,
            fps: FpsCounter::new(now),
        })
    }

    /// Record the window's new framebuffer size. A zero dimension means
    /// the window is minimized and frames are skipped until it grows back.
    pub fn note_resized(&mut self, width: u32, height: u32) {
        self.extent_hint = (width, height);
        self.minimized = width == 0 || height == 0;
        if !self.minimized {
            self.needs_rebuild = true;
        }
    }

    /// Drive one frame through the acquire-submit-present protocol.
    /// Out-of-date or suboptimal swapchains are rebuilt here; any other
    /// device error propagates to the caller as fatal.
    pub fn render_frame(&mut self) -> RenderResult<FrameReport> {
        if self.minimized {
            return Ok(FrameReport::default());
        }

        if self.needs_rebuild || self.generation.is_none() {
            self.rebuild_generation()?;
        }
        let gen = self
            .generation
            .as_mut()
            .ok_or(ash::vk::Result::ERROR_INITIALIZATION_FAILED)?;

        // rotate to the next semaphore slot before acquiring
        let (image_available, render_finished) = gen.frames.acquire_slot();

        let (image_index, status) = gen.swapchain.acquire_next_image(image_available)?;
        match classify_acquire(status) {
            AcquireAction::Render => {}
            AcquireAction::RenderThenRebuild => self.needs_rebuild = true,
            AcquireAction::SkipAndRebuild => {
                self.needs_rebuild = true;
                return Ok(FrameReport::default());
            }
        }

        // the image's previous submission must retire before its command
        // buffer and uniform buffer are touched again
        gen.frames.wait_and_reset_image_fence(image_index)?;

        let elapsed = self.start_time.elapsed().as_secs_f32();
        gen.write_uniform(image_index, elapsed);

        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [gen.command_buffers[image_index as usize]];
        let signal_semaphores = [render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                gen.frames.image_fence(image_index),
            )?;
        }

        let present_status =
            gen.swapchain
                .present(self.device.present_queue, image_index, render_finished)?;

        if present_status != SwapchainStatus::Optimal {
            self.needs_rebuild = true;
        }

        let fps = self.fps.tick(Instant::now());
        Ok(FrameReport {
            rendered: true,
            fps,
        })
    }

    fn rebuild_generation(&mut self) -> RenderResult<()> {
        self.device.wait_idle()?;
        self.generation = None;
        self.generation = Some(Generation::new(
            self.device.clone(),
            self.command_pool,
            self.descriptor_set_layout,
            self.preferred_present_mode,
            self.extent_hint,
            self.clear_color,
            self.msaa_samples,
            &self.vertex_buffer,
            &self.index_buffer,
            self.index_count,
            self.texture.view,
            self.sampler,
        )?);
        self.needs_rebuild = false;
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if self.device.wait_idle().is_err() {
            // device lost; destruction calls below are all we can do
        }
        self.generation = None;
        unsafe {
            self.device.device.destroy_sampler(self.sampler, None);
        }
        self.texture.destroy(&self.device);
        self.index_buffer.destroy(&self.device);
        self.vertex_buffer.destroy(&self.device);
        unsafe {
            self.device
                .device
                .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            self.device
                .device
                .destroy_command_pool(self.command_pool, None);
        }
    }
}

fn create_descriptor_pool(
    device: &DeviceContext,
    image_count: u32,
) -> RenderResult<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: image_count,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: image_count,
        },
    ];

    let pool_info = vk::DescriptorPoolCreateInfo::builder()
        .pool_sizes(&pool_sizes)
        .max_sets(image_count);

    let pool = unsafe { device.device.create_descriptor_pool(&pool_info, None)? };
    Ok(pool)
}

fn allocate_descriptor_sets(
    device: &DeviceContext,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
    uniform_buffers: &[Buffer],
    texture_view: vk::ImageView,
    sampler: vk::Sampler,
) -> RenderResult<Vec<vk::DescriptorSet>> {
    let layouts = vec![layout; uniform_buffers.len()];
    let alloc_info = vk::DescriptorSetAllocateInfo::builder()
        .descriptor_pool(pool)
        .set_layouts(&layouts);

    let sets = unsafe { device.device.allocate_descriptor_sets(&alloc_info)? };

    for (set, buffer) in sets.iter().zip(uniform_buffers) {
        let buffer_info = vk::DescriptorBufferInfo {
            buffer: buffer.buffer,
            offset: 0,
            range: std::mem::size_of::<UniformData>() as vk::DeviceSize,
        };
        let image_info = vk::DescriptorImageInfo {
            sampler,
            image_view: texture_view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };

        let buffer_infos = [buffer_info];
        let image_infos = [image_info];
        let writes = [
            vk::WriteDescriptorSet::builder()
                .dst_set(*set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_infos)
                .build(),
            vk::WriteDescriptorSet::builder()
                .dst_set(*set)
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&image_infos)
                .build(),
        ];

        unsafe { device.device.update_descriptor_sets(&writes, &[]) };
    }

    Ok(sets)
}

#[allow(clippy::too_many_arguments)]
fn record_command_buffers(
    device: &DeviceContext,
    command_pool: vk::CommandPool,
    render_pass: vk::RenderPass,
    framebuffers: &[vk::Framebuffer],
    extent: vk::Extent2D,
    clear_color: [f32; 4],
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    descriptor_sets: &[vk::DescriptorSet],
    vertex_buffer: vk::Buffer,
    index_buffer: vk::Buffer,
    index_count: u32,
) -> RenderResult<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(framebuffers.len() as u32);

    let command_buffers = unsafe { device.device.allocate_command_buffers(&alloc_info)? };
    if let Err(e) = record_into(
        device,
        &command_buffers,
        render_pass,
        framebuffers,
        extent,
        clear_color,
        pipeline,
        pipeline_layout,
        descriptor_sets,
        vertex_buffer,
        index_buffer,
        index_count,
    ) {
        unsafe {
            device
                .device
                .free_command_buffers(command_pool, &command_buffers);
        }
        return Err(e);
    }

    Ok(command_buffers)
}

#[allow(clippy::too_many_arguments)]
fn record_into(
    device: &DeviceContext,
    command_buffers: &[vk::CommandBuffer],
    render_pass: vk::RenderPass,
    framebuffers: &[vk::Framebuffer],
    extent: vk::Extent2D,
    clear_color: [f32; 4],
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,
    descriptor_sets: &[vk::DescriptorSet],
    vertex_buffer: vk::Buffer,
    index_buffer: vk::Buffer,
    index_count: u32,
) -> RenderResult<()> {
    let clear_values = [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ];

    for (i, (&cmd, &framebuffer)) in command_buffers.iter().zip(framebuffers).enumerate() {
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            device.device.begin_command_buffer(cmd, &begin_info)?;
        }

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.device.cmd_begin_render_pass(
                cmd,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
            device
                .device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
            device
                .device
                .cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer], &[0]);
            device
                .device
                .cmd_bind_index_buffer(cmd, index_buffer, 0, vk::IndexType::UINT32);
            device.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout,
                0,
                &[descriptor_sets[i]],
                &[],
            );
            device.device.cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0);
            device.device.cmd_end_render_pass(cmd);
            device.device.end_command_buffer(cmd)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_counter_holds_until_window_closes() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        assert!(counter.tick(start + Duration::from_millis(100)).is_none());
        assert!(counter.tick(start + Duration::from_millis(500)).is_none());
    }

    #[test]
    fn fps_counter_emits_sample_and_resets() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        for i in 1..=59 {
            assert!(counter
                .tick(start + Duration::from_millis(i * 16))
                .is_none());
        }
        let sample = counter
            .tick(start + Duration::from_secs(1))
            .expect("window closed");
        assert_eq!(sample.frames, 60);
        assert!((sample.fps - 60.0).abs() < 0.5);

        // next window starts fresh
        assert!(counter
            .tick(start + Duration::from_millis(1100))
            .is_none());
    }

    #[test]
    fn model_rotation_completes_in_four_seconds() {
        let full_turn = model_matrix(4.0);
        let identity = Mat4::IDENTITY;
        for (a, b) in full_turn
            .to_cols_array()
            .iter()
            .zip(identity.to_cols_array().iter())
        {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn suboptimal_acquire_renders_then_rebuilds() {
        assert_eq!(
            classify_acquire(SwapchainStatus::Suboptimal),
            AcquireAction::RenderThenRebuild
        );
    }

    #[test]
    fn out_of_date_acquire_skips_the_frame() {
        assert_eq!(
            classify_acquire(SwapchainStatus::OutOfDate),
            AcquireAction::SkipAndRebuild
        );
        assert_eq!(
            classify_acquire(SwapchainStatus::Optimal),
            AcquireAction::Render
        );
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let proj = projection_matrix(vk::Extent2D {
            width: 800,
            height: 600,
        });
        assert!(proj.y_axis.y < 0.0);
    }
}
