// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Context, Result};
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{vk, Entry, Instance};
use lumen_math::Mat4;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::info;

use crate::device::{ChainDevice, FrameDevice};
use crate::pipeline::{self, COLORS_OFFSET, POSITIONS_OFFSET};

/// Instance-level objects. Dropped after the device.
struct SurfaceContext {
    entry: Entry,
    instance: Instance,
    loader: surface::Instance,
    surface: vk::SurfaceKHR,
}

impl Drop for SurfaceContext {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Device, queue and everything that lives as long as the device.
///
/// Handles are filled in one by one during bring-up and start out null, so a
/// failure part-way releases exactly what was created.
pub struct Gpu {
    device: ash::Device,
    phys: vk::PhysicalDevice,
    queue_family: u32,
    queue: vk::Queue,
    swapchain_loader: swapchain::Device,
    format: vk::SurfaceFormatKHR,

    render_pass: vk::RenderPass,
    set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    desc_pool: vk::DescriptorPool,
    desc_set: vk::DescriptorSet,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    map: *mut u8,
    cmd_pool: vk::CommandPool,

    clear: vk::ClearValue,
    ctx: SurfaceContext,
}

impl Drop for Gpu {
    fn drop(&mut self) {
        unsafe {
            let d = &self.device;
            d.device_wait_idle().ok();

            d.destroy_pipeline(self.pipeline, None);
            d.destroy_pipeline_layout(self.pipeline_layout, None);
            d.destroy_descriptor_pool(self.desc_pool, None);
            d.destroy_descriptor_set_layout(self.set_layout, None);
            d.destroy_buffer(self.buffer, None);
            d.free_memory(self.memory, None);
            d.destroy_command_pool(self.cmd_pool, None);
            d.destroy_render_pass(self.render_pass, None);
            d.destroy_device(None);
        }
    }
}

fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_UNORM
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

unsafe fn create_instance(entry: &Entry, display_raw: RawDisplayHandle) -> Result<Instance> {
    let app_name = c"lumen";

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app_name.as_ptr(),
        application_version: 0,
        p_engine_name: app_name.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_1,
        ..Default::default()
    };

    let ext_slice = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?;
    let ext_vec = ext_slice.to_vec();

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_vec.len() as u32,
        pp_enabled_extension_names: ext_vec.as_ptr(),
        ..Default::default()
    };

    Ok(entry.create_instance(&create_info, None)?)
}

unsafe fn pick_device_and_queue(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32)> {
    let devices = instance
        .enumerate_physical_devices()
        .context("enumerate_physical_devices")?;
    if devices.is_empty() {
        return Err(anyhow!("no Vulkan devices found"));
    }
    for phys in devices {
        let qprops = instance.get_physical_device_queue_family_properties(phys);
        for (i, q) in qprops.iter().enumerate() {
            if q.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && surface_loader
                    .get_physical_device_surface_support(phys, i as u32, surface)
                    .unwrap_or(false)
            {
                return Ok((phys, i as u32));
            }
        }
    }
    Err(anyhow!("no suitable physical device/queue family"))
}

impl Gpu {
    /// Bring up the instance, the Wayland surface, the device and the draw
    /// resources.
    ///
    /// # Safety
    /// The handles must stay valid for as long as the returned `Gpu` lives.
    pub unsafe fn new(
        display: RawDisplayHandle,
        window: RawWindowHandle,
        clear_color: [f32; 4],
    ) -> Result<Self> {
        // STRICT ORDER:
        // 1) instance with the platform WSI extensions
        // 2) surface from THIS instance
        // 3) physical device + queue family that can present to that surface
        // 4) logical device, then device-level objects
        let entry = Entry::linked();
        let instance = create_instance(&entry, display).context("create_instance")?;
        let loader = surface::Instance::new(&entry, &instance);
        let mut ctx = SurfaceContext {
            entry,
            instance,
            loader,
            surface: vk::SurfaceKHR::null(),
        };
        ctx.surface = ash_window::create_surface(&ctx.entry, &ctx.instance, display, window, None)
            .context("ash_window::create_surface")?;

        let (phys, queue_family) = pick_device_and_queue(&ctx.instance, &ctx.loader, ctx.surface)?;

        let priorities = [1.0_f32];
        let qinfo = vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: queue_family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        };
        let device_exts = [swapchain::NAME.as_ptr()];
        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: 1,
            p_queue_create_infos: &qinfo,
            enabled_extension_count: device_exts.len() as u32,
            pp_enabled_extension_names: device_exts.as_ptr(),
            ..Default::default()
        };
        let device = ctx
            .instance
            .create_device(phys, &dinfo, None)
            .context("create_device")?;
        let queue = device.get_device_queue(queue_family, 0);
        let swapchain_loader = swapchain::Device::new(&ctx.instance, &device);

        let mut gpu = Gpu {
            device,
            phys,
            queue_family,
            queue,
            swapchain_loader,
            format: vk::SurfaceFormatKHR::default(),
            render_pass: vk::RenderPass::null(),
            set_layout: vk::DescriptorSetLayout::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            desc_pool: vk::DescriptorPool::null(),
            desc_set: vk::DescriptorSet::null(),
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
            map: std::ptr::null_mut(),
            cmd_pool: vk::CommandPool::null(),
            clear: vk::ClearValue {
                color: vk::ClearColorValue { float32: clear_color },
            },
            ctx,
        };
        gpu.init_draw_resources()?;
        Ok(gpu)
    }

    unsafe fn init_draw_resources(&mut self) -> Result<()> {
        let formats = self
            .ctx
            .loader
            .get_physical_device_surface_formats(self.phys, self.ctx.surface)
            .context("get_physical_device_surface_formats")?;
        self.format = choose_surface_format(&formats)
            .ok_or_else(|| anyhow!("surface reports no formats"))?;

        self.render_pass = pipeline::create_render_pass(&self.device, self.format.format)?;
        self.set_layout = pipeline::create_spin_set_layout(&self.device)?;
        (self.pipeline_layout, self.pipeline) =
            pipeline::create_pipeline(&self.device, self.render_pass, self.set_layout)?;

        let mem_props = self
            .ctx
            .instance
            .get_physical_device_memory_properties(self.phys);
        let spin = pipeline::create_spin_buffer(&self.device, &mem_props)?;
        self.buffer = spin.buffer;
        self.memory = spin.memory;
        self.map = spin.map;
        (self.desc_pool, self.desc_set) =
            pipeline::create_spin_descriptor(&self.device, self.set_layout, self.buffer)?;

        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: self.queue_family,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        self.cmd_pool = self
            .device
            .create_command_pool(&pool_info, None)
            .context("create_command_pool")?;

        info!("vk: surface format {:?}", self.format.format);
        Ok(())
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub unsafe fn supported_present_modes(&self) -> Result<Vec<vk::PresentModeKHR>> {
        self.ctx
            .loader
            .get_physical_device_surface_present_modes(self.phys, self.ctx.surface)
            .context("get_physical_device_surface_present_modes")
    }

    pub unsafe fn wait_idle(&self) {
        self.device.device_wait_idle().ok();
    }
}

impl ChainDevice for Gpu {
    fn surface(&self) -> vk::SurfaceKHR {
        self.ctx.surface
    }

    fn queue_family(&self) -> u32 {
        self.queue_family
    }

    unsafe fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.ctx
            .loader
            .get_physical_device_surface_capabilities(self.phys, self.ctx.surface)
    }

    unsafe fn surface_supported(&self) -> VkResult<bool> {
        self.ctx
            .loader
            .get_physical_device_surface_support(self.phys, self.queue_family, self.ctx.surface)
    }

    unsafe fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        self.swapchain_loader.create_swapchain(info, None)
    }

    unsafe fn destroy_swapchain(&self, chain: vk::SwapchainKHR) {
        self.swapchain_loader.destroy_swapchain(chain, None);
    }

    unsafe fn swapchain_images(&self, chain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.swapchain_loader.get_swapchain_images(chain)
    }

    unsafe fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
    ) -> VkResult<vk::ImageView> {
        let sub = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let iv_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: sub,
            ..Default::default()
        };
        self.device.create_image_view(&iv_info, None)
    }

    unsafe fn destroy_image_view(&self, view: vk::ImageView) {
        self.device.destroy_image_view(view, None);
    }

    unsafe fn create_framebuffer(
        &self,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let fb_info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass: self.render_pass,
            attachment_count: 1,
            p_attachments: &view,
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        self.device.create_framebuffer(&fb_info, None)
    }

    unsafe fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.device.destroy_framebuffer(framebuffer, None);
    }

    unsafe fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags,
            ..Default::default()
        };
        self.device.create_fence(&ci, None)
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        self.device.destroy_fence(fence, None);
    }

    unsafe fn allocate_command_buffer(&self) -> VkResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.cmd_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        self.device
            .allocate_command_buffers(&alloc_info)?
            .first()
            .copied()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    unsafe fn free_command_buffer(&self, cmd: vk::CommandBuffer) {
        self.device.free_command_buffers(self.cmd_pool, &[cmd]);
    }

    unsafe fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        self.device
            .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
    }

    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.device.destroy_semaphore(semaphore, None);
    }
}

impl FrameDevice for Gpu {
    unsafe fn acquire_next_image(
        &self,
        chain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.swapchain_loader
            .acquire_next_image(chain, u64::MAX, signal, vk::Fence::null())
    }

    unsafe fn wait_and_reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.device.wait_for_fences(&[fence], true, u64::MAX)?;
        self.device.reset_fences(&[fence])
    }

    unsafe fn write_rotation(&self, rotation: &Mat4) {
        pipeline::write_bytes(self.map, 0, bytemuck::bytes_of(rotation));
    }

    unsafe fn record_draw(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) -> VkResult<()> {
        let d = &self.device;
        d.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        d.begin_command_buffer(cmd, &begin)?;

        let clears = [self.clear];
        let area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.render_pass,
            framebuffer,
            render_area: area,
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        d.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);

        d.cmd_bind_vertex_buffers(
            cmd,
            0,
            &[self.buffer, self.buffer],
            &[POSITIONS_OFFSET, COLORS_OFFSET],
        );
        d.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
        d.cmd_bind_descriptor_sets(
            cmd,
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline_layout,
            0,
            &[self.desc_set],
            &[],
        );
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        d.cmd_set_viewport(cmd, 0, &[viewport]);
        d.cmd_set_scissor(cmd, 0, &[area]);
        d.cmd_draw(cmd, 3, 1, 0, 0);

        d.cmd_end_render_pass(cmd);
        d.end_command_buffer(cmd)
    }

    unsafe fn submit(
        &self,
        cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<()> {
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &signal,
            ..Default::default()
        };
        self.device
            .queue_submit(self.queue, std::slice::from_ref(&submit), fence)
    }

    unsafe fn present(
        &self,
        chain: vk::SwapchainKHR,
        index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &chain,
            p_image_indices: &index,
            ..Default::default()
        };
        self.swapchain_loader.queue_present(self.queue, &present)
    }

    unsafe fn drain_queue(&self) -> VkResult<()> {
        self.device.queue_wait_idle(self.queue)
    }
}
