//! Renderer orchestration and the per-frame state machine
//!
//! Owns the context, swapchain, command pool, per-slot synchronization, and
//! every drawable. `draw_frame` walks one frame through
//! wait → acquire → record → submit → present, advancing the frame slot
//! only when a frame was actually submitted. A stale acquire recreates the
//! swapchain and leaves both the fence and the slot untouched, so the next
//! iteration retries the same slot safely.

use crate::config::RenderConfig;
use crate::foundation::math::{normal_matrix, Mat4, Vec3};
use crate::overlay::DebugOverlay;
use crate::render::vulkan::buffer::UniformBuffer;
use crate::render::vulkan::commands::{CommandPool, CommandRecorder};
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::descriptor::{
    light_cube_layout, lit_object_layout, DescriptorLayout, DescriptorPool,
};
use crate::render::vulkan::dynamic_uniform::DynamicUniformArena;
use crate::render::vulkan::swapchain::{SurfaceStatus, Swapchain};
use crate::render::vulkan::sync::FrameSync;
use crate::render::vulkan::texture::Texture2D;
use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::scene::mesh::Mesh;
use crate::scene::object::{LightCube, LitObject};
use crate::window::Window;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use slotmap::{new_key_type, SlotMap};
use std::path::Path;

new_key_type! {
    /// Stable handle to a lit object owned by the renderer
    pub struct ObjectKey;
}

/// Per-frame scene uniforms shared by every lit object
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneUbo {
    /// World-space point light position (w unused)
    pub light_pos: [f32; 4],
    /// World-space camera position (w unused)
    pub view_pos: [f32; 4],
    /// Combined view-projection matrix
    pub view_proj: [[f32; 4]; 4],
}

unsafe impl Pod for SceneUbo {}
unsafe impl Zeroable for SceneUbo {}

/// Uniforms for the unlit light-cube indicator
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, Default)]
pub struct LightCubeUbo {
    /// Full model-view-projection matrix
    pub transform: [[f32; 4]; 4],
}

unsafe impl Pod for LightCubeUbo {}
unsafe impl Zeroable for LightCubeUbo {}

/// What `draw_frame` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was recorded, submitted, and queued for presentation
    Rendered,
    /// The surface was stale; the swapchain was rebuilt and no frame was
    /// submitted
    Skipped,
}

/// Round-robin frame slot counter.
///
/// Advances only on submitted frames; a skipped frame retries the same
/// slot, whose fence is still signaled from its previous use.
#[derive(Debug, Clone, Copy)]
pub struct FrameSlots {
    current: usize,
    max: usize,
}

impl FrameSlots {
    pub fn new(max_frames_in_flight: usize) -> Self {
        Self {
            current: 0,
            max: max_frames_in_flight.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.max;
    }
}

fn mat_array(mat: &Mat4) -> [[f32; 4]; 4] {
    let mut out = [[0.0; 4]; 4];
    for column in 0..4 {
        for row in 0..4 {
            out[column][row] = mat[(row, column)];
        }
    }
    out
}

/// Top-level renderer: one swapchain, one frame loop, a set of drawables
pub struct Renderer {
    // Field order is drop order: GPU resources first, the pools and chain
    // they came from next, the device last.
    overlay: Option<Box<dyn DebugOverlay>>,
    objects: SlotMap<ObjectKey, LitObject>,
    light_cube: Option<LightCube>,
    scene_ubos: Vec<UniformBuffer<SceneUbo>>,
    dynamic_arena: DynamicUniformArena,
    lit_layout: DescriptorLayout,
    light_layout: DescriptorLayout,
    descriptor_pool: DescriptorPool,
    sync: Vec<FrameSync>,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,
    swapchain: Swapchain,
    context: VulkanContext,

    frame_slots: FrameSlots,
    scene_data: SceneUbo,
    light_cube_model: Mat4,
    view_proj: Mat4,
    next_instance: usize,
    resize_requested: bool,
}

impl Renderer {
    /// Build the renderer against an existing window. `max_instances` sizes
    /// the dynamic uniform arena; `add_lit_object` consumes one slot each.
    pub fn new(
        window: &mut Window,
        config: &RenderConfig,
        max_instances: usize,
    ) -> VulkanResult<Self> {
        let context = VulkanContext::new(window, config)?;
        let swapchain = Swapchain::new(&context, window)?;
        let device = context.device().handle().clone();
        let frames = config.max_frames_in_flight;

        let command_pool = CommandPool::new(device.clone(), context.device().graphics_family())?;
        let command_buffers = command_pool.allocate_primary(frames as u32)?;

        let mut sync = Vec::with_capacity(frames);
        for _ in 0..frames {
            sync.push(FrameSync::new(&device)?);
        }

        let min_alignment = context
            .physical_device()
            .min_uniform_buffer_offset_alignment();
        let dynamic_arena = DynamicUniformArena::new(
            &device,
            &context.physical_device().memory_properties,
            min_alignment,
            max_instances,
            frames,
        )?;

        let mut scene_ubos = Vec::with_capacity(frames);
        for _ in 0..frames {
            scene_ubos.push(UniformBuffer::new(
                device.clone(),
                &context.physical_device().memory_properties,
            )?);
        }

        // Sets: one per frame slot per lit object, plus the light cube.
        let max_sets = ((max_instances + 1) * frames) as u32;
        let descriptor_pool = DescriptorPool::new(device.clone(), max_sets)?;
        let lit_layout = lit_object_layout(&device)?;
        let light_layout = light_cube_layout(&device)?;

        log::info!(
            "Renderer ready: {} frames in flight, arena capacity {}, {} swapchain images",
            frames,
            max_instances,
            swapchain.image_count()
        );

        Ok(Self {
            overlay: None,
            objects: SlotMap::with_key(),
            light_cube: None,
            scene_ubos,
            dynamic_arena,
            lit_layout,
            light_layout,
            descriptor_pool,
            sync,
            command_buffers,
            command_pool,
            swapchain,
            context,
            frame_slots: FrameSlots::new(frames),
            scene_data: SceneUbo::default(),
            light_cube_model: Mat4::identity(),
            view_proj: Mat4::identity(),
            next_instance: 0,
            resize_requested: false,
        })
    }

    /// Decode an image file into a mipmapped, sampled texture.
    pub fn load_texture(&self, path: &Path) -> VulkanResult<Texture2D> {
        Texture2D::from_file(&self.context, &self.command_pool, path)
    }

    /// Upload raw RGBA8 pixels as a mipmapped, sampled texture.
    pub fn create_texture_rgba8(
        &self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> VulkanResult<Texture2D> {
        Texture2D::from_rgba8(&self.context, &self.command_pool, width, height, pixels)
    }

    /// Create a lit, textured drawable and hand back its key. Consumes one
    /// instance slot in the dynamic uniform arena.
    pub fn add_lit_object(
        &mut self,
        mesh: &Mesh,
        diffuse: Texture2D,
        specular: Texture2D,
        vertex_shader: &Path,
        fragment_shader: &Path,
    ) -> VulkanResult<ObjectKey> {
        if self.next_instance >= self.dynamic_arena.instance_count() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Instance arena is full ({} slots)",
                    self.dynamic_arena.instance_count()
                ),
            });
        }
        let instance_index = self.next_instance;

        let object = LitObject::new(
            &self.context,
            &self.command_pool,
            &self.descriptor_pool,
            &self.lit_layout,
            self.swapchain.render_pass(),
            &self.scene_ubos,
            &self.dynamic_arena,
            mesh,
            diffuse,
            specular,
            vertex_shader,
            fragment_shader,
            instance_index,
        )?;
        self.next_instance += 1;
        Ok(self.objects.insert(object))
    }

    /// Install the single unlit light indicator.
    pub fn set_light_cube(
        &mut self,
        mesh: &Mesh,
        vertex_shader: &Path,
        fragment_shader: &Path,
    ) -> VulkanResult<()> {
        let cube = LightCube::new(
            &self.context,
            &self.command_pool,
            &self.descriptor_pool,
            &self.light_layout,
            self.swapchain.render_pass(),
            mesh,
            vertex_shader,
            fragment_shader,
            self.frame_slots.max(),
        )?;
        self.light_cube = Some(cube);
        Ok(())
    }

    pub fn set_overlay(&mut self, overlay: Box<dyn DebugOverlay>) {
        self.overlay = Some(overlay);
    }

    /// Stage one object's transform for the next frame.
    pub fn set_object_transform(&mut self, key: ObjectKey, model: Mat4) -> VulkanResult<()> {
        let object = self
            .objects
            .get(key)
            .ok_or_else(|| VulkanError::ResourceNotFound("lit object".to_string()))?;
        let normal = normal_matrix(&model);
        self.dynamic_arena
            .write_instance(object.instance_index(), &model, &normal)
    }

    pub fn set_light_cube_transform(&mut self, model: Mat4) {
        self.light_cube_model = model;
    }

    /// Stage the per-frame scene uniforms.
    pub fn update_scene(&mut self, light_pos: Vec3, view_pos: Vec3, view_proj: Mat4) {
        self.scene_data = SceneUbo {
            light_pos: [light_pos.x, light_pos.y, light_pos.z, 1.0],
            view_pos: [view_pos.x, view_pos.y, view_pos.z, 1.0],
            view_proj: mat_array(&view_proj),
        };
        self.view_proj = view_proj;
    }

    /// Note a window resize; the swapchain is rebuilt after the next
    /// presented frame.
    pub fn notify_resize(&mut self) {
        self.resize_requested = true;
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.aspect_ratio()
    }

    /// Block until the GPU finishes all in-flight work. Called before
    /// shutdown so drawables can be dropped safely.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.device().wait_idle()
    }

    /// Run one frame through the lifecycle.
    pub fn draw_frame(
        &mut self,
        window: &mut Window,
        delta_seconds: f32,
    ) -> VulkanResult<FrameOutcome> {
        let slot = self.frame_slots.current();

        // Backpressure: the slot's previous submission must retire before
        // its command buffer and uniform regions are reused.
        self.sync[slot].in_flight.wait(u64::MAX)?;

        let image_index = match self
            .swapchain
            .acquire_next_image(self.sync[slot].image_available.handle())?
        {
            SurfaceStatus::Ready(index) => index,
            SurfaceStatus::Stale => {
                // The fence stays signaled and the slot index stays put;
                // resetting here with no submission to re-signal it would
                // deadlock the next wait.
                self.swapchain.recreate(&self.context, window)?;
                return Ok(FrameOutcome::Skipped);
            }
        };

        self.sync[slot].in_flight.reset()?;

        // Publish this slot's uniforms.
        self.scene_ubos[slot].write(&self.scene_data)?;
        self.dynamic_arena.publish(slot)?;
        if let Some(light) = &self.light_cube {
            let mvp = self.view_proj * self.light_cube_model;
            light.write_transform(slot, &LightCubeUbo {
                transform: mat_array(&mvp),
            })?;
        }

        if let Some(overlay) = self.overlay.as_mut() {
            overlay.begin_frame(delta_seconds);
        }

        let device = self.context.device().handle();
        let recorder = CommandRecorder::begin(device, self.command_buffers[slot])?;
        {
            let pass = self.swapchain.begin_render_pass(&recorder, image_index);
            for object in self.objects.values() {
                pass.bind_pipeline(object.pipeline().handle());
                pass.bind_vertex_buffer(object.vertex_buffer().handle());
                pass.bind_index_buffer(object.index_buffer().handle());
                pass.bind_descriptor_set(
                    object.pipeline().layout(),
                    object.descriptor_set(slot),
                    &[self.dynamic_arena.dynamic_offset(object.instance_index())],
                );
                pass.draw_indexed(object.index_buffer().index_count());
            }
            if let Some(light) = &self.light_cube {
                pass.bind_pipeline(light.pipeline().handle());
                pass.bind_vertex_buffer(light.vertex_buffer().handle());
                pass.bind_index_buffer(light.index_buffer().handle());
                pass.bind_descriptor_set(
                    light.pipeline().layout(),
                    light.descriptor_set(slot),
                    &[],
                );
                pass.draw_indexed(light.index_buffer().index_count());
            }
            // Overlay draws last, on top of the scene.
            if let Some(overlay) = self.overlay.as_mut() {
                overlay.record(recorder.handle());
            }
        }
        let command_buffer = recorder.end()?;

        let wait_semaphores = [self.sync[slot].image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync[slot].render_finished.handle()];
        let buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            device.queue_submit(
                self.context.device().graphics_queue(),
                &[submit_info.build()],
                self.sync[slot].in_flight.handle(),
            )
        }
        .map_err(VulkanError::Api)?;

        let status = self.swapchain.present(
            self.context.device().present_queue(),
            self.sync[slot].render_finished.handle(),
            image_index,
        )?;
        if status == SurfaceStatus::Stale || self.resize_requested {
            self.resize_requested = false;
            self.swapchain.recreate(&self.context, window)?;
        }

        // Submission happened, so the slot's fence will re-signal; the
        // round-robin may move on.
        self.frame_slots.advance();
        Ok(FrameOutcome::Rendered)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.context.device().wait_idle() {
            log::error!("wait_idle failed during renderer teardown: {}", e);
        }
        log::info!("Renderer shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_cycle_round_robin() {
        let mut slots = FrameSlots::new(2);
        let observed: Vec<usize> = (0..6)
            .map(|_| {
                let s = slots.current();
                slots.advance();
                s
            })
            .collect();
        assert_eq!(observed, [0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn steady_state_thousand_frames() {
        let mut slots = FrameSlots::new(2);
        for _ in 0..1000 {
            slots.advance();
        }
        assert_eq!(slots.current(), 1000 % 2);
    }

    #[test]
    fn skipped_frame_does_not_advance() {
        // Model the draw_frame control flow: a stale acquire returns before
        // the advance, so the same slot is retried.
        let mut slots = FrameSlots::new(3);
        let schedule = [true, true, false, true, false, false, true];
        let mut observed = Vec::new();
        for &acquired in &schedule {
            observed.push(slots.current());
            if acquired {
                slots.advance();
            }
        }
        assert_eq!(observed, [0, 1, 2, 2, 0, 0, 0]);
    }

    /// Pure model of one slot's fence through the frame lifecycle,
    /// mirroring the ordering draw_frame enforces.
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum FenceState {
        Signaled,
        Waited,
        Reset,
        Submitted,
    }

    struct SlotModel {
        state: FenceState,
    }

    impl SlotModel {
        fn new() -> Self {
            // Fences are created signaled.
            Self {
                state: FenceState::Signaled,
            }
        }

        fn wait(&mut self) {
            assert!(
                matches!(self.state, FenceState::Signaled | FenceState::Submitted),
                "waited on a fence that cannot signal: {:?}",
                self.state
            );
            self.state = FenceState::Waited;
        }

        fn reset(&mut self) {
            assert_eq!(self.state, FenceState::Waited, "reset before wait");
            self.state = FenceState::Reset;
        }

        fn submit(&mut self) {
            assert_eq!(self.state, FenceState::Reset, "submit before reset");
            self.state = FenceState::Submitted;
        }

        fn stale_acquire_bailout(&mut self) {
            // No reset happened; the slot must still be waitable.
            assert_eq!(self.state, FenceState::Waited);
            self.state = FenceState::Signaled;
        }
    }

    #[test]
    fn fence_transitions_alternate_strictly() {
        let mut slots = FrameSlots::new(2);
        let mut fences = [SlotModel::new(), SlotModel::new()];
        // Frames 2 and 5 hit a stale acquire.
        for frame in 0..8 {
            let slot = slots.current();
            fences[slot].wait();
            let stale = frame == 2 || frame == 5;
            if stale {
                fences[slot].stale_acquire_bailout();
                continue;
            }
            fences[slot].reset();
            fences[slot].submit();
            slots.advance();
        }
        // Every slot ends in a waitable state.
        for fence in &fences {
            assert!(matches!(
                fence.state,
                FenceState::Signaled | FenceState::Submitted
            ));
        }
    }

    #[test]
    fn scene_ubo_layout_is_shader_compatible() {
        // std140: two vec4s then a mat4, 96 bytes, 16-byte aligned.
        assert_eq!(std::mem::size_of::<SceneUbo>(), 96);
        assert_eq!(std::mem::align_of::<SceneUbo>(), 16);
        assert_eq!(std::mem::size_of::<LightCubeUbo>(), 64);
    }

    #[test]
    fn mat_array_is_column_major() {
        let mat = Mat4::new_translation(&Vec3::new(7.0, 8.0, 9.0));
        let cols = mat_array(&mat);
        // Translation lives in the last column.
        assert_eq!(cols[3][0], 7.0);
        assert_eq!(cols[3][1], 8.0);
        assert_eq!(cols[3][2], 9.0);
        assert_eq!(cols[0][0], 1.0);
    }
}
