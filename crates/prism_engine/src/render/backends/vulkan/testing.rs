//! Test doubles for the device, resource, recording and presentation seams
//!
//! Compiled for tests only.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ash::vk;
use ash::vk::Handle;
use slotmap::{Key, SlotMap};

use super::commands::CommandSink;
use super::descriptors::{DescriptorWrite, LayoutBinding};
use super::pipeline::PipelineConfig;
use super::resources::registry::not_found;
use super::resources::{BufferHandle, GpuResources, MeshDraw, MeshHandle};
use super::{GpuDevice, VulkanError, VulkanResult};
use crate::render::renderer::{AcquireOutcome, PresentOutcome, PresentationBackend};

/// Counters of device calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    pub shader_modules_created: usize,
    pub shader_modules_destroyed: usize,
    pub layouts_created: usize,
    pub layouts_destroyed: usize,
    pub pipeline_layouts_created: usize,
    pub pipeline_layouts_destroyed: usize,
    pub pipelines_created: usize,
    pub pipelines_destroyed: usize,
    pub pools_created: usize,
    pub pools_reset: usize,
    pub pools_destroyed: usize,
    pub sets_allocated: usize,
}

#[derive(Default)]
struct MockState {
    stats: MockStats,
    pool_usage: HashMap<u64, (u32, u32)>,
    layout_bindings: HashMap<u64, Vec<LayoutBinding>>,
    pipeline_layouts: HashMap<u64, Vec<vk::DescriptorSetLayout>>,
    pipeline_configs: Vec<PipelineConfig>,
    writes: Vec<DescriptorWrite>,
    fail_next_allocation: Option<vk::Result>,
    fail_reset: Option<usize>,
}

/// In-memory [`GpuDevice`] handing out unique fake handles
pub struct MockDevice {
    next_handle: AtomicU64,
    state: Mutex<MockState>,
}

impl MockDevice {
    /// Layout handle that never fits in any pool
    pub const OVERSIZED_LAYOUT: u64 = 0xDEAD;

    pub fn shared() -> Arc<Self> {
        Arc::new(Self {
            next_handle: AtomicU64::new(0x1000),
            state: Mutex::new(MockState::default()),
        })
    }

    pub fn stats(&self) -> MockStats {
        self.lock().stats
    }

    pub fn writes(&self) -> Vec<DescriptorWrite> {
        self.lock().writes.clone()
    }

    pub fn layout_bindings(&self, layout: vk::DescriptorSetLayout) -> Vec<LayoutBinding> {
        self.lock()
            .layout_bindings
            .get(&layout.as_raw())
            .cloned()
            .unwrap_or_default()
    }

    pub fn pipeline_layout_sets(&self, layout: vk::PipelineLayout) -> Vec<vk::DescriptorSetLayout> {
        self.lock()
            .pipeline_layouts
            .get(&layout.as_raw())
            .cloned()
            .unwrap_or_default()
    }

    pub fn pipeline_configs(&self) -> Vec<PipelineConfig> {
        self.lock().pipeline_configs.clone()
    }

    pub fn fail_next_allocation(&self, result: vk::Result) {
        self.lock().fail_next_allocation = Some(result);
    }

    /// Make the `nth` pool reset from now on (1-based) fail with device loss
    pub fn fail_reset_number(&self, nth: usize) {
        let mut state = self.lock();
        state.fail_reset = Some(state.stats.pools_reset + nth);
    }

    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl GpuDevice for MockDevice {
    fn create_shader_module(&self, code: &[u32]) -> VulkanResult<vk::ShaderModule> {
        if code.is_empty() {
            return Err(VulkanError::Api(vk::Result::ERROR_INITIALIZATION_FAILED));
        }
        self.lock().stats.shader_modules_created += 1;
        Ok(vk::ShaderModule::from_raw(self.handle()))
    }

    fn destroy_shader_module(&self, _module: vk::ShaderModule) {
        self.lock().stats.shader_modules_destroyed += 1;
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        let raw = self.handle();
        let mut state = self.lock();
        state.stats.layouts_created += 1;
        state.layout_bindings.insert(raw, bindings.to_vec());
        Ok(vk::DescriptorSetLayout::from_raw(raw))
    }

    fn destroy_descriptor_set_layout(&self, _layout: vk::DescriptorSetLayout) {
        self.lock().stats.layouts_destroyed += 1;
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<vk::PipelineLayout> {
        let raw = self.handle();
        let mut state = self.lock();
        state.stats.pipeline_layouts_created += 1;
        state.pipeline_layouts.insert(raw, set_layouts.to_vec());
        Ok(vk::PipelineLayout::from_raw(raw))
    }

    fn destroy_pipeline_layout(&self, _layout: vk::PipelineLayout) {
        self.lock().stats.pipeline_layouts_destroyed += 1;
    }

    fn create_graphics_pipeline(
        &self,
        config: &PipelineConfig,
        _vertex_module: vk::ShaderModule,
        _fragment_module: vk::ShaderModule,
        _layout: vk::PipelineLayout,
        _render_pass: vk::RenderPass,
    ) -> VulkanResult<vk::Pipeline> {
        let raw = self.handle();
        let mut state = self.lock();
        state.stats.pipelines_created += 1;
        state.pipeline_configs.push(config.clone());
        Ok(vk::Pipeline::from_raw(raw))
    }

    fn destroy_pipeline(&self, _pipeline: vk::Pipeline) {
        self.lock().stats.pipelines_destroyed += 1;
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        _pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VulkanResult<vk::DescriptorPool> {
        let raw = self.handle();
        let mut state = self.lock();
        state.stats.pools_created += 1;
        state.pool_usage.insert(raw, (max_sets, 0));
        Ok(vk::DescriptorPool::from_raw(raw))
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VulkanResult<()> {
        let mut state = self.lock();
        state.stats.pools_reset += 1;
        if state.fail_reset == Some(state.stats.pools_reset) {
            state.fail_reset = None;
            return Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST));
        }
        if let Some(usage) = state.pool_usage.get_mut(&pool.as_raw()) {
            usage.1 = 0;
        }
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut state = self.lock();
        state.stats.pools_destroyed += 1;
        state.pool_usage.remove(&pool.as_raw());
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, vk::Result> {
        let raw = self.handle();
        let mut state = self.lock();
        if let Some(result) = state.fail_next_allocation.take() {
            return Err(result);
        }
        if layout.as_raw() == Self::OVERSIZED_LAYOUT {
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }

        let usage = state
            .pool_usage
            .get_mut(&pool.as_raw())
            .ok_or(vk::Result::ERROR_UNKNOWN)?;
        if usage.1 >= usage.0 {
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }
        usage.1 += 1;
        state.stats.sets_allocated += 1;
        Ok(vk::DescriptorSet::from_raw(raw))
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        self.lock().writes.extend_from_slice(writes);
    }
}

/// [`GpuResources`] backed by plain byte vectors
#[derive(Default)]
pub struct MockResources {
    buffers: SlotMap<BufferHandle, Vec<u8>>,
    meshes: SlotMap<MeshHandle, u32>,
}

impl MockResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mesh that draws `index_count` indices
    pub fn add_mesh(&mut self, index_count: u32) -> MeshHandle {
        self.meshes.insert(index_count)
    }

    pub fn buffer_bytes(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(handle).map(Vec::as_slice)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }
}

fn fake_buffer<K: Key>(key: K, salt: u64) -> vk::Buffer {
    vk::Buffer::from_raw(key.data().as_ffi() ^ salt)
}

impl GpuResources for MockResources {
    fn create_uniform_buffer(&mut self, size: vk::DeviceSize) -> VulkanResult<BufferHandle> {
        Ok(self.buffers.insert(vec![0; size as usize]))
    }

    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, bytes: &[u8]) -> VulkanResult<()> {
        let buffer = self.buffers.get_mut(handle).ok_or_else(|| not_found(handle))?;
        let start = offset as usize;
        let end = start + bytes.len();
        if end > buffer.len() {
            return Err(VulkanError::invalid("write past end of mock buffer"));
        }
        buffer[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn buffer_info(&self, handle: BufferHandle) -> VulkanResult<vk::DescriptorBufferInfo> {
        let buffer = self.buffers.get(handle).ok_or_else(|| not_found(handle))?;
        Ok(vk::DescriptorBufferInfo {
            buffer: fake_buffer(handle, 0),
            offset: 0,
            range: buffer.len() as vk::DeviceSize,
        })
    }

    fn mesh_draw(&self, handle: MeshHandle) -> VulkanResult<MeshDraw> {
        let index_count = *self.meshes.get(handle).ok_or_else(|| not_found(handle))?;
        Ok(MeshDraw {
            vertex_buffer: fake_buffer(handle, 0x1_0000_0000),
            index_buffer: fake_buffer(handle, 0x2_0000_0000),
            index_count,
        })
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) -> VulkanResult<()> {
        self.buffers.remove(handle).map(drop).ok_or_else(|| not_found(handle))
    }
}

/// A command captured by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    BindPipeline(vk::Pipeline),
    BindDescriptorSets {
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: Vec<vk::DescriptorSet>,
    },
    BindVertexBuffers(Vec<vk::Buffer>),
    BindIndexBuffer(vk::Buffer),
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
}

/// [`CommandSink`] that stores every command in order
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub commands: Vec<Command>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets bound at `first_set`, in recording order
    pub fn bound_sets(&self, first_set: u32) -> Vec<vk::DescriptorSet> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::BindDescriptorSets { first_set: f, sets, .. } if *f == first_set => {
                    sets.first().copied()
                }
                _ => None,
            })
            .collect()
    }
}

impl CommandSink for RecordingSink {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.commands.push(Command::BindPipeline(pipeline));
    }

    fn bind_descriptor_sets(
        &mut self,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        self.commands.push(Command::BindDescriptorSets {
            layout,
            first_set,
            sets: sets.to_vec(),
        });
    }

    fn bind_vertex_buffers(&mut self, buffers: &[vk::Buffer], _offsets: &[vk::DeviceSize]) {
        self.commands.push(Command::BindVertexBuffers(buffers.to_vec()));
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer) {
        self.commands.push(Command::BindIndexBuffer(buffer));
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) {
        self.commands.push(Command::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.commands.push(Command::DrawIndexed {
            index_count,
            instance_count,
        });
    }
}

/// A call made on [`MockPresenter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterCall {
    WaitForFrame(usize),
    Acquire(usize),
    BeginCommands(usize),
    EndCommands(usize),
    BeginRenderPass(usize, u32),
    EndRenderPass(usize),
    SubmitPresent(usize, u32),
    Recreate,
}

/// Scripted [`PresentationBackend`] with a three-image swapchain
pub struct MockPresenter {
    extent: vk::Extent2D,
    next_image: u32,
    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    calls: Vec<PresenterCall>,
    recreations: usize,
}

impl MockPresenter {
    pub const IMAGE_COUNT: u32 = 3;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            next_image: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            calls: Vec::new(),
            recreations: 0,
        }
    }

    /// Return `outcome` from the next acquire instead of a fresh image
    pub fn queue_acquire(&mut self, outcome: AcquireOutcome) {
        self.acquire_script.push_back(outcome);
    }

    /// Return `outcome` from the next present
    pub fn queue_present(&mut self, outcome: PresentOutcome) {
        self.present_script.push_back(outcome);
    }

    pub fn calls(&self) -> &[PresenterCall] {
        &self.calls
    }

    pub fn recreations(&self) -> usize {
        self.recreations
    }
}

impl PresentationBackend for MockPresenter {
    fn wait_for_frame(&mut self, frame: usize) -> VulkanResult<()> {
        self.calls.push(PresenterCall::WaitForFrame(frame));
        Ok(())
    }

    fn acquire_next_image(&mut self, frame: usize) -> VulkanResult<AcquireOutcome> {
        self.calls.push(PresenterCall::Acquire(frame));
        if let Some(outcome) = self.acquire_script.pop_front() {
            return Ok(outcome);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % Self::IMAGE_COUNT;
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn begin_commands(&mut self, frame: usize) -> VulkanResult<vk::CommandBuffer> {
        self.calls.push(PresenterCall::BeginCommands(frame));
        Ok(vk::CommandBuffer::from_raw(0x100 + frame as u64))
    }

    fn end_commands(&mut self, frame: usize) -> VulkanResult<()> {
        self.calls.push(PresenterCall::EndCommands(frame));
        Ok(())
    }

    fn begin_render_pass(&mut self, frame: usize, image_index: u32) -> VulkanResult<()> {
        self.calls.push(PresenterCall::BeginRenderPass(frame, image_index));
        Ok(())
    }

    fn end_render_pass(&mut self, frame: usize) -> VulkanResult<()> {
        self.calls.push(PresenterCall::EndRenderPass(frame));
        Ok(())
    }

    fn submit_and_present(&mut self, frame: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        self.calls.push(PresenterCall::SubmitPresent(frame, image_index));
        Ok(self.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<()> {
        self.calls.push(PresenterCall::Recreate);
        self.extent = extent;
        self.recreations += 1;
        Ok(())
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn render_pass(&self) -> vk::RenderPass {
        vk::RenderPass::from_raw(0x5000)
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        Ok(())
    }
}

/// Minimal SPIR-V assembler for reflection tests
pub mod spirv {
    const MAGIC: u32 = 0x0723_0203;
    const VERSION_1_0: u32 = 0x0001_0000;

    const OP_NAME: u32 = 5;
    const OP_MEMORY_MODEL: u32 = 14;
    const OP_ENTRY_POINT: u32 = 15;
    const OP_EXECUTION_MODE: u32 = 16;
    const OP_CAPABILITY: u32 = 17;
    const OP_TYPE_VOID: u32 = 19;
    const OP_TYPE_FLOAT: u32 = 22;
    const OP_TYPE_IMAGE: u32 = 25;
    const OP_TYPE_SAMPLED_IMAGE: u32 = 27;
    const OP_TYPE_STRUCT: u32 = 30;
    const OP_TYPE_POINTER: u32 = 32;
    const OP_TYPE_FUNCTION: u32 = 33;
    const OP_FUNCTION: u32 = 54;
    const OP_FUNCTION_END: u32 = 56;
    const OP_VARIABLE: u32 = 59;
    const OP_DECORATE: u32 = 71;
    const OP_MEMBER_DECORATE: u32 = 72;
    const OP_LABEL: u32 = 248;
    const OP_RETURN: u32 = 253;

    const DECORATION_BLOCK: u32 = 2;
    const DECORATION_BINDING: u32 = 33;
    const DECORATION_DESCRIPTOR_SET: u32 = 34;
    const DECORATION_OFFSET: u32 = 35;

    const STORAGE_UNIFORM_CONSTANT: u32 = 0;
    const STORAGE_UNIFORM: u32 = 2;

    /// Shader stage of the generated entry point
    #[derive(Debug, Clone, Copy)]
    pub enum Stage {
        Vertex,
        Fragment,
    }

    /// Resource kind of a generated variable
    #[derive(Debug, Clone, Copy)]
    pub enum Kind {
        UniformBuffer,
        CombinedImageSampler,
    }

    /// A descriptor variable to declare
    #[derive(Debug, Clone, Copy)]
    pub struct Binding<'a> {
        pub name: &'a str,
        pub set: u32,
        pub binding: u32,
        pub kind: Kind,
    }

    impl<'a> Binding<'a> {
        pub fn ubo(name: &'a str, set: u32, binding: u32) -> Self {
            Self { name, set, binding, kind: Kind::UniformBuffer }
        }

        pub fn sampler(name: &'a str, set: u32, binding: u32) -> Self {
            Self { name, set, binding, kind: Kind::CombinedImageSampler }
        }
    }

    fn op(words: &mut Vec<u32>, opcode: u32, operands: &[u32]) {
        let count = u32::try_from(operands.len() + 1).unwrap_or(u32::MAX);
        words.push((count << 16) | opcode);
        words.extend_from_slice(operands);
    }

    fn literal(text: &str) -> Vec<u32> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    /// Assemble a module with one entry point declaring `bindings`
    pub fn module(stage: Stage, bindings: &[Binding<'_>]) -> Vec<u8> {
        let mut next_id = 1u32;
        let mut id = || {
            let value = next_id;
            next_id += 1;
            value
        };

        let void = id();
        let fn_ty = id();
        let float = id();
        let main = id();
        let label = id();
        let image_ty = id();
        let sampled_image_ty = id();
        let sampler_ptr = id();
        let ubo_ids: Vec<(u32, u32, u32)> = bindings.iter().map(|_| (id(), id(), id())).collect();
        let bound = next_id;

        let mut body = Vec::new();
        op(&mut body, OP_CAPABILITY, &[1]);
        op(&mut body, OP_MEMORY_MODEL, &[0, 1]);

        let model = match stage {
            Stage::Vertex => 0,
            Stage::Fragment => 4,
        };
        let mut entry = vec![model, main];
        entry.extend(literal("main"));
        op(&mut body, OP_ENTRY_POINT, &entry);
        if matches!(stage, Stage::Fragment) {
            op(&mut body, OP_EXECUTION_MODE, &[main, 7]);
        }

        for (binding, &(_, _, var)) in bindings.iter().zip(&ubo_ids) {
            let mut name = vec![var];
            name.extend(literal(binding.name));
            op(&mut body, OP_NAME, &name);
        }

        for (binding, &(block, _, var)) in bindings.iter().zip(&ubo_ids) {
            if matches!(binding.kind, Kind::UniformBuffer) {
                op(&mut body, OP_DECORATE, &[block, DECORATION_BLOCK]);
                op(&mut body, OP_MEMBER_DECORATE, &[block, 0, DECORATION_OFFSET, 0]);
            }
            op(&mut body, OP_DECORATE, &[var, DECORATION_DESCRIPTOR_SET, binding.set]);
            op(&mut body, OP_DECORATE, &[var, DECORATION_BINDING, binding.binding]);
        }

        op(&mut body, OP_TYPE_VOID, &[void]);
        op(&mut body, OP_TYPE_FUNCTION, &[fn_ty, void]);
        op(&mut body, OP_TYPE_FLOAT, &[float, 32]);
        op(&mut body, OP_TYPE_IMAGE, &[image_ty, float, 1, 0, 0, 0, 1, 0]);
        op(&mut body, OP_TYPE_SAMPLED_IMAGE, &[sampled_image_ty, image_ty]);
        op(&mut body, OP_TYPE_POINTER, &[sampler_ptr, STORAGE_UNIFORM_CONSTANT, sampled_image_ty]);

        for (binding, &(block, ptr, var)) in bindings.iter().zip(&ubo_ids) {
            match binding.kind {
                Kind::UniformBuffer => {
                    op(&mut body, OP_TYPE_STRUCT, &[block, float]);
                    op(&mut body, OP_TYPE_POINTER, &[ptr, STORAGE_UNIFORM, block]);
                    op(&mut body, OP_VARIABLE, &[ptr, var, STORAGE_UNIFORM]);
                }
                Kind::CombinedImageSampler => {
                    op(&mut body, OP_VARIABLE, &[sampler_ptr, var, STORAGE_UNIFORM_CONSTANT]);
                }
            }
        }

        op(&mut body, OP_FUNCTION, &[void, main, 0, fn_ty]);
        op(&mut body, OP_LABEL, &[label]);
        op(&mut body, OP_RETURN, &[]);
        op(&mut body, OP_FUNCTION_END, &[]);

        let mut words = vec![MAGIC, VERSION_1_0, 0, bound, 0];
        words.extend(body);
        words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }
}
