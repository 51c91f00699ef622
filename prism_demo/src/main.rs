//! Demo scene: two vases, a cube and six orbiting point lights

mod controller;
mod geometry;

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use glfw::{Action, Key, WindowEvent};
use prism_engine::config::{Config, ConfigError};
use prism_engine::core::RendererConfig;
use prism_engine::foundation::logging;
use prism_engine::foundation::math::Vec3;
use prism_engine::foundation::time::{FpsCounter, Timer};
use prism_engine::render::backends::vulkan::descriptors::PoolSizes;
use prism_engine::render::backends::vulkan::initialization::WindowError;
use prism_engine::render::backends::vulkan::resources::GpuResources;
use prism_engine::render::backends::vulkan::{
    BufferHandle, CommandRecorder, DescriptorAllocator, DescriptorLayoutCache, ImageData, ResourceRegistry,
    SharedDevice, TextureHandle, VulkanContext, VulkanError, VulkanPresenter, Window,
};
use prism_engine::render::{Camera, FrameContext, GlobalUbo, PointLightSystem, Renderer, ResizeSignal, SimpleRenderSystem};
use prism_engine::scene::{Scene, TransformComponent};
use thiserror::Error;

use controller::CameraController;
use geometry::Shading;

const CONFIG_PATH: &str = "prism.toml";
const TEXTURE_PATH: &str = "textures/checker.png";

#[derive(Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Vulkan(#[from] VulkanError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// GPU objects in drop order; the renderer owns the device and goes last
struct Demo {
    simple: SimpleRenderSystem,
    point_lights: PointLightSystem,
    allocator: DescriptorAllocator,
    layout_cache: DescriptorLayoutCache,
    registry: ResourceRegistry,
    global_buffers: Vec<BufferHandle>,
    raw_device: ash::Device,
    renderer: Renderer<VulkanPresenter>,
}

impl Drop for Demo {
    fn drop(&mut self) {
        if let Err(err) = self.renderer.wait_idle() {
            log::warn!("wait_idle during shutdown failed: {}", err);
        }
    }
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), DemoError> {
    let config = RendererConfig::load_or_default(CONFIG_PATH)?;
    let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;

    let context = VulkanContext::new(
        &mut window,
        &config.application_name,
        config.vulkan_version(),
        config.enable_validation,
    )?;

    let extent = window.framebuffer_extent();
    let resize = ResizeSignal::new(extent.width, extent.height);
    let mut scene = Scene::new();
    let mut demo = Demo::new(&config, context, extent, resize.clone(), &mut scene)?;

    demo.run(&mut window, &config.window.title, &resize, &mut scene)
}

impl Demo {
    fn new(
        config: &RendererConfig,
        context: VulkanContext,
        extent: vk::Extent2D,
        resize: ResizeSignal,
        scene: &mut Scene,
    ) -> Result<Self, DemoError> {
        let raw_device = context.raw_device();
        let device: SharedDevice = Arc::new(raw_device.clone());
        let memory_properties = context.memory_properties();
        let queue = context.graphics_queue();
        let queue_family = context.graphics_queue_family();

        // Declared before every other GPU object so it is dropped after them
        let frames = config.max_frames_in_flight;
        let presenter = VulkanPresenter::new(context, extent, frames, config.clear_color, config.vsync)?;
        let renderer = Renderer::new(presenter, frames, resize)?;

        let mut registry = ResourceRegistry::new(raw_device.clone(), memory_properties, queue, queue_family)?;

        let mut layout_cache = DescriptorLayoutCache::new(device.clone());
        let mut allocator =
            DescriptorAllocator::with_pool_sizes(device.clone(), PoolSizes::default(), config.descriptors.sets_per_pool);

        let (simple_vert, simple_frag) = config.shaders.simple_paths();
        let mut simple = SimpleRenderSystem::from_files(
            device.clone(),
            &mut layout_cache,
            renderer.swapchain_render_pass(),
            simple_vert,
            simple_frag,
            frames,
        )?;
        let (light_vert, light_frag) = config.shaders.point_light_paths();
        let mut point_lights = PointLightSystem::from_files(
            device,
            &mut layout_cache,
            renderer.swapchain_render_pass(),
            light_vert,
            light_frag,
            frames,
        )?;

        let texture = load_texture(&mut registry)?;
        let texture_info = registry.texture_info(texture)?;

        let global_stages = simple.effect().binding("globalUbo")?.stage_flags;
        let sampler_stages = simple.effect().binding("texSampler")?.stage_flags;
        let light_global_stages = point_lights.effect().binding("globalUbo")?.stage_flags;

        let mut global_buffers = Vec::with_capacity(frames);
        for frame in 0..frames {
            let buffer = registry.create_uniform_buffer(std::mem::size_of::<GlobalUbo>() as vk::DeviceSize)?;
            let info = registry.buffer_info(buffer)?;
            simple.bind_per_frame_buffer(frame, "globalUbo", info, global_stages)?;
            simple.bind_per_frame_image(frame, "texSampler", texture_info, sampler_stages)?;
            point_lights.bind_per_frame_buffer(frame, "globalUbo", info, light_global_stages)?;
            global_buffers.push(buffer);
        }
        simple.finish_descriptors(&mut layout_cache, &mut allocator)?;
        point_lights.finish_descriptors(&mut layout_cache, &mut allocator)?;

        build_scene(scene, &mut registry)?;
        let meshes = simple.provision(scene, &mut registry, &mut layout_cache, &mut allocator)?;
        let lights = point_lights.provision(scene, &mut registry, &mut layout_cache, &mut allocator)?;
        log::info!("Scene ready: {} meshes, {} lights", meshes, lights);

        Ok(Self {
            simple,
            point_lights,
            allocator,
            layout_cache,
            registry,
            global_buffers,
            raw_device,
            renderer,
        })
    }

    fn run(
        &mut self,
        window: &mut Window,
        title: &str,
        resize: &ResizeSignal,
        scene: &mut Scene,
    ) -> Result<(), DemoError> {
        let controller = CameraController::default();
        let mut viewer = TransformComponent::default();
        viewer.translation.z = -2.5;

        let mut camera = Camera::new();
        let mut timer = Timer::new();
        let mut fps = FpsCounter::default();

        while !window.should_close() {
            window.poll_events();
            for event in window.flush_events() {
                match event {
                    WindowEvent::FramebufferSize(width, height) => {
                        resize.notify(width.max(0) as u32, height.max(0) as u32);
                    }
                    WindowEvent::Key(Key::Escape, _, Action::Press, _) => window.set_should_close(true),
                    _ => {}
                }
            }

            let frame_time = timer.update();
            if let Some(rate) = fps.tick(frame_time) {
                window.set_title(&format!("{} - {:.0} fps", title, rate));
            }
            controller.apply(&controller.read_input(window), frame_time, &mut viewer);
            camera.set_view_yxz(viewer.translation, viewer.rotation);
            camera.set_perspective_projection(50f32.to_radians(), self.renderer.aspect_ratio(), 0.1, 100.0);

            let Some(command_buffer) = self.renderer.begin_frame()? else {
                if resize.extent().width == 0 || resize.extent().height == 0 {
                    window.wait_events();
                }
                continue;
            };
            let frame_index = self.renderer.frame_index();
            let mut recorder = CommandRecorder::new(self.raw_device.clone(), command_buffer);

            let mut ubo = GlobalUbo::default();
            ubo.set_camera(&camera);

            let mut frame = FrameContext::new(
                frame_index,
                frame_time,
                &mut recorder,
                &camera,
                scene,
                &mut self.registry,
            );
            self.point_lights.update(&mut frame, &mut ubo)?;
            frame
                .resources
                .write_buffer(self.global_buffers[frame_index], 0, ubo.as_bytes())?;

            self.renderer.begin_swapchain_render_pass()?;
            self.simple.render(&mut frame)?;
            self.point_lights.render(&mut frame)?;
            self.renderer.end_swapchain_render_pass()?;
            self.renderer.end_frame()?;
        }

        log::info!(
            "Exiting after {} frames, {:.1} fps average",
            timer.frame_count(),
            timer.average_fps()
        );
        Ok(())
    }
}

fn load_texture(registry: &mut ResourceRegistry) -> Result<TextureHandle, VulkanError> {
    if Path::new(TEXTURE_PATH).exists() {
        registry.load_texture(TEXTURE_PATH)
    } else {
        log::info!("{} not found, using a generated checkerboard", TEXTURE_PATH);
        registry.upload_texture(&ImageData::checkerboard(256, 32, [230, 230, 230, 255], [90, 90, 90, 255]))
    }
}

fn build_scene(scene: &mut Scene, registry: &mut ResourceRegistry) -> Result<(), VulkanError> {
    let flat_vase = registry.upload_mesh(&geometry::vase(24, Shading::Flat, [0.8, 0.7, 0.6]))?;
    let smooth_vase = registry.upload_mesh(&geometry::vase(48, Shading::Smooth, [0.6, 0.7, 0.8]))?;
    let floor = registry.upload_mesh(&geometry::floor_quad())?;
    let cube = registry.upload_mesh(&geometry::cube())?;

    let object = scene.create_object();
    object.mesh = Some(flat_vase);
    object.transform.translation = Vec3::new(-0.5, 0.5, 0.0);
    object.transform.scale = Vec3::new(3.0, 1.5, 3.0);

    let object = scene.create_object();
    object.mesh = Some(smooth_vase);
    object.transform.translation = Vec3::new(0.5, 0.5, 0.0);
    object.transform.scale = Vec3::new(3.0, 1.5, 3.0);

    let object = scene.create_object();
    object.mesh = Some(floor);
    object.transform.translation = Vec3::new(0.0, 0.5, 0.0);
    object.transform.scale = Vec3::new(3.0, 1.0, 3.0);

    let object = scene.create_object();
    object.mesh = Some(cube);
    object.transform.translation = Vec3::new(0.0, 0.3, 1.2);
    object.transform.scale = Vec3::new(0.4, 0.4, 0.4);
    object.transform.rotation.y = 0.6;

    let colors = [
        Vec3::new(1.0, 0.1, 0.1),
        Vec3::new(0.1, 0.1, 1.0),
        Vec3::new(0.1, 1.0, 0.1),
        Vec3::new(1.0, 1.0, 0.1),
        Vec3::new(0.1, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
    ];
    for (i, color) in colors.iter().enumerate() {
        let angle = i as f32 * std::f32::consts::TAU / colors.len() as f32;
        let light = scene.create_point_light(0.2, 0.1, *color);
        light.transform.translation = Vec3::new(-angle.cos(), -1.0, -angle.sin());
    }
    Ok(())
}
