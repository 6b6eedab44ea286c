use std::path::PathBuf;
use std::time;

use log::{debug, info};
use nalgebra::{vector, Vector3};
use show_image::event::{VirtualKeyCode, WindowEvent};
use show_image::{create_window, ImageInfo, ImageView, WindowOptions};

use crate::camera::{Camera, CameraInput};
use crate::error::RenderError;
use crate::scene::mesh::{load_obj, Topology};
use crate::scene::texture::Material;
use crate::scene::Scene;
use crate::util::Color;

const FIELD_OF_VIEW: f32 = 45.0;

/// Execution context, filled in from the command line.
pub struct Params {
    pub width: u32,
    pub height: u32,
    pub print_fps: bool,
    pub asset_path: PathBuf,
    pub mesh_file: String,
    pub topology: Topology,
    pub rotation_speed: f32,
    pub threads: usize,
    /// Render this many frames without a window and save the last one.
    pub headless_frames: Option<u32>,
    pub output: PathBuf,
}

/// Toggles that live outside the scene.
struct Controls {
    rotate: bool,
    uniform_clear_color: bool,
    print_fps: bool,
    camera: CameraInput,
}

impl Controls {
    fn clear_color(&self) -> Color {
        if self.uniform_clear_color {
            return vector![0.1, 0.1, 0.1];
        }
        return vector![0.39, 0.39, 0.39];
    }
}

/// What a processed window event asks the loop to do.
#[derive(PartialEq)]
enum Action {
    Continue,
    Exit,
}

fn print_key_bindings() {
    info!("[Key Bindings - SHARED]");
    info!("   [F2]  Toggle Rotation");
    info!("   [F10] Toggle Uniform ClearColor");
    info!("   [F11] Toggle Print FPS");
    info!("   [WASD] Move Camera, [Arrows] Rotate Camera, [LShift] Boost");
    info!("[Key Bindings - SOFTWARE]");
    info!("   [F5]  Cycle Shading Mode");
    info!("   [F6]  Toggle NormalMap");
    info!("   [F7]  Toggle DepthBuffer Visualization");
    info!("   [Esc] Exit");
}

/// Applies a single window event to the scene and controls.
fn handle_event(window_event: WindowEvent, scene: &mut Scene, controls: &mut Controls) -> Action {
    let WindowEvent::KeyboardInput(event) = window_event else {
        return Action::Continue;
    };
    let Some(key_code) = event.input.key_code else {
        return Action::Continue;
    };
    let pressed = event.input.state.is_pressed();

    // Held keys drive the camera.
    match key_code {
        VirtualKeyCode::W => controls.camera.forward = pressed,
        VirtualKeyCode::S => controls.camera.backward = pressed,
        VirtualKeyCode::A => controls.camera.left = pressed,
        VirtualKeyCode::D => controls.camera.right = pressed,
        VirtualKeyCode::Left => controls.camera.yaw_left = pressed,
        VirtualKeyCode::Right => controls.camera.yaw_right = pressed,
        VirtualKeyCode::Up => controls.camera.pitch_up = pressed,
        VirtualKeyCode::Down => controls.camera.pitch_down = pressed,
        VirtualKeyCode::LShift => controls.camera.boost = pressed,
        _ => (),
    }

    // Toggles fire once, on release.
    if !event.input.state.is_released() {
        return Action::Continue;
    }
    match key_code {
        VirtualKeyCode::Escape => return Action::Exit,
        VirtualKeyCode::F2 => {
            controls.rotate = !controls.rotate;
            info!("**(SHARED) Vehicle Rotation {}", if controls.rotate { "ON" } else { "OFF" });
        }
        VirtualKeyCode::F5 => {
            scene.cycle_shading_mode();
        }
        VirtualKeyCode::F6 => {
            scene.toggle_normal_map();
        }
        VirtualKeyCode::F7 => {
            scene.toggle_depth_buffer();
        }
        VirtualKeyCode::F10 => {
            controls.uniform_clear_color = !controls.uniform_clear_color;
            info!(
                "**(SHARED) Uniform ClearColor {}",
                if controls.uniform_clear_color { "ON" } else { "OFF" }
            );
        }
        VirtualKeyCode::F11 => {
            controls.print_fps = !controls.print_fps;
            info!("**(SHARED) Print FPS {}", if controls.print_fps { "ON" } else { "OFF" });
        }
        _ => (),
    }
    return Action::Continue;
}

/// Loads the mesh and material named by `params`, in the requested topology.
fn load_scene(params: &Params) -> Result<Scene, RenderError> {
    let mut mesh = load_obj(params.asset_path.join(&params.mesh_file))?;
    if params.topology == Topology::TriangleStrip {
        mesh = mesh.to_strip()?;
    }
    let material = Material::load(&params.asset_path)?;
    let scene = Scene::new(params.width, params.height, mesh, material, params.threads);
    debug!(
        "submitting {} indices as {:?}, shading mode {}",
        scene.mesh().indices().len(),
        scene.mesh().topology(),
        scene.shading().shading_mode.label()
    );
    return Ok(scene);
}

/// Renders `frames` frames at a fixed 1/30 s time step and writes the last one as a PNG.
fn run_headless(params: &Params, mut scene: Scene, camera: &Camera, frames: u32) -> Result<(), RenderError> {
    let clear_color = vector![0.39, 0.39, 0.39];
    let time_begin = time::Instant::now();
    for _ in 0..frames.max(1) {
        scene.update(params.rotation_speed, 1.0 / 30.0);
        scene.render(&camera.view(), clear_color);
    }
    let frame = scene.frame_buffer();
    let covered = frame.depth_data().iter().filter(|depth| depth.is_finite()).count();
    info!(
        "rendered {} frames in {:.3}s, {} of {} pixels covered",
        frame.frame_index(),
        time_begin.elapsed().as_secs_f32(),
        covered,
        frame.depth_data().len()
    );

    image::save_buffer(
        &params.output,
        frame.as_render_data(),
        frame.width(),
        frame.height(),
        image::ColorType::Rgb8,
    )
    .map_err(|source| RenderError::Save {
        path: params.output.clone(),
        source,
    })?;
    info!("saved {}", params.output.display());
    return Ok(());
}

/// Actually launches the window, showing images.
/// Takes struct, defining execution context.
pub fn run(params: Params) -> Result<(), Box<dyn std::error::Error>> {
    let mut scene = load_scene(&params)?;
    let aspect_ratio = params.width as f32 / params.height as f32;
    let mut camera = Camera::new(aspect_ratio, FIELD_OF_VIEW, Vector3::zeros());

    if let Some(frames) = params.headless_frames {
        run_headless(&params, scene, &camera, frames)?;
        return Ok(());
    }

    print_key_bindings();
    let window_options: WindowOptions = WindowOptions {
        size: Some([params.width, params.height]),
        ..Default::default()
    };
    let window = create_window("output", window_options)?;
    let event_channel = window.event_channel()?;

    let mut controls = Controls {
        rotate: true,
        uniform_clear_color: false,
        print_fps: params.print_fps,
        camera: CameraInput::default(),
    };

    let mut exit = false;
    let mut last_frame = time::Instant::now();
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    while !exit {
        let now = time::Instant::now();
        let delta_seconds = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        camera.update(&controls.camera, delta_seconds);
        if controls.rotate {
            scene.update(params.rotation_speed, delta_seconds);
        }
        scene.render(&camera.view(), controls.clear_color());

        let image_data = ImageView::new(ImageInfo::rgb8(params.width, params.height), scene.as_render_data());
        window.set_image("image", image_data)?;

        // Unloading everything that has piled up in the event channel since the last frame.
        for window_event in event_channel.try_iter() {
            if handle_event(window_event, &mut scene, &mut controls) == Action::Exit {
                exit = true;
            }
        }

        if controls.print_fps {
            // Counting frames to printout stats every second.
            frame_counter += 1;
            let elapsed = now.duration_since(frame_counter_time_begin).as_secs_f32();
            if elapsed > 1.0 {
                info!(
                    "FPS: {} ({:.2} ms per frame)",
                    frame_counter,
                    1000.0 * elapsed / frame_counter as f32
                );
                frame_counter_time_begin = now;
                frame_counter = 0;
            }
        }
    }

    return Ok(());
}
