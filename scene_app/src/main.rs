//! Demo scene: two textured cubes lit by an orbiting point light, with a
//! free-fly camera and a frame-stats overlay.

use prism_engine::prelude::*;
use std::path::Path;

const MAX_INSTANCES: usize = 16;
const CONFIG_PATH: &str = "scene_app/render.toml";
const TEXTURE_SIZE: u32 = 256;

/// Procedural checkerboard, RGBA8. Used instead of image assets so the demo
/// has no file dependencies beyond its shaders.
fn checkerboard(size: u32, cells: u32, bright: [u8; 4], dark: [u8; 4]) -> Vec<u8> {
    let cell = (size / cells).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let on = ((x / cell) + (y / cell)) % 2 == 0;
            pixels.extend_from_slice(if on { &bright } else { &dark });
        }
    }
    pixels
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match RenderConfig::from_file(Path::new(CONFIG_PATH)) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Using default render config ({})", e);
            RenderConfig::default()
        }
    };

    let mut app = Application::new(&config, MAX_INSTANCES)?;
    let cube = Mesh::cube();

    let phong_vert = Path::new("target/shaders/phong_vert.spv");
    let phong_frag = Path::new("target/shaders/phong_frag.spv");
    let light_vert = Path::new("target/shaders/light_cube_vert.spv");
    let light_frag = Path::new("target/shaders/light_cube_frag.spv");

    let renderer = app.renderer_mut();

    let stone = checkerboard(TEXTURE_SIZE, 8, [200, 200, 205, 255], [90, 90, 100, 255]);
    let gold = checkerboard(TEXTURE_SIZE, 16, [230, 190, 80, 255], [120, 90, 30, 255]);
    let gloss = checkerboard(TEXTURE_SIZE, 8, [255, 255, 255, 255], [40, 40, 40, 255]);

    let stone_tex = renderer.create_texture_rgba8(TEXTURE_SIZE, TEXTURE_SIZE, &stone)?;
    let stone_gloss = renderer.create_texture_rgba8(TEXTURE_SIZE, TEXTURE_SIZE, &gloss)?;
    let gold_tex = renderer.create_texture_rgba8(TEXTURE_SIZE, TEXTURE_SIZE, &gold)?;
    let gold_gloss = renderer.create_texture_rgba8(TEXTURE_SIZE, TEXTURE_SIZE, &gloss)?;

    let big_cube = renderer.add_lit_object(&cube, stone_tex, stone_gloss, phong_vert, phong_frag)?;
    let small_cube = renderer.add_lit_object(&cube, gold_tex, gold_gloss, phong_vert, phong_frag)?;
    renderer.set_light_cube(&cube, light_vert, light_frag)?;
    renderer.set_overlay(Box::new(FrameStatsOverlay::new()));

    app.run(move |renderer, camera, time| {
        let light_pos = Vec3::new(3.0 * time.cos(), 1.5, 3.0 * time.sin());

        let spin = Mat4::from_axis_angle(&Vec3::y_axis(), time * 0.5);
        renderer.set_object_transform(big_cube, spin)?;

        let orbit = Mat4::new_translation(&Vec3::new(2.2, 0.8, 0.0))
            * Mat4::from_axis_angle(&Vec3::x_axis(), time)
            * Mat4::new_scaling(0.5);
        renderer.set_object_transform(small_cube, orbit)?;

        renderer.set_light_cube_transform(
            Mat4::new_translation(&light_pos) * Mat4::new_scaling(0.2),
        );
        renderer.update_scene(light_pos, camera.position(), camera.view_projection_matrix());
        Ok(())
    })?;
    Ok(())
}

fn main() {
    prism_engine::foundation::logging::init();
    if let Err(e) = run() {
        log::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}
