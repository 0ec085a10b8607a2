// Compiles the GLSL shaders under assets/shaders into SPIR-V at
// ../target/shaders so the demo can load them at run time.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn find_glslc() -> Option<PathBuf> {
    if let Ok(sdk) = env::var("VULKAN_SDK") {
        let candidate = if cfg!(target_os = "windows") {
            Path::new(&sdk).join("Bin").join("glslc.exe")
        } else {
            Path::new(&sdk).join("bin").join("glslc")
        };
        if candidate.exists() {
            return Some(candidate);
        }
    }
    // Fall back to whatever is on PATH.
    let bare = PathBuf::from("glslc");
    let found = Command::new(&bare)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false);
    found.then_some(bare)
}

fn main() {
    println!("cargo:rerun-if-changed=assets/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let glslc = match find_glslc() {
        Some(path) => path,
        None => {
            eprintln!("warning: glslc not found, shader compilation skipped");
            eprintln!("hint: Install the Vulkan SDK and set VULKAN_SDK");
            return;
        }
    };

    let shader_dir = PathBuf::from("assets/shaders");
    let target_dir = PathBuf::from("../target/shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create {:?}: {}", target_dir, e);
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory at {:?}", shader_dir);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_shader = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("vert" | "frag" | "comp")
        );
        if !is_shader {
            continue;
        }

        let out_file = match path.file_stem() {
            Some(stem) => target_dir.join(stem).with_extension("spv"),
            None => continue,
        };

        let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {:?}", path.file_name().unwrap_or_default());
            }
            Ok(s) => {
                panic!(
                    "glslc failed for {:?} with exit code {}",
                    path,
                    s.code().unwrap_or(-1)
                );
            }
            Err(e) => {
                panic!("Failed to run glslc for {:?}: {}", path, e);
            }
        }
    }
}
