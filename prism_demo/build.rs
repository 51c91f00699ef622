// Compiles GLSL under shaders/ to SPIR-V in the workspace target/shaders directory

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const STAGES: [&str; 2] = ["vert", "frag"];

fn glslc() -> PathBuf {
    match env::var("VULKAN_SDK") {
        Ok(sdk) if cfg!(target_os = "windows") => PathBuf::from(sdk).join("Bin").join("glslc.exe"),
        Ok(sdk) => PathBuf::from(sdk).join("bin").join("glslc"),
        Err(_) => PathBuf::from("glslc"),
    }
}

fn compile(glslc: &Path, source: &Path, output: &Path) -> Result<(), String> {
    let status = Command::new(glslc)
        .arg(source)
        .arg("-o")
        .arg(output)
        .status()
        .map_err(|e| format!("could not run {}: {}", glslc.display(), e))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("glslc failed for {} ({})", source.display(), status))
    }
}

fn is_stale(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(dst)) => src > dst,
        _ => true,
    }
}

fn main() {
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var("SKIP_SHADERS").is_ok() {
        println!("cargo:warning=SKIP_SHADERS set, shader compilation skipped");
        return;
    }

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let shader_dir = manifest_dir.join("shaders");
    let target_dir = manifest_dir.join("..").join("target").join("shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=could not create {}: {}", target_dir.display(), e);
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            println!("cargo:warning=no shader directory at {}", shader_dir.display());
            return;
        }
    };

    let glslc = glslc();
    let mut compiled = 0;
    for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
        let is_stage = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| STAGES.contains(&ext));
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_stage {
            continue;
        }

        // simple_shader.vert -> simple_shader.vert.spv
        let output = target_dir.join(format!("{}.spv", file_name));
        if !is_stale(&path, &output) {
            continue;
        }
        match compile(&glslc, &path, &output) {
            Ok(()) => compiled += 1,
            Err(message) => {
                println!("cargo:warning={}; the demo needs prebuilt SPIR-V in {}", message, target_dir.display());
                return;
            }
        }
    }

    if compiled > 0 {
        println!("cargo:warning=compiled {} shader(s) into {}", compiled, target_dir.display());
    }
}
