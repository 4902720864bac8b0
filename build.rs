// Compile GLSL shaders to SPIR-V with glslc (Vulkan SDK)

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=shaders/");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    compile_shader(Path::new("shaders/scene.vert"), &out_dir.join("scene.vert.spv"));
    compile_shader(Path::new("shaders/scene.frag"), &out_dir.join("scene.frag.spv"));
}

fn compile_shader(input: &Path, output: &Path) {
    let result = Command::new("glslc").arg(input).arg("-o").arg(output).status();

    match result {
        Ok(status) if status.success() => {
            println!("compiled {} -> {}", input.display(), output.display());
        }
        Ok(status) => {
            panic!(
                "failed to compile {}: exit code {:?}",
                input.display(),
                status.code()
            );
        }
        Err(e) => {
            // missing glslc is not fatal for the build; the binary will
            // report the missing .spv at startup
            println!(
                "cargo:warning=glslc not found ({}); compile manually: glslc {} -o {}",
                e,
                input.display(),
                output.display()
            );
        }
    }
}
