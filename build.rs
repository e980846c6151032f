//! Build script for detecting system dependencies and providing installation guidance.
//!
//! Only `OpenCV` is linked natively; the X11 client is pure Rust, so the X
//! server just needs the XTEST extension at runtime.

use std::env;
use std::process::Command;

/// `OpenCV` modules the vision pipeline links against
const REQUIRED_MODULES: [&str; 3] = ["opencv_core", "opencv_imgproc", "opencv_videoio"];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if !check_pkg_config() {
        return;
    }

    if let Some(package) = find_opencv() {
        check_opencv_modules(package);
    }

    if env::var("TARGET").unwrap_or_default().contains("linux") {
        println!("cargo:rerun-if-env-changed=DISPLAY");
        if env::var_os("DISPLAY").is_none() {
            println!("cargo:warning=DISPLAY is not set; the binary will fall back to dry-run input without an X server");
        }
    }
}

fn check_pkg_config() -> bool {
    let output = Command::new("pkg-config").arg("--version").output();

    match output {
        Ok(output) if output.status.success() => true,
        _ => {
            println!("cargo:warning=pkg-config not found. This is required to find OpenCV.");
            println!("cargo:warning=On Ubuntu: sudo apt-get install pkg-config");
            println!("cargo:warning=On macOS: brew install pkg-config");
            false
        }
    }
}

/// pkg-config package name of the installed `OpenCV`, if any
fn find_opencv() -> Option<&'static str> {
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    println!("cargo:rerun-if-env-changed=OPENCV_LINK_PATHS");
    println!("cargo:rerun-if-env-changed=OPENCV_INCLUDE_PATHS");

    for package in ["opencv4", "opencv"] {
        let output = Command::new("pkg-config").args(["--modversion", package]).output();
        if let Ok(output) = output {
            if output.status.success() {
                let version = String::from_utf8_lossy(&output.stdout);
                println!("cargo:warning=Found OpenCV version: {}", version.trim());
                return Some(package);
            }
        }
    }

    println!("cargo:warning=OpenCV not found via pkg-config. Make sure OpenCV is installed.");
    println!("cargo:warning=On Ubuntu: sudo apt-get install libopencv-dev");
    println!("cargo:warning=On macOS: brew install opencv");
    None
}

fn check_opencv_modules(package: &str) {
    let Ok(output) = Command::new("pkg-config").args(["--libs", package]).output() else {
        return;
    };
    let libs = String::from_utf8_lossy(&output.stdout);

    for module in REQUIRED_MODULES {
        if !libs.contains(module) {
            println!("cargo:warning=OpenCV module {module} not listed by pkg-config; camera capture or segmentation may fail to link");
        }
    }
}
