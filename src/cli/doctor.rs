//! Environment readiness check.

use crate::engine::chromium::find_chromium;
use anyhow::Result;
use std::process::Command;

/// Check Chromium availability, port configuration, and available memory.
pub async fn run() -> Result<()> {
    println!("Netsieve Doctor");
    println!("===============");
    println!();

    // OS and architecture
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    // Check Chromium
    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome or set NETSIEVE_CHROMIUM_PATH."
        ),
    }

    // Check PORT configuration
    match std::env::var("PORT") {
        Ok(p) => match p.trim().parse::<u16>() {
            Ok(port) => println!("[OK] PORT is set to {port}"),
            Err(_) => println!("[!!] PORT is set but not a valid port number: {p:?}"),
        },
        Err(_) => println!(
            "[OK] PORT not set — server will listen on {}",
            crate::cli::serve_cmd::DEFAULT_PORT
        ),
    }

    // Check available memory
    let mem_mb = get_available_memory_mb();
    match mem_mb {
        Some(mb) => {
            if mb >= 512 {
                println!("[OK] Available memory: {mb}MB (>= 512MB required for Chromium)");
            } else {
                println!("[!!] Available memory: {mb}MB (< 512MB, Chromium may not start)");
            }
        }
        None => println!("[??] Could not determine available memory"),
    }

    println!();
    if chromium_path.is_some() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
        println!("  Install Chrome/Chromium or point NETSIEVE_CHROMIUM_PATH at a binary.");
    }

    Ok(())
}

/// Get available memory in MB (platform-specific).
fn get_available_memory_mb() -> Option<u64> {
    #[cfg(target_os = "macos")]
    {
        let output = Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        let bytes: u64 = s.trim().parse().ok()?;
        Some(bytes / 1_048_576)
    }
    #[cfg(target_os = "linux")]
    {
        let output = Command::new("free").args(["-m"]).output().ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        for line in s.lines() {
            if line.starts_with("Mem:") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 7 {
                    return parts[6].parse().ok();
                }
            }
        }
        None
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
