use anyhow::Result;
use strikecam::audio::Microphone;
use strikecam::video;

/// Comma-separated override used by tests instead of real hardware.
fn list_from_env(var: &str) -> Option<Vec<String>> {
    let raw = std::env::var(var).ok()?;
    Some(
        raw.trim()
            .split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

fn print_list(kind: &str, items: &[String]) {
    if items.is_empty() {
        println!("No {kind} detected.");
    } else {
        println!("Available {kind}:");
        for item in items {
            println!("  - {item}");
        }
    }
}

pub(crate) fn list_input_devices() -> Result<()> {
    let devices = list_from_env("STRIKECAM_TEST_DEVICES").unwrap_or_else(|| {
        Microphone::list_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err}");
            Vec::new()
        })
    });
    print_list("audio input devices", &devices);
    Ok(())
}

pub(crate) fn list_cameras() -> Result<()> {
    let cameras = list_from_env("STRIKECAM_TEST_CAMERAS").unwrap_or_else(|| {
        match video::list_cameras() {
            Ok(cameras) => cameras
                .into_iter()
                .map(|(index, name)| format!("{index}: {name}"))
                .collect(),
            Err(err) => {
                eprintln!("Failed to list cameras: {err:#}");
                Vec::new()
            }
        }
    });
    print_list("cameras", &cameras);
    Ok(())
}
