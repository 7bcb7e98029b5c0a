//! List available audio input devices.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::recording::audio::suppress_alsa_warnings;

/// One input device as shown to the user.
struct DeviceInfo {
    name: String,
    is_default: bool,
    config: Option<(u32, u16)>,
}

/// Lists all input devices with the index `audio.device` accepts.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    let devices = suppress_alsa_warnings(describe_devices)?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!();
    println!("Available audio input devices:");
    println!();
    for (index, device) in devices.iter().enumerate() {
        let default_indicator = if device.is_default { " [DEFAULT]" } else { "" };
        let config = match device.config {
            Some((sample_rate, channels)) => format!("{sample_rate}Hz, {channels} channels"),
            None => "configuration unavailable".to_string(),
        };
        println!("  ID: {index}");
        println!("    Name: {}{}", device.name, default_indicator);
        println!("    Config: {config}");
        println!();
    }
    println!("Set audio.device in voxclip.toml to a name or ID from this list.");

    Ok(())
}

fn describe_devices() -> anyhow::Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?
        .filter_map(|device| {
            // Devices that cannot report a name are unusable by name or index
            let name = device.name().ok()?;
            let config = device
                .default_input_config()
                .ok()
                .map(|c| (c.sample_rate().0, c.channels()));
            Some(DeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                config,
            })
        })
        .collect();

    Ok(devices)
}
