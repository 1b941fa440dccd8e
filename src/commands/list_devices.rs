//! List available audio input devices.

use console::style;

use crate::capture::list_input_devices;

/// Prints every input device with its index, which `capture.device` accepts.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> anyhow::Result<()> {
    let devices = list_input_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!();
    println!("{}", style("Available audio input devices:").bold());
    println!();

    for (index, device) in devices.iter().enumerate() {
        let default_indicator = if device.is_default {
            style(" [DEFAULT]").green().to_string()
        } else {
            String::new()
        };
        let config_info = match device.default_config {
            Some((sample_rate, channels)) => format!("{sample_rate}Hz, {channels} channels"),
            None => "configuration unavailable".to_string(),
        };

        println!("  ID: {index}");
        println!("    Name: {}{}", device.name, default_indicator);
        println!("    Config: {config_info}");
        println!();
    }

    println!(
        "Set {} in the config file to one of the IDs or names above.",
        style("capture.device").cyan()
    );
    Ok(())
}
