use std::error::Error;
use std::fs;
use std::path::Path;
use std::process::Command;

/// CPU model from `/proc/cpuinfo`, falling back to `lscpu`.
pub fn get_cpu_model() -> Result<String, Box<dyn Error>> {
    if let Ok(cpuinfo) = fs::read_to_string("/proc/cpuinfo") {
        if let Some(model) = cpuinfo
            .lines()
            .find(|line| line.starts_with("model name"))
            .and_then(|line| line.split(':').nth(1))
        {
            return Ok(model.trim().to_string());
        }
    }

    let output = Command::new("lscpu").output()?;
    let result = String::from_utf8_lossy(&output.stdout);
    let model = result
        .lines()
        .find(|line| line.contains("Model name"))
        .and_then(|line| line.split(':').nth(1))
        .unwrap_or("");
    Ok(model.trim().to_string())
}

/// MAC of the first physical NIC (by name), else of the first other
/// non-loopback interface.
///
/// Physical NICs have a `device` link in sysfs. Bridges and container
/// interfaces do not, and get a fresh address each time they are recreated.
pub fn primary_mac_address() -> Result<Option<String>, Box<dyn Error>> {
    mac_address_in(Path::new("/sys/class/net"))
}

fn mac_address_in(net: &Path) -> Result<Option<String>, Box<dyn Error>> {
    let (mut physical, mut other): (Vec<String>, Vec<String>) = fs::read_dir(net)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name != "lo")
        .partition(|name| net.join(name).join("device").exists());
    physical.sort();
    other.sort();

    for name in physical.iter().chain(other.iter()) {
        if let Ok(address) = fs::read_to_string(net.join(name).join("address")) {
            let address = address.trim();
            if super::is_usable_mac(address) {
                return Ok(Some(address.to_string()));
            }
        }
    }
    Ok(None)
}
