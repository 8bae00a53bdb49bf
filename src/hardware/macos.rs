use std::error::Error;
use std::process::Command;

/// CPU brand string via `sysctl machdep.cpu.brand_string`.
pub fn get_cpu_model() -> Result<String, Box<dyn Error>> {
    let output = Command::new("sysctl")
        .args(["-n", "machdep.cpu.brand_string"])
        .output()?;

    let result = String::from_utf8_lossy(&output.stdout);
    Ok(result.trim().to_string())
}

/// First `ether` address reported by `ifconfig`, skipping loopback.
pub fn primary_mac_address() -> Result<Option<String>, Box<dyn Error>> {
    let output = Command::new("ifconfig").output()?;
    let result = String::from_utf8_lossy(&output.stdout);

    let mut in_loopback = false;
    for line in result.lines() {
        if !line.starts_with(char::is_whitespace) {
            in_loopback = line.starts_with("lo");
            continue;
        }
        if in_loopback {
            continue;
        }
        if let Some(address) = line.trim().strip_prefix("ether ") {
            let address = address.split_whitespace().next().unwrap_or("");
            if super::is_usable_mac(address) {
                return Ok(Some(address.to_string()));
            }
        }
    }
    Ok(None)
}
