use std::error::Error;
use std::process::Command;

/// Processor name via `wmic cpu get Name`.
pub fn get_cpu_model() -> Result<String, Box<dyn Error>> {
    let output = Command::new("wmic").args(["cpu", "get", "Name"]).output()?;
    let result = String::from_utf8_lossy(&output.stdout);
    let name = result.lines().nth(1).unwrap_or("").trim();
    Ok(name.to_string())
}

/// First physical adapter address from `getmac`.
pub fn primary_mac_address() -> Result<Option<String>, Box<dyn Error>> {
    let output = Command::new("getmac")
        .args(["/fo", "csv", "/nh"])
        .output()?;
    let result = String::from_utf8_lossy(&output.stdout);

    let address = result
        .lines()
        .filter_map(|line| line.split(',').next())
        .map(|field| field.trim().trim_matches('"').to_string())
        .find(|address| super::is_usable_mac(address));
    Ok(address)
}
