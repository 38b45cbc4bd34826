use super::{DisplayBackend, DisplayDescriptor};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

/// MCCS feature code of the luminance control.
const BRIGHTNESS_FEATURE: &str = "10";

/// Model name reported by monitors which don't identify themselves.
const GENERIC_MODEL: &str = "Generic PnP Monitor";

/// A [DisplayBackend] driving external monitors over DDC/CI by invoking the
/// `ddcutil` command line tool.
///
/// Displays are identified by the I2C bus they are attached to (`i2c-4` for
/// `/dev/i2c-4`), which stays stable as long as the cabling doesn't change.
#[derive(Debug, Clone)]
pub struct DdcutilBackend {
    executable: String,
    extra_args: Vec<String>,
}

/// A display block from `ddcutil detect --terse`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedDisplay {
    pub bus: u32,
    pub manufacturer: String,
    pub model: String,
}

impl DetectedDisplay {
    /// Whether the display identifies itself well enough to be offered to the
    /// user.
    pub fn is_identifiable(&self) -> bool {
        !self.manufacturer.is_empty() && !self.model.is_empty() && self.model != GENERIC_MODEL
    }

    pub fn id(&self) -> String {
        format!("i2c-{}", self.bus)
    }
}

impl DdcutilBackend {
    /// Create a backend running the given executable, passing `extra_args`
    /// (for example `--sleep-multiplier`) to every invocation.
    pub fn new(executable: &str, extra_args: &[String]) -> DdcutilBackend {
        DdcutilBackend {
            executable: executable.to_owned(),
            extra_args: extra_args.to_vec(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.executable)
            .args(&self.extra_args)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // An abandoned call must not leave ddcutil holding the bus
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.executable))?;
        if !output.status.success() {
            bail!(
                "{} {} failed ({}): {}",
                self.executable,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn get_brightness(&self, bus: u32) -> Result<u16> {
        let bus = bus.to_string();
        let output = self
            .run(&["--bus", bus.as_str(), "getvcp", BRIGHTNESS_FEATURE, "--terse"])
            .await?;
        parse_brightness(&output)
    }
}

#[async_trait]
impl DisplayBackend for DdcutilBackend {
    async fn list_displays(&self) -> Result<Vec<DisplayDescriptor>> {
        let output = self.run(&["detect", "--terse"]).await?;
        let mut displays = Vec::new();
        for detected in parse_detect_output(&output)? {
            if !detected.is_identifiable() {
                log::debug!("Skipping unidentifiable display on bus {}", detected.bus);
                continue;
            }
            let brightness = match self.get_brightness(detected.bus).await {
                Ok(b) => b,
                Err(e) => {
                    log::warn!(
                        "Skipping {} on bus {}, couldn't read brightness: {}",
                        detected.model,
                        detected.bus,
                        e
                    );
                    continue;
                }
            };
            displays.push(DisplayDescriptor {
                id: detected.id(),
                name: detected.model,
                brightness,
            });
        }
        Ok(displays)
    }

    async fn set_brightness(&self, id: &str, value: u16) -> Result<()> {
        let bus = bus_for_id(id)?.to_string();
        let value_arg = value.to_string();
        self.run(&["--bus", bus.as_str(), "setvcp", BRIGHTNESS_FEATURE, value_arg.as_str()])
            .await
            .context("Failed to set brightness")?;
        log::info!("Brightness set to {} for {}", value, id);
        Ok(())
    }
}

/// Map an id produced by [DetectedDisplay::id] back to its I2C bus number.
pub fn bus_for_id(id: &str) -> Result<u32> {
    id.strip_prefix("i2c-")
        .and_then(|bus| bus.parse().ok())
        .ok_or_else(|| anyhow!("Display not found"))
}

/// Parse the output of `ddcutil detect --terse`.
///
/// Blocks headed `Invalid display` and blocks without a bus line are
/// dropped, blocks with an empty or missing monitor line are kept with empty
/// names so the caller can decide what to do with them.
pub fn parse_detect_output(output: &str) -> Result<Vec<DetectedDisplay>> {
    let display_header = Regex::new(r"^Display\s+\d+")?;
    let bus_line = Regex::new(r"^\s*I2C bus:\s*/dev/i2c-(\d+)")?;
    let monitor_line = Regex::new(r"^\s*Monitor:\s*([^:]*):([^:]*):")?;

    let mut displays = Vec::new();
    let mut current: Option<(Option<u32>, String, String)> = None;
    let mut finish = |block: Option<(Option<u32>, String, String)>| {
        if let Some((Some(bus), manufacturer, model)) = block {
            displays.push(DetectedDisplay {
                bus,
                manufacturer,
                model,
            });
        }
    };

    for line in output.lines() {
        if display_header.is_match(line) {
            finish(current.take());
            current = Some((None, String::new(), String::new()));
        } else if line.starts_with(|c: char| !c.is_whitespace()) {
            // Any other unindented line starts a block we're not interested in
            finish(current.take());
        } else if let Some((bus, manufacturer, model)) = current.as_mut() {
            if let Some(captures) = bus_line.captures(line) {
                *bus = captures[1].parse().ok();
            } else if let Some(captures) = monitor_line.captures(line) {
                *manufacturer = captures[1].trim().to_owned();
                *model = captures[2].trim().to_owned();
            }
        }
    }
    finish(current.take());
    Ok(displays)
}

/// Parse the current value from `ddcutil getvcp 10 --terse`, which looks
/// like `VCP 10 C 50 100`.
pub fn parse_brightness(output: &str) -> Result<u16> {
    let re = Regex::new(r"VCP\s+10\s+C\s+(\d+)\s+\d+")?;
    let captures = re
        .captures(output)
        .ok_or_else(|| anyhow!("failed to parse ddcutil output: {}", output.trim()))?;
    Ok(captures[1].parse()?)
}
