use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// One controllable display, as reported by a [DisplayBackend].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisplayDescriptor {
    /// Backend-assigned identifier, stable for the session
    pub id: String,
    /// Human-readable label, not used for identity
    pub name: String,
    /// Brightness percentage. Expected in 0..=100 but stored as given.
    pub brightness: u16,
}

impl DisplayDescriptor {
    pub fn new(id: &str, name: &str, brightness: u16) -> DisplayDescriptor {
        DisplayDescriptor {
            id: id.to_owned(),
            name: name.to_owned(),
            brightness,
        }
    }
}

/// The service which enumerates displays and applies brightness changes to
/// the hardware.
///
/// Implementations are cloned into the tasks which perform the calls, so
/// clones must share whatever connection or state they use.
#[async_trait]
pub trait DisplayBackend: Send + Sync + Clone + 'static {
    /// List all controllable displays. All-or-nothing, there are no partial
    /// results.
    async fn list_displays(&self) -> Result<Vec<DisplayDescriptor>>;

    /// Set the brightness of the display with the given id.
    async fn set_brightness(&self, id: &str, value: u16) -> Result<()>;
}
