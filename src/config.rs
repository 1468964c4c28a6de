// Startup configuration: the supported-channel catalog and the engine's
// tunable knobs. Both are built once and passed explicitly to the components
// that need them; nothing here is ambient process state.

use serde::{Deserialize, Serialize};

// Which protocol implementation a channel type code resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    OtaXml,
    Stub,
}

// One supported OTA type as advertised to hotels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub name: String,
    pub default_endpoint: String,
    pub commission_pct: f64,
    pub adapter_kind: AdapterKind,
}

// Immutable table of supported channel types. Loaded once at startup; the
// default set covers the marketplaces the product ships connectors for.
#[derive(Debug, Clone)]
pub struct ChannelCatalog {
    entries: Vec<CatalogEntry>,
}

impl ChannelCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn find(&self, code: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.code == code)
    }
}

impl Default for ChannelCatalog {
    fn default() -> Self {
        Self::new(vec![
            CatalogEntry {
                code: "booking_com".to_string(),
                name: "Booking.com".to_string(),
                default_endpoint: "https://supply-xml.booking.com/hotels/xml".to_string(),
                commission_pct: 15.0,
                adapter_kind: AdapterKind::OtaXml,
            },
            CatalogEntry {
                code: "expedia".to_string(),
                name: "Expedia".to_string(),
                default_endpoint: "https://services.expediapartnercentral.com/eqc".to_string(),
                commission_pct: 18.0,
                adapter_kind: AdapterKind::Stub,
            },
            CatalogEntry {
                code: "agoda".to_string(),
                name: "Agoda".to_string(),
                default_endpoint: "https://supply.agoda.com/api".to_string(),
                commission_pct: 17.0,
                adapter_kind: AdapterKind::Stub,
            },
            CatalogEntry {
                code: "airbnb".to_string(),
                name: "Airbnb".to_string(),
                default_endpoint: "https://api.airbnb.com/v2".to_string(),
                commission_pct: 14.0,
                adapter_kind: AdapterKind::Stub,
            },
        ])
    }
}

// Engine knobs. The 30 second network timeout is a hard ceiling for every
// outbound OTA call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub timeout_secs: u64,
    pub sync_horizon_days: u32,
    pub default_pull_window_days: u32,
    pub page_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            sync_horizon_days: 365,
            default_pull_window_days: 30,
            page_size: 50,
        }
    }
}
