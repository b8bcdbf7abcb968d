/// Bluetooth Low Energy scanning that feeds the capture store
use bluer::{Adapter, AdapterEvent, Address, Device, Uuid};
use futures_util::{pin_mut, StreamExt};
use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::advertising::EncodeDiagnostic;
use crate::capture::{lock_store, SharedStore};
use crate::config::{CaptureConfig, UuidParsePolicy};
use crate::models::AdvertisementObservation;
use crate::report::format_packet;

/// Read the advertised fields of a device into an observation
///
/// # Returns
/// Ok(None) for devices that are only cached by BlueZ and have no current RSSI
pub async fn read_observation(device: &Device) -> bluer::Result<Option<AdvertisementObservation>> {
    let address = device.address().to_string().to_uppercase();

    let rssi = match device.rssi().await? {
        Some(rssi) => rssi,
        None => {
            debug!("No RSSI for {}, device not in range", address);
            return Ok(None);
        }
    };

    let name = device.name().await?;
    let uuids = device.uuids().await?.unwrap_or_default();
    let service_data = device.service_data().await?.unwrap_or_default();
    let manufacturer_data = device.manufacturer_data().await?.unwrap_or_default();

    Ok(Some(build_observation(
        address,
        name,
        rssi,
        uuids,
        service_data,
        manufacturer_data,
    )))
}

/// Assemble an observation from the raw device properties
///
/// bluer reports UUIDs and data as hash collections. They are sorted so that
/// an unchanged advertisement always encodes to the same payload.
pub fn build_observation<U, S, M>(
    address: String,
    name: Option<String>,
    rssi: i16,
    uuids: U,
    service_data: S,
    manufacturer_data: M,
) -> AdvertisementObservation
where
    U: IntoIterator<Item = Uuid>,
    S: IntoIterator<Item = (Uuid, Vec<u8>)>,
    M: IntoIterator<Item = (u16, Vec<u8>)>,
{
    let mut service_uuids: Vec<String> = uuids.into_iter().map(|uuid| uuid.to_string()).collect();
    service_uuids.sort();

    let mut service_data: Vec<(String, Vec<u8>)> = service_data
        .into_iter()
        .map(|(uuid, data)| (uuid.to_string(), data))
        .collect();
    service_data.sort();

    let mut manufacturer_data: Vec<(u16, Vec<u8>)> = manufacturer_data.into_iter().collect();
    manufacturer_data.sort();

    AdvertisementObservation {
        address,
        name,
        rssi,
        service_uuids,
        service_data,
        manufacturer_data,
    }
}

fn log_diagnostics(address: &str, diagnostics: &[EncodeDiagnostic], policy: UuidParsePolicy) {
    for diagnostic in diagnostics {
        match (diagnostic.is_parse_skipped(), policy) {
            (true, UuidParsePolicy::Ignore) => debug!("{}: {}", address, diagnostic),
            _ => warn!("{}: {}", address, diagnostic),
        }
    }
}

/// Hand one device event to the store
///
/// Failures to read a device are logged and swallowed so that a single
/// misbehaving peripheral never stops the session.
async fn handle_device(adapter: &Adapter, addr: Address, config: &CaptureConfig, store: &SharedStore) {
    let device = match adapter.device(addr) {
        Ok(device) => device,
        Err(e) => {
            debug!("Failed to get device {}: {}", addr, e);
            return;
        }
    };

    let observation = match read_observation(&device).await {
        Ok(Some(observation)) => observation,
        Ok(None) => return,
        Err(e) => {
            debug!("Failed to read properties of {}: {}", addr, e);
            return;
        }
    };

    if !config.accepts(&observation.address, observation.name.as_deref()) {
        return;
    }

    // No await while the store is locked
    let mut store = lock_store(store);
    let count = store.len();
    let observed = store.observe(&observation);
    if observed.is_new {
        info!(
            "Captured packet #{} from {} ({})",
            count + 1,
            observed.packet.address,
            observed.packet.name
        );
        println!("{}{}", format_packet(observed.packet), "-".repeat(80));
        log_diagnostics(&observed.packet.address, &observed.diagnostics, config.uuid_policy);
    }
}

/// Capture advertisements into `store` for the configured duration
///
/// Discovery runs in a background task that feeds every device event through
/// the store. The wait ends after `config.duration` or on Ctrl+C; either way
/// scanning stops and everything captured so far stays in the store.
///
/// # Arguments
/// * `config` - Adapter, duration and device filters
/// * `store` - Session store shared with the discovery task
///
/// # Returns
/// Error only if the adapter could not be set up for scanning
pub async fn capture_advertisements(
    config: &CaptureConfig,
    store: SharedStore,
) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize Bluetooth session
    let session = match bluer::Session::new().await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create Bluetooth session: {}", e);
            return Err(e.into());
        }
    };

    let adapter = match session.adapter(&config.adapter) {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Failed to get Bluetooth adapter {}: {}", config.adapter, e);
            return Err(e.into());
        }
    };

    if let Err(e) = adapter.set_powered(true).await {
        error!("Failed to power on adapter: {}", e);
        return Err(e.into());
    }

    // Every advertisement is wanted, repeats included
    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le,
        duplicate_data: true,
        ..Default::default()
    };

    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    info!(
        "Scanning for BLE advertisements on {} for {} seconds",
        config.adapter,
        config.duration.as_secs()
    );

    let discovery_handle = match adapter.discover_devices_with_changes().await {
        Ok(events) => {
            let adapter = adapter.clone();
            let config = config.clone();
            let store = store.clone();
            tokio::spawn(async move {
                pin_mut!(events);
                while let Some(event) = events.next().await {
                    match event {
                        AdapterEvent::DeviceAdded(addr) => {
                            handle_device(&adapter, addr, &config, &store).await
                        }
                        other => debug!("Discovery event: {:?}", other),
                    }
                }
            })
        }
        Err(e) => {
            error!("Failed to start device discovery: {}", e);
            return Err(e.into());
        }
    };

    tokio::select! {
        _ = sleep(config.duration) => info!("Scan duration elapsed"),
        _ = tokio::signal::ctrl_c() => info!("Scan interrupted, keeping captured packets"),
    }

    // Dropping the event stream ends discovery
    discovery_handle.abort();

    info!("Scan complete, {} distinct packets captured", lock_store(&store).len());
    Ok(())
}
