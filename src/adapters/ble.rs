//! BLE GATT peripheral adapter.
//!
//! Exposes one primary service with a write characteristic (inbound frames)
//! and a notify characteristic (responses). Radio callbacks are translated
//! into [`LinkEvent`]s on the connection's inbound queue; [`NotifyPort`] is
//! the outbound half.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via `esp_idf_svc::sys`.
//! - **all other targets**: simulation that records notifications and lets
//!   tests or the console inject radio events.
//!
//! ## GATT layout
//!
//! | Characteristic | UUID                                     | Props        |
//! |----------------|------------------------------------------|--------------|
//! | RX (write)     | `5d4abcf9-9eb6-4b0f-94d9-d9cecf1d18ed`   | Write        |
//! | TX (notify)    | `5d4abcfa-9eb6-4b0f-94d9-d9cecf1d18ed`   | Notify + CCCD|

use std::sync::Arc;

use log::{info, warn};

use crate::app::commands::LinkEvent;
use crate::app::ports::{BleError, NotifyPort};
use crate::protocol::channels::{InboundQueue, offer};

use super::utils::format_mac;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x5d4abcf8_9eb6_4b0f_94d9_d9cecf1d18ed;
pub const CHAR_RX_UUID: u128 = 0x5d4abcf9_9eb6_4b0f_94d9_d9cecf1d18ed;
pub const CHAR_TX_UUID: u128 = 0x5d4abcfa_9eb6_4b0f_94d9_d9cecf1d18ed;

/// Client Characteristic Configuration descriptor.
pub const CCCD_UUID: u16 = 0x2902;

/// Largest attribute value the stack will notify.
pub const MAX_NOTIFY_LEN: usize = 512;

const DEVICE_NAME_MAX: usize = 29;

#[cfg(not(target_os = "espidf"))]
const SIM_MAC: [u8; 6] = [0x02, 0x00, 0x5d, 0x4a, 0xbc, 0xf8];

// ───────────────────────────────────────────────────────────────
// State
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Connected,
    Failed,
}

/// CCCD value decoding: bit 0 = notifications enabled.
pub fn cccd_enables_notify(value: &[u8]) -> bool {
    value.first().is_some_and(|b| b & 0x01 != 0)
}

// ── ESP-IDF static bridge ─────────────────────────────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. Handles live in atomics and the inbound queue in a OnceLock.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONN_ID: AtomicU32 = AtomicU32::new(u32::MAX);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_RX_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_TX_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CCCD_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_INBOUND: std::sync::OnceLock<Arc<InboundQueue>> = std::sync::OnceLock::new();

/// `false` when the queue refused the event.
#[cfg(target_os = "espidf")]
fn push_from_stack(event: LinkEvent) -> bool {
    let Some(queue) = BLE_INBOUND.get() else {
        return false;
    };
    let taken = offer(queue, event);
    if !taken {
        log::warn!("BLE GATTS: inbound queue full, write refused");
    }
    taken
}

#[cfg(target_os = "espidf")]
fn check(step: &str, ret: esp_idf_svc::sys::esp_err_t) -> Result<(), BleError> {
    if ret != esp_idf_svc::sys::ESP_OK as esp_idf_svc::sys::esp_err_t {
        log::error!("BLE: {} failed ({})", step, ret);
        return Err(BleError::InitFailed);
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    t.uuid.uuid128 = uuid.to_le_bytes();
    t
}

#[cfg(target_os = "espidf")]
unsafe fn start_advertising() {
    use esp_idf_svc::sys::*;
    let mut adv_params = esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        ..unsafe { core::mem::zeroed() }
    };
    unsafe { esp_ble_gap_start_advertising(&mut adv_params) };
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    BLE_GATTS_IF.store(gatts_if as u32, AtomicOrdering::Relaxed);

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid128_to_esp(SERVICE_UUID),
                    inst_id: 0,
                },
                is_primary: true,
            };
            unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8) };
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let svc_handle = unsafe { (*param).create.service_handle };
            BLE_SVC_HANDLE.store(svc_handle as u32, AtomicOrdering::Relaxed);
            BLE_CHAR_STEP.store(1, AtomicOrdering::Relaxed);
            let mut uuid = uuid128_to_esp(CHAR_RX_UUID);
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
                esp_ble_gatts_add_char(
                    svc_handle,
                    &mut uuid,
                    ESP_GATT_PERM_WRITE as esp_gatt_perm_t,
                    (ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_WRITE_NR)
                        as esp_gatt_char_prop_t,
                    core::ptr::null_mut(),
                    core::ptr::null_mut(),
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let handle = unsafe { (*param).add_char.attr_handle };
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            match BLE_CHAR_STEP.load(AtomicOrdering::Relaxed) {
                1 => {
                    BLE_RX_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    BLE_CHAR_STEP.store(2, AtomicOrdering::Relaxed);
                    let mut uuid = uuid128_to_esp(CHAR_TX_UUID);
                    unsafe {
                        esp_ble_gatts_add_char(
                            svc_handle,
                            &mut uuid,
                            ESP_GATT_PERM_READ as esp_gatt_perm_t,
                            ESP_GATT_CHAR_PROP_BIT_NOTIFY as esp_gatt_char_prop_t,
                            core::ptr::null_mut(),
                            core::ptr::null_mut(),
                        );
                    }
                }
                2 => {
                    BLE_TX_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    BLE_CHAR_STEP.store(3, AtomicOrdering::Relaxed);
                    let mut uuid: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
                    uuid.len = 2;
                    uuid.uuid.uuid16 = CCCD_UUID;
                    unsafe {
                        esp_ble_gatts_add_char_descr(
                            svc_handle,
                            &mut uuid,
                            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                            core::ptr::null_mut(),
                            core::ptr::null_mut(),
                        );
                    }
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            let handle = unsafe { (*param).add_char_descr.attr_handle };
            BLE_CCCD_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
            log::info!(
                "BLE GATTS: rx={} tx={} cccd={} registered",
                BLE_RX_HANDLE.load(AtomicOrdering::Relaxed),
                BLE_TX_HANDLE.load(AtomicOrdering::Relaxed),
                handle
            );
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let conn_id = unsafe { (*param).connect.conn_id };
            BLE_CONN_ID.store(conn_id as u32, AtomicOrdering::Relaxed);
            push_from_stack(LinkEvent::Connected);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONN_ID.store(u32::MAX, AtomicOrdering::Relaxed);
            push_from_stack(LinkEvent::Disconnected);
            unsafe { start_advertising() };
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            let data: &[u8] = if p.value.is_null() || p.len == 0 {
                &[]
            } else {
                unsafe { core::slice::from_raw_parts(p.value, p.len as usize) }
            };
            let handle = p.handle as u32;

            let taken = if handle == BLE_RX_HANDLE.load(AtomicOrdering::Relaxed) {
                push_from_stack(LinkEvent::received(data))
            } else if handle == BLE_CCCD_HANDLE.load(AtomicOrdering::Relaxed) {
                push_from_stack(if cccd_enables_notify(data) {
                    LinkEvent::Subscribed
                } else {
                    LinkEvent::Unsubscribed
                })
            } else {
                true
            };

            // A refused write-without-response is lost; the peer only learns
            // of it through the missing reply.
            if p.need_rsp {
                let status = if taken {
                    esp_gatt_status_t_ESP_GATT_OK
                } else {
                    esp_gatt_status_t_ESP_GATT_BUSY
                };
                unsafe {
                    esp_ble_gatts_send_response(
                        gatts_if,
                        p.conn_id,
                        p.trans_id,
                        status,
                        core::ptr::null_mut(),
                    );
                }
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    state: BleState,
    device_name: heapless::String<DEVICE_NAME_MAX>,
    inbound: Arc<InboundQueue>,
    /// Simulation: every notification handed to the radio, in order.
    #[cfg(not(target_os = "espidf"))]
    sent: Vec<Vec<u8>>,
}

impl BleAdapter {
    /// `device_name` is truncated to the 29 bytes an advertisement can carry.
    pub fn new(device_name: &str, inbound: Arc<InboundQueue>) -> Self {
        let mut name = heapless::String::new();
        for c in device_name.chars() {
            if name.push(c).is_err() {
                break;
            }
        }
        Self {
            state: BleState::Idle,
            device_name: name,
            inbound,
            #[cfg(not(target_os = "espidf"))]
            sent: Vec::new(),
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, BleState::Advertising | BleState::Connected)
    }

    pub fn start(&mut self) -> Result<(), BleError> {
        info!("BLE: starting advertising as '{}'", self.device_name);
        if let Err(e) = self.platform_start() {
            self.state = BleState::Failed;
            return Err(e);
        }
        self.state = BleState::Advertising;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.platform_stop();
        self.state = BleState::Idle;
        info!("BLE: stopped");
    }

    // ── Radio-side hooks ──────────────────────────────────────
    //
    // Called by tests and the host simulation the way the stack bridge is
    // called on device. Each one becomes exactly one inbound event. Writes
    // return `Busy` when the queue is full so the peer can retry.

    pub fn on_central_connected(&mut self) {
        self.state = BleState::Connected;
        if self.push(LinkEvent::Connected).is_err() {
            warn!("BLE: connect event refused, next session starts on first write");
        }
    }

    /// Never refused: the queue parks it until there is room.
    pub fn on_central_disconnected(&mut self) {
        if self.state != BleState::Idle {
            self.state = BleState::Advertising;
        }
        let _ = self.push(LinkEvent::Disconnected);
    }

    pub fn on_rx_write(&mut self, data: &[u8]) -> Result<(), BleError> {
        self.push(LinkEvent::received(data))
    }

    pub fn on_cccd_write(&mut self, value: &[u8]) -> Result<(), BleError> {
        self.push(if cccd_enables_notify(value) {
            LinkEvent::Subscribed
        } else {
            LinkEvent::Unsubscribed
        })
    }

    fn push(&self, event: LinkEvent) -> Result<(), BleError> {
        if offer(&self.inbound, event) {
            Ok(())
        } else {
            warn!("BLE: inbound queue full, write refused");
            Err(BleError::Busy)
        }
    }

    /// Simulation: drain recorded notifications.
    #[cfg(not(target_os = "espidf"))]
    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.sent)
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), BleError> {
        use esp_idf_svc::sys::*;

        let _ = BLE_INBOUND.set(self.inbound.clone());

        let mut mac = [0u8; 6];
        // SAFETY: `mac` is 6 bytes, as esp_read_mac requires for BT addresses.
        unsafe { esp_read_mac(mac.as_mut_ptr(), esp_mac_type_t_ESP_MAC_BT) };

        let mut name = [0u8; DEVICE_NAME_MAX + 1];
        name[..self.device_name.len()].copy_from_slice(self.device_name.as_bytes());

        // SAFETY: single-threaded stack bring-up from the main task.
        unsafe {
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            check("bt_controller_init", esp_bt_controller_init(&mut bt_cfg))?;
            check(
                "bt_controller_enable",
                esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
            )?;
            check("bluedroid_init", esp_bluedroid_init())?;
            check("bluedroid_enable", esp_bluedroid_enable())?;

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            esp_ble_gatts_app_register(0);
            esp_ble_gap_set_device_name(name.as_ptr() as *const _);
            start_advertising();
        }

        info!("BLE(espidf): Bluedroid up, address {}", format_mac(&mac));
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), BleError> {
        info!(
            "BLE(sim): advertising '{}' at {} (service {:032x})",
            self.device_name,
            format_mac(&SIM_MAC),
            SERVICE_UUID
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        use esp_idf_svc::sys::*;
        // SAFETY: tears down what platform_start brought up, same task.
        unsafe {
            esp_ble_gap_stop_advertising();
            esp_bluedroid_disable();
            esp_bluedroid_deinit();
            esp_bt_controller_disable();
            esp_bt_controller_deinit();
        }
        info!("BLE(espidf): stack shut down");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {
        info!("BLE(sim): stopped");
    }

    #[cfg(target_os = "espidf")]
    fn platform_notify(&mut self, bytes: &[u8]) -> Result<(), BleError> {
        use esp_idf_svc::sys::*;
        let conn = BLE_CONN_ID.load(AtomicOrdering::Relaxed);
        let handle = BLE_TX_HANDLE.load(AtomicOrdering::Relaxed);
        if conn == u32::MAX || handle == 0 {
            return Err(BleError::NotifyFailed);
        }
        // SAFETY: the stack copies `bytes` before returning.
        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as esp_gatt_if_t,
                conn as u16,
                handle as u16,
                bytes.len() as u16,
                bytes.as_ptr() as *mut u8,
                false,
            )
        };
        if ret != ESP_OK as i32 {
            return Err(BleError::NotifyFailed);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_notify(&mut self, bytes: &[u8]) -> Result<(), BleError> {
        self.sent.push(bytes.to_vec());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// NotifyPort
// ───────────────────────────────────────────────────────────────

impl NotifyPort for BleAdapter {
    fn notify(&mut self, bytes: &[u8]) -> Result<(), BleError> {
        if bytes.len() > MAX_NOTIFY_LEN {
            return Err(BleError::TooLarge);
        }
        self.platform_notify(bytes)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_adapter() -> (BleAdapter, Arc<InboundQueue>) {
        let q = Arc::new(InboundQueue::new());
        (BleAdapter::new("bleprov-test", q.clone()), q)
    }

    #[test]
    fn start_stop_lifecycle() {
        let (mut adapter, _) = make_adapter();
        assert_eq!(adapter.state(), BleState::Idle);
        adapter.start().unwrap();
        assert!(adapter.is_active());
        adapter.stop();
        assert_eq!(adapter.state(), BleState::Idle);
    }

    #[test]
    fn radio_callbacks_become_link_events() {
        let (mut adapter, q) = make_adapter();
        adapter.start().unwrap();
        adapter.on_central_connected();
        adapter.on_cccd_write(&[0x01, 0x00]).unwrap();
        adapter.on_rx_write(&[0x24, 0x23]).unwrap();
        adapter.on_cccd_write(&[0x00, 0x00]).unwrap();
        adapter.on_central_disconnected();

        assert_eq!(q.try_receive().ok(), Some(LinkEvent::Connected));
        assert_eq!(q.try_receive().ok(), Some(LinkEvent::Subscribed));
        assert_eq!(q.try_receive().ok(), LinkEvent::write(&[0x24, 0x23]));
        assert_eq!(q.try_receive().ok(), Some(LinkEvent::Unsubscribed));
        assert_eq!(q.try_receive().ok(), Some(LinkEvent::Disconnected));
        assert_eq!(adapter.state(), BleState::Advertising);
    }

    #[test]
    fn oversized_write_is_queued_as_malformed() {
        let (mut adapter, q) = make_adapter();
        adapter.on_rx_write(&[0x24; 300]).unwrap();
        assert_eq!(
            q.try_receive().ok(),
            Some(LinkEvent::Malformed {
                len: 300,
                error: crate::protocol::codec::FrameError::LengthMismatch,
            })
        );
    }

    #[test]
    fn full_queue_refuses_writes_but_keeps_disconnect() {
        let (mut adapter, q) = make_adapter();
        adapter.start().unwrap();
        for _ in 0..crate::protocol::channels::INBOUND_DEPTH {
            adapter.on_rx_write(&[0x24, 0x23]).unwrap();
        }
        assert_eq!(adapter.on_rx_write(&[0x24, 0x23]), Err(BleError::Busy));
        assert_eq!(adapter.on_cccd_write(&[0x01, 0x00]), Err(BleError::Busy));

        adapter.on_central_disconnected();
        let drained: Vec<_> = core::iter::from_fn(|| q.try_receive().ok()).collect();
        assert_eq!(drained.last(), Some(&LinkEvent::Disconnected));
        assert_eq!(drained.len(), crate::protocol::channels::INBOUND_DEPTH + 1);
    }

    #[test]
    fn notify_records_and_bounds() {
        let (mut adapter, _) = make_adapter();
        adapter.notify(b"ok").unwrap();
        assert_eq!(adapter.notify(&[0u8; MAX_NOTIFY_LEN + 1]), Err(BleError::TooLarge));
        assert_eq!(adapter.take_sent(), vec![b"ok".to_vec()]);
        assert!(adapter.take_sent().is_empty());
    }

    #[test]
    fn long_device_name_is_truncated() {
        let q = Arc::new(InboundQueue::new());
        let adapter = BleAdapter::new(&"n".repeat(40), q);
        assert_eq!(adapter.device_name.len(), DEVICE_NAME_MAX);
    }

    #[test]
    fn cccd_bit_zero_controls_notify() {
        assert!(cccd_enables_notify(&[0x01, 0x00]));
        assert!(cccd_enables_notify(&[0x03, 0x00]));
        assert!(!cccd_enables_notify(&[0x02, 0x00]));
        assert!(!cccd_enables_notify(&[]));
    }
}
