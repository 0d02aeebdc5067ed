//! # Infinity Bus Constants
//!
//! Device addresses, table addresses, snoop windows and bit masks used by the
//! protocol engine and the decoders.

// Device addresses on the bus
pub const DEVICE_THERMOSTAT: u16 = 0x2001;
pub const DEVICE_AIR_HANDLER: u16 = 0x4001;
pub const DEVICE_HEAT_PUMP: u16 = 0x5001;
/// Source address used for every request this system writes.
pub const DEVICE_SAM: u16 = 0x9201;

// Frame layout
pub const FRAME_HEADER_LEN: usize = 8;
pub const FRAME_CRC_LEN: usize = 2;
pub const FRAME_MIN_LEN: usize = FRAME_HEADER_LEN + FRAME_CRC_LEN;
pub const FRAME_MAX_PAYLOAD: usize = 255;
pub const FRAME_MAX_LEN: usize = FRAME_MIN_LEN + FRAME_MAX_PAYLOAD;
pub const FRAME_LENGTH_OFFSET: usize = 4;

// Operations
pub const OP_ACK02: u8 = 0x02;
pub const OP_ACK06: u8 = 0x06;
pub const OP_READ_TABLE: u8 = 0x0b;
pub const OP_WRITE_TABLE: u8 = 0x0c;
pub const OP_NACK: u8 = 0x15;
pub const OP_CHANGE_TABLE_NAME: u8 = 0x1e;
pub const OP_ALARM_PACKET: u8 = 0x22;

/// Every table address and snoop discriminator is three bytes long.
pub const TABLE_ADDRESS_LEN: usize = 3;

// Thermostat tables
pub const TABLE_TSTAT_CURRENT_PARAMS: [u8; 3] = [0x00, 0x3b, 0x02];
pub const TABLE_TSTAT_ZONE_PARAMS: [u8; 3] = [0x00, 0x3b, 0x03];

// Snoop windows (inclusive)
pub const SNOOP_AIR_HANDLER_LOW: u16 = 0x4000;
pub const SNOOP_AIR_HANDLER_HIGH: u16 = 0x42ff;
pub const SNOOP_HEAT_PUMP_LOW: u16 = 0x5000;
pub const SNOOP_HEAT_PUMP_HIGH: u16 = 0x51ff;

// Snoop discriminators
pub const DISC_HEAT_PUMP_TEMPS: [u8; 3] = [0x00, 0x3e, 0x01];
pub const DISC_HEAT_PUMP_STAGE: [u8; 3] = [0x00, 0x3e, 0x02];
pub const DISC_AIR_HANDLER_BLOWER: [u8; 3] = [0x00, 0x03, 0x06];
pub const DISC_AIR_HANDLER_DUCT: [u8; 3] = [0x00, 0x03, 0x16];

// Bit-packed fields
pub const MODE_MASK: u8 = 0x0f;
pub const MODE_STAGE_SHIFT: u8 = 5;
pub const ZONE1_HOLD_MASK: u8 = 0x01;
pub const HEAT_PUMP_STAGE_SHIFT: u8 = 1;
/// Heat-pump temperatures are carried in sixteenths of a degree.
pub const HEAT_PUMP_TEMP_DIVISOR: f32 = 16.0;

// Cache keys
pub const KEY_THERMOSTAT: &str = "thermostat";
pub const KEY_BLOWER: &str = "blower";
pub const KEY_DUCT: &str = "duct";
pub const KEY_HEAT_PUMP: &str = "heatpump";
pub const KEY_HEAT_PUMP_STAGE: &str = "heatpumpstage";

// Serial link defaults
pub const DEFAULT_BAUD_RATE: u32 = 38400;
pub const DEFAULT_HTTP_PORT: u16 = 8080;
