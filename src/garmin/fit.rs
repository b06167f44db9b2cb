// ABOUTME: Minimal FIT encoder for weight-scale files accepted by the Garmin upload service
// ABOUTME: Writes file_id, file_creator, device_info and weight_scale messages with a CRC-16 trailer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # FIT weight files
//!
//! Only the subset of the FIT protocol needed for one body-composition
//! record is implemented. Every message is written as a definition record
//! followed by one data record, little-endian, with a 12-byte header (no
//! header CRC) and a CRC-16 over the whole file.

use bodycomp_core::Measurement;
use chrono::{DateTime, Utc};

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z)
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

const HEADER_SIZE: u8 = 12;
const PROTOCOL_VERSION: u8 = 16;
const PROFILE_VERSION: u16 = 108;
const FILE_TYPE_WEIGHT: u32 = 9;

const MESG_FILE_ID: u16 = 0;
const MESG_DEVICE_INFO: u16 = 23;
const MESG_WEIGHT_SCALE: u16 = 30;
const MESG_FILE_CREATOR: u16 = 49;

const LOCAL_FILE_ID: u8 = 0;
const LOCAL_FILE_CREATOR: u8 = 1;
const LOCAL_DEVICE_INFO: u8 = 2;
const LOCAL_WEIGHT_SCALE: u8 = 3;

const DEFINITION_FLAG: u8 = 0x40;

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

/// FIT base types used by weight files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseType {
    Enum,
    Uint8,
    Uint16,
    Uint32,
    Uint32z,
}

impl BaseType {
    const fn id(self) -> u8 {
        match self {
            Self::Enum => 0x00,
            Self::Uint8 => 0x02,
            Self::Uint16 => 0x84,
            Self::Uint32 => 0x86,
            Self::Uint32z => 0x8C,
        }
    }

    const fn size(self) -> u8 {
        match self {
            Self::Enum | Self::Uint8 => 1,
            Self::Uint16 => 2,
            Self::Uint32 | Self::Uint32z => 4,
        }
    }

    const fn invalid(self) -> u32 {
        match self {
            Self::Enum | Self::Uint8 => 0xFF,
            Self::Uint16 => 0xFFFF,
            Self::Uint32 => 0xFFFF_FFFF,
            Self::Uint32z => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Field {
    number: u8,
    base: BaseType,
    value: Option<u32>,
}

const fn field(number: u8, base: BaseType, value: Option<u32>) -> Field {
    Field {
        number,
        base,
        value,
    }
}

/// Scale a physical value into its stored integer, `None` when unrepresentable
fn scaled(value: Option<f64>, scale: f64, base: BaseType) -> Option<u32> {
    let raw = (value? * scale).round();
    if !raw.is_finite() || raw < 0.0 || raw >= f64::from(base.invalid()) {
        return None;
    }
    Some(raw as u32)
}

/// Seconds since the FIT epoch
#[must_use]
pub fn fit_timestamp(at: DateTime<Utc>) -> u32 {
    u32::try_from(at.timestamp() - FIT_EPOCH_OFFSET).unwrap_or(0)
}

/// CRC-16 as defined by the FIT protocol
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &byte| {
        let crc = crc16_nibble(crc, byte & 0x0F);
        crc16_nibble(crc, byte >> 4)
    })
}

const fn crc16_nibble(crc: u16, nibble: u8) -> u16 {
    let tmp = CRC_TABLE[(crc & 0x0F) as usize];
    let crc = (crc >> 4) & 0x0FFF;
    crc ^ tmp ^ CRC_TABLE[nibble as usize]
}

/// Body composition values of one weight_scale record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightScaleRecord {
    /// kg
    pub weight: f64,
    /// %
    pub percent_fat: Option<f64>,
    /// %
    pub percent_hydration: Option<f64>,
    /// kg
    pub visceral_fat_mass: Option<f64>,
    /// kg
    pub bone_mass: Option<f64>,
    /// kg
    pub muscle_mass: Option<f64>,
    /// kcal/day
    pub basal_met: Option<f64>,
    /// kcal/day
    pub active_met: Option<f64>,
    /// 1-9
    pub physique_rating: Option<u8>,
    /// years
    pub metabolic_age: Option<u8>,
    /// 1-59
    pub visceral_fat_rating: Option<u8>,
    /// kg/m^2
    pub bmi: Option<f64>,
}

impl From<&Measurement> for WeightScaleRecord {
    fn from(m: &Measurement) -> Self {
        Self {
            weight: m.weight_kg,
            percent_fat: m.percent_fat,
            percent_hydration: m.percent_hydration,
            visceral_fat_mass: None,
            bone_mass: m.bone_mass_kg,
            muscle_mass: Some(m.muscle_mass_kg),
            basal_met: m.basal_met,
            active_met: None,
            physique_rating: None,
            metabolic_age: m.metabolic_age,
            visceral_fat_rating: m
                .visceral_fat_rating
                .and_then(|rating| u8::try_from(rating).ok()),
            bmi: m.bmi,
        }
    }
}

/// Incremental writer for a weight FIT file
#[derive(Debug)]
pub struct FitWeightEncoder {
    buf: Vec<u8>,
}

impl Default for FitWeightEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FitWeightEncoder {
    /// Start a file; the header is patched in [`FitWeightEncoder::finish`]
    #[must_use]
    pub fn new() -> Self {
        let mut encoder = Self {
            buf: Vec::with_capacity(256),
        };
        encoder.write_header(0);
        encoder
    }

    fn write_header(&mut self, data_size: u32) {
        let mut header = Vec::with_capacity(usize::from(HEADER_SIZE));
        header.push(HEADER_SIZE);
        header.push(PROTOCOL_VERSION);
        header.extend_from_slice(&PROFILE_VERSION.to_le_bytes());
        header.extend_from_slice(&data_size.to_le_bytes());
        header.extend_from_slice(b".FIT");

        if self.buf.len() >= header.len() {
            self.buf[..header.len()].copy_from_slice(&header);
        } else {
            self.buf = header;
        }
    }

    fn write_message(&mut self, local: u8, global: u16, fields: &[Field]) {
        self.buf.push(DEFINITION_FLAG | local);
        self.buf.push(0); // reserved
        self.buf.push(0); // little-endian
        self.buf.extend_from_slice(&global.to_le_bytes());
        self.buf.push(fields.len() as u8);
        for f in fields {
            self.buf.extend_from_slice(&[f.number, f.base.size(), f.base.id()]);
        }

        self.buf.push(local);
        for f in fields {
            let raw = f.value.unwrap_or_else(|| f.base.invalid());
            let bytes = raw.to_le_bytes();
            self.buf.extend_from_slice(&bytes[..usize::from(f.base.size())]);
        }
    }

    /// `file_id` message identifying a weight file
    pub fn write_file_id(&mut self, time_created: u32) {
        self.write_message(
            LOCAL_FILE_ID,
            MESG_FILE_ID,
            &[
                field(3, BaseType::Uint32z, None), // serial_number
                field(4, BaseType::Uint32, Some(time_created)),
                field(1, BaseType::Uint16, None), // manufacturer
                field(2, BaseType::Uint16, None), // product
                field(5, BaseType::Uint16, None), // number
                field(0, BaseType::Enum, Some(FILE_TYPE_WEIGHT)),
            ],
        );
    }

    /// `file_creator` message with unknown versions
    pub fn write_file_creator(&mut self) {
        self.write_message(
            LOCAL_FILE_CREATOR,
            MESG_FILE_CREATOR,
            &[
                field(0, BaseType::Uint16, None), // software_version
                field(1, BaseType::Uint8, None),  // hardware_version
            ],
        );
    }

    /// `device_info` message with only a timestamp
    pub fn write_device_info(&mut self, timestamp: u32) {
        self.write_message(
            LOCAL_DEVICE_INFO,
            MESG_DEVICE_INFO,
            &[
                field(253, BaseType::Uint32, Some(timestamp)),
                field(3, BaseType::Uint32z, None), // serial_number
                field(7, BaseType::Uint32, None),  // cum_operating_time
                field(8, BaseType::Uint32, None),
                field(2, BaseType::Uint16, None), // manufacturer
                field(4, BaseType::Uint16, None), // product
                field(5, BaseType::Uint16, None), // software_version
                field(10, BaseType::Uint16, None), // battery_voltage
                field(0, BaseType::Uint8, None),  // device_index
                field(1, BaseType::Uint8, None),  // device_type
                field(6, BaseType::Uint8, None),  // hardware_version
                field(11, BaseType::Uint8, None), // battery_status
            ],
        );
    }

    /// `weight_scale` message carrying the measurement
    pub fn write_weight_scale(&mut self, timestamp: u32, record: &WeightScaleRecord) {
        use BaseType::{Uint16, Uint32, Uint8};
        self.write_message(
            LOCAL_WEIGHT_SCALE,
            MESG_WEIGHT_SCALE,
            &[
                field(253, Uint32, Some(timestamp)),
                field(0, Uint16, scaled(Some(record.weight), 100.0, Uint16)),
                field(1, Uint16, scaled(record.percent_fat, 100.0, Uint16)),
                field(2, Uint16, scaled(record.percent_hydration, 100.0, Uint16)),
                field(3, Uint16, scaled(record.visceral_fat_mass, 100.0, Uint16)),
                field(4, Uint16, scaled(record.bone_mass, 100.0, Uint16)),
                field(5, Uint16, scaled(record.muscle_mass, 100.0, Uint16)),
                field(7, Uint16, scaled(record.basal_met, 4.0, Uint16)),
                field(9, Uint16, scaled(record.active_met, 4.0, Uint16)),
                field(8, Uint8, record.physique_rating.map(u32::from)),
                field(10, Uint8, record.metabolic_age.map(u32::from)),
                field(11, Uint8, record.visceral_fat_rating.map(u32::from)),
                field(13, Uint16, scaled(record.bmi, 10.0, Uint16)),
            ],
        );
    }

    /// Patch the data size and append the file CRC
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        let data_size = (self.buf.len() - usize::from(HEADER_SIZE)) as u32;
        self.write_header(data_size);
        let crc = crc16(&self.buf);
        self.buf.extend_from_slice(&crc.to_le_bytes());
        self.buf
    }
}

/// Encode one measurement taken at `at` as a complete FIT file
#[must_use]
pub fn encode_measurement(measurement: &Measurement, at: DateTime<Utc>) -> Vec<u8> {
    let timestamp = fit_timestamp(at);
    let mut encoder = FitWeightEncoder::new();
    encoder.write_file_id(timestamp);
    encoder.write_file_creator();
    encoder.write_device_info(timestamp);
    encoder.write_weight_scale(timestamp, &WeightScaleRecord::from(measurement));
    encoder.finish()
}
