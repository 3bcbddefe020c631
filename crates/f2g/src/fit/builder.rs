//! Low-level FIT binary assembly: header, definition records, data
//! records, trailing CRC.
//!
//! Everything is little-endian. Each message shape gets a definition
//! record on local message type 0 immediately before its data; the record
//! stream reuses one definition for all rows.

use super::crc;
use super::profile::{BaseType, PROFILE_VERSION, PROTOCOL_VERSION};

const HEADER_SIZE: u8 = 14;
const DEFINITION_HEADER: u8 = 0x40;
const DATA_HEADER: u8 = 0x00;

/// One field of a message: profile field number, base type, raw value
/// (already scaled to the profile's storage unit).
#[derive(Clone, Copy, Debug)]
pub struct Field {
    pub num: u8,
    pub base: BaseType,
    pub value: u32,
}

impl Field {
    pub fn new(num: u8, base: BaseType, value: u32) -> Self {
        Self { num, base, value }
    }
}

#[derive(Clone, Debug)]
pub struct Message {
    pub global_num: u16,
    pub fields: Vec<Field>,
}

#[derive(Debug, Default)]
pub struct FitFileBuilder {
    body: Vec<u8>,
}

impl FitFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a definition record followed by its single data record.
    pub fn add(&mut self, msg: &Message) {
        let layout: Vec<(u8, BaseType)> = msg.fields.iter().map(|f| (f.num, f.base)).collect();
        self.write_definition(msg.global_num, &layout);
        let values: Vec<u32> = msg.fields.iter().map(|f| f.value).collect();
        self.write_data_row(&layout, &values);
    }

    /// Append one definition for `layout` and then one data record per
    /// row. Row values must match the layout positionally; absent values
    /// are the base type's invalid placeholder.
    pub fn add_rows(&mut self, global_num: u16, layout: &[(u8, BaseType)], rows: &[Vec<u32>]) {
        self.write_definition(global_num, layout);
        for row in rows {
            self.write_data_row(layout, row);
        }
    }

    fn write_definition(&mut self, global_num: u16, layout: &[(u8, BaseType)]) {
        self.body.push(DEFINITION_HEADER);
        self.body.push(0); // reserved
        self.body.push(0); // architecture: little-endian
        self.body.extend_from_slice(&global_num.to_le_bytes());
        self.body.push(layout.len() as u8);
        for (num, base) in layout {
            self.body.push(*num);
            self.body.push(base.size());
            self.body.push(base.code());
        }
    }

    fn write_data_row(&mut self, layout: &[(u8, BaseType)], values: &[u32]) {
        debug_assert_eq!(layout.len(), values.len());
        self.body.push(DATA_HEADER);
        for ((_, base), value) in layout.iter().zip(values) {
            match base {
                BaseType::Enum | BaseType::Uint8 => self.body.push(*value as u8),
                BaseType::Uint16 => self.body.extend_from_slice(&(*value as u16).to_le_bytes()),
                BaseType::Uint32 => self.body.extend_from_slice(&value.to_le_bytes()),
            }
        }
    }

    /// Finalize: 14-byte header (with header CRC), body, file CRC.
    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE as usize + self.body.len() + 2);
        out.push(HEADER_SIZE);
        out.push(PROTOCOL_VERSION);
        out.extend_from_slice(&PROFILE_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.body.len() as u32).to_le_bytes());
        out.extend_from_slice(b".FIT");
        let header_crc = crc::checksum(&out[..12]);
        out.extend_from_slice(&header_crc.to_le_bytes());
        out.extend_from_slice(&self.body);
        let file_crc = crc::checksum(&out);
        out.extend_from_slice(&file_crc.to_le_bytes());
        out
    }
}
