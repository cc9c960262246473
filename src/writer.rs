//! Encoding of single-section PAT and PMT tables.
//!
//! Sections are written with `section_number = last_section_number = 0`,
//! `current_next_indicator` set, reserved bits set to one and a CRC-32/MPEG-2
//! trailer.

use super::{Error, ErrorDetails, Result};
use crate::bits::PID_MASK;
use crate::pat::ProgramAssociation;
use crc::{Crc, CRC_32_MPEG_2};
use modular_bitfield_msb::prelude::*;
use smallvec::SmallVec;

const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Largest `section_length` allowed for PAT and PMT sections.
pub const MAX_SECTION_LENGTH: usize = 1021;

pub const PAT_TABLE_ID: u8 = 0x00;
pub const PMT_TABLE_ID: u8 = 0x02;

#[bitfield]
#[derive(Debug)]
pub struct PsiHeader {
    pub table_id: B8,
    pub section_syntax_indicator: bool,
    pub private_bit: bool,
    pub reserved_bits: B2,
    pub section_length: B12,
}

#[bitfield]
#[derive(Debug)]
pub struct PsiTableSyntax {
    pub table_id_extension: B16,
    pub reserved_bits: B2,
    pub version: B5,
    pub current_next_indicator: bool,
    pub section_num: B8,
    pub last_section_num: B8,
}

#[bitfield]
#[derive(Debug)]
pub struct PatEntry {
    pub program_num: B16,
    pub reserved: B3,
    pub program_map_pid: B13,
}

#[bitfield]
#[derive(Debug)]
pub struct PmtHeader {
    pub reserved: B3,
    pub pcr_pid: B13,
    pub reserved2: B4,
    pub program_info_length: B12,
}

#[bitfield]
#[derive(Debug)]
pub struct ElementaryStreamInfoHeader {
    pub stream_type: B8,
    pub reserved: B3,
    pub elementary_pid: B13,
    pub reserved2: B4,
    pub es_info_length: B12,
}

/// A tagged, length-prefixed descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub tag: u8,
    pub data: SmallVec<[u8; 8]>,
}

impl Descriptor {
    pub fn new(tag: u8, data: &[u8]) -> Self {
        Self {
            tag,
            data: SmallVec::from_slice(data),
        }
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.data.len() > u8::MAX as usize {
            return Err(Error::new(0, ErrorDetails::DescriptorTooLong(self.data.len())));
        }
        out.push(self.tag);
        out.push(self.data.len() as u8);
        out.extend_from_slice(&self.data);
        Ok(())
    }
}

fn write_descriptors<'a, I>(descriptors: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a Descriptor>,
{
    let mut out = Vec::new();
    for descriptor in descriptors {
        descriptor.write(&mut out)?;
    }
    if out.len() > MAX_SECTION_LENGTH {
        return Err(Error::new(0, ErrorDetails::SectionTooLong(out.len())));
    }
    Ok(out)
}

/// Wraps a table body in the long-form section header and appends the CRC.
fn finish_section(table_id: u8, table_id_extension: u16, version: u8, body: &[u8]) -> Result<Vec<u8>> {
    // table syntax, body, CRC_32
    let section_length = 5 + body.len() + 4;
    if section_length > MAX_SECTION_LENGTH {
        return Err(Error::new(0, ErrorDetails::SectionTooLong(section_length)));
    }
    let header = PsiHeader::new()
        .with_table_id(table_id)
        .with_section_syntax_indicator(true)
        .with_private_bit(false)
        .with_reserved_bits(0b11)
        .with_section_length(section_length as u16);
    let syntax = PsiTableSyntax::new()
        .with_table_id_extension(table_id_extension)
        .with_reserved_bits(0b11)
        .with_version(version & 0x1F)
        .with_current_next_indicator(true)
        .with_section_num(0)
        .with_last_section_num(0);

    let mut out = Vec::with_capacity(3 + section_length);
    out.extend_from_slice(&header.into_bytes());
    out.extend_from_slice(&syntax.into_bytes());
    out.extend_from_slice(body);
    let crc = CRC.checksum(&out);
    out.extend_from_slice(&crc.to_be_bytes());
    Ok(out)
}

/// Program Association Table contents to encode.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatSection {
    pub transport_stream_id: u16,
    pub version: u8,
    /// Written first as the program 0 entry.
    pub network_pid: Option<u16>,
    pub programs: Vec<ProgramAssociation>,
}

impl PatSection {
    pub fn new(transport_stream_id: u16) -> Self {
        Self {
            transport_stream_id,
            ..Default::default()
        }
    }

    pub fn with_network_pid(mut self, pid: u16) -> Self {
        self.network_pid = Some(pid);
        self
    }

    pub fn with_program(mut self, program_number: u16, program_map_pid: u16) -> Self {
        self.programs.push(ProgramAssociation {
            program_number,
            program_map_pid,
        });
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let network = self.network_pid.map(|pid| (0, pid));
        let programs = self
            .programs
            .iter()
            .map(|p| (p.program_number, p.program_map_pid));

        let mut body = Vec::with_capacity((self.programs.len() + 1) * 4);
        for (program_num, pid) in network.into_iter().chain(programs) {
            let entry = PatEntry::new()
                .with_program_num(program_num)
                .with_reserved(0b111)
                .with_program_map_pid(pid & PID_MASK);
            body.extend_from_slice(&entry.into_bytes());
        }
        finish_section(PAT_TABLE_ID, self.transport_stream_id, self.version, &body)
    }
}

/// One elementary stream entry of a [`PmtSection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtStream {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub descriptors: SmallVec<[Descriptor; 4]>,
}

impl PmtStream {
    pub fn new(stream_type: u8, elementary_pid: u16) -> Self {
        Self {
            stream_type,
            elementary_pid,
            descriptors: SmallVec::new(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }
}

/// Program Map Table contents to encode.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PmtSection {
    pub program_number: u16,
    pub version: u8,
    pub pcr_pid: u16,
    pub program_descriptors: Vec<Descriptor>,
    pub streams: Vec<PmtStream>,
}

impl PmtSection {
    pub fn new(program_number: u16, pcr_pid: u16) -> Self {
        Self {
            program_number,
            pcr_pid,
            ..Default::default()
        }
    }

    pub fn with_program_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.program_descriptors.push(descriptor);
        self
    }

    pub fn with_stream(mut self, stream: PmtStream) -> Self {
        self.streams.push(stream);
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let program_info = write_descriptors(&self.program_descriptors)?;
        let header = PmtHeader::new()
            .with_reserved(0b111)
            .with_pcr_pid(self.pcr_pid & PID_MASK)
            .with_reserved2(0b1111)
            .with_program_info_length(program_info.len() as u16);

        let mut body = Vec::new();
        body.extend_from_slice(&header.into_bytes());
        body.extend_from_slice(&program_info);
        for stream in &self.streams {
            let es_info = write_descriptors(&stream.descriptors)?;
            let es_header = ElementaryStreamInfoHeader::new()
                .with_stream_type(stream.stream_type)
                .with_reserved(0b111)
                .with_elementary_pid(stream.elementary_pid & PID_MASK)
                .with_reserved2(0b1111)
                .with_es_info_length(es_info.len() as u16);
            body.extend_from_slice(&es_header.into_bytes());
            body.extend_from_slice(&es_info);
        }
        finish_section(PMT_TABLE_ID, self.program_number, self.version, &body)
    }
}
