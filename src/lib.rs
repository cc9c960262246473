//! Decoder for MPEG transport stream Program Specific Information sections.
//!
//! Decodes single-section Program Association Tables (PAT) and Program Map
//! Tables (PMT) as delivered by a section filter. Every field offset is
//! checked against the section and buffer bounds; malformed or truncated
//! sections are reported as [`Error`] values.
//!
//! # Usage
//! Simply add this crate as a dependency in your `Cargo.toml`.
//!
//! ```toml
//! [dependencies]
//! mpegts-psi = "~0.1.0"
//! ```
//!
//! ```
//! let pat = [
//!     0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00,
//!     0x00, 0x01, 0xE1, 0x00, 0x00, 0x00, 0x00, 0x00,
//! ];
//! let programs = mpegts_psi::decode_pat(&pat).unwrap();
//! assert_eq!(programs[0].program_number, 1);
//! assert_eq!(programs[0].program_map_pid, 0x100);
//! ```

use log::warn;
use std::fmt::{Display, Formatter};
use std::result;

pub mod bits;
use bits::LENGTH_MASK;

mod slice_reader;
use slice_reader::SliceReader;

pub mod config;
pub use config::{CapacityPolicy, DecoderConfig, StreamSelection, TELETEXT_DESCRIPTOR_TAG};

mod pat;
pub use pat::{PatFill, ProgramAssociation};

mod pmt;
pub use pmt::{ElementaryStream, ProgramMap, StreamKind, StreamType};

pub mod writer;
use writer::{PAT_TABLE_ID, PMT_TABLE_ID};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDetails {
    /// A read of this many bytes would pass the end of the section or buffer.
    SectionOverrun(usize),
    /// `section_length` is smaller than the table's fixed fields.
    SectionTooShort(u16),
    /// A loop length would go negative.
    LengthUnderflow,
    /// A descriptor runs past the end of its ES_info loop.
    DescriptorOverrun,
    /// More programs than the output slice of this length can hold.
    CapacityExceeded(usize),
    /// Not a PAT or PMT.
    UnexpectedTableId(u8),
    /// Encoded `section_length` would exceed the PSI limit.
    SectionTooLong(usize),
    /// Descriptor payload longer than 255 bytes.
    DescriptorTooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    location: usize,
    details: ErrorDetails,
}

impl Error {
    pub fn new(location: usize, details: ErrorDetails) -> Self {
        Self { location, details }
    }

    /// Byte offset into the section where decoding stopped.
    pub fn location(&self) -> usize {
        self.location
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let what = match &self.details {
            ErrorDetails::SectionOverrun(len) => write!(f, "read of {} bytes overruns section", len),
            ErrorDetails::SectionTooShort(len) => write!(f, "section_length {} too short", len),
            ErrorDetails::LengthUnderflow => write!(f, "loop length underflow"),
            ErrorDetails::DescriptorOverrun => write!(f, "descriptor overruns ES_info loop"),
            ErrorDetails::CapacityExceeded(cap) => write!(f, "more than {} programs", cap),
            ErrorDetails::UnexpectedTableId(id) => write!(f, "unexpected table_id {:#04x}", id),
            ErrorDetails::SectionTooLong(len) => write!(f, "section_length {} too long", len),
            ErrorDetails::DescriptorTooLong(len) => write!(f, "descriptor of {} bytes too long", len),
        };
        what?;
        write!(f, " at offset {}", self.location)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// Reads `section_length` and returns it with a reader positioned after the
/// 3-byte section header and bounded to the section end.
fn open_section(section: &[u8]) -> Result<(u16, SliceReader)> {
    let mut reader = SliceReader::new(section);
    // table_id is not re-validated
    reader.skip(1)?;
    let section_length = reader.read_masked_be_u16(LENGTH_MASK)?;
    let body = match section.get(3..3 + section_length as usize) {
        Some(body) => body,
        None => {
            warn!(
                "section_length {} exceeds buffer of {} bytes",
                section_length,
                section.len()
            );
            return Err(reader.make_error(ErrorDetails::SectionOverrun(section_length as usize)));
        }
    };
    Ok((section_length, SliceReader::new_at(body, 3)))
}

/// Stateless PAT/PMT decoder.
///
/// Holds only its configuration, so one instance may be shared between
/// threads; each call works on its own cursor.
#[derive(Debug, Default, Copy, Clone)]
pub struct PsiDecoder {
    config: DecoderConfig,
}

/// A decoded table, see [`PsiDecoder::decode_section`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Table {
    Pat(Vec<ProgramAssociation>),
    Pmt(ProgramMap),
}

impl PsiDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes a section as PAT or PMT depending on its `table_id`.
    pub fn decode_section(&self, section: &[u8]) -> Result<Table> {
        match section.first() {
            Some(&PAT_TABLE_ID) => Ok(Table::Pat(self.decode_pat(section)?)),
            Some(&PMT_TABLE_ID) => Ok(Table::Pmt(self.decode_pmt(section)?)),
            Some(&table_id) => {
                warn!("Unhandled table_id {:x}", table_id);
                Err(Error::new(0, ErrorDetails::UnexpectedTableId(table_id)))
            }
            None => Err(Error::new(0, ErrorDetails::SectionOverrun(1))),
        }
    }
}

/// [`PsiDecoder::decode_pat`] with the default configuration.
pub fn decode_pat(section: &[u8]) -> Result<Vec<ProgramAssociation>> {
    PsiDecoder::default().decode_pat(section)
}

/// [`PsiDecoder::decode_pat_into`] with the default configuration.
pub fn decode_pat_into(section: &[u8], out: &mut [ProgramAssociation]) -> Result<PatFill> {
    PsiDecoder::default().decode_pat_into(section, out)
}

/// [`PsiDecoder::decode_pmt`] with the default configuration.
pub fn decode_pmt(section: &[u8]) -> Result<ProgramMap> {
    PsiDecoder::default().decode_pmt(section)
}

/// [`PsiDecoder::decode_pmt_into`] with the default configuration.
pub fn decode_pmt_into(section: &[u8], out: &mut ProgramMap) -> Result<()> {
    PsiDecoder::default().decode_pmt_into(section, out)
}

/// [`PsiDecoder::decode_section`] with the default configuration.
pub fn decode_section(section: &[u8]) -> Result<Table> {
    PsiDecoder::default().decode_section(section)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_by_table_id() {
        let pat = writer::PatSection::new(1).with_program(1, 0x100).to_bytes().unwrap();
        assert!(matches!(decode_section(&pat).unwrap(), Table::Pat(p) if p.len() == 1));

        let pmt = writer::PmtSection::new(1, 0x100)
            .with_stream(writer::PmtStream::new(0x02, 0x100))
            .to_bytes()
            .unwrap();
        assert!(matches!(decode_section(&pmt).unwrap(), Table::Pmt(m) if m.video_pid == Some(0x100)));

        let mut sdt = pat;
        sdt[0] = 0x42;
        assert_eq!(
            *decode_section(&sdt).unwrap_err().details(),
            ErrorDetails::UnexpectedTableId(0x42)
        );
        assert!(decode_section(&[]).is_err());
    }

    #[test]
    fn short_header() {
        let err = decode_pat(&[0x00, 0xB0]).unwrap_err();
        assert_eq!(err.location(), 1);
        assert_eq!(*err.details(), ErrorDetails::SectionOverrun(2));
    }

    #[test]
    fn section_past_buffer() {
        let err = decode_pmt(&[0x02, 0xB0, 0x20, 0x00]).unwrap_err();
        assert_eq!(err.location(), 3);
        assert_eq!(*err.details(), ErrorDetails::SectionOverrun(0x20));
        assert_eq!(err.to_string(), "read of 32 bytes overruns section at offset 3");
    }

    #[test]
    fn trailing_bytes_ignored() {
        let mut pat = writer::PatSection::new(1).with_program(7, 0x107).to_bytes().unwrap();
        pat.extend_from_slice(&[0xFF; 64]);
        assert_eq!(decode_pat(&pat).unwrap().len(), 1);
    }
}
