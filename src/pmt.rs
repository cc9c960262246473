use super::{open_section, Error, ErrorDetails, PsiDecoder, Result};
use crate::bits::{LENGTH_MASK, PID_MASK};
use crate::config::StreamSelection;
use crate::slice_reader::SliceReader;
use log::{debug, warn};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use smallvec::SmallVec;

/// Bytes of `section_length` outside the program descriptors and the stream
/// loop: program_number, version/current_next, section numbers, PCR_PID,
/// program_info_length and CRC_32.
const PMT_FIXED_LENGTH: u16 = 13;
/// stream_type, elementary_PID and ES_info_length.
const ES_HEADER_LENGTH: usize = 5;
/// descriptor_tag and descriptor_length.
const DESCRIPTOR_HEADER_LENGTH: usize = 2;

/// Named `stream_type` values (ISO/IEC 13818-1 Table 2-34).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum StreamType {
    Mpeg1Video = 0x01,
    Mpeg2Video = 0x02,
    Mpeg1Audio = 0x03,
    Mpeg2Audio = 0x04,
    PrivateSections = 0x05,
    /// Carries DVB teletext and subtitles.
    PesPrivateData = 0x06,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

impl StreamType {
    pub fn from_u8(value: u8) -> Option<Self> {
        FromPrimitive::from_u8(value)
    }

    pub fn kind(self) -> StreamKind {
        match self {
            StreamType::Mpeg1Video | StreamType::Mpeg2Video => StreamKind::Video,
            StreamType::Mpeg1Audio | StreamType::Mpeg2Audio => StreamKind::Audio,
            _ => StreamKind::Other,
        }
    }
}

/// One entry of the PMT elementary stream loop.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ElementaryStream {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub es_info_length: u16,
    /// The entry's descriptor loop holds the teletext tag.
    pub teletext: bool,
}

impl ElementaryStream {
    pub fn kind(&self) -> StreamKind {
        StreamType::from_u8(self.stream_type).map_or(StreamKind::Other, StreamType::kind)
    }
}

/// Decoded Program Map Table.
///
/// `video_pid` and `audio_pid` are `None` when the section lists no stream
/// of that kind. A program without video is an audio-only (or data-only)
/// channel.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProgramMap {
    pub program_number: u16,
    pub pcr_pid: u16,
    pub video_pid: Option<u16>,
    pub audio_pid: Option<u16>,
    pub teletext_present: bool,
    /// Every stream entry in section order.
    pub streams: SmallVec<[ElementaryStream; 4]>,
}

impl ProgramMap {
    /// Resets to "nothing found".
    pub fn clear(&mut self) {
        self.program_number = 0;
        self.pcr_pid = 0;
        self.video_pid = None;
        self.audio_pid = None;
        self.teletext_present = false;
        self.streams.clear();
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self.video_pid, None | Some(0))
    }
}

impl PsiDecoder {
    /// Decodes a PMT section into a fresh [`ProgramMap`].
    pub fn decode_pmt(&self, section: &[u8]) -> Result<ProgramMap> {
        let mut map = ProgramMap::default();
        self.decode_pmt_into(section, &mut map)?;
        Ok(map)
    }

    /// Decodes a PMT section into a reused [`ProgramMap`].
    ///
    /// `out` is cleared before scanning. Decoding is all-or-nothing: on error
    /// `out` stays cleared.
    pub fn decode_pmt_into(&self, section: &[u8], out: &mut ProgramMap) -> Result<()> {
        out.clear();
        debug!("PMT decode started");
        self.scan_pmt(section, out).map_err(|err| {
            out.clear();
            err
        })?;
        debug!(
            "PMT decode completed: program {} video {:x?} audio {:x?} teletext {}",
            out.program_number, out.video_pid, out.audio_pid, out.teletext_present
        );
        Ok(())
    }

    fn scan_pmt(&self, section: &[u8], map: &mut ProgramMap) -> Result<()> {
        let (section_length, mut reader) = open_section(section)?;
        if section_length < PMT_FIXED_LENGTH {
            warn!("PMT section_length {} below fixed length", section_length);
            return Err(Error::new(1, ErrorDetails::SectionTooShort(section_length)));
        }
        map.program_number = reader.read_be_u16()?;
        // version, section numbers
        reader.skip(3)?;
        map.pcr_pid = reader.read_masked_be_u16(PID_MASK)?;
        let program_info_length = reader.read_masked_be_u16(LENGTH_MASK)?;

        let loop_length = match (section_length - PMT_FIXED_LENGTH).checked_sub(program_info_length) {
            Some(length) => length as usize,
            None => {
                warn!(
                    "PMT program_info_length {} exceeds section_length {}",
                    program_info_length, section_length
                );
                return Err(Error::new(10, ErrorDetails::LengthUnderflow));
            }
        };

        // Program level descriptors are not interpreted.
        reader.skip(program_info_length as usize)?;
        let mut streams = reader.new_sub_reader(loop_length)?;

        while streams.remaining_len() > 0 {
            if streams.remaining_len() < ES_HEADER_LENGTH {
                warn!("Partial PMT stream entry of {} bytes", streams.remaining_len());
                return Err(streams.make_error(ErrorDetails::LengthUnderflow));
            }
            let stream_type = streams.read_u8()?;
            let elementary_pid = streams.read_masked_be_u16(PID_MASK)?;
            let es_info_length = streams.read_masked_be_u16(LENGTH_MASK)?;
            if es_info_length as usize > streams.remaining_len() {
                warn!(
                    "ES_info_length {} exceeds remaining stream loop of {} bytes",
                    es_info_length,
                    streams.remaining_len()
                );
                return Err(streams.make_error(ErrorDetails::LengthUnderflow));
            }
            let mut descriptors = streams.new_sub_reader(es_info_length as usize)?;
            let teletext = self.scan_descriptors(&mut descriptors)?;

            let stream = ElementaryStream {
                stream_type,
                elementary_pid,
                es_info_length,
                teletext,
            };
            match stream.kind() {
                StreamKind::Video => self.select_pid(&mut map.video_pid, elementary_pid),
                StreamKind::Audio => self.select_pid(&mut map.audio_pid, elementary_pid),
                StreamKind::Other => {}
            }
            map.teletext_present |= teletext;
            map.streams.push(stream);
        }
        Ok(())
    }

    /// Walks one ES_info descriptor loop, reporting whether the teletext tag
    /// appears in it.
    fn scan_descriptors(&self, reader: &mut SliceReader) -> Result<bool> {
        let mut found = false;
        while reader.remaining_len() > 0 {
            if reader.remaining_len() < DESCRIPTOR_HEADER_LENGTH {
                warn!("Partial descriptor header in ES_info loop");
                return Err(reader.make_error(ErrorDetails::DescriptorOverrun));
            }
            let tag = reader.read_u8()?;
            let length = reader.read_u8()? as usize;
            if length > reader.remaining_len() {
                warn!(
                    "Descriptor {:x} of length {} overruns ES_info loop",
                    tag, length
                );
                return Err(reader.make_error(ErrorDetails::DescriptorOverrun));
            }
            reader.skip(length)?;
            if tag == self.config.teletext_tag {
                found = true;
            }
        }
        Ok(found)
    }

    fn select_pid(&self, slot: &mut Option<u16>, pid: u16) {
        match self.config.stream_selection {
            StreamSelection::LastMatch => *slot = Some(pid),
            StreamSelection::FirstMatch => {
                slot.get_or_insert(pid);
            }
        }
    }
}
