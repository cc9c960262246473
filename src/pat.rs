use super::{open_section, Error, ErrorDetails, PsiDecoder, Result};
use crate::bits::PID_MASK;
use crate::config::CapacityPolicy;
use log::{debug, warn};

/// Bytes of `section_length` not taken by program entries: transport_stream_id,
/// version/current_next, section_number, last_section_number and CRC_32.
const PAT_FIXED_LENGTH: u16 = 9;
const PAT_ENTRY_LENGTH: usize = 4;

/// One program of a Program Association Table.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ProgramAssociation {
    pub program_number: u16,
    /// PID of the program's PMT, always 13 bits.
    pub program_map_pid: u16,
}

/// Outcome of [`PsiDecoder::decode_pat_into`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PatFill {
    /// Entries written to the front of the output slice.
    pub written: usize,
    /// Associations that did not fit (only with [`CapacityPolicy::Truncate`]).
    pub dropped: usize,
}

impl PatFill {
    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }
}

impl PsiDecoder {
    /// Walks the program loop, handing every non-network entry to `visit`
    /// together with its section offset. Returns the number of entries visited.
    fn walk_pat<F>(&self, section: &[u8], mut visit: F) -> Result<usize>
    where
        F: FnMut(usize, ProgramAssociation) -> Result<()>,
    {
        let (section_length, mut reader) = open_section(section)?;
        if section_length < PAT_FIXED_LENGTH {
            warn!("PAT section_length {} below fixed length", section_length);
            return Err(Error::new(1, ErrorDetails::SectionTooShort(section_length)));
        }
        // transport_stream_id, version, section numbers
        reader.skip(5)?;
        let mut programs = reader.new_sub_reader((section_length - PAT_FIXED_LENGTH) as usize)?;

        let mut count = 0;
        while programs.remaining_len() > 0 {
            if programs.remaining_len() < PAT_ENTRY_LENGTH {
                warn!("Partial PAT entry of {} bytes", programs.remaining_len());
                return Err(programs.make_error(ErrorDetails::LengthUnderflow));
            }
            let location = programs.location();
            let program_number = programs.read_be_u16()?;
            let program_map_pid = programs.read_masked_be_u16(PID_MASK)?;
            if program_number == 0 {
                debug!("Skipping network PID {:x}", program_map_pid);
                continue;
            }
            visit(
                location,
                ProgramAssociation {
                    program_number,
                    program_map_pid,
                },
            )?;
            count += 1;
        }
        Ok(count)
    }

    /// Decodes a PAT section into a new vector, in section order.
    pub fn decode_pat(&self, section: &[u8]) -> Result<Vec<ProgramAssociation>> {
        debug!("PAT decode started");
        let mut programs = Vec::new();
        self.walk_pat(section, |_, assoc| {
            programs.push(assoc);
            Ok(())
        })?;
        debug!("PAT decode completed: {} programs", programs.len());
        Ok(programs)
    }

    /// Decodes a PAT section into a caller-supplied slice.
    ///
    /// At most `out.len()` entries are written. What happens to the rest is
    /// decided by the configured [`CapacityPolicy`].
    pub fn decode_pat_into(&self, section: &[u8], out: &mut [ProgramAssociation]) -> Result<PatFill> {
        debug!("PAT decode started, capacity {}", out.len());
        let policy = self.config.capacity_policy;
        let capacity = out.len();
        let mut fill = PatFill::default();
        self.walk_pat(section, |location, assoc| {
            if let Some(slot) = out.get_mut(fill.written) {
                *slot = assoc;
                fill.written += 1;
                return Ok(());
            }
            match policy {
                CapacityPolicy::Truncate => {
                    fill.dropped += 1;
                    Ok(())
                }
                CapacityPolicy::Fail => {
                    warn!("PAT holds more than {} programs", capacity);
                    Err(Error::new(location, ErrorDetails::CapacityExceeded(capacity)))
                }
            }
        })?;
        if fill.is_truncated() {
            warn!(
                "PAT output full: {} programs written, {} dropped",
                fill.written, fill.dropped
            );
        }
        debug!("PAT decode completed: {} programs", fill.written);
        Ok(fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecoderConfig;

    // section_length 13, program 1 -> PID 0x100, CRC bytes not checked
    const SINGLE_PROGRAM: [u8; 16] = [
        0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01, 0xE1, 0x00, 0xDE, 0xAD, 0xBE,
        0xEF,
    ];

    // network entry, then programs 0x10 -> 0x1000 and 0x11 -> 0x1001
    const THREE_ENTRIES: [u8; 24] = [
        0x00, 0xB0, 0x15, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x00, 0xE0, 0x10, 0x00, 0x10, 0xF0,
        0x00, 0x00, 0x11, 0xF0, 0x01, 0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn single_program() {
        let programs = PsiDecoder::default().decode_pat(&SINGLE_PROGRAM).unwrap();
        assert_eq!(
            programs,
            vec![ProgramAssociation {
                program_number: 1,
                program_map_pid: 256
            }]
        );
    }

    #[test]
    fn network_entry_skipped() {
        let programs = PsiDecoder::default().decode_pat(&THREE_ENTRIES).unwrap();
        assert_eq!(programs.len(), 2);
        assert_eq!(programs[0].program_number, 0x10);
        assert_eq!(programs[0].program_map_pid, 0x1000);
        assert_eq!(programs[1].program_number, 0x11);
        assert_eq!(programs[1].program_map_pid, 0x1001);
    }

    #[test]
    fn section_length_below_fixed_part() {
        let mut section = SINGLE_PROGRAM;
        section[2] = 0x08;
        let err = PsiDecoder::default().decode_pat(&section).unwrap_err();
        assert_eq!(*err.details(), ErrorDetails::SectionTooShort(8));
    }

    #[test]
    fn partial_entry_rejected() {
        let mut section = SINGLE_PROGRAM;
        section[2] = 0x0B;
        let err = PsiDecoder::default().decode_pat(&section).unwrap_err();
        assert_eq!(*err.details(), ErrorDetails::LengthUnderflow);
        assert_eq!(err.location(), 8);
    }

    #[test]
    fn truncated_buffer_rejected() {
        let err = PsiDecoder::default()
            .decode_pat(&SINGLE_PROGRAM[..12])
            .unwrap_err();
        assert!(matches!(err.details(), ErrorDetails::SectionOverrun(_)));
    }

    #[test]
    fn capacity_truncate() {
        let mut out = [ProgramAssociation::default(); 1];
        let fill = PsiDecoder::default()
            .decode_pat_into(&THREE_ENTRIES, &mut out)
            .unwrap();
        assert_eq!(fill, PatFill { written: 1, dropped: 1 });
        assert!(fill.is_truncated());
        assert_eq!(out[0].program_number, 0x10);
    }

    #[test]
    fn capacity_fail() {
        let decoder = PsiDecoder::new(
            DecoderConfig::default().with_capacity_policy(CapacityPolicy::Fail),
        );
        let mut out = [ProgramAssociation::default(); 1];
        let err = decoder.decode_pat_into(&THREE_ENTRIES, &mut out).unwrap_err();
        assert_eq!(*err.details(), ErrorDetails::CapacityExceeded(1));
        assert_eq!(err.location(), 16);

        let mut out = [ProgramAssociation::default(); 4];
        let fill = decoder.decode_pat_into(&THREE_ENTRIES, &mut out).unwrap();
        assert_eq!(fill, PatFill { written: 2, dropped: 0 });
    }
}
