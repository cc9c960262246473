use super::{Error, ErrorDetails, Result};
use crate::bits::masked_u16;

/// Forward-only cursor over a section buffer.
///
/// Every read is checked against the end of the slice; a read past it yields
/// [`ErrorDetails::SectionOverrun`] carrying the absolute section offset.
#[derive(Debug)]
pub struct SliceReader<'a> {
    slice: &'a [u8],
    location: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(slice: &'a [u8]) -> Self {
        Self { slice, location: 0 }
    }

    /// Reader whose reported locations start at `location` instead of 0.
    pub fn new_at(slice: &'a [u8], location: usize) -> Self {
        Self { slice, location }
    }

    /// Splits off the next `length` bytes as an independent reader, so a
    /// length-delimited loop can never consume bytes past its own end.
    pub fn new_sub_reader(&mut self, length: usize) -> Result<Self> {
        let location = self.location;
        Ok(Self {
            slice: self.read(length)?,
            location,
        })
    }

    pub fn make_error(&self, details: ErrorDetails) -> Error {
        Error::new(self.location, details)
    }

    pub fn location(&self) -> usize {
        self.location
    }

    pub fn remaining_len(&self) -> usize {
        self.slice.len()
    }

    pub fn skip(&mut self, length: usize) -> Result<()> {
        self.read(length).map(|_| ())
    }

    pub fn read(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.slice.len() {
            Err(self.make_error(ErrorDetails::SectionOverrun(length)))
        } else {
            self.location += length;
            let (left, right) = self.slice.split_at(length);
            self.slice = right;
            Ok(left)
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read(1)?[0])
    }

    pub fn read_be_u16(&mut self) -> Result<u16> {
        self.read_masked_be_u16(crate::bits::FULL_MASK)
    }

    /// Reads the next two bytes as a big-endian value and applies `mask`.
    pub fn read_masked_be_u16(&mut self, mask: u16) -> Result<u16> {
        let value = self.masked_u16_at(0, 1, mask)?;
        self.skip(2)?;
        Ok(value)
    }

    /// Combines the bytes at `first` and `second` (relative to the cursor)
    /// without advancing. Both indices are validated before reading.
    pub fn masked_u16_at(&self, first: usize, second: usize, mask: u16) -> Result<u16> {
        let needed = first.max(second) + 1;
        if needed > self.slice.len() {
            Err(self.make_error(ErrorDetails::SectionOverrun(needed)))
        } else {
            Ok(masked_u16(self.slice, first, second, mask))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::PID_MASK;

    #[test]
    fn reads_advance_location() {
        let data = [0x02, 0xE0, 0x64, 0xF0, 0x00];
        let mut reader = SliceReader::new_at(&data, 12);
        assert_eq!(reader.read_u8().unwrap(), 0x02);
        assert_eq!(reader.read_masked_be_u16(PID_MASK).unwrap(), 100);
        assert_eq!(reader.location(), 15);
        assert_eq!(reader.remaining_len(), 2);
    }

    #[test]
    fn overrun_reports_location() {
        let data = [0x00, 0x01, 0x02];
        let mut reader = SliceReader::new(&data);
        reader.skip(2).unwrap();
        let err = reader.read_be_u16().unwrap_err();
        assert_eq!(err.location(), 2);
        assert_eq!(*err.details(), ErrorDetails::SectionOverrun(2));
        // Failed reads do not move the cursor.
        assert_eq!(reader.remaining_len(), 1);
    }

    #[test]
    fn sub_reader_is_bounded() {
        let data = [0x56, 0x05, 0xAA, 0xBB];
        let mut reader = SliceReader::new(&data);
        let mut sub = reader.new_sub_reader(2).unwrap();
        assert_eq!(sub.read_u8().unwrap(), 0x56);
        assert_eq!(sub.read_u8().unwrap(), 0x05);
        assert!(sub.skip(5).is_err());
        assert_eq!(reader.remaining_len(), 2);
    }

    #[test]
    fn split_read_checks_both_indices() {
        let data = [0x01, 0x02, 0x03];
        let reader = SliceReader::new(&data);
        assert_eq!(reader.masked_u16_at(0, 2, 0xFFFF).unwrap(), 0x0103);
        assert!(reader.masked_u16_at(0, 3, 0xFFFF).is_err());
    }
}
