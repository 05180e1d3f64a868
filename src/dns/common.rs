use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};
use std::io::ErrorKind;

use super::ParseError;

pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;
    fn read<E: Endianness>(&mut self, reader: &mut BitReader<&[u8], E>) -> Result<(), ParseError>;

    /// Read length-prefixed labels up to and including the zero-length
    /// terminator. The terminator itself is not returned and label bytes
    /// are kept as received.
    fn read_labels<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
    ) -> Result<Vec<Vec<u8>>, ParseError> {
        let mut labels = Vec::new();
        loop {
            let label_len = reader.read_var::<u8>(8).map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => ParseError::MissingTerminator,
                _ => ParseError::from(e),
            })?;
            if label_len == 0 {
                break;
            }
            let mut buf = vec![0; label_len as usize];
            reader.read_bytes(&mut buf).map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => ParseError::LabelOverrun,
                _ => ParseError::from(e),
            })?;
            labels.push(buf);
        }

        Ok(labels)
    }

    /// Write labels length-prefixed, followed by the zero-length terminator.
    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &[Vec<u8>],
    ) -> Result<(), ParseError> {
        write_name(writer, labels.iter().map(Vec::as_slice))
    }
}

/// Write any sequence of labels as an uncompressed name.
pub fn write_name<'a, E: Endianness>(
    writer: &mut BitWriter<&mut Vec<u8>, E>,
    labels: impl IntoIterator<Item = &'a [u8]>,
) -> Result<(), ParseError> {
    for label in labels {
        let len = u8::try_from(label.len()).map_err(|_| ParseError::LabelTooLong(label.len()))?;
        writer.write_var::<u8>(8, len)?;
        writer.write_bytes(label)?;
    }
    writer.write_var::<u8>(8, 0)?;
    Ok(())
}
