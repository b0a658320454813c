use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for documents read from and written to text files.
///
/// Implementors handle format-specific parsing and serialization; the path-based
/// helpers take care of opening and buffering the files.
pub trait DocumentFile: Sized {
    /// The error type for I/O and parsing failures.
    type Error: Error + From<io::Error>;

    /// Parses a document from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the content is malformed.
    fn read_from(reader: &mut impl BufRead) -> Result<Self, Self::Error>;

    /// Serializes the document to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(&self, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads a document from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes the document to a file path, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
