//! We use this mocking module in unit tests to emulate the serial command
//! channel.

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 256>,
    /// Buffer containing pre-configured data to be read
    read_buffer: heapless::Vec<u8, 256>,
    /// Current position in the read buffer
    read_position: usize,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

#[derive(Debug)]
pub enum MockSerialError {
    /// Simulated buffer overflow
    BufferOverflow,
    /// Generic simulated hard error for testing
    SimulatedError,
    /// Would block - no data available
    WouldBlock,
}

impl core::fmt::Display for MockSerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MockSerialError::BufferOverflow => write!(f, "buffer overflow"),
            MockSerialError::SimulatedError => write!(f, "simulated hard error"),
            MockSerialError::WouldBlock => write!(f, "no data available"),
        }
    }
}

// embedded_io::Error requires core::error::Error.
impl core::error::Error for MockSerialError {}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::BrokenPipe,
            MockSerialError::WouldBlock => embedded_io::ErrorKind::TimedOut,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.write_buffer.extend_from_slice(buf).is_err() {
            return Err(MockSerialError::BufferOverflow);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        if self.read_position >= self.read_buffer.len() {
            return Err(MockSerialError::WouldBlock);
        }

        let available_bytes = self.read_buffer.len() - self.read_position;
        let bytes_to_read = core::cmp::min(buf.len(), available_bytes);
        buf[..bytes_to_read]
            .copy_from_slice(&self.read_buffer[self.read_position..][..bytes_to_read]);

        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl MockSerial {
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            should_error_on_read: false,
        }
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;
        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(())
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Configure whether read operations should fail with a hard error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Read, Write};

    #[test]
    fn write_accumulates_data() {
        let mut mock = MockSerial::new();
        mock.write(b"ok\n").unwrap();
        mock.write(b"err\n").unwrap();
        assert_eq!(mock.written_data(), b"ok\nerr\n");
    }

    #[test]
    fn read_returns_scripted_data_then_would_block() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"load on\n").unwrap();

        let mut buffer = [0u8; 5];
        assert_eq!(mock.read(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer, b"load ");
        assert_eq!(mock.read(&mut buffer).unwrap(), 3);
        assert_eq!(&buffer[..3], b"on\n");

        let result = mock.read(&mut buffer);
        assert!(matches!(result, Err(MockSerialError::WouldBlock)));
    }

    #[test]
    fn set_read_data_replaces_previous() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"first").unwrap();
        mock.set_read_data(b"second\n").unwrap();

        let mut buffer = [0u8; 10];
        let n = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"second\n");
    }

    #[test]
    fn errors_describe_themselves() {
        // The error type has to satisfy embedded_io::Error's core::error
        // supertrait, which wants a Display impl worth reading.
        assert_eq!(
            format!("{}", MockSerialError::SimulatedError),
            "simulated hard error"
        );
        let e: &dyn core::error::Error = &MockSerialError::WouldBlock;
        assert_eq!(format!("{e}"), "no data available");
    }

    #[test]
    fn read_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"data").unwrap();
        mock.set_read_error(true);

        let mut buffer = [0u8; 4];
        let result = mock.read(&mut buffer);
        assert!(matches!(result, Err(MockSerialError::SimulatedError)));
    }
}
