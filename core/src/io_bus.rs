use crate::Bus;

/// A bus that also supports separate I/O port operations.
///
/// The Z80 has a separate I/O address space accessed via IN and OUT
/// instructions. On the calculator boards only the low 8 bits of the port
/// address are decoded, so ports are a `u8` here.
pub trait IoBus: Bus {
    /// Read a byte from the given I/O port.
    ///
    /// `bus` is the CPU's scratch data-bus byte at the time of the access.
    /// A device that accepts the read returns the byte it drives onto the
    /// bus; a device that drops the read (e.g. an LCD in its busy window)
    /// returns `bus` unchanged. Unhandled ports read `0xFF`.
    fn read_io(&mut self, port: u8, bus: u8) -> u8;

    /// Write a byte to the given I/O port. Unhandled ports drop the write.
    fn write_io(&mut self, port: u8, value: u8);
}
