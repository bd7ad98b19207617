use core::fmt;

/// Errors returned by the trickle timer and its helpers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The alarm facility has no free alarm, or the supplied alarm id is out of range.
    ///
    /// This is fatal for the timer instance: it must not be started.
    NoFreeAlarm,

    /// The timer has not been initialized.
    NotInUse,

    /// The timer is initialized but not running.
    NotRunning,

    /// The supplied `Parameters` are inconsistent.
    InvalidConfig,

    /// Invalid value supplied for a field.
    InvalidValue,

    /// Unexpectedly reached EOF while reading or writing data.
    Eof,

    /// Parsing didn't consume the entire buffer.
    IncompleteParse,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::NoFreeAlarm => "no free alarm available",
            Error::NotInUse => "timer not initialized",
            Error::NotRunning => "timer not running",
            Error::InvalidConfig => "invalid timer parameters",
            Error::InvalidValue => "invalid value for field",
            Error::Eof => "end of buffer",
            Error::IncompleteParse => "excess data in buffer",
        })
    }
}
