pub mod dakota_init;
pub mod driver;
pub mod ff_update;
pub mod fftpl;
pub mod listen;
pub mod pbs;
pub mod report;
pub mod status;

/// Instance number used when none is given: the optimizer process that started us.
pub(crate) fn default_instance() -> String {
    #[cfg(unix)]
    {
        std::os::unix::process::parent_id().to_string()
    }
    #[cfg(not(unix))]
    {
        std::process::id().to_string()
    }
}
