/// Controls registry decoding and request parsing behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// When true, payload bytes left over after the last field make decoding
    /// fail instead of being ignored.
    pub reject_trailing_bytes: bool,
    /// When true, textual command requests are checked against the envelope
    /// JSON Schema before they are mapped onto a command.
    pub validate_requests: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reject_trailing_bytes: false,
            validate_requests: true,
        }
    }
}
