use crate::codec::UnpiType;

/// Delivery priority of a message.
///
/// Lower values are delivered first. Synchronous traffic (requests and their
/// responses) jumps ahead of asynchronous notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Synchronous requests and responses.
    Urgent = 1,
    /// Asynchronous notifications.
    Normal = 2,
}

impl Priority {
    /// Priority of a message with the given request type.
    pub fn for_type(unpi_type: UnpiType) -> Self {
        match unpi_type {
            UnpiType::AsyncReq => Priority::Normal,
            UnpiType::SyncReq | UnpiType::SyncRsp => Priority::Urgent,
        }
    }

    /// Numeric level, `1` for urgent and `2` for normal.
    pub fn level(self) -> u8 {
        self as u8
    }
}
