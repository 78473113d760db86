//! Node states.

/// Where a namespace node is in its fetch or production lifecycle.
///
/// Variants are ordered. Handlers compare with `>=` against
/// [`NamespaceState::InterestExpressed`] to ask "has this been requested".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NamespaceState {
    NameExists,
    InterestExpressed,
    InterestTimeout,
    InterestNetworkNack,
    DataReceived,
    Deserializing,
    Decrypting,
    DecryptionError,
    ProducingObject,
    Serializing,
    Encrypting,
    EncryptionError,
    Signing,
    SigningError,
    ObjectReady,
    ObjectReadyButStale,
}

impl NamespaceState {
    /// States that end a fetch attempt without an object.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            NamespaceState::InterestTimeout
                | NamespaceState::InterestNetworkNack
                | NamespaceState::DecryptionError
                | NamespaceState::EncryptionError
                | NamespaceState::SigningError
        )
    }
}

/// Validation progress of the data attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidateState {
    WaitingForData,
    Validating,
    ValidateSuccess,
    ValidateFailure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_ordering() {
        assert!(NamespaceState::NameExists < NamespaceState::InterestExpressed);
        assert!(NamespaceState::InterestTimeout >= NamespaceState::InterestExpressed);
        assert!(NamespaceState::ObjectReady >= NamespaceState::InterestExpressed);
    }

    #[test]
    fn test_failure_states() {
        assert!(NamespaceState::InterestTimeout.is_failure());
        assert!(NamespaceState::DecryptionError.is_failure());
        assert!(!NamespaceState::ObjectReady.is_failure());
        assert!(!NamespaceState::ProducingObject.is_failure());
    }
}
