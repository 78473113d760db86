//! Configuration for namespaces and handlers.

use std::time::Duration;

use cnl_core::DEFAULT_INTEREST_LIFETIME;

use crate::error::{NamespaceError, Result};

/// Interest timing applied at a root and inherited by its subtree.
#[derive(Debug, Clone)]
pub struct NamespaceConfig {
    /// Lifetime of the first expression of an interest.
    pub interest_lifetime: Duration,
    /// Total time an interest is re-expressed before it times out.
    pub max_interest_lifetime: Duration,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            interest_lifetime: DEFAULT_INTEREST_LIFETIME,
            max_interest_lifetime: Duration::from_secs(16),
        }
    }
}

/// Segment fetching parameters.
#[derive(Debug, Clone)]
pub struct SegmentStreamConfig {
    /// Segment interests kept outstanding.
    pub interest_pipeline_size: usize,
    /// Interests sent before the first segment arrives.
    pub initial_interest_count: usize,
}

impl Default for SegmentStreamConfig {
    fn default() -> Self {
        Self {
            interest_pipeline_size: 8,
            initial_interest_count: 1,
        }
    }
}

impl SegmentStreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interest_pipeline_size < 1 {
            return Err(NamespaceError::InvalidConfig(
                "interest pipeline size must be at least 1".into(),
            ));
        }
        if self.initial_interest_count < 1 {
            return Err(NamespaceError::InvalidConfig(
                "initial interest count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SegmentedObjectConfig {
    pub stream: SegmentStreamConfig,
    /// Largest content per segment when producing.
    pub max_segment_payload_length: usize,
    /// Fetch `_manifest` and deliver the object only if every segment
    /// digest matches.
    pub verify_manifest: bool,
}

impl Default for SegmentedObjectConfig {
    fn default() -> Self {
        Self {
            stream: SegmentStreamConfig::default(),
            max_segment_payload_length: 8192,
            verify_manifest: false,
        }
    }
}

impl SegmentedObjectConfig {
    pub fn validate(&self) -> Result<()> {
        self.stream.validate()?;
        if self.max_segment_payload_length < 1 {
            return Err(NamespaceError::InvalidConfig(
                "max segment payload length must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeneralizedObjectConfig {
    pub segmented: SegmentedObjectConfig,
}

#[derive(Debug, Clone)]
pub struct GeneralizedStreamConfig {
    /// Sequence numbers fetched ahead of the last one delivered.
    pub pipeline_size: usize,
    /// Freshness period of each produced `_latest` packet.
    pub latest_packet_freshness: Duration,
    pub object: GeneralizedObjectConfig,
}

impl Default for GeneralizedStreamConfig {
    fn default() -> Self {
        Self {
            pipeline_size: 8,
            latest_packet_freshness: Duration::from_millis(1000),
            object: GeneralizedObjectConfig::default(),
        }
    }
}

impl GeneralizedStreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pipeline_size < 1 {
            return Err(NamespaceError::InvalidConfig(
                "pipeline size must be at least 1".into(),
            ));
        }
        self.object.segmented.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NamespaceConfig::default();
        assert_eq!(config.interest_lifetime, Duration::from_secs(4));
        assert_eq!(config.max_interest_lifetime, Duration::from_secs(16));

        let segmented = SegmentedObjectConfig::default();
        assert_eq!(segmented.max_segment_payload_length, 8192);
        assert!(segmented.validate().is_ok());
        assert!(GeneralizedStreamConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_pipeline_rejected() {
        let config = SegmentStreamConfig {
            interest_pipeline_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(NamespaceError::InvalidConfig(_))));

        let config = SegmentStreamConfig {
            initial_interest_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
