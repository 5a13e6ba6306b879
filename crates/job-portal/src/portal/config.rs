use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ACTIVE_APPLICATIONS: u32 = 10;

/// Capacity dials applied by the portal service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalLimits {
    /// Active applications a single applicant may hold at once.
    pub max_active_applications: u32,
}

impl Default for PortalLimits {
    fn default() -> Self {
        Self {
            max_active_applications: DEFAULT_MAX_ACTIVE_APPLICATIONS,
        }
    }
}
