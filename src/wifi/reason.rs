use std::fmt;

/// Station disconnect reason as reported by the link driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisconnectReason(pub u8);

impl DisconnectReason {
    pub const AUTH_EXPIRE: Self = Self(2);
    pub const ASSOC_LEAVE: Self = Self(8);
    pub const FOURWAY_HANDSHAKE_TIMEOUT: Self = Self(15);
    pub const BEACON_TIMEOUT: Self = Self(200);
    pub const NO_AP_FOUND: Self = Self(201);
    pub const AUTH_FAIL: Self = Self(202);
    pub const ASSOC_FAIL: Self = Self(203);
    pub const HANDSHAKE_TIMEOUT: Self = Self(204);
    pub const CONNECTION_FAIL: Self = Self(205);

    pub fn name(self) -> &'static str {
        match self.0 {
            2 => "AUTH_EXPIRE",
            3 => "AUTH_LEAVE",
            4 => "ASSOC_EXPIRE",
            5 => "ASSOC_TOOMANY",
            6 => "NOT_AUTHED",
            7 => "NOT_ASSOCED",
            8 => "ASSOC_LEAVE",
            9 => "ASSOC_NOT_AUTHED",
            10 => "DISASSOC_PWRCAP_BAD",
            11 => "DISASSOC_SUPCHAN_BAD",
            13 => "IE_INVALID",
            14 => "MIC_FAILURE",
            15 => "4WAY_HANDSHAKE_TIMEOUT",
            16 => "GROUP_KEY_UPDATE_TIMEOUT",
            17 => "IE_IN_4WAY_DIFFERS",
            18 => "GROUP_CIPHER_INVALID",
            19 => "PAIRWISE_CIPHER_INVALID",
            20 => "AKMP_INVALID",
            21 => "UNSUPP_RSN_IE_VERSION",
            22 => "INVALID_RSN_IE_CAP",
            23 => "802_1X_AUTH_FAILED",
            24 => "CIPHER_SUITE_REJECTED",
            200 => "BEACON_TIMEOUT",
            201 => "NO_AP_FOUND",
            202 => "AUTH_FAIL",
            203 => "ASSOC_FAIL",
            204 => "HANDSHAKE_TIMEOUT",
            205 => "CONNECTION_FAIL",
            _ => "UNKNOWN",
        }
    }

    /// Reasons that point at wrong or rejected credentials.
    pub fn is_auth_failure(self) -> bool {
        matches!(
            self,
            Self::AUTH_EXPIRE
                | Self::FOURWAY_HANDSHAKE_TIMEOUT
                | Self::BEACON_TIMEOUT
                | Self::AUTH_FAIL
                | Self::ASSOC_FAIL
                | Self::HANDSHAKE_TIMEOUT
        )
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}
