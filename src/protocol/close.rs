use phf::phf_map;

/// Reconnect policy for one close code.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseCodeInfo {
    pub description: &'static str,
    /// Whether the session should dial again without caller intervention.
    pub recoverable: bool,
}

/// Close code whose reason field carries a replacement endpoint URL instead
/// of human-readable text.
pub const BAD_ROUTE: u16 = 4006;

/// Known gateway close codes.
///
/// 4007 (out of sync) is deliberately absent; the gateway has never
/// documented its semantics, so it falls through to the permissive default.
static CLOSE_CODES: phf::Map<u16, CloseCodeInfo> = phf_map! {
    4000_u16 => CloseCodeInfo { description: "unknown error", recoverable: true },
    4001_u16 => CloseCodeInfo { description: "invalid auth", recoverable: false },
    4002_u16 => CloseCodeInfo { description: "identify timeout", recoverable: true },
    4003_u16 => CloseCodeInfo { description: "not authenticated", recoverable: true },
    4004_u16 => CloseCodeInfo { description: "invalid opcode", recoverable: true },
    4005_u16 => CloseCodeInfo { description: "invalid payload", recoverable: true },
    4006_u16 => CloseCodeInfo { description: "bad route", recoverable: true },
};

const UNKNOWN_CLOSE: CloseCodeInfo = CloseCodeInfo {
    description: "unknown close code",
    recoverable: true,
};

/// Map a close code to its description and reconnect policy.
///
/// Codes not in the table are treated as recoverable: most transient
/// failures should self-heal via reconnect.
#[must_use]
pub fn classify(code: u16) -> &'static CloseCodeInfo {
    CLOSE_CODES.get(&code).unwrap_or(&UNKNOWN_CLOSE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_auth_is_fatal() {
        let info = classify(4001);

        assert_eq!(info.description, "invalid auth");
        assert!(!info.recoverable);
    }

    #[test]
    fn every_other_known_code_is_recoverable() {
        for code in [4000, 4002, 4003, 4004, 4005, 4006] {
            assert!(classify(code).recoverable, "code {code} should reconnect");
        }
    }

    #[test]
    fn table_misses_default_to_recoverable() {
        // 4007 (out of sync) and arbitrary codes both take the default.
        assert!(classify(4007).recoverable);
        assert!(classify(1006).recoverable);
        assert_eq!(classify(4999).description, "unknown close code");
    }
}
