use crate::device::BdAddr;

/// Boards we have handed out a name to.
const KNOWN_BOARDS: &[(BdAddr, &str)] = &[
    (BdAddr::new([0x30, 0xae, 0xa4, 0xcc, 0x24, 0x6a]), "esp32-1"),
    (BdAddr::new([0x30, 0xae, 0xa4, 0xcc, 0x32, 0x4e]), "esp32-2"),
    (BdAddr::new([0xac, 0x67, 0xb2, 0x53, 0x82, 0x8a]), "esp32-3"),
    (BdAddr::new([0xac, 0x67, 0xb2, 0x53, 0x7f, 0x22]), "esp32-4"),
    (BdAddr::new([0xac, 0x67, 0xb2, 0x53, 0x84, 0x82]), "esp32-5"),
    (BdAddr::new([0xac, 0x67, 0xb2, 0x53, 0x84, 0xaa]), "esp32-6"),
    (BdAddr::new([0x24, 0x0a, 0xc4, 0xeb, 0x36, 0x8a]), "esp32-7"),
    (BdAddr::new([0xac, 0x67, 0xb2, 0x53, 0x93, 0x1e]), "esp32-8"),
    (BdAddr::new([0xac, 0x67, 0xb2, 0x53, 0x84, 0xb2]), "esp32-9"),
    (BdAddr::new([0xac, 0x67, 0xb2, 0x53, 0x7b, 0x3a]), "esp32-10"),
    (BdAddr::new([0x8c, 0xaa, 0xb5, 0x85, 0x0a, 0x7e]), "esp32-11"),
    (BdAddr::new([0x8c, 0xaa, 0xb5, 0x86, 0x2b, 0xa2]), "esp32-12"),
    (BdAddr::new([0x8c, 0xaa, 0xb5, 0x86, 0x22, 0xc2]), "esp32-13"),
    (BdAddr::new([0x8c, 0xaa, 0xb5, 0x85, 0x43, 0x42]), "esp32-14"),
    (BdAddr::new([0x8c, 0xaa, 0xb5, 0x85, 0x6d, 0x06]), "esp32-15"),
    (BdAddr::new([0x8c, 0xaa, 0xb5, 0x85, 0x05, 0xf2]), "esp32-16"),
    (BdAddr::new([0x8c, 0xaa, 0xb5, 0x84, 0xe9, 0x76]), "esp32-17"),
    (BdAddr::new([0x8c, 0xaa, 0xb5, 0x86, 0x2d, 0x5a]), "esp32-18"),
    (BdAddr::new([0x8c, 0xaa, 0xb5, 0x84, 0xec, 0xc6]), "esp32-19"),
    (BdAddr::new([0x8c, 0xaa, 0xb5, 0x86, 0x08, 0x46]), "esp32-20"),
    (BdAddr::new([0x30, 0xae, 0xa4, 0xcc, 0x45, 0x06]), "esp32-wrover-1"),
    (BdAddr::new([0x30, 0xae, 0xa4, 0xcc, 0x42, 0x7a]), "esp32-wrover-2"),
];

/// Friendly name for a device address.
///
/// Unknown boards get `esp32_xxxx` from the last two address bytes.
pub fn device_name(addr: &BdAddr) -> String {
    KNOWN_BOARDS
        .iter()
        .find(|(known, _)| known == addr)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| {
            let bytes = addr.as_bytes();
            format!("esp32_{:02x}{:02x}", bytes[4], bytes[5])
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_board() {
        let addr: BdAddr = "8c:aa:b5:85:0a:7e".parse().unwrap();
        assert_eq!(device_name(&addr), "esp32-11");
        let addr: BdAddr = "30:AE:A4:CC:42:7A".parse().unwrap();
        assert_eq!(device_name(&addr), "esp32-wrover-2");
    }

    #[test]
    fn test_unknown_board() {
        let addr: BdAddr = "11:22:33:44:55:66".parse().unwrap();
        assert_eq!(device_name(&addr), "esp32_5566");
    }
}
