// https://dev.mysql.com/doc/internals/en/capability-flags.html#packet-Protocol::CapabilityFlags
// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/group__group__cs__capabilities__flags.html

use std::fmt;

bitflags::bitflags! {
    /// Capability flags advertised in the Initial Handshake.
    ///
    /// Bits 25..31 have no name here. They are kept verbatim so a decoded
    /// value re-encodes to the exact bytes it was read from.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        // use the improved version of "old password auth"
        const LONG_PASSWORD = 1 << 0;

        // send found (read: matched) rows instead of affected rows in the EOF packet
        const FOUND_ROWS = 1 << 1;

        // longer flags for column metadata
        const LONG_FLAG = 1 << 2;

        // database (schema) name can be specified on connect in Handshake Response Packet
        const CONNECT_WITH_DB = 1 << 3;

        // do not permit `database.table.column`
        const NO_SCHEMA = 1 << 4;

        // compression protocol supported
        const COMPRESS = 1 << 5;

        // legacy flag to enable special ODBC handling
        const ODBC = 1 << 6;

        // enable LOAD DATA LOCAL
        const LOCAL_FILES = 1 << 7;

        // SQL parser can ignore spaces before '('
        const IGNORE_SPACE = 1 << 8;

        // uses the 4.1+ protocol
        const PROTOCOL_41 = 1 << 9;

        // wait_timeout versus wait_interactive_timeout
        const INTERACTIVE = 1 << 10;

        // switch to SSL after the handshake
        const SSL = 1 << 11;

        // do not issue SIGPIPE if network failures occur
        const IGNORE_SIGPIPE = 1 << 12;

        // EOF packets will contain transaction status flags
        const TRANSACTIONS = 1 << 13;

        // unused, was 4.1 protocol in 4.1.0
        const RESERVED = 1 << 14;

        // support native 4.1+ authentication
        const SECURE_CONNECTION = 1 << 15;

        // can handle multiple statements in COM_QUERY and COM_STMT_PREPARE
        const MULTI_STATEMENTS = 1 << 16;

        // can send multiple result sets for COM_QUERY
        const MULTI_RESULTS = 1 << 17;

        // can send multiple result sets for COM_STMT_EXECUTE
        const PS_MULTI_RESULTS = 1 << 18;

        // supports authentication plugins
        const PLUGIN_AUTH = 1 << 19;

        // permits connection attributes
        const CONNECT_ATTRS = 1 << 20;

        // enable authentication response packet to be larger than 255 bytes
        const PLUGIN_AUTH_LENENC_DATA = 1 << 21;

        // can handle connection for a user account with expired passwords
        const CAN_HANDLE_EXPIRED_PASSWORDS = 1 << 22;

        // capable of handling server state change information in an OK packet
        const SESSION_TRACK = 1 << 23;

        // client no longer needs EOF_Packet and will use OK_Packet instead
        const DEPRECATE_EOF = 1 << 24;
    }
}

impl Capabilities {
    /// A value with only `bit` set. Positions past 31 yield an empty set.
    pub const fn with_bit(bit: u32) -> Self {
        match 1u32.checked_shl(bit) {
            Some(bits) => Self::from_bits_retain(bits),
            None => Self::empty(),
        }
    }

    /// Reassemble the flags from the two 16-bit halves of the handshake.
    pub const fn from_halves(low: u16, high: u16) -> Self {
        Self::from_bits_retain(low as u32 | ((high as u32) << 16))
    }

    /// The half written before character set and status flags.
    pub const fn low_half(&self) -> u16 {
        (self.bits() & 0xFFFF) as u16
    }

    /// The half written after status flags.
    pub const fn high_half(&self) -> u16 {
        (self.bits() >> 16) as u16
    }

    /// True if any bit of `flag` is set.
    pub const fn has(&self, flag: Capabilities) -> bool {
        self.bits() & flag.bits() != 0
    }

    /// One line per named flag that is set, lowest bit first.
    ///
    /// Each line reads `0x00080000 - 00000000000010000000000000000000 - PLUGIN_AUTH`.
    pub fn describe(&self) -> String {
        self.iter_names()
            .map(|(name, flag)| format!("0x{:08x} - {:032b} - {}", flag.bits(), flag.bits(), name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_bit_sets_only_that_flag() {
        for (name, flag) in Capabilities::all().iter_names() {
            let bit = flag.bits().trailing_zeros();
            let value = Capabilities::with_bit(bit);
            assert!(value.has(flag), "{name} should be set");

            for (other_name, other) in Capabilities::all().iter_names() {
                if other != flag {
                    assert!(!value.has(other), "{other_name} should not be set for {name}");
                }
            }
        }
    }

    #[test]
    fn twenty_five_named_bits() {
        assert_eq!(Capabilities::all().iter_names().count(), 25);
        assert_eq!(Capabilities::all().bits(), 0x01FF_FFFF);
    }

    #[test]
    fn halves_are_reassembled() {
        let caps = Capabilities::from_halves(
            u16::from_le_bytes([0x01, 0x00]),
            u16::from_le_bytes([0x02, 0x00]),
        );
        assert_eq!(caps.bits(), 0x0002_0001);
        assert_eq!(caps.low_half(), 0x0001);
        assert_eq!(caps.high_half(), 0x0002);
    }

    #[test]
    fn describe_is_ordered_and_skips_reserved_bits() {
        let caps = Capabilities::PLUGIN_AUTH
            | Capabilities::LONG_PASSWORD
            | Capabilities::SECURE_CONNECTION
            | Capabilities::from_bits_retain(1 << 30);

        let text = caps.describe();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines,
            vec![
                "0x00000001 - 00000000000000000000000000000001 - LONG_PASSWORD",
                "0x00008000 - 00000000000000001000000000000000 - SECURE_CONNECTION",
                "0x00080000 - 00000000000010000000000000000000 - PLUGIN_AUTH",
            ]
        );
    }

    #[test]
    fn describe_empty() {
        assert_eq!(Capabilities::empty().describe(), "");
        assert_eq!(Capabilities::from_bits_retain(0xFE00_0000).describe(), "");
    }

    #[test]
    fn bit_past_range_is_empty() {
        assert!(Capabilities::with_bit(32).is_empty());
    }
}
