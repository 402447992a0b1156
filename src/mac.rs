//! Parses textual hardware addresses and narrows them down to IEEE 802 MAC-48
//! addresses, the only kind a magic packet can carry.
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

const MAC48_LEN: usize = 6;

/// Two hex digits per group, five `:` or `-` separators. Each separator is
/// matched on its own, so `11:22-33:44-55:66` passes.
const MAC48_PATTERN: &str = r"^([0-9a-fA-F]{2}[:-]){5}([0-9a-fA-F]{2})$";

static MAC48: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MAC48_PATTERN).expect("MAC-48 pattern compiles"));

/// A 6 byte network hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; MAC48_LEN]);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HardwareAddrError {
    /// Too short, or decodes to a byte count no hardware address uses
    #[error("invalid length")]
    InvalidLength,

    /// Neither `xx:xx:..` / `xx-xx-..` nor `xxxx.xxxx.xxxx`
    #[error("unknown notation")]
    UnknownNotation,

    #[error("expected a delimiter at position {0}")]
    ExpectedDelimiter(usize),

    #[error("invalid hex digit at position {0}")]
    InvalidHexDigit(usize),
}

/// Which validation layer rejected the input.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Stage {
    #[error("parse_hardware_addr: {0}")]
    HardwareAddr(#[from] HardwareAddrError),

    #[error("not a IEEE 802 MAC-48 address")]
    Mac48,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid MAC address '{input}': {stage}")]
    InvalidFormat { input: String, stage: Stage },
}

impl ParseError {
    fn new(input: &str, stage: impl Into<Stage>) -> Self {
        ParseError::InvalidFormat {
            input: input.to_owned(),
            stage: stage.into(),
        }
    }
}

fn hex_value(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

/// Parses any of the common hardware address notations:
///
/// ```text
/// 00:00:5e:00:53:01
/// 00-00-5e-00-53-01
/// 0000.5e00.5301
/// ```
///
/// as well as their 8 byte (EUI-64) and 20 byte (IP over InfiniBand)
/// variants. In the two digit notations every separator may be either `:` or
/// `-`, independently of the others.
pub fn parse_hardware_addr(input: &str) -> Result<Vec<u8>, HardwareAddrError> {
    let s = input.as_bytes();
    if s.len() < 14 {
        return Err(HardwareAddrError::InvalidLength);
    }

    let (digits, separators): (usize, &[u8]) = match (s[2], s[4]) {
        (b':' | b'-', _) => (2, b":-"),
        (_, b'.') => (4, b"."),
        _ => return Err(HardwareAddrError::UnknownNotation),
    };

    // every group is followed by one separator, except the last
    let stride = digits + 1;
    if (s.len() + 1) % stride != 0 {
        return Err(HardwareAddrError::InvalidLength);
    }
    let groups = (s.len() + 1) / stride;
    let len = groups * digits / 2;
    if !matches!(len, 6 | 8 | 20) {
        return Err(HardwareAddrError::InvalidLength);
    }

    let mut addr = Vec::with_capacity(len);
    for group in 0..groups {
        let start = group * stride;
        if group > 0 && !separators.contains(&s[start - 1]) {
            return Err(HardwareAddrError::ExpectedDelimiter(start - 1));
        }
        for pos in (start..start + digits).step_by(2) {
            let hi = hex_value(s[pos]).ok_or(HardwareAddrError::InvalidHexDigit(pos))?;
            let lo = hex_value(s[pos + 1]).ok_or(HardwareAddrError::InvalidHexDigit(pos + 1))?;
            addr.push(hi << 4 | lo);
        }
    }

    Ok(addr)
}

impl MacAddr {
    pub const fn new(bytes: [u8; MAC48_LEN]) -> Self {
        MacAddr(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MAC48_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for MacAddr {
    type Error = std::array::TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        bytes.try_into().map(MacAddr)
    }
}

impl FromStr for MacAddr {
    type Err = ParseError;

    /// Accepts exactly six pairs of hex digits separated by `:` or `-`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let bytes = parse_hardware_addr(input).map_err(|err| ParseError::new(input, err))?;

        // the generic parser also takes EUI-64 and dotted forms
        if !MAC48.is_match(input) {
            return Err(ParseError::new(input, Stage::Mac48));
        }

        bytes
            .as_slice()
            .try_into()
            .map_err(|_| ParseError::new(input, Stage::Mac48))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[cfg(test)]
fn stage_of(input: &str) -> Stage {
    match input.parse::<MacAddr>() {
        Err(ParseError::InvalidFormat { stage, .. }) => stage,
        Ok(mac) => panic!("'{input}' parsed as {mac}"),
    }
}

#[test]
fn test_parse_colon() {
    let mac: MacAddr = "11:22:33:44:55:66".parse().unwrap();
    assert_eq!(mac.as_bytes(), &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
}

#[test]
fn test_parse_hyphen() {
    let colon: MacAddr = "11:22:33:44:55:66".parse().unwrap();
    let hyphen: MacAddr = "11-22-33-44-55-66".parse().unwrap();
    assert_eq!(colon, hyphen);
}

#[test]
fn test_parse_mixed_case() {
    let mac: MacAddr = "aA:Bb:cC:dD:eE:Ff".parse().unwrap();
    assert_eq!(mac.as_bytes(), &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
}

#[test]
fn test_parse_mixed_separators_accepted() {
    // permissive on purpose: each separator is checked on its own
    let mac: MacAddr = "11:22-33:44-55:66".parse().unwrap();
    assert_eq!(mac.as_bytes(), &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
}

#[test]
fn test_parse_too_many_groups() {
    let err = "11:22:33:44:55:66:77".parse::<MacAddr>().unwrap_err();
    assert!(matches!(err, ParseError::InvalidFormat { .. }));
    assert!(err.to_string().contains("11:22:33:44:55:66:77"));
}

#[test]
fn test_parse_too_few_groups() {
    assert_eq!(
        stage_of("11:22:33:44:55"),
        Stage::HardwareAddr(HardwareAddrError::InvalidLength)
    );
}

#[test]
fn test_parse_three_digit_groups() {
    assert!("111:222:333:444:555:666".parse::<MacAddr>().is_err());
}

#[test]
fn test_parse_gibberish() {
    assert!("hello".parse::<MacAddr>().is_err());
    assert_eq!(
        stage_of("he:js:an:cc:dd:ee"),
        Stage::HardwareAddr(HardwareAddrError::InvalidHexDigit(0))
    );
}

#[test]
fn test_parse_bad_separator() {
    assert_eq!(
        stage_of("11:22:33_44:55:66"),
        Stage::HardwareAddr(HardwareAddrError::ExpectedDelimiter(8))
    );
}

#[test]
fn test_parse_sign_is_not_a_digit() {
    assert_eq!(
        stage_of("+1:22:33:44:55:66"),
        Stage::HardwareAddr(HardwareAddrError::InvalidHexDigit(0))
    );
}

#[test]
fn test_parse_eui64_rejected_by_mac48_check() {
    let input = "11:22:33:44:55:66:77:88";
    assert_eq!(parse_hardware_addr(input).unwrap().len(), 8);
    assert_eq!(stage_of(input), Stage::Mac48);
}

#[test]
fn test_parse_dotted_rejected_by_mac48_check() {
    let input = "1122.3344.5566";
    assert_eq!(
        parse_hardware_addr(input).unwrap(),
        vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66]
    );
    assert_eq!(stage_of(input), Stage::Mac48);
}

#[test]
fn test_parse_infiniband_length() {
    let input = "00:00:00:00:fe:80:00:00:00:00:00:00:02:00:5e:10:00:00:00:01";
    assert_eq!(parse_hardware_addr(input).unwrap().len(), 20);
    assert_eq!(stage_of(input), Stage::Mac48);
}

#[test]
fn test_display() {
    let mac = MacAddr::new([0x0A, 0xBB, 0x0C, 0xDD, 0x0E, 0xFF]);
    assert_eq!(mac.to_string(), "0a:bb:0c:dd:0e:ff");
}

#[test]
fn test_try_from_slice() {
    let bytes = [1u8, 2, 3, 4, 5, 6, 7];
    assert!(MacAddr::try_from(&bytes[..6]).is_ok());
    assert!(MacAddr::try_from(&bytes[..]).is_err());
}
