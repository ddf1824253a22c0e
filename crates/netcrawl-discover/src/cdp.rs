//! CDP neighbor output parser.
//!
//! Turns the text of `show cdp neighbors detail` into `DeviceRecord`s with a
//! small state machine over a `LineScanner`:
//!
//! ```text
//! SeekDevice ──"Device ID:"──▶ SeekAddress ──"IP address:"──▶ SeekPlatform
//!     ▲                            │                              │
//!     │◀────── next device / EOF ──┘◀──── next device / EOF ──────┘
//!     │                                                           │ "Platform: … Capabilities:"
//!     │◀── record committed ── SeekInterface ◀────────────────────┘
//! ```
//!
//! Every field lookup stops at the next `Device ID:` line, so an incomplete
//! block is dropped without disturbing the blocks after it. A field that is
//! present but malformed (an address that does not decode, a platform line
//! with no capabilities marker) aborts the whole parse.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use netcrawl_core::{DeviceRecord, InterfaceId, Node};

use crate::error::ParseError;
use crate::lines::{Found, Line, LineScanner};

const DEVICE_START: &[&str] = &["Device", "ID:"];
const IP_ADDRESS: &[&str] = &["IP", "address:"];
const PLATFORM: &[&str] = &["Platform:"];
const CAPABILITIES: &str = "Capabilities:";
const INTERFACE: &[&str] = &["Interface:"];

enum State {
    SeekDevice,
    SeekAddress {
        name: Option<String>,
    },
    SeekPlatform {
        name: Option<String>,
        address: IpAddr,
    },
    SeekInterface {
        name: Option<String>,
        address: IpAddr,
        device_type: String,
    },
}

/// Parse CDP detail output into neighbor records, in document order.
pub fn parse(text: &str) -> Result<Vec<DeviceRecord>, ParseError> {
    let mut scanner = LineScanner::new(text);
    let mut records = Vec::new();
    let mut found_devices = false;
    let mut state = State::SeekDevice;

    loop {
        state = match state {
            State::SeekDevice => match scanner.find_start(DEVICE_START) {
                Some(line) => {
                    found_devices = true;
                    State::SeekAddress {
                        name: device_name(&line),
                    }
                }
                None if found_devices => return Ok(records),
                None => return Err(ParseError::NoDevices),
            },

            State::SeekAddress { name } => {
                match scanner.find_until(|l| l.starts_with(IP_ADDRESS), DEVICE_START) {
                    Found::Match(line) => State::SeekPlatform {
                        address: parse_address(&line)?,
                        name,
                    },
                    Found::Boundary | Found::End => {
                        skip_block(name.as_deref(), "no IP address listed");
                        State::SeekDevice
                    }
                }
            }

            State::SeekPlatform { name, address } => {
                match scanner.find_until(|l| l.starts_with(PLATFORM), DEVICE_START) {
                    Found::Match(line) => State::SeekInterface {
                        device_type: parse_platform(&line)?,
                        name,
                        address,
                    },
                    Found::Boundary | Found::End => {
                        skip_block(name.as_deref(), "platform was not listed");
                        State::SeekDevice
                    }
                }
            }

            State::SeekInterface {
                name,
                address,
                device_type,
            } => {
                match scanner.find_until(
                    |l| l.starts_with(INTERFACE) && port_id_index(l).is_some(),
                    DEVICE_START,
                ) {
                    Found::Match(line) => match parse_interface(&line) {
                        Some(interface) => {
                            records.push(DeviceRecord {
                                name,
                                address,
                                device_type,
                                interface,
                            });
                        }
                        None => skip_block(name.as_deref(), "interface name was empty"),
                    },
                    Found::Boundary | Found::End => {
                        skip_block(name.as_deref(), "did not list the interface it was seen on");
                    }
                }
                State::SeekDevice
            }
        };
    }
}

/// Parse `text` and install the result as `host`'s neighbor set.
///
/// Each record becomes a shell `Node` keyed by the host's local interface.
/// Returns the number of neighbors installed.
pub fn parse_into(host: &Node, text: &str) -> Result<usize, ParseError> {
    let records = parse(text)?;
    let neighbors: BTreeMap<InterfaceId, Arc<Node>> = records
        .iter()
        .map(|r| (r.interface.clone(), Arc::new(Node::from_record(r))))
        .collect();
    let count = neighbors.len();
    host.complete(neighbors);
    Ok(count)
}

fn device_name(line: &Line<'_>) -> Option<String> {
    let name = line.join(DEVICE_START.len(), line.items.len());
    (!name.is_empty()).then_some(name)
}

fn parse_address(line: &Line<'_>) -> Result<IpAddr, ParseError> {
    let value = line.join(IP_ADDRESS.len(), line.items.len());
    value
        .parse::<IpAddr>()
        .map(|ip| ip.to_canonical())
        .map_err(|_| ParseError::InvalidAddress {
            line: line.number,
            value,
        })
}

fn parse_platform(line: &Line<'_>) -> Result<String, ParseError> {
    let platform = line
        .position_from(PLATFORM.len(), CAPABILITIES)
        .map(|caps| trim_separators(&line.join(PLATFORM.len(), caps)).to_string())
        .unwrap_or_default();

    if platform.is_empty() {
        return Err(ParseError::MissingCapabilities {
            line: line.number,
            raw: line.raw.trim().to_string(),
        });
    }
    Ok(platform)
}

fn parse_interface(line: &Line<'_>) -> Option<InterfaceId> {
    let port = port_id_index(line)?;
    let interface = trim_separators(&line.join(INTERFACE.len(), port)).to_string();
    (!interface.is_empty()).then(|| InterfaceId(interface))
}

/// Index of the `Port ID` pair that follows the local interface name.
fn port_id_index(line: &Line<'_>) -> Option<usize> {
    line.items
        .windows(2)
        .enumerate()
        .skip(INTERFACE.len() + 1)
        .find(|(_, pair)| pair[0] == "Port" && pair[1] == "ID")
        .map(|(i, _)| i)
}

fn trim_separators(s: &str) -> &str {
    s.trim_end_matches(|c: char| c == ',' || c.is_whitespace())
}

fn skip_block(name: Option<&str>, reason: &str) {
    tracing::debug!(
        device = name.unwrap_or("<unnamed>"),
        reason,
        "Saw a device but skipped it"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTER_OUTPUT: &str = "
Device ID: Switch2
Entry address(es):
  IP address: 192.168.1.243
Platform: cisco WS-C2950-12,  Capabilities: Trans-Bridge Switch
Interface: FastEthernet0/12,  Port ID (outgoing port): FastEthernet0/1
Holdtime : 137 sec
Version :
Cisco Internetwork Operating System Software
IOS (tm) C2950 Software (C2950-C3H2S-M), Version 12.0(5.3)WC(1), MAINTENANCE INTERIM SOFTWARE
Copyright (c) 1986-2001 by cisco Systems, Inc.
Compiled Mon 30-Apr-01 07:56 by devgoyal
advertisement version: 2
Protocol Hello:  OUI=0x00000C, Protocol ID=0x0112; payload len=27, value=00000000FFFFFFFF010121FF0000000000000006D6AC46C0FF0001
VTP Management Domain: ''
Management address(es):
-------------------------
Device ID: Router2
Entry address(es):
  IP address: 192.168.1.240
Platform: Cisco 2621XM,  Capabilities: Switch IGMP
Interface: FastEthernet0/3,  Port ID (outgoing port): FastEthernet0/0
Holdtime : 142 sec
Version :
Cisco IOS Software, C2600 Software (C2600-ADVIPSERVICESK9-M), Version 12.3(4)T4,  RELEASE SOFTWARE (fc2)
Technical Support: http://www.cisco.com/techsupport
Copyright (c) 1986-2004 by Cisco Systems, Inc.
Compiled Thu 11-Mar-04 19:57 by eaarmas
advertisement version: 2
VTP Management Domain: ''
Duplex: full
Management address(es):
-------------------------
Device ID: RootBridge.edtetz.net
Entry address(es):
  IP address: 192.168.1.103
Platform: AIR-AP350,  Capabilities:
Interface: FastEthernet0/1,  Port ID (outgoing port): fec0
Holdtime : 131 sec
Version :
Cisco 350 Series AP 12.03T
advertisement version: 2
Duplex: full
Power drawn: 6.000 Watts
Management address(es):
	";

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn summary(records: &[DeviceRecord]) -> Vec<(String, String, String)> {
        records
            .iter()
            .map(|r| {
                (
                    r.interface.to_string(),
                    r.address.to_string(),
                    r.device_type.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_end_to_end() {
        let records = parse(ROUTER_OUTPUT).unwrap();
        assert_eq!(
            summary(&records),
            vec![
                (
                    "FastEthernet0/12".to_string(),
                    "192.168.1.243".to_string(),
                    "cisco WS-C2950-12".to_string()
                ),
                (
                    "FastEthernet0/3".to_string(),
                    "192.168.1.240".to_string(),
                    "Cisco 2621XM".to_string()
                ),
                (
                    "FastEthernet0/1".to_string(),
                    "192.168.1.103".to_string(),
                    "AIR-AP350".to_string()
                ),
            ]
        );
        assert_eq!(records[0].name.as_deref(), Some("Switch2"));
        assert_eq!(records[2].name.as_deref(), Some("RootBridge.edtetz.net"));
    }

    #[test]
    fn test_parse_into_host() {
        let host = Node::root(ip("192.168.0.1"));
        let count = parse_into(&host, ROUTER_OUTPUT).unwrap();
        assert_eq!(count, 3);

        let switch = host.neighbor("FastEthernet0/12").unwrap();
        assert_eq!(switch.address(), ip("192.168.1.243"));
        assert_eq!(switch.device_type().as_deref(), Some("cisco WS-C2950-12"));
        assert_eq!(switch.neighbor_count(), 0);

        let router = host.neighbor("FastEthernet0/3").unwrap();
        assert_eq!(router.address(), ip("192.168.1.240"));
        assert_eq!(host.device_type().as_deref(), Some("root"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = parse(ROUTER_OUTPUT).unwrap();
        let second = parse(ROUTER_OUTPUT).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_devices() {
        assert_eq!(parse(""), Err(ParseError::NoDevices));
        assert_eq!(
            parse("% CDP is not enabled\n"),
            Err(ParseError::NoDevices)
        );
    }

    #[test]
    fn test_only_incomplete_blocks_is_not_an_error() {
        let text = "Device ID: lonely\nEntry address(es):\nHoldtime : 10 sec\n";
        assert_eq!(parse(text), Ok(vec![]));
    }

    #[test]
    fn test_block_missing_address_is_skipped() {
        let text = "\
Device ID: noaddr
Platform: cisco WS-C2950-12,  Capabilities: Switch
Interface: FastEthernet0/1,  Port ID (outgoing port): FastEthernet0/1
Device ID: good
  IP address: 10.0.0.2
Platform: cisco WS-C2950-12,  Capabilities: Switch
Interface: FastEthernet0/2,  Port ID (outgoing port): FastEthernet0/1
";
        let records = parse(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, ip("10.0.0.2"));
        assert_eq!(records[0].interface.as_str(), "FastEthernet0/2");
    }

    #[test]
    fn test_block_missing_platform_is_skipped() {
        let text = "\
Device ID: noplatform
  IP address: 10.0.0.3
Interface: FastEthernet0/1,  Port ID (outgoing port): FastEthernet0/1
Device ID: good
  IP address: 10.0.0.4
Platform: Cisco 2621XM,  Capabilities: Router
Interface: FastEthernet0/2,  Port ID (outgoing port): FastEthernet0/0
";
        let records = parse(text).unwrap();
        assert_eq!(summary(&records), vec![(
            "FastEthernet0/2".to_string(),
            "10.0.0.4".to_string(),
            "Cisco 2621XM".to_string()
        )]);
    }

    #[test]
    fn test_block_missing_interface_is_skipped() {
        let text = "\
Device ID: first
  IP address: 10.0.0.5
Platform: Cisco 2621XM,  Capabilities: Router
Holdtime : 142 sec
Device ID: second
  IP address: 10.0.0.6
Platform: Cisco 2621XM,  Capabilities: Router
Interface: FastEthernet0/9,  Port ID (outgoing port): FastEthernet0/0
Device ID: third
  IP address: 10.0.0.7
Platform: Cisco 2621XM,  Capabilities: Router
";
        let records = parse(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, ip("10.0.0.6"));
    }

    #[test]
    fn test_invalid_address_aborts() {
        let text = "\
Device ID: good
  IP address: 10.0.0.2
Platform: cisco WS-C2950-12,  Capabilities: Switch
Interface: FastEthernet0/1,  Port ID (outgoing port): FastEthernet0/1
Device ID: bad
  IP address: 10.0.0.300
Platform: cisco WS-C2950-12,  Capabilities: Switch
Interface: FastEthernet0/2,  Port ID (outgoing port): FastEthernet0/1
";
        assert_eq!(
            parse(text),
            Err(ParseError::InvalidAddress {
                line: 6,
                value: "10.0.0.300".to_string()
            })
        );
    }

    #[test]
    fn test_platform_without_capabilities_aborts() {
        let text = "\
Device ID: sw
  IP address: 10.0.0.2
Platform: cisco WS-C2950-12
Interface: FastEthernet0/1,  Port ID (outgoing port): FastEthernet0/1
";
        assert_eq!(
            parse(text),
            Err(ParseError::MissingCapabilities {
                line: 3,
                raw: "Platform: cisco WS-C2950-12".to_string()
            })
        );
    }

    #[test]
    fn test_management_addresses_are_ignored() {
        let text = "\
Device ID: sw
Entry address(es):
  IP address: 10.0.0.2
Platform: cisco WS-C3750,  Capabilities: Switch IGMP
Interface: GigabitEthernet1/0/1,  Port ID (outgoing port): GigabitEthernet1/0/24
Management address(es):
  IP address: 172.16.0.2
";
        let records = parse(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, ip("10.0.0.2"));
    }

    #[test]
    fn test_interface_name_with_spaces() {
        let text = "\
Device ID: nexus
  IP address: 10.0.0.8
Platform: N9K-C93180YC-EX,  Capabilities: Router Switch
Interface: Ethernet 1/49,  Port ID (outgoing port): Ethernet1/1
";
        let records = parse(text).unwrap();
        assert_eq!(records[0].interface.as_str(), "Ethernet 1/49");
    }

    #[test]
    fn test_addresses_are_canonical() {
        let text = "\
Device ID: v6
  IP address: FE80::1
Platform: ASR1001,  Capabilities: Router
Interface: Gi0/0/0,  Port ID (outgoing port): Gi0/0/1
Device ID: mapped
  IP address: ::ffff:10.0.0.9
Platform: ASR1001,  Capabilities: Router
Interface: Gi0/0/1,  Port ID (outgoing port): Gi0/0/1
";
        let records = parse(text).unwrap();
        assert_eq!(records[0].address, ip("fe80::1"));
        assert_eq!(records[1].address, ip("10.0.0.9"));
    }

    #[test]
    fn test_duplicate_interface_keeps_last() {
        let text = "\
Device ID: a
  IP address: 10.0.0.2
Platform: X,  Capabilities: Switch
Interface: Fa0/1,  Port ID (outgoing port): Fa0/1
Device ID: b
  IP address: 10.0.0.3
Platform: X,  Capabilities: Switch
Interface: Fa0/1,  Port ID (outgoing port): Fa0/2
";
        let host = Node::new(ip("10.0.0.1"));
        assert_eq!(parse_into(&host, text).unwrap(), 1);
        assert_eq!(
            host.neighbor("Fa0/1").unwrap().address(),
            ip("10.0.0.3")
        );
    }

    #[test]
    fn test_failed_parse_leaves_host_untouched() {
        let host = Node::new(ip("10.0.0.1"));
        host.set_neighbor("Fa0/9".into(), Arc::new(Node::new(ip("10.0.0.99"))));
        assert!(parse_into(&host, "").is_err());
        assert!(host.neighbor("Fa0/9").is_some());
        assert!(host.device_type().is_none());
    }
}
